//! Network request interception.

use std::fmt;

use tether_sys::tether_net_response;

use crate::{Error, Result};

/// A network request made by the webview - could be a page load, an
/// XMLHttpRequest, a `fetch()`, an img src, anything.
///
/// Dropping the request without calling [`NetRequest::respond`] lets it go
/// through to the network.
pub struct NetRequest<'a> {
    uri: &'a str,
    responder: &'a mut dyn FnMut(&NetResponse<'_>),
}

impl<'a> NetRequest<'a> {
    /// Wrap a requested URI and the function that answers it.
    pub fn new(uri: &'a str, responder: &'a mut dyn FnMut(&NetResponse<'_>)) -> Self {
        Self { uri, responder }
    }

    /// The URI that was requested by the webview.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.uri
    }

    /// Answer this request, bypassing the regular network stack.
    pub fn respond(self, response: NetResponse<'_>) {
        tracing::debug!(
            "Responding to {} with {} ({} bytes)",
            self.uri,
            response.status_code,
            response.content.len()
        );
        (self.responder)(&response);
    }
}

impl fmt::Debug for NetRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetRequest").field("uri", &self.uri).finish_non_exhaustive()
    }
}

/// A substitute response for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetResponse<'a> {
    /// Contents of the response
    pub content: &'a [u8],
    /// The HTTP status code
    pub status_code: u16,
}

impl<'a> NetResponse<'a> {
    /// A `200 OK` response with the given content.
    #[must_use]
    pub fn ok(content: &'a [u8]) -> Self {
        Self {
            content,
            status_code: 200,
        }
    }

    /// An empty `404 Not Found` response.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            content: &[],
            status_code: 404,
        }
    }

    /// Borrow the C representation. Only valid while `self` is.
    #[must_use]
    pub fn to_raw(&self) -> tether_net_response {
        tether_net_response {
            status_code: usize::from(self.status_code),
            content: self.content.as_ptr(),
            content_length: self.content.len(),
        }
    }

    /// Read a response handed over by C code.
    ///
    /// # Safety
    ///
    /// `raw.content` must point to `raw.content_length` readable bytes that
    /// outlive `'a`, or be null with a zero length.
    #[allow(unsafe_code)]
    pub unsafe fn from_raw(raw: &tether_net_response) -> Result<Self> {
        let status_code = u16::try_from(raw.status_code)
            .ok()
            .filter(|code| (100..1000).contains(code))
            .ok_or(Error::InvalidStatusCode(raw.status_code))?;

        let content = if raw.content.is_null() || raw.content_length == 0 {
            &[][..]
        } else {
            // SAFETY: the caller guarantees the pointer and length describe live memory.
            unsafe { std::slice::from_raw_parts(raw.content, raw.content_length) }
        };

        Ok(Self {
            content,
            status_code,
        })
    }
}

/// The reason phrase sent along with a status code.
#[must_use]
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Detect the MIME type of a response from the last segment of the URI it answers.
///
/// Directory URIs are documents. `None` means the type is unknown and the
/// engine should sniff it.
#[must_use]
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn mime_for_uri(uri: &str) -> Option<&'static str> {
    let path = uri.split(['?', '#']).next().unwrap_or("");
    let file = path.rsplit('/').next().unwrap_or("");
    if file.is_empty() {
        return Some("text/html");
    }
    let (_, extension) = file.rsplit_once('.')?;

    let mime = match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" | "map" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(mime)
}

/// The raw header block for a response to `uri`. Empty when the type is unknown.
#[must_use]
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn response_headers(uri: &str) -> String {
    mime_for_uri(uri)
        .map(|mime| format!("Content-Type: {mime}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uri() {
        let mut responder = |_: &NetResponse<'_>| {};
        let req = NetRequest::new("https://example.com/index.html", &mut responder);
        assert_eq!(req.uri(), "https://example.com/index.html");
    }

    #[test]
    fn test_respond_reaches_responder() {
        let mut seen = None;
        let mut responder = |res: &NetResponse<'_>| {
            seen = Some((res.status_code, res.content.to_vec()));
        };
        NetRequest::new("https://example.com/", &mut responder).respond(NetResponse::ok(b"hi"));
        assert_eq!(seen, Some((200, b"hi".to_vec())));
    }

    #[test]
    fn test_dropping_request_does_not_respond() {
        let mut calls = 0;
        let mut responder = |_: &NetResponse<'_>| calls += 1;
        drop(NetRequest::new("https://example.com/", &mut responder));
        assert_eq!(calls, 0);
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_response_raw_round_trip() {
        let body = b"<h1>hello</h1>";
        let raw = NetResponse::ok(body).to_raw();
        assert_eq!(raw.status_code, 200);
        assert_eq!(raw.content_length, body.len());

        let back = unsafe { NetResponse::from_raw(&raw) }.unwrap();
        assert_eq!(back.content, body);
        assert_eq!(back.status_code, 200);
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_response_from_raw_null_content() {
        let raw = tether_net_response {
            status_code: 204,
            content: std::ptr::null(),
            content_length: 0,
        };
        let res = unsafe { NetResponse::from_raw(&raw) }.unwrap();
        assert!(res.content.is_empty());
        assert_eq!(res.status_code, 204);
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_response_from_raw_rejects_bad_status() {
        for status_code in [0, 99, 1000, usize::MAX] {
            let raw = tether_net_response {
                status_code,
                content: std::ptr::null(),
                content_length: 0,
            };
            let err = unsafe { NetResponse::from_raw(&raw) }.unwrap_err();
            assert!(matches!(err, Error::InvalidStatusCode(code) if code == status_code));
        }
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(599), "");
    }

    #[test]
    fn test_mime_for_uri() {
        assert_eq!(mime_for_uri("https://app.local/index.html"), Some("text/html"));
        assert_eq!(mime_for_uri("https://app.local/app.JS?v=3"), Some("text/javascript"));
        assert_eq!(mime_for_uri("https://app.local/style.css#top"), Some("text/css"));
        assert_eq!(mime_for_uri("https://app.local/archive.xyz"), None);
        assert_eq!(mime_for_uri("https://app.local/data"), None);
    }

    #[test]
    fn test_directory_uris_are_documents() {
        assert_eq!(mime_for_uri("https://app.local/"), Some("text/html"));
        assert_eq!(mime_for_uri("https://app.local/docs/?page=2"), Some("text/html"));
        assert_eq!(response_headers("https://app.local/"), "Content-Type: text/html");
    }

    #[test]
    fn test_response_headers() {
        assert_eq!(response_headers("https://app.local/logo.png"), "Content-Type: image/png");
        assert_eq!(response_headers("https://app.local/blob"), "");
    }
}
