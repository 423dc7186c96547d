use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tether has already been started")]
    AlreadyStarted,

    #[error("tether has not been started")]
    NotStarted,

    #[error("must be called from the thread that called start()")]
    NotMainThread,

    #[error("no event loop is active on this thread right now")]
    NoActiveEventLoop,

    #[error("the event loop has exited")]
    EventLoopClosed,

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Failed to create window: {0}")]
    WindowCreation(#[from] winit::error::OsError),

    #[error("Window handle error")]
    WindowHandle,

    #[error("the window has been closed")]
    WindowClosed,

    #[error("web views are not supported on this platform")]
    PlatformNotSupported,

    #[error("WebView error: {0}")]
    WebView(String),

    #[error("unexpected null pointer")]
    NullPointer,

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("String contains a NUL byte: {0}")]
    InteriorNul(#[from] std::ffi::NulError),

    #[error("Invalid HTTP status code: {0}")]
    InvalidStatusCode(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<raw_window_handle::HandleError> for Error {
    fn from(_: raw_window_handle::HandleError) -> Self {
        Self::WindowHandle
    }
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for Error {
    fn from(e: windows::core::Error) -> Self {
        Self::WebView(e.message())
    }
}

#[cfg(target_os = "windows")]
impl From<webview2_com::Error> for Error {
    fn from(e: webview2_com::Error) -> Self {
        Self::WebView(format!("{e:?}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::WindowClosed.to_string(), "the window has been closed");
        assert_eq!(Error::InvalidStatusCode(70000).to_string(), "Invalid HTTP status code: 70000");
        assert_eq!(Error::WebView("boom".into()).to_string(), "WebView error: boom");
    }

    #[test]
    fn test_from_nul_error() {
        let err: Error = std::ffi::CString::new("a\0b").unwrap_err().into();
        assert!(matches!(err, Error::InteriorNul(_)));
    }

    #[test]
    fn test_from_utf8_error() {
        let bytes = [0xffu8, 0xfe];
        let err: Error = std::str::from_utf8(&bytes).unwrap_err().into();
        assert!(matches!(err, Error::InvalidUtf8(_)));
    }
}
