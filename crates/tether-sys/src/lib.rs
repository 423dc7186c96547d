//! Raw C ABI types for tether.
//!
//! These mirror `include/tether.h` and must be kept in sync with it by hand.
//! The functions themselves are exported by the `tether` crate.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void};

/// Opaque window type. Only ever used behind a pointer.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct _tether {
    _unused: [u8; 0],
}

/// Pointer type for tether windows.
pub type tether = *mut _tether;

/// Called once the event loop is running. Contains the host's "real" main.
pub type tether_start_callback = unsafe extern "C" fn();

/// A unit of work scheduled with `tether_dispatch`.
pub type tether_dispatch_callback = unsafe extern "C" fn(data: *mut c_void);

/// The page called `window.tether(message)`.
pub type tether_message_callback = unsafe extern "C" fn(data: *mut c_void, message: *const c_char);

/// The window was closed and its resources have been released.
pub type tether_closed_callback = unsafe extern "C" fn(data: *mut c_void);

/// The page is about to fetch a resource.
pub type tether_net_request_callback =
    unsafe extern "C" fn(data: *mut c_void, req: *const tether_net_request);

/// Completes a `tether_net_request`.
pub type tether_respond_callback =
    unsafe extern "C" fn(ctx: *const c_void, res: *const tether_net_response);

/// A substitute response for an intercepted request.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct tether_net_response {
    /// The HTTP status code for the response.
    pub status_code: usize,
    /// The contents of the response.
    pub content: *const u8,
    /// Length of the contents of the response, in bytes.
    pub content_length: usize,
}

/// A network request made by the webview.
///
/// Only valid for the duration of the `net_request` callback.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct tether_net_request {
    /// The URI that has been requested.
    pub request_uri: *const c_char,
    /// Closure context for `respond`.
    pub respond_ctx: *const c_void,
    /// Call at most once to answer the request instead of the network.
    pub respond: Option<tether_respond_callback>,
}

/// Configuration options for a window.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct tether_options {
    /// Initial width of the window in pixels.
    pub initial_width: usize,
    /// Initial height of the window in pixels.
    pub initial_height: usize,
    /// Width below which the window cannot be resized.
    pub minimum_width: usize,
    /// Height below which the window cannot be resized.
    pub minimum_height: usize,
    /// When set, don't show OS decorations.
    pub borderless: bool,
    /// When set, enable the developer tools.
    pub debug: bool,
    /// The data to pass to event handlers.
    pub data: *mut c_void,
    /// The window received a message via `window.tether(string)`.
    pub message: Option<tether_message_callback>,
    /// The window was closed, and its resources have all been released.
    pub closed: Option<tether_closed_callback>,
    /// A network request was made.
    pub net_request: Option<tether_net_request_callback>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_net_response_layout() {
        assert_eq!(size_of::<tether_net_response>(), 3 * size_of::<usize>());
        assert_eq!(align_of::<tether_net_response>(), align_of::<usize>());
    }

    #[test]
    fn test_net_request_layout() {
        assert_eq!(size_of::<tether_net_request>(), 3 * size_of::<*const c_void>());
    }

    #[test]
    fn test_callbacks_are_pointer_sized() {
        // Option<fn> must stay nullable-pointer sized to match the header.
        assert_eq!(size_of::<Option<tether_message_callback>>(), size_of::<*const c_void>());
        assert_eq!(size_of::<Option<tether_net_request_callback>>(), size_of::<*const c_void>());
    }

    #[test]
    fn test_options_layout() {
        let word = size_of::<usize>();
        // Four sizes, two bools padded to a word, data and three callbacks.
        assert_eq!(size_of::<tether_options>(), 4 * word + word + 4 * word);
    }

    #[test]
    fn test_opaque_handle_is_zero_sized() {
        assert_eq!(size_of::<_tether>(), 0);
    }
}
