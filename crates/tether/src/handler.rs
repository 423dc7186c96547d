//! Window event handlers.

use std::cell::Cell;
use std::ffi::{c_void, CString};
use std::rc::Rc;

use tether_sys::{
    tether, tether_closed_callback, tether_message_callback, tether_net_request,
    tether_net_request_callback, tether_net_response, tether_options,
};

use crate::net::{NetRequest, NetResponse};
use crate::window::Window;

/// Boxed error returned by [`Handler::handle_net`].
pub type HandlerError = Box<dyn std::error::Error>;

/// An event handler; you probably want to implement one.
///
/// - When the webpage calls `window.tether(string)`, the string is passed to
///   `handle_message`.
/// - Every request the webpage makes goes through `handle_net` first.
/// - The handler is dropped when the window is closed.
pub trait Handler: 'static {
    /// The webpage called `window.tether` with the given string.
    fn handle_message(&mut self, window: Window, message: &str) {
        let _ = (window, message);
    }

    /// A request was made, and it can be intercepted by responding to it.
    ///
    /// # Errors
    /// Errors are logged; the request then goes through to the network.
    fn handle_net(&mut self, request: NetRequest<'_>) -> Result<(), HandlerError> {
        let _ = request;
        Ok(())
    }
}

/// Adapts the callbacks of a `tether_options` to [`Handler`].
///
/// Dropping it calls `closed(data)` and then frees the window handle that was
/// given out to C, if any.
pub(crate) struct RawHandler {
    data: *mut c_void,
    message: Option<tether_message_callback>,
    closed: Option<tether_closed_callback>,
    net_request: Option<tether_net_request_callback>,
    handle: Rc<Cell<tether>>,
}

impl RawHandler {
    pub(crate) fn new(opts: &tether_options) -> Self {
        Self {
            data: opts.data,
            message: opts.message,
            closed: opts.closed,
            net_request: opts.net_request,
            handle: Rc::new(Cell::new(std::ptr::null_mut())),
        }
    }

    /// Where the C window handle goes once the window exists.
    ///
    /// Whatever handle is in the slot when the adapter drops is freed then.
    pub(crate) fn handle_slot(&self) -> Rc<Cell<tether>> {
        Rc::clone(&self.handle)
    }
}

impl Handler for RawHandler {
    #[allow(unsafe_code)]
    fn handle_message(&mut self, _window: Window, message: &str) {
        let Some(callback) = self.message else {
            return;
        };
        match CString::new(message) {
            // SAFETY: the host promised `message` accepts its own data pointer
            // and a NUL-terminated string valid for the call.
            Ok(message) => unsafe { callback(self.data, message.as_ptr()) },
            Err(e) => tracing::error!("Dropping message from page: {}", e),
        }
    }

    #[allow(unsafe_code)]
    fn handle_net(&mut self, request: NetRequest<'_>) -> Result<(), HandlerError> {
        let Some(callback) = self.net_request else {
            return Ok(());
        };

        let uri = CString::new(request.uri())?;
        let mut pending = Some(request);
        let raw = tether_net_request {
            request_uri: uri.as_ptr(),
            respond_ctx: std::ptr::addr_of_mut!(pending).cast::<c_void>().cast_const(),
            respond: Some(respond),
        };

        // SAFETY: `raw` and everything it points to outlive the call.
        unsafe { callback(self.data, &raw) };
        Ok(())
    }
}

impl Drop for RawHandler {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        if let Some(closed) = self.closed {
            crate::ffi::abort_on_panic(|| {
                // SAFETY: the host gave us this callback for exactly this purpose.
                unsafe { closed(self.data) };
            });
        }
        let handle = self.handle.replace(std::ptr::null_mut());
        if !handle.is_null() {
            // SAFETY: the handle was created by `ffi::into_handle` and the host
            // may no longer use it once `closed` has returned.
            drop(unsafe { crate::ffi::from_handle(handle) });
        }
    }
}

/// `respond` trampoline handed to C inside a `tether_net_request`.
#[allow(unsafe_code)]
unsafe extern "C" fn respond(ctx: *const c_void, res: *const tether_net_response) {
    crate::ffi::abort_on_panic(|| {
        if ctx.is_null() || res.is_null() {
            tracing::error!("respond called with a null pointer");
            return;
        }

        // SAFETY: `ctx` is the `Option<NetRequest>` set up in `handle_net`,
        // which is still on the stack while the host's callback runs.
        let pending = unsafe { &mut *ctx.cast_mut().cast::<Option<NetRequest<'_>>>() };
        let Some(request) = pending.take() else {
            tracing::warn!("Ignoring second response to the same request");
            return;
        };

        // SAFETY: the host promises `res` describes valid memory for this call.
        match unsafe { NetResponse::from_raw(&*res) } {
            Ok(response) => request.respond(response),
            Err(e) => tracing::error!("Invalid response for {}: {}", request.uri(), e),
        }
    });
}
