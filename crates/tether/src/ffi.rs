//! The exported C ABI, declared in `tether-sys/include/tether.h`.
//!
//! None of these functions can report failure to the caller. Errors are
//! logged instead, and `tether_new` returns a null handle.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};

use tether_sys::{_tether, tether, tether_dispatch_callback, tether_options, tether_start_callback};

use crate::handler::RawHandler;
use crate::options::Options;
use crate::window::Window;
use crate::{app, Error, Result};

/// Run `f`, aborting the process if it panics. Unwinding into C is undefined.
pub(crate) fn abort_on_panic<R>(f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!("Panic across the C boundary, aborting");
            std::process::abort();
        }
    }
}

pub(crate) fn into_handle(window: Window) -> tether {
    Box::into_raw(Box::new(window)).cast::<_tether>()
}

/// # Safety
/// `handle` must come from [`into_handle`] and must not be used afterwards.
pub(crate) unsafe fn from_handle(handle: tether) -> Box<Window> {
    // SAFETY: upheld by the caller.
    unsafe { Box::from_raw(handle.cast::<Window>()) }
}

/// # Safety
/// `ptr` must be null or a NUL-terminated string that outlives `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::NullPointer);
    }
    // SAFETY: upheld by the caller.
    Ok(unsafe { CStr::from_ptr(ptr) }.to_str()?)
}

/// # Safety
/// `handle` must be null or a live handle returned by `tether_new`.
unsafe fn with_window(name: &str, handle: tether, f: impl FnOnce(&Window) -> Result<()>) {
    abort_on_panic(|| {
        if handle.is_null() {
            tracing::error!("{} called with a null window", name);
            return;
        }
        // SAFETY: the handle stays valid until the window's `closed` callback.
        let window = unsafe { &*handle.cast_const().cast::<Window>() };
        if let Err(e) = f(window) {
            tracing::error!("{} failed: {}", name, e);
        }
    });
}

struct RawTask {
    data: *mut c_void,
    func: tether_dispatch_callback,
}

// SAFETY: the host hands `data` over to whichever thread runs `func`.
unsafe impl Send for RawTask {}

impl RawTask {
    fn run(self) {
        abort_on_panic(|| {
            // SAFETY: the host asked for exactly this call.
            unsafe { (self.func)(self.data) };
        });
    }
}

/// Start the event loop and call `func` on the main thread once it runs.
///
/// # Safety
/// `func` must be safe to call on this thread.
#[no_mangle]
pub unsafe extern "C" fn tether_start(func: Option<tether_start_callback>) {
    abort_on_panic(|| {
        let result = app::start(move || {
            if let Some(func) = func {
                // SAFETY: upheld by the caller.
                abort_on_panic(|| unsafe { func() });
            }
        });
        if let Err(e) = result {
            tracing::error!("tether_start failed: {}", e);
        }
    });
}

/// Schedule `func(data)` on the main thread. Callable from any thread.
///
/// # Safety
/// `func` must accept `data` on the main thread.
#[no_mangle]
pub unsafe extern "C" fn tether_dispatch(data: *mut c_void, func: Option<tether_dispatch_callback>) {
    abort_on_panic(|| {
        let Some(func) = func else {
            tracing::error!("tether_dispatch called without a function");
            return;
        };
        let task = RawTask { data, func };
        if let Err(e) = app::dispatch(move || task.run()) {
            tracing::error!("tether_dispatch failed: {}", e);
        }
    });
}

/// Stop the event loop, closing every remaining window.
#[no_mangle]
pub extern "C" fn tether_exit() {
    abort_on_panic(|| {
        if let Err(e) = app::exit() {
            tracing::error!("tether_exit failed: {}", e);
        }
    });
}

/// Open a new window. Returns null on failure, after calling `closed`.
///
/// # Safety
/// The callbacks in `opts` must accept `opts.data` for as long as the window
/// is open.
#[no_mangle]
pub unsafe extern "C" fn tether_new(opts: tether_options) -> tether {
    abort_on_panic(|| {
        let handler = RawHandler::new(&opts);
        let slot = handler.handle_slot();
        match Window::new(Options::from(&opts).with_handler(handler)) {
            Ok(window) => {
                let handle = into_handle(window);
                slot.set(handle);
                handle
            }
            Err(e) => {
                tracing::error!("tether_new failed: {}", e);
                std::ptr::null_mut()
            }
        }
    })
}

/// Close the window. `closed` is called once it has been torn down.
///
/// # Safety
/// `self_` must be a live handle returned by `tether_new`.
#[no_mangle]
pub unsafe extern "C" fn tether_close(self_: tether) {
    // SAFETY: upheld by the caller.
    unsafe { with_window("tether_close", self_, Window::close) };
}

/// # Safety
/// `self_` must be a live handle and `html` a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_load(self_: tether, html: *const c_char) {
    // SAFETY: upheld by the caller.
    unsafe { with_window("tether_load", self_, |w| w.load(str_arg(html)?)) };
}

/// # Safety
/// `self_` must be a live handle and `uri` a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_navigate(self_: tether, uri: *const c_char) {
    // SAFETY: upheld by the caller.
    unsafe { with_window("tether_navigate", self_, |w| w.navigate(str_arg(uri)?)) };
}

/// # Safety
/// `self_` must be a live handle and `js` a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_eval(self_: tether, js: *const c_char) {
    // SAFETY: upheld by the caller.
    unsafe { with_window("tether_eval", self_, |w| w.eval(str_arg(js)?)) };
}

/// # Safety
/// `self_` must be a live handle and `title` a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_title(self_: tether, title: *const c_char) {
    // SAFETY: upheld by the caller.
    unsafe { with_window("tether_title", self_, |w| w.title(str_arg(title)?)) };
}

/// # Safety
/// `self_` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn tether_focus(self_: tether) {
    // SAFETY: upheld by the caller.
    unsafe { with_window("tether_focus", self_, Window::focus) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_null_handles_are_ignored() {
        unsafe {
            tether_close(std::ptr::null_mut());
            tether_load(std::ptr::null_mut(), c"<p>hi</p>".as_ptr());
            tether_navigate(std::ptr::null_mut(), c"https://example.com/".as_ptr());
            tether_eval(std::ptr::null_mut(), std::ptr::null());
            tether_title(std::ptr::null_mut(), c"title".as_ptr());
            tether_focus(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_str_arg() {
        assert!(matches!(unsafe { str_arg(std::ptr::null()) }, Err(Error::NullPointer)));
        assert_eq!(unsafe { str_arg(c"hello".as_ptr()) }.unwrap(), "hello");

        let invalid = [0xffu8, 0];
        let err = unsafe { str_arg(invalid.as_ptr().cast()) }.unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8(_)));
    }

    #[test]
    fn test_closed_window_handle() {
        let handle = into_handle(Window::detached(None));
        unsafe {
            tether_eval(handle, c"1 + 1".as_ptr());
            tether_close(handle);
            drop(from_handle(handle));
        }
    }

    static CLOSED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_closed(_data: *mut c_void) {
        CLOSED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_new_before_start_returns_null() {
        let opts = tether_options {
            initial_width: 640,
            initial_height: 480,
            minimum_width: 480,
            minimum_height: 360,
            borderless: false,
            debug: false,
            data: std::ptr::null_mut(),
            message: None,
            closed: Some(count_closed),
            net_request: None,
        };
        let handle = unsafe { tether_new(opts) };
        assert!(handle.is_null());
        assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
    }

    static RAN: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_run(_data: *mut c_void) {
        RAN.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_dispatch_before_start_drops_task() {
        unsafe {
            tether_dispatch(std::ptr::null_mut(), Some(count_run));
            tether_dispatch(std::ptr::null_mut(), None);
        }
        tether_exit();
        assert_eq!(RAN.load(Ordering::SeqCst), 0);
    }
}
