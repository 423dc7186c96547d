//! Windows that are web views.
//!
//! tether opens OS windows whose whole client area is a web view, and exposes
//! the same handful of operations both as a Rust API and as a C ABI (see
//! `tether-sys/include/tether.h`).
//!
//! Everything happens on the thread that called [`start`], except for
//! [`dispatch`], which can be called from anywhere to get back onto it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tether::{Handler, Options, Window};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn handle_message(&mut self, window: Window, message: &str) {
//!         let _ = window.eval(&format!("console.log({message:?})"));
//!     }
//! }
//!
//! fn main() -> tether::Result<()> {
//!     tether::start(|| {
//!         let window = Window::new(Options::new().with_handler(Echo)).unwrap();
//!         window.title("Echo").unwrap();
//!         window.load("<button onclick=\"tether('hi')\">Say hi</button>").unwrap();
//!     })
//! }
//! ```
//!
//! ## Platform support
//!
//! Only Windows is supported, through the WebView2 runtime. Elsewhere the
//! crate builds and the event loop runs, but [`Window::new`] fails with
//! [`Error::PlatformNotSupported`].

mod app;
mod error;
mod ffi;
mod fullscreen;
mod handler;
mod ipc;
mod net;
mod options;
mod platform;
mod window;

pub use app::{dispatch, exit, start};
pub use error::{Error, Result};
pub use handler::{Handler, HandlerError};
pub use ipc::{BackendMessage, FrontendMessage, JS_BRIDGE};
pub use net::{NetRequest, NetResponse};
pub use options::Options;
pub use window::Window;
