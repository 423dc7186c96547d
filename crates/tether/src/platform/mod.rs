//! Platform-specific web view implementations.
//!
//! WebView2 is the only backend. Elsewhere, creating a window fails with
//! [`crate::Error::PlatformNotSupported`].

#[cfg(target_os = "windows")]
mod webview2;
#[cfg(target_os = "windows")]
pub(crate) use webview2::{initialize, WebView};

#[cfg(not(target_os = "windows"))]
mod unsupported;
#[cfg(not(target_os = "windows"))]
pub(crate) use unsupported::{initialize, WebView};
