//! Stand-in for platforms without a web view backend.

use winit::dpi::PhysicalSize;

use crate::window::WindowEvents;
use crate::{Error, Result};

pub(crate) fn initialize() -> Result<()> {
    tracing::warn!("Web views are only supported on Windows; opening a window will fail");
    Ok(())
}

/// Never constructed.
pub(crate) struct WebView {
    _private: (),
}

impl WebView {
    pub(crate) fn attach(
        _window: &winit::window::Window,
        _debug: bool,
        _events: WindowEvents,
    ) -> Result<Self> {
        Err(Error::PlatformNotSupported)
    }

    pub(crate) fn set_bounds(&self, _size: PhysicalSize<u32>) {}

    pub(crate) fn eval(&self, _js: &str) -> Result<()> {
        Err(Error::PlatformNotSupported)
    }

    pub(crate) fn load_html(&self, _html: &str) -> Result<()> {
        Err(Error::PlatformNotSupported)
    }

    pub(crate) fn navigate(&self, _uri: &str) -> Result<()> {
        Err(Error::PlatformNotSupported)
    }
}
