//! Window options.

use std::fmt;

use tether_sys::tether_options;
use winit::dpi::PhysicalSize;
use winit::window::WindowAttributes;

use crate::handler::Handler;

/// The window options.
///
/// Note that these are mostly *suggestions* rather than *requirements*.
pub struct Options {
    /// The initial window width in pixels.
    pub initial_width: usize,
    /// The initial window height in pixels.
    pub initial_height: usize,
    /// The minimum window width in pixels.
    pub minimum_width: usize,
    /// The minimum window height in pixels.
    pub minimum_height: usize,
    /// Hide the title bar and the other OS decorations.
    pub borderless: bool,
    /// Enable developer tools
    pub debug: bool,
    /// The window's handler. Dropped when the window closes.
    pub handler: Option<Box<dyn Handler>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_width: 640,
            initial_height: 480,
            minimum_width: 480,
            minimum_height: 360,
            borderless: false,
            debug: false,
            handler: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("initial_width", &self.initial_width)
            .field("initial_height", &self.initial_height)
            .field("minimum_width", &self.minimum_width)
            .field("minimum_height", &self.minimum_height)
            .field("borderless", &self.borderless)
            .field("debug", &self.debug)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl Options {
    /// Default options without a handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial size of the window, in pixels.
    #[must_use]
    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.initial_width = width;
        self.initial_height = height;
        self
    }

    /// Set the size below which the window can't be resized.
    #[must_use]
    pub fn with_minimum_size(mut self, width: usize, height: usize) -> Self {
        self.minimum_width = width;
        self.minimum_height = height;
        self
    }

    /// Hide the title bar and the other OS decorations.
    #[must_use]
    pub fn with_borderless(mut self, borderless: bool) -> Self {
        self.borderless = borderless;
        self
    }

    /// Enable the developer tools and the default context menu.
    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Set the handler that receives the window's events.
    #[must_use]
    pub fn with_handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Attributes for the OS window backing these options.
    ///
    /// The window starts hidden; it is shown once its web view is attached.
    pub(crate) fn window_attributes(&self) -> WindowAttributes {
        WindowAttributes::default()
            .with_title("")
            .with_inner_size(PhysicalSize::new(
                clamp_pixels(self.initial_width),
                clamp_pixels(self.initial_height),
            ))
            .with_min_inner_size(PhysicalSize::new(
                clamp_pixels(self.minimum_width),
                clamp_pixels(self.minimum_height),
            ))
            .with_decorations(!self.borderless)
            .with_visible(false)
    }
}

/// Sizes and flags only; the C callbacks are adapted separately.
impl From<&tether_options> for Options {
    fn from(opts: &tether_options) -> Self {
        Self {
            initial_width: opts.initial_width,
            initial_height: opts.initial_height,
            minimum_width: opts.minimum_width,
            minimum_height: opts.minimum_height,
            borderless: opts.borderless,
            debug: opts.debug,
            handler: None,
        }
    }
}

fn clamp_pixels(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
