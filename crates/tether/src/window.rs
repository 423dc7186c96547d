//! Windows that are web views.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use winit::dpi::PhysicalSize;
use winit::window::{Fullscreen, WindowId};

use crate::app::{self, TetherEvent};
use crate::fullscreen::{FullscreenChange, FullscreenTracker};
use crate::handler::Handler;
use crate::ipc::{BackendMessage, FrontendMessage};
use crate::net::{NetRequest, NetResponse};
use crate::options::Options;
use crate::platform::WebView;
use crate::{Error, Result};

/// A window, which may or may not be open.
///
/// Cheap to clone. Only usable from the main thread; once the window is
/// closed, every operation fails with [`Error::WindowClosed`].
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id.get())
            .field("open", &self.is_open())
            .finish()
    }
}

struct WindowInner {
    id: Cell<Option<WindowId>>,
    live: RefCell<Option<Live>>,
    handler: RefCell<Option<Box<dyn Handler>>>,
    fullscreen: Cell<FullscreenTracker>,
}

/// The OS resources of an open window. The web view goes first on drop.
struct Live {
    webview: WebView,
    window: winit::window::Window,
}

impl Window {
    /// Make a new window with the given options.
    ///
    /// # Errors
    /// Fails off the main thread, outside the event loop, or when the OS
    /// window or its web view can't be created. The handler is dropped then.
    pub fn new(options: Options) -> Result<Self> {
        app::assert_main()?;

        let attributes = options.window_attributes();
        let debug = options.debug;
        let inner = Rc::new(WindowInner {
            id: Cell::new(None),
            live: RefCell::new(None),
            handler: RefCell::new(options.handler),
            fullscreen: Cell::default(),
        });

        let window = app::create_window(attributes)?;
        let id = window.id();
        inner.id.set(Some(id));

        let events = WindowEvents {
            id,
            inner: Rc::downgrade(&inner),
        };
        let webview = WebView::attach(&window, debug, events)?;
        window.set_visible(true);
        inner.live.replace(Some(Live { webview, window }));

        let this = Self { inner };
        app::register(id, this.clone());
        tracing::info!("Opened window {:?}", id);
        Ok(this)
    }

    /// Make a new window with the default options and the given handler.
    ///
    /// # Errors
    /// See [`Window::new`].
    pub fn with_handler(handler: impl Handler) -> Result<Self> {
        Self::new(Options::new().with_handler(handler))
    }

    /// Whether the window is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.live.borrow().is_some()
    }

    /// Evaluate the given JavaScript asynchronously.
    ///
    /// # Errors
    /// Fails if the window is closed or the script could not be submitted.
    pub fn eval(&self, js: &str) -> Result<()> {
        self.with_live(|live| live.webview.eval(js))?;
        tracing::debug!("Evaluating script ({} bytes)", js.len());
        Ok(())
    }

    /// Load the given HTML asynchronously.
    ///
    /// # Errors
    /// Fails if the window is closed.
    pub fn load(&self, html: &str) -> Result<()> {
        self.with_live(|live| live.webview.load_html(html))?;
        tracing::debug!("Loading HTML content ({} bytes)", html.len());
        Ok(())
    }

    /// Navigate to the given URI asynchronously.
    ///
    /// # Errors
    /// Fails if the window is closed or the URI is rejected.
    pub fn navigate(&self, uri: &str) -> Result<()> {
        if uri.is_empty() {
            return Err(Error::WebView("URI cannot be empty".to_string()));
        }
        self.with_live(|live| live.webview.navigate(uri))?;
        tracing::debug!("Navigating to {}", uri);
        Ok(())
    }

    /// Set this window's title to the given string.
    ///
    /// # Errors
    /// Fails if the window is closed.
    pub fn title(&self, title: &str) -> Result<()> {
        self.with_live(|live| {
            live.window.set_title(title);
            Ok(())
        })
    }

    /// Focus this window above the other windows.
    ///
    /// This will not steal the focus from other applications.
    ///
    /// # Errors
    /// Fails if the window is closed.
    pub fn focus(&self) -> Result<()> {
        self.with_live(|live| {
            live.window.focus_window();
            Ok(())
        })
    }

    /// Close this window. It is torn down on the next turn of the event loop.
    ///
    /// # Errors
    /// Fails if the window is already closed.
    pub fn close(&self) -> Result<()> {
        let id = self.with_live(|live| Ok(live.window.id()))?;
        app::post(TetherEvent::Close(id))
    }

    /// Hand a structured message to the page's bridge.
    ///
    /// # Errors
    /// Fails if the message can't be serialized or the window is closed.
    pub fn send(&self, message: &BackendMessage) -> Result<()> {
        self.eval(&message.to_script()?)
    }

    /// Settle the page's `tether.call` that produced `request`.
    ///
    /// Messages sent with `tether.send` expect no answer; nothing is sent then.
    ///
    /// # Errors
    /// Fails if the window is closed.
    pub fn reply(
        &self,
        request: &FrontendMessage,
        outcome: std::result::Result<serde_json::Value, String>,
    ) -> Result<()> {
        match request.reply(outcome) {
            Some(message) => self.send(&message),
            None => {
                tracing::debug!("{} expects no reply", request.name);
                Ok(())
            }
        }
    }

    fn with_live<R>(&self, f: impl FnOnce(&Live) -> Result<R>) -> Result<R> {
        app::assert_main()?;
        let live = self.inner.live.borrow();
        let live = live.as_ref().ok_or(Error::WindowClosed)?;
        f(live)
    }

    pub(crate) fn deliver_message(&self, text: &str) {
        let Ok(mut handler) = self.inner.handler.try_borrow_mut() else {
            tracing::warn!("Handler is busy, dropping message ({} bytes)", text.len());
            return;
        };
        if let Some(handler) = handler.as_mut() {
            handler.handle_message(self.clone(), text);
        }
    }

    #[cfg_attr(not(target_os = "windows"), allow(dead_code))]
    fn handle_net(&self, uri: &str, responder: &mut dyn FnMut(&NetResponse<'_>)) {
        let Ok(mut handler) = self.inner.handler.try_borrow_mut() else {
            tracing::warn!("Handler is busy, letting {} through", uri);
            return;
        };
        if let Some(handler) = handler.as_mut() {
            if let Err(e) = handler.handle_net(NetRequest::new(uri, responder)) {
                tracing::error!("Failed to handle request for {}: {}", uri, e);
            }
        }
    }

    pub(crate) fn resized(&self, size: PhysicalSize<u32>) {
        if let Ok(live) = self.inner.live.try_borrow() {
            if let Some(live) = live.as_ref() {
                live.webview.set_bounds(size);
            }
        }
    }

    #[cfg_attr(not(target_os = "windows"), allow(dead_code))]
    fn fullscreen_changed(&self, contains_fullscreen_element: bool) {
        let mut tracker = self.inner.fullscreen.get();
        let change = tracker.update(contains_fullscreen_element);
        self.inner.fullscreen.set(tracker);

        let Some(change) = change else {
            return;
        };
        let Ok(live) = self.inner.live.try_borrow() else {
            return;
        };
        let Some(live) = live.as_ref() else {
            return;
        };

        tracing::debug!("Fullscreen change: {:?}", change);
        match change {
            FullscreenChange::Enter => {
                let monitor = live.window.current_monitor();
                live.window.set_fullscreen(Some(Fullscreen::Borderless(monitor)));
            }
            FullscreenChange::Leave => live.window.set_fullscreen(None),
        }
    }

    /// Release the web view and the OS window, then drop the handler.
    pub(crate) fn shutdown(&self) {
        let live = self.inner.live.borrow_mut().take();
        if live.is_none() {
            return;
        }
        drop(live);

        let handler = self.inner.handler.borrow_mut().take();
        drop(handler);

        tracing::info!("Closed window {:?}", self.inner.id.get());
    }
}

/// Where the platform web view reports events for one window.
#[derive(Clone)]
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) struct WindowEvents {
    id: WindowId,
    inner: Weak<WindowInner>,
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
impl WindowEvents {
    /// Queue a script message; handlers run from the event loop.
    pub(crate) fn message(&self, text: String) {
        if let Err(e) = app::post(TetherEvent::Message { window: self.id, text }) {
            tracing::warn!("Dropping message from page: {}", e);
        }
    }

    /// Offer a request to the handler. Runs synchronously.
    pub(crate) fn net_request(&self, uri: &str, responder: &mut dyn FnMut(&NetResponse<'_>)) {
        if let Some(inner) = self.inner.upgrade() {
            Window { inner }.handle_net(uri, responder);
        }
    }

    pub(crate) fn fullscreen_changed(&self, contains_fullscreen_element: bool) {
        if let Some(inner) = self.inner.upgrade() {
            Window { inner }.fullscreen_changed(contains_fullscreen_element);
        }
    }
}

#[cfg(test)]
impl Window {
    /// A window that was never opened, for exercising handler plumbing.
    pub(crate) fn detached(handler: Option<Box<dyn Handler>>) -> Self {
        Self {
            inner: Rc::new(WindowInner {
                id: Cell::new(None),
                live: RefCell::new(None),
                handler: RefCell::new(handler),
                fullscreen: Cell::default(),
            }),
        }
    }

    pub(crate) fn net_request_for_test(&self, uri: &str, responder: &mut dyn FnMut(&NetResponse<'_>)) {
        self.handle_net(uri, responder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerError;

    #[derive(Default)]
    struct Recorder {
        messages: Rc<RefCell<Vec<String>>>,
        dropped: Rc<Cell<bool>>,
    }

    impl Handler for Recorder {
        fn handle_message(&mut self, window: Window, message: &str) {
            assert!(!window.is_open());
            self.messages.borrow_mut().push(message.to_string());
        }

        fn handle_net(&mut self, request: NetRequest<'_>) -> std::result::Result<(), HandlerError> {
            if request.uri().ends_with(".fail") {
                return Err("no such asset".into());
            }
            if request.uri().starts_with("https://app.local/") {
                request.respond(NetResponse::ok(b"local"));
            }
            Ok(())
        }
    }

    impl Drop for Recorder {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    #[test]
    fn test_new_before_start() {
        let err = Window::new(Options::default()).unwrap_err();
        assert!(matches!(err, Error::NotStarted));
    }

    #[test]
    fn test_new_before_start_drops_handler() {
        let recorder = Recorder::default();
        let dropped = recorder.dropped.clone();
        assert!(Window::with_handler(recorder).is_err());
        assert!(dropped.get());
    }

    #[test]
    fn test_debug_shows_id_and_state() {
        let printed = format!("{:?}", Window::detached(None));
        assert_eq!(printed, "Window { id: None, open: false }");
    }

    #[test]
    fn test_detached_window_is_closed() {
        let window = Window::detached(None);
        assert!(!window.is_open());
        assert!(window.eval("1 + 1").is_err());
        assert!(window.close().is_err());
    }

    #[test]
    fn test_reply_needs_an_open_window_only_for_calls() {
        let window = Window::detached(None);
        let sent = FrontendMessage::parse(r#"{"name":"log"}"#).unwrap();
        assert!(window.reply(&sent, Ok(serde_json::Value::Null)).is_ok());

        let call = FrontendMessage::parse(r#"{"name":"add","id":"1"}"#).unwrap();
        assert!(window.reply(&call, Ok(serde_json::json!(3))).is_err());
    }

    #[test]
    fn test_deliver_message() {
        let recorder = Recorder::default();
        let messages = recorder.messages.clone();
        let window = Window::detached(Some(Box::new(recorder)));

        window.deliver_message("hello");
        window.deliver_message("world");
        assert_eq!(*messages.borrow(), vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_net_request_intercepted() {
        let window = Window::detached(Some(Box::new(Recorder::default())));
        let mut answered = Vec::new();
        let mut responder = |res: &NetResponse<'_>| answered.push(res.content.to_vec());

        window.net_request_for_test("https://app.local/index.html", &mut responder);
        window.net_request_for_test("https://example.com/", &mut responder);
        window.net_request_for_test("https://app.local/missing.fail", &mut responder);
        assert_eq!(answered, vec![b"local".to_vec()]);
    }

    #[test]
    fn test_net_request_without_handler() {
        let window = Window::detached(None);
        let mut calls = 0;
        window.net_request_for_test("https://app.local/", &mut |_: &NetResponse<'_>| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_events_after_window_dropped() {
        let window = Window::detached(Some(Box::new(Recorder::default())));
        let events = WindowEvents {
            id: WindowId::from(0u64),
            inner: Rc::downgrade(&window.inner),
        };
        drop(window);

        let mut calls = 0;
        events.net_request("https://app.local/", &mut |_: &NetResponse<'_>| calls += 1);
        events.fullscreen_changed(true);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_fullscreen_tracked_without_live_window() {
        let window = Window::detached(None);
        window.fullscreen_changed(true);
        assert!(window.inner.fullscreen.get().is_active());
        window.fullscreen_changed(false);
        assert!(!window.inner.fullscreen.get().is_active());
    }
}
