//! The UI-thread event loop.
//!
//! Everything except [`dispatch`] must happen on the thread that called
//! [`start`]. Work from other threads is posted to the loop as a single event
//! type and run when the loop next drains its queue.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{WindowAttributes, WindowId};

use crate::window::Window;
use crate::{platform, Error, Result};

/// A unit of work to run on the UI thread.
pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// Events posted to the loop.
pub(crate) enum TetherEvent {
    /// Run a closure.
    Dispatch(Task),
    /// A page called `window.tether(text)`.
    Message { window: WindowId, text: String },
    /// Tear a window down.
    Close(WindowId),
    /// Leave the loop.
    Exit,
}

impl fmt::Debug for TetherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatch(_) => f.write_str("Dispatch"),
            Self::Message { window, text } => f
                .debug_struct("Message")
                .field("window", window)
                .field("len", &text.len())
                .finish(),
            Self::Close(id) => f.debug_tuple("Close").field(id).finish(),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

static STARTED: AtomicBool = AtomicBool::new(false);
static PROXY: OnceLock<Mutex<EventLoopProxy<TetherEvent>>> = OnceLock::new();

thread_local! {
    static MAIN_THREAD: Cell<bool> = const { Cell::new(false) };
    static ACTIVE_LOOP: Cell<*const ActiveEventLoop> = const { Cell::new(std::ptr::null()) };
    static WINDOWS: RefCell<HashMap<WindowId, Window>> = RefCell::new(HashMap::new());
}

/// Initialize things and run the event loop until [`exit`] is called.
///
/// Call this at most once. The calling thread becomes the one that owns every
/// window, and `entry` runs on it as soon as the loop is live. It should
/// contain your "real" main function.
///
/// # Errors
/// Fails if called twice, or if the event loop or the web view runtime can't
/// be set up. A failed start can be retried.
pub fn start<F: FnOnce() + 'static>(entry: F) -> Result<()> {
    claim(&STARTED)?;

    let event_loop = match platform::initialize().and_then(|()| build_event_loop()) {
        Ok(event_loop) => event_loop,
        Err(e) => {
            STARTED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };
    PROXY
        .set(Mutex::new(event_loop.create_proxy()))
        .map_err(|_| Error::AlreadyStarted)?;
    MAIN_THREAD.with(|main| main.set(true));

    tracing::info!("Starting event loop");
    let mut app = App {
        entry: Some(Box::new(entry)),
    };
    event_loop.run_app(&mut app)?;
    tracing::info!("Event loop exited");

    Ok(())
}

/// Take the one-shot start flag.
fn claim(started: &AtomicBool) -> Result<()> {
    if started.swap(true, Ordering::SeqCst) {
        Err(Error::AlreadyStarted)
    } else {
        Ok(())
    }
}

/// Build the loop on the calling thread, whichever thread that is.
fn build_event_loop() -> Result<EventLoop<TetherEvent>> {
    #[allow(unused_mut)]
    let mut builder = EventLoop::<TetherEvent>::with_user_event();

    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::EventLoopBuilderExtWindows;
        builder.with_any_thread(true);
    }

    #[cfg(all(
        unix,
        not(any(target_os = "macos", target_os = "ios", target_os = "android"))
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_any_thread(true);
    }

    Ok(builder.build()?)
}

/// Terminate the event loop as gracefully as possible.
///
/// Windows that are still open get closed before [`start`] returns.
///
/// # Errors
/// Fails when not called from the main thread, or after the loop exited.
pub fn exit() -> Result<()> {
    assert_main()?;
    post(TetherEvent::Exit)
}

/// Run the given function on the main thread.
///
/// # Errors
/// Fails before [`start`] and after the loop exited; `f` is dropped unrun.
pub fn dispatch<F: FnOnce() + Send + 'static>(f: F) -> Result<()> {
    post(TetherEvent::Dispatch(Box::new(f)))
}

/// Make sure that we're initialized and on the main thread.
pub(crate) fn assert_main() -> Result<()> {
    confinement(MAIN_THREAD.with(Cell::get), PROXY.get().is_some())
}

fn confinement(is_main: bool, started: bool) -> Result<()> {
    match (is_main, started) {
        (true, _) => Ok(()),
        (false, false) => Err(Error::NotStarted),
        (false, true) => Err(Error::NotMainThread),
    }
}

pub(crate) fn post(event: TetherEvent) -> Result<()> {
    let proxy = PROXY.get().ok_or(Error::NotStarted)?;
    let proxy = proxy.lock().unwrap_or_else(PoisonError::into_inner);
    proxy.send_event(event).map_err(|_| Error::EventLoopClosed)
}

/// Create an OS window. Only possible while the loop is running one of our callbacks.
#[allow(unsafe_code)]
pub(crate) fn create_window(attributes: WindowAttributes) -> Result<winit::window::Window> {
    let active = ACTIVE_LOOP.with(Cell::get);
    if active.is_null() {
        return Err(Error::NoActiveEventLoop);
    }
    // SAFETY: ACTIVE_LOOP is only non-null inside `with_active_loop`, which
    // outlives every use of the pointer on this thread.
    let event_loop = unsafe { &*active };
    Ok(event_loop.create_window(attributes)?)
}

pub(crate) fn register(id: WindowId, window: Window) {
    WINDOWS.with(|windows| windows.borrow_mut().insert(id, window));
}

fn lookup(id: WindowId) -> Option<Window> {
    WINDOWS.with(|windows| windows.borrow().get(&id).cloned())
}

fn close_window(id: WindowId) {
    let window = WINDOWS.with(|windows| windows.borrow_mut().remove(&id));
    if let Some(window) = window {
        window.shutdown();
    }
}

fn close_all() {
    let windows: Vec<Window> =
        WINDOWS.with(|windows| windows.borrow_mut().drain().map(|(_, w)| w).collect());
    for window in windows {
        window.shutdown();
    }
}

struct ActiveLoopGuard(*const ActiveEventLoop);

impl Drop for ActiveLoopGuard {
    fn drop(&mut self) {
        ACTIVE_LOOP.with(|active| active.set(self.0));
    }
}

fn with_active_loop<R>(event_loop: &ActiveEventLoop, f: impl FnOnce() -> R) -> R {
    let previous = ACTIVE_LOOP.with(|active| active.replace(std::ptr::from_ref(event_loop)));
    let _guard = ActiveLoopGuard(previous);
    f()
}

struct App {
    entry: Option<Box<dyn FnOnce()>>,
}

impl ApplicationHandler<TetherEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(entry) = self.entry.take() {
            with_active_loop(event_loop, entry);
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: TetherEvent) {
        tracing::trace!("User event: {:?}", event);
        with_active_loop(event_loop, || match event {
            TetherEvent::Dispatch(task) => task(),
            TetherEvent::Message { window, text } => match lookup(window) {
                Some(target) => target.deliver_message(&text),
                None => tracing::warn!("Dropping message for closed window {:?}", window),
            },
            TetherEvent::Close(id) => close_window(id),
            TetherEvent::Exit => event_loop.exit(),
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        with_active_loop(event_loop, || match event {
            WindowEvent::CloseRequested => close_window(window_id),
            WindowEvent::Resized(size) => {
                if let Some(window) = lookup(window_id) {
                    window.resized(size);
                }
            }
            _ => {}
        });
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        with_active_loop(event_loop, close_all);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No test ever calls `start`, so the loop is never running here.

    #[test]
    fn test_dispatch_before_start() {
        let err = dispatch(|| panic!("must not run")).unwrap_err();
        assert!(matches!(err, Error::NotStarted));
    }

    #[test]
    fn test_exit_before_start() {
        assert!(matches!(exit().unwrap_err(), Error::NotStarted));
    }

    #[test]
    fn test_assert_main_before_start() {
        assert!(matches!(assert_main().unwrap_err(), Error::NotStarted));
    }

    #[test]
    fn test_second_claim_fails() {
        let started = AtomicBool::new(false);
        assert!(claim(&started).is_ok());
        assert!(matches!(claim(&started).unwrap_err(), Error::AlreadyStarted));

        // Released after a failed start.
        started.store(false, Ordering::SeqCst);
        assert!(claim(&started).is_ok());
    }

    #[test]
    fn test_confinement() {
        assert!(confinement(true, true).is_ok());
        assert!(matches!(confinement(false, false).unwrap_err(), Error::NotStarted));
        assert!(matches!(confinement(false, true).unwrap_err(), Error::NotMainThread));
    }

    #[test]
    fn test_other_threads_are_not_main() {
        MAIN_THREAD.with(|main| main.set(true));
        assert!(confinement(MAIN_THREAD.with(Cell::get), true).is_ok());

        let off_main = std::thread::spawn(|| {
            matches!(
                confinement(MAIN_THREAD.with(Cell::get), true),
                Err(Error::NotMainThread)
            )
        });
        assert!(off_main.join().unwrap());
        MAIN_THREAD.with(|main| main.set(false));
    }

    #[test]
    fn test_create_window_outside_loop() {
        let err = create_window(WindowAttributes::default()).unwrap_err();
        assert!(matches!(err, Error::NoActiveEventLoop));
    }

    #[test]
    fn test_event_debug_hides_message_text() {
        let event = TetherEvent::Dispatch(Box::new(|| {}));
        assert_eq!(format!("{event:?}"), "Dispatch");
        assert_eq!(format!("{:?}", TetherEvent::Exit), "Exit");
    }
}
