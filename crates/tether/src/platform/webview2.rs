//! Windows WebView2 implementation.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::sync::mpsc;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use webview2_com::Microsoft::Web::WebView2::Win32::{
    CreateCoreWebView2Environment, ICoreWebView2, ICoreWebView2Controller,
    ICoreWebView2Environment, ICoreWebView2WebResourceRequestedEventArgs,
    COREWEBVIEW2_PROCESS_FAILED_KIND, COREWEBVIEW2_WEB_RESOURCE_CONTEXT_ALL,
};
use webview2_com::{
    take_pwstr, AddScriptToExecuteOnDocumentCreatedCompletedHandler,
    ContainsFullScreenElementChangedEventHandler,
    CreateCoreWebView2ControllerCompletedHandler, CreateCoreWebView2EnvironmentCompletedHandler,
    ExecuteScriptCompletedHandler, NavigationCompletedEventHandler,
    NavigationStartingEventHandler, NewWindowRequestedEventHandler, ProcessFailedEventHandler,
    WebMessageReceivedEventHandler, WebResourceRequestedEventHandler,
};
use windows::core::{w, BOOL, HSTRING, PCWSTR, PWSTR};
use windows::Win32::Foundation::{E_OUTOFMEMORY, E_POINTER, E_UNEXPECTED, HWND, RECT};
use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};
use windows::Win32::UI::Shell::SHCreateMemStream;
use winit::dpi::PhysicalSize;

use crate::ipc::JS_BRIDGE;
use crate::net::{self, NetResponse};
use crate::window::WindowEvents;
use crate::{Error, Result};

thread_local! {
    /// Shared by every web view of the UI thread.
    static ENVIRONMENT: RefCell<Option<ICoreWebView2Environment>> = const { RefCell::new(None) };
}

/// Enter a single-threaded apartment and spin up the WebView2 environment.
pub(crate) fn initialize() -> Result<()> {
    // SAFETY: called once, from the thread that will own every window.
    unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }.ok()?;

    let environment = create_environment()?;
    ENVIRONMENT.with(|env| env.replace(Some(environment)));
    tracing::info!("WebView2 environment created");
    Ok(())
}

/// Pump the message loop until the environment has been created.
fn create_environment() -> Result<ICoreWebView2Environment> {
    let (tx, rx) = mpsc::channel();

    CreateCoreWebView2EnvironmentCompletedHandler::wait_for_async_operation(
        Box::new(|handler| {
            // SAFETY: plain COM call with a live completion handler.
            unsafe { CreateCoreWebView2Environment(&handler) }
                .map_err(webview2_com::Error::WindowsError)
        }),
        Box::new(move |error_code, environment| {
            error_code?;
            tx.send(environment.ok_or_else(|| windows::core::Error::from(E_POINTER)))
                .map_err(|_| windows::core::Error::from(E_UNEXPECTED))?;
            Ok(())
        }),
    )?;

    let environment = rx.recv().map_err(|_| webview2_com::Error::SendError)??;
    Ok(environment)
}

/// Pump the message loop until a controller is attached to `hwnd`.
fn create_controller(
    environment: &ICoreWebView2Environment,
    hwnd: HWND,
) -> Result<ICoreWebView2Controller> {
    let (tx, rx) = mpsc::channel();
    let environment = environment.clone();

    CreateCoreWebView2ControllerCompletedHandler::wait_for_async_operation(
        Box::new(move |handler| {
            // SAFETY: `hwnd` is a live window owned by this thread.
            unsafe { environment.CreateCoreWebView2Controller(hwnd, &handler) }
                .map_err(webview2_com::Error::WindowsError)
        }),
        Box::new(move |error_code, controller| {
            error_code?;
            tx.send(controller.ok_or_else(|| windows::core::Error::from(E_POINTER)))
                .map_err(|_| windows::core::Error::from(E_UNEXPECTED))?;
            Ok(())
        }),
    )?;

    let controller = rx.recv().map_err(|_| webview2_com::Error::SendError)??;
    Ok(controller)
}

/// A WebView2 control filling the client area of a window.
pub(crate) struct WebView {
    controller: ICoreWebView2Controller,
    webview: ICoreWebView2,
}

impl WebView {
    /// Attach a new control to `window`, blocking until it is ready.
    pub(crate) fn attach(
        window: &winit::window::Window,
        debug: bool,
        events: WindowEvents,
    ) -> Result<Self> {
        let hwnd = match window.window_handle()?.as_raw() {
            RawWindowHandle::Win32(handle) => HWND(handle.hwnd.get() as *mut std::ffi::c_void),
            _ => return Err(Error::WindowHandle),
        };

        let environment = ENVIRONMENT
            .with(|env| env.borrow().clone())
            .ok_or(Error::NotStarted)?;
        let controller = create_controller(&environment, hwnd)?;
        // SAFETY: the controller was created on this thread and is alive.
        let webview = unsafe { controller.CoreWebView2() }?;

        let this = Self {
            controller,
            webview,
        };
        this.set_bounds(window.inner_size());
        // SAFETY: see above.
        unsafe { this.controller.SetIsVisible(true) }?;

        this.configure(debug)?;
        this.install_bridge(events.clone())?;
        this.intercept_requests(environment, events.clone())?;
        this.watch_fullscreen(events)?;
        this.log_lifecycle()?;

        tracing::debug!("Attached WebView2 to {:?}", hwnd);
        Ok(this)
    }

    fn configure(&self, debug: bool) -> Result<()> {
        // SAFETY: `self.webview` is alive for as long as `self`.
        unsafe {
            let settings = self.webview.Settings()?;
            settings.SetAreDevToolsEnabled(debug)?;
            settings.SetAreDefaultContextMenusEnabled(debug)?;
            settings.SetIsStatusBarEnabled(false)?;
        }
        Ok(())
    }

    /// Define `window.tether` in every document and forward what it posts.
    fn install_bridge(&self, events: WindowEvents) -> Result<()> {
        let bridge = HSTRING::from(JS_BRIDGE);

        let added = AddScriptToExecuteOnDocumentCreatedCompletedHandler::create(Box::new(
            |error_code, _id| {
                if let Err(e) = error_code {
                    tracing::error!("Failed to install script bridge: {}", e.message());
                }
                Ok(())
            },
        ));

        // SAFETY: `bridge` outlives the call; the handlers own their captures.
        unsafe {
            self.webview
                .AddScriptToExecuteOnDocumentCreated(PCWSTR(bridge.as_ptr()), &added)?;

            let mut token = 0;
            self.webview.add_WebMessageReceived(
                &WebMessageReceivedEventHandler::create(Box::new(move |_webview, args| {
                    if let Some(args) = args {
                        let mut message = PWSTR::null();
                        args.TryGetWebMessageAsString(&mut message)?;
                        events.message(take_pwstr(message));
                    }
                    Ok(())
                })),
                &mut token,
            )?;
        }
        Ok(())
    }

    /// Offer every request to the window's handler before it hits the network.
    fn intercept_requests(
        &self,
        environment: ICoreWebView2Environment,
        events: WindowEvents,
    ) -> Result<()> {
        // SAFETY: the handler owns its captures and runs on this thread.
        unsafe {
            self.webview
                .AddWebResourceRequestedFilter(w!("*"), COREWEBVIEW2_WEB_RESOURCE_CONTEXT_ALL)?;

            let mut token = 0;
            self.webview.add_WebResourceRequested(
                &WebResourceRequestedEventHandler::create(Box::new(move |_webview, args| {
                    let Some(args) = args else {
                        return Ok(());
                    };

                    let mut uri = PWSTR::null();
                    args.Request()?.Uri(&mut uri)?;
                    let uri = take_pwstr(uri);

                    let mut outcome: windows::core::Result<()> = Ok(());
                    events.net_request(&uri, &mut |response: &NetResponse<'_>| {
                        outcome = respond(&environment, &args, &uri, response);
                    });
                    outcome
                })),
                &mut token,
            )?;
        }
        Ok(())
    }

    fn watch_fullscreen(&self, events: WindowEvents) -> Result<()> {
        // SAFETY: the handler owns its captures and runs on this thread.
        unsafe {
            let mut token = 0;
            self.webview.add_ContainsFullScreenElementChanged(
                &ContainsFullScreenElementChangedEventHandler::create(Box::new(
                    move |sender, _args| {
                        if let Some(sender) = sender {
                            let mut contains = BOOL::default();
                            sender.ContainsFullScreenElement(&mut contains)?;
                            events.fullscreen_changed(contains.as_bool());
                        }
                        Ok(())
                    },
                )),
                &mut token,
            )?;
        }
        Ok(())
    }

    /// Diagnostic listeners; they only log.
    fn log_lifecycle(&self) -> Result<()> {
        // SAFETY: the handlers capture nothing and run on this thread.
        unsafe {
            let mut token = 0;
            self.webview.add_NavigationStarting(
                &NavigationStartingEventHandler::create(Box::new(|_webview, args| {
                    if let Some(args) = args {
                        let mut uri = PWSTR::null();
                        args.Uri(&mut uri)?;
                        tracing::debug!("NavigationStarting: {}", take_pwstr(uri));
                    }
                    Ok(())
                })),
                &mut token,
            )?;

            let mut token = 0;
            self.webview.add_NavigationCompleted(
                &NavigationCompletedEventHandler::create(Box::new(|_webview, args| {
                    if let Some(args) = args {
                        let mut success = BOOL::default();
                        args.IsSuccess(&mut success)?;
                        if success.as_bool() {
                            tracing::debug!("NavigationCompleted");
                        } else {
                            tracing::warn!("Navigation failed");
                        }
                    }
                    Ok(())
                })),
                &mut token,
            )?;

            let mut token = 0;
            self.webview.add_NewWindowRequested(
                &NewWindowRequestedEventHandler::create(Box::new(|_webview, args| {
                    if let Some(args) = args {
                        let mut uri = PWSTR::null();
                        args.Uri(&mut uri)?;
                        tracing::debug!("NewWindowRequested: {}", take_pwstr(uri));
                    }
                    Ok(())
                })),
                &mut token,
            )?;

            let mut token = 0;
            self.webview.add_ProcessFailed(
                &ProcessFailedEventHandler::create(Box::new(|_webview, args| {
                    if let Some(args) = args {
                        let mut kind = COREWEBVIEW2_PROCESS_FAILED_KIND::default();
                        args.ProcessFailedKind(&mut kind)?;
                        tracing::error!("WebView2 process failed: {:?}", kind);
                    }
                    Ok(())
                })),
                &mut token,
            )?;
        }
        Ok(())
    }

    /// Resize the control to cover a client area of `size`.
    pub(crate) fn set_bounds(&self, size: PhysicalSize<u32>) {
        let bounds = RECT {
            left: 0,
            top: 0,
            right: i32::try_from(size.width).unwrap_or(i32::MAX),
            bottom: i32::try_from(size.height).unwrap_or(i32::MAX),
        };
        // SAFETY: `self.controller` is alive for as long as `self`.
        if let Err(e) = unsafe { self.controller.SetBounds(bounds) } {
            tracing::warn!("Failed to resize web view: {}", e.message());
        }
    }

    pub(crate) fn eval(&self, js: &str) -> Result<()> {
        let script = HSTRING::from(js);
        let completed = ExecuteScriptCompletedHandler::create(Box::new(|error_code, _result| {
            if let Err(e) = error_code {
                tracing::error!("Script evaluation failed: {}", e.message());
            }
            Ok(())
        }));

        // SAFETY: `script` outlives the call.
        unsafe { self.webview.ExecuteScript(PCWSTR(script.as_ptr()), &completed) }?;
        Ok(())
    }

    pub(crate) fn load_html(&self, html: &str) -> Result<()> {
        let html = HSTRING::from(html);
        // SAFETY: `html` outlives the call.
        unsafe { self.webview.NavigateToString(PCWSTR(html.as_ptr())) }?;
        Ok(())
    }

    pub(crate) fn navigate(&self, uri: &str) -> Result<()> {
        let uri = HSTRING::from(uri);
        // SAFETY: `uri` outlives the call.
        unsafe { self.webview.Navigate(PCWSTR(uri.as_ptr())) }?;
        Ok(())
    }
}

impl Drop for WebView {
    fn drop(&mut self) {
        // SAFETY: closing is the last thing done with the controller.
        if let Err(e) = unsafe { self.controller.Close() } {
            tracing::warn!("Failed to close web view: {}", e.message());
        }
    }
}

/// Answer an intercepted request with an in-memory response.
fn respond(
    environment: &ICoreWebView2Environment,
    args: &ICoreWebView2WebResourceRequestedEventArgs,
    uri: &str,
    response: &NetResponse<'_>,
) -> windows::core::Result<()> {
    let reason = HSTRING::from(net::reason_phrase(response.status_code));
    let headers = HSTRING::from(net::response_headers(uri));

    // SAFETY: the stream copies `content`; the strings outlive the calls.
    unsafe {
        let stream = SHCreateMemStream(Some(response.content))
            .ok_or_else(|| windows::core::Error::from(E_OUTOFMEMORY))?;
        let response = environment.CreateWebResourceResponse(
            &stream,
            i32::from(response.status_code),
            PCWSTR(reason.as_ptr()),
            PCWSTR(headers.as_ptr()),
        )?;
        args.SetResponse(&response)
    }
}
