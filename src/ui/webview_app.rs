//! Desktop host using `wry` + `tao`.
//!
//! Architecture:
//! - The monitor runs on a tokio runtime; window work is requested through
//!   [`GuiHost`] and performed here on the event loop thread.
//! - Each monitor cycle gets its own hidden window whose webview loads the
//!   dashboard. Page-load events feed the tab status channel.
//! - Alert popups and the options page are served via the `ticketwatch://`
//!   custom protocol.
//! - IPC from JS → Rust via `window.ipc.postMessage()`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tao::dpi::{LogicalPosition, LogicalSize};
use tao::event::{Event, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget};
use tao::window::{Window, WindowBuilder, WindowId};
use tokio::runtime::Runtime;
use wry::http::{Request, Response};
use wry::{PageLoadEvent, WebView, WebViewBuilder};

use crate::app::{init_tracing, App, HostCapabilities};
use crate::managers::alert_window::{build_alert_view, on_alert_ready, render_alert_html, AlertParams};
use crate::managers::options::{view_script, OptionsCommand};
use crate::services::localization_engine::{escape_html, LocalizationEngine};
use crate::services::notifier::default_notifier;
use crate::services::page_loader::extraction_script;
use crate::services::power::InhibitorPower;
use crate::services::sound::default_player;
use crate::types::errors::PageError;
use crate::types::tab::{TabId, TabStatus};
use crate::ui::host::{GuiHost, ScriptReply, UserEvent};

const PROTOCOL: &str = "ticketwatch";
const OPTIONS_LOCATOR: &str = "ticketwatch://localhost/options";

type BoxError = Box<dyn std::error::Error>;

struct HostWindow {
    window: Window,
    webview: WebView,
}

/// Everything the event loop owns.
#[derive(Default)]
struct Windows {
    tabs: HashMap<TabId, HostWindow>,
    alerts: HashMap<WindowId, HostWindow>,
    options: Option<HostWindow>,
}

fn read_i18n(app: &App) -> std::sync::RwLockReadGuard<'_, LocalizationEngine> {
    match app.i18n.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Serves `ticketwatch://localhost/alert?...` and `ticketwatch://localhost/options`.
fn serve_page(app: &App, request: &Request<Vec<u8>>) -> Response<Cow<'static, [u8]>> {
    let uri = request.uri();
    let (status, html) = match uri.path() {
        "/alert" => {
            let params = AlertParams::from_query(uri.query().unwrap_or_default());
            (200, render_alert_html(&params, &read_i18n(app)))
        }
        "/options" => (200, app.options.render_html()),
        other => (404, format!("<!DOCTYPE html><p>Not found: {}</p>", escape_html(other))),
    };
    Response::builder()
        .status(status)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Cow::Owned(html.into_bytes()))
        .unwrap_or_else(|_| Response::new(Cow::Borrowed(&b""[..])))
}

fn build_webview(builder: WebViewBuilder<'_>, window: &Window) -> Result<WebView, BoxError> {
    #[cfg(target_os = "linux")]
    {
        use tao::platform::unix::WindowExtUnix;
        use wry::WebViewBuilderExtUnix;
        let vbox = window.default_vbox().ok_or("window has no GTK container")?;
        Ok(builder.build_gtk(vbox)?)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Ok(builder.build(window)?)
    }
}

fn open_hidden_tab(
    target: &EventLoopWindowTarget<UserEvent>,
    url: &str,
    status: Arc<tokio::sync::watch::Sender<TabStatus>>,
) -> Result<HostWindow, BoxError> {
    let window = WindowBuilder::new()
        .with_title("ticketwatch monitor")
        .with_visible(false)
        .with_inner_size(LogicalSize::new(1280.0, 800.0))
        .build(target)?;

    let builder = WebViewBuilder::new()
        .with_url(url)
        .with_visible(false)
        .with_on_page_load_handler(move |event, _url| {
            if let PageLoadEvent::Finished = event {
                status.send_replace(TabStatus::Complete);
            }
        });
    let webview = build_webview(builder, &window)?;
    Ok(HostWindow { window, webview })
}

fn open_alert(
    target: &EventLoopWindowTarget<UserEvent>,
    app: &Arc<App>,
    runtime: &Runtime,
    proxy: &EventLoopProxy<UserEvent>,
    locator: &str,
) -> Result<HostWindow, BoxError> {
    let params = AlertParams::from_query(locator);
    let title = build_alert_view(&params, &read_i18n(app)).title;
    let tuning = &app.tuning;

    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(LogicalSize::new(tuning.alert_width, tuning.alert_height))
        .with_position(LogicalPosition::new(tuning.alert_left, tuning.alert_top))
        .with_always_on_top(true)
        .build(target)?;

    let page_app = app.clone();
    let ipc_app = app.clone();
    let handle = runtime.handle().clone();
    let ipc_proxy = proxy.clone();
    let builder = WebViewBuilder::new()
        .with_custom_protocol(PROTOCOL.into(), move |_wv_id, request| serve_page(&page_app, &request))
        .with_url(locator)
        .with_ipc_handler(move |msg: Request<String>| {
            let cmd = serde_json::from_str::<Value>(msg.body())
                .ok()
                .and_then(|v| v.get("cmd").and_then(|c| c.as_str()).map(str::to_string));
            match cmd.as_deref() {
                Some("alert_ready") => {
                    let app = ipc_app.clone();
                    let params = params.clone();
                    handle.spawn(async move {
                        let outcome = on_alert_ready(
                            app.store.as_ref(),
                            app.sound.clone(),
                            &app.assets_dir,
                            &params,
                            &app.tuning,
                        )
                        .await;
                        tracing::debug!(?outcome, "Alert sound finished");
                    });
                }
                Some("open_options") => {
                    let _ = ipc_proxy.send_event(UserEvent::OpenOptions);
                }
                _ => tracing::debug!(body = msg.body().as_str(), "Ignoring alert message"),
            }
        });
    let webview = build_webview(builder, &window)?;
    Ok(HostWindow { window, webview })
}

fn open_options(
    target: &EventLoopWindowTarget<UserEvent>,
    app: &Arc<App>,
    runtime: &Runtime,
    proxy: &EventLoopProxy<UserEvent>,
) -> Result<HostWindow, BoxError> {
    let window = WindowBuilder::new()
        .with_title("ticketwatch")
        .with_inner_size(LogicalSize::new(520.0, 640.0))
        .build(target)?;

    let page_app = app.clone();
    let ipc_app = app.clone();
    let handle = runtime.handle().clone();
    let ipc_proxy = proxy.clone();
    let builder = WebViewBuilder::new()
        .with_custom_protocol(PROTOCOL.into(), move |_wv_id, request| serve_page(&page_app, &request))
        .with_url(OPTIONS_LOCATOR)
        .with_ipc_handler(move |msg: Request<String>| {
            let Some(command) = OptionsCommand::from_ipc(msg.body()) else {
                tracing::debug!(body = msg.body().as_str(), "Ignoring options message");
                return;
            };
            let controller = ipc_app.options.clone();
            let proxy = ipc_proxy.clone();
            handle.spawn(async move {
                let event = if controller.handle(command).await {
                    UserEvent::ReloadOptions
                } else {
                    UserEvent::EvalInOptions(view_script(&controller.view()))
                };
                let _ = proxy.send_event(event);
            });
        })
        .with_devtools(cfg!(debug_assertions));
    let webview = build_webview(builder, &window)?;
    Ok(HostWindow { window, webview })
}

fn extract(windows: &Windows, tab: &TabId, reply: ScriptReply) {
    let Some(host) = windows.tabs.get(tab) else {
        let _ = reply.send(Err(PageError::TabNotFound(tab.to_string())));
        return;
    };
    let slot = Arc::new(Mutex::new(Some(reply)));
    let callback_slot = slot.clone();
    let result = host.webview.evaluate_script_with_callback(&extraction_script(), move |raw| {
        let taken = match callback_slot.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(reply) = taken {
            let _ = reply.send(Ok(raw));
        }
    });
    if let Err(e) = result {
        let taken = match slot.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(reply) = taken {
            let _ = reply.send(Err(PageError::InjectionFailed(e.to_string())));
        }
    }
}

// ─── Main entry point ───

pub fn run() -> Result<(), BoxError> {
    init_tracing(false);

    let runtime = Runtime::new()?;
    let event_loop: EventLoop<UserEvent> = EventLoopBuilder::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let host = Arc::new(GuiHost::new(proxy.clone()));
    let capabilities = HostCapabilities {
        loader: host.clone(),
        alerts: host.clone(),
        notifier: Arc::from(default_notifier()),
        power: Arc::new(InhibitorPower::platform_default()),
        sound: default_player(),
    };
    let app = Arc::new(App::open_default(capabilities)?);

    {
        let app = app.clone();
        let host = host.clone();
        runtime.spawn(async move {
            app.startup().await;
            if app.needs_setup() {
                tracing::info!("No monitorUrl configured, opening options");
                host.send(UserEvent::OpenOptions);
            }
        });
    }
    {
        let host = host.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                host.send(UserEvent::Quit);
            }
        });
    }

    let mut windows = Windows::default();

    event_loop.run(move |event, target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::WindowEvent {
                window_id,
                event: WindowEvent::CloseRequested,
                ..
            } => {
                if windows.alerts.remove(&window_id).is_none()
                    && windows.options.as_ref().map(|o| o.window.id()) == Some(window_id)
                {
                    windows.options = None;
                }
            }

            Event::UserEvent(user_event) => match user_event {
                UserEvent::OpenHiddenTab { tab, url, status } => {
                    match open_hidden_tab(target, &url, status.clone()) {
                        Ok(host) => {
                            windows.tabs.insert(tab, host);
                        }
                        Err(e) => {
                            tracing::error!(tab = %tab, error = %e, "Could not open tab");
                            status.send_replace(TabStatus::Failed(e.to_string()));
                        }
                    }
                }
                UserEvent::ExtractCounters { tab, reply } => extract(&windows, &tab, reply),
                UserEvent::CloseTab(tab) => {
                    windows.tabs.remove(&tab);
                }
                UserEvent::OpenAlert(locator) => {
                    match open_alert(target, &app, &runtime, &proxy, &locator) {
                        Ok(host) => {
                            windows.alerts.insert(host.window.id(), host);
                        }
                        Err(e) => tracing::error!(error = %e, "Could not open alert window"),
                    }
                }
                UserEvent::OpenOptions => match &windows.options {
                    Some(existing) => existing.window.set_focus(),
                    None => match open_options(target, &app, &runtime, &proxy) {
                        Ok(host) => windows.options = Some(host),
                        Err(e) => tracing::error!(error = %e, "Could not open options window"),
                    },
                },
                UserEvent::EvalInOptions(js) => {
                    if let Some(options) = &windows.options {
                        let _ = options.webview.evaluate_script(&js);
                    }
                }
                UserEvent::ReloadOptions => {
                    if let Some(options) = &windows.options {
                        let _ = options.webview.load_url(OPTIONS_LOCATOR);
                    }
                }
                UserEvent::Quit => {
                    app.shutdown();
                    windows = Windows::default();
                    *control_flow = ControlFlow::Exit;
                }
            },

            _ => {}
        }
    })
}
