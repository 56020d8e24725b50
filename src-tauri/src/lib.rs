mod clipboard;
mod commands;
mod error;
mod overlay;
mod secure_storage;
mod settings_store;
mod state;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use clipboard::ClipboardText;
use copywizz_core::{
    AppSettings, GeminiConfig, GeminiProvider, HistoryStore, NotificationHandle,
    NotificationSurface, QueryOrchestrator, RetryableCompletionClient, SurfaceConfig, SurfaceEvent,
};
use error::AppError;
use overlay::{MeasurementSlot, TauriSurfaceBackend};
use settings_store::SecureSettingsStore;
use state::AppState;
use tauri::Emitter;
use tauri::menu::{Menu, MenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{Manager, RunEvent, WindowEvent};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const MAIN_WINDOW_LABEL: &str = "main";
const MENU_ID_SHOW_APP: &str = "show_app";
const MENU_ID_QUIT: &str = "quit";
const EVENT_NOTIFICATION_STATE: &str = "notification-state";

type SetupResult<T> = Result<T, Box<dyn Error>>;

fn init_logging() -> Result<(), AppError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| AppError::LoggingInit(err.to_string()))
}

fn init_rustls_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_some() {
        return;
    }

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls CryptoProvider was already installed");
    } else {
        info!("rustls CryptoProvider initialized with ring");
    }
}

fn show_main_window(app_handle: &tauri::AppHandle) {
    let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) else {
        warn!("main window not found when opening it from tray");
        return;
    };
    if let Err(show_err) = window.show() {
        warn!("failed to show main window from tray menu: {show_err}");
    }
    if let Err(focus_err) = window.set_focus() {
        warn!("failed to focus main window from tray menu: {focus_err}");
    }
}

fn setup_tray(app: &mut tauri::App) -> SetupResult<()> {
    let show_item = MenuItem::with_id(app, MENU_ID_SHOW_APP, "Show App", true, None::<&str>)?;
    let quit_item = MenuItem::with_id(app, MENU_ID_QUIT, "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&show_item, &quit_item])?;

    TrayIconBuilder::new()
        .icon(tauri::include_image!("./icons/icon.png"))
        .tooltip("CopyWizz")
        .menu(&menu)
        .show_menu_on_left_click(true)
        .on_menu_event(|app_handle, event| match event.id().as_ref() {
            MENU_ID_SHOW_APP => show_main_window(app_handle),
            MENU_ID_QUIT => app_handle.exit(0),
            _ => {}
        })
        .build(app)?;

    Ok(())
}

#[cfg(desktop)]
fn setup_global_shortcut(app: &mut tauri::App, hotkey: &str) -> SetupResult<()> {
    use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};

    let shortcut = commands::parse_shortcut(hotkey)?;

    app.handle().plugin(
        tauri_plugin_global_shortcut::Builder::new()
            .with_handler(|app_handle, _, event| {
                if !matches!(event.state, ShortcutState::Pressed) {
                    return;
                }
                let app_handle = app_handle.clone();
                tauri::async_runtime::spawn(async move {
                    commands::handle_shortcut_pressed(app_handle).await;
                });
            })
            .build(),
    )?;

    app.global_shortcut().register(shortcut)?;
    info!(hotkey, "global shortcut registered");
    Ok(())
}

#[cfg(not(desktop))]
fn setup_global_shortcut(_app: &mut tauri::App, _hotkey: &str) -> SetupResult<()> {
    Ok(())
}

/// Starts the notification surface task and returns the handle used to drive it.
fn spawn_notification_surface(
    app_handle: &tauri::AppHandle,
    measurements: Arc<MeasurementSlot>,
) -> NotificationHandle {
    let backend = TauriSurfaceBackend::new(app_handle.clone(), measurements);
    let surface = NotificationSurface::new(backend, SurfaceConfig::default());
    let events = surface.subscribe();
    let (handle, rx) = NotificationHandle::channel();

    tauri::async_runtime::spawn(surface.run(rx));
    spawn_surface_event_forwarder(app_handle.clone(), events);
    handle
}

fn spawn_surface_event_forwarder(
    app_handle: tauri::AppHandle,
    mut events: broadcast::Receiver<SurfaceEvent>,
) {
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(phase = ?event.phase, visible = event.state.visible, "notification updated");
                    if let Err(err) = app_handle.emit_to(MAIN_WINDOW_LABEL, EVENT_NOTIFICATION_STATE, &event) {
                        warn!("failed to emit notification state event: {err}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification state forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn resolve_app_dirs(app: &tauri::App) -> anyhow::Result<(PathBuf, PathBuf)> {
    let config_dir = app
        .path()
        .app_config_dir()
        .context("failed to resolve app config directory")?;
    let data_dir = app
        .path()
        .app_data_dir()
        .context("failed to resolve app data directory")?;
    Ok((config_dir, data_dir))
}

fn setup_app(app: &mut tauri::App) -> SetupResult<()> {
    let (config_dir, data_dir) = resolve_app_dirs(app)?;

    let settings = Arc::new(SecureSettingsStore::open(&config_dir).map_err(AppError::from)?);
    let app_settings = AppSettings::load(&settings);
    let hotkey = commands::normalize_hotkey(&app_settings.hotkey);

    let measurements = Arc::new(MeasurementSlot::default());
    let notifications = spawn_notification_surface(app.handle(), Arc::clone(&measurements));

    let provider = GeminiProvider::new(GeminiConfig {
        model: app_settings.model.clone(),
        ..GeminiConfig::default()
    });
    let history = Arc::new(HistoryStore::in_dir(&data_dir));
    info!(path = %history.path().display(), "history store ready");

    let orchestrator = QueryOrchestrator::new(
        RetryableCompletionClient::new(provider),
        ClipboardText::new(app.handle().clone()),
        Arc::clone(&settings),
        history,
        notifications,
    );
    app.manage(AppState::new(
        orchestrator,
        settings,
        measurements,
        hotkey.clone(),
    ));

    if let Err(err) = commands::apply_launch_at_login(app.handle(), app_settings.launch_at_login) {
        warn!("{err}");
    }

    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        if let Err(err) = window.set_icon(tauri::include_image!("./icons/icon.png")) {
            warn!("failed to set main window icon: {err}");
        }
    }

    setup_tray(app)?;
    setup_global_shortcut(app, &hotkey)?;
    Ok(())
}

fn handle_run_event(app_handle: &tauri::AppHandle, event: RunEvent) {
    match event {
        RunEvent::WindowEvent {
            label,
            event: WindowEvent::CloseRequested { api, .. },
            ..
        } => {
            if label == MAIN_WINDOW_LABEL {
                api.prevent_close();
                if let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) {
                    if let Err(hide_err) = window.hide() {
                        warn!("failed to hide main window on close request: {hide_err}");
                    } else {
                        info!("main window hidden to tray");
                    }
                } else {
                    warn!("main window not found while handling close request");
                }
            }
        }
        RunEvent::ExitRequested { code, api, .. } => {
            if code.is_none() {
                api.prevent_exit();
                info!("prevented system-triggered app exit; app remains in tray");
            }
        }
        _ => {}
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    if let Err(init_err) = init_logging() {
        eprintln!("logging bootstrap failed: {init_err}");
    }
    init_rustls_crypto_provider();

    info!("starting copywizz");

    let builder = tauri::Builder::default()
        .plugin(tauri_plugin_clipboard_manager::init())
        .plugin(tauri_plugin_autostart::init(
            tauri_plugin_autostart::MacosLauncher::LaunchAgent,
            None,
        ))
        .setup(setup_app)
        .invoke_handler(tauri::generate_handler![
            commands::app_status,
            commands::get_performance_report,
            commands::get_history,
            commands::toggle_favorite,
            commands::get_settings,
            commands::save_settings,
            commands::verify_api_key,
            commands::apply_prompt_edit,
            commands::hide_notification,
            commands::notification_measured
        ]);

    let app = match builder.build(tauri::generate_context!()) {
        Ok(app) => app,
        Err(build_err) => {
            error!("failed to build tauri app: {build_err}");
            return;
        }
    };

    app.run(handle_run_event);
}
