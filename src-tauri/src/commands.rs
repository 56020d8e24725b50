use copywizz_core::settings::DEFAULT_HOTKEY;
use copywizz_core::{
    AppSettings, HistoryEntry, InvocationOutcome, PerformanceReport, TemplateEdit, VerifyOutcome,
    apply_template_edit,
};
use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager, State};
use tracing::{info, warn};

use crate::error::AppError;
use crate::state::{AppState, RuntimeState};

pub const HISTORY_CHANGED_EVENT: &str = "history-changed";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub ready: bool,
    pub hotkey: String,
    pub model: String,
    pub history_path: String,
}

#[tauri::command]
pub async fn app_status(state: State<'_, AppState>) -> Result<AppStatus, String> {
    let runtime = state.runtime();
    let hotkey = runtime.current_hotkey.lock().await.clone();
    Ok(AppStatus {
        service: "copywizz",
        version: env!("CARGO_PKG_VERSION"),
        ready: true,
        hotkey,
        model: runtime.orchestrator.client().provider().model(),
        history_path: runtime.history().path().display().to_string(),
    })
}

#[tauri::command]
pub async fn get_performance_report(
    state: State<'_, AppState>,
) -> Result<PerformanceReport, String> {
    let runtime = state.runtime();
    let metrics = runtime.orchestrator.metrics();
    let report = metrics.lock().await.report();
    Ok(report)
}

#[tauri::command]
pub async fn get_history(
    state: State<'_, AppState>,
    favorites_only: Option<bool>,
) -> Result<Vec<HistoryEntry>, String> {
    let history = state.runtime().history();
    if favorites_only.unwrap_or(false) {
        Ok(history.favorites().await)
    } else {
        Ok(history.read_all().await)
    }
}

#[tauri::command]
pub async fn toggle_favorite(
    app_handle: AppHandle,
    state: State<'_, AppState>,
    id: String,
) -> Result<Option<HistoryEntry>, String> {
    let updated = state.runtime().history().toggle_favorite(&id).await;
    match &updated {
        Some(entry) => emit_history_changed(&app_handle, entry),
        None => warn!(id = id.as_str(), "toggle_favorite ignored unknown history id"),
    }
    Ok(updated)
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> AppSettings {
    AppSettings::load(&state.runtime().settings)
}

#[tauri::command]
pub async fn save_settings(
    app_handle: AppHandle,
    state: State<'_, AppState>,
    settings: AppSettings,
) -> Result<AppSettings, String> {
    let runtime = state.runtime();
    save_settings_impl(&app_handle, &runtime, settings)
        .await
        .map_err(|err| err.to_string())
}

#[tauri::command]
pub async fn verify_api_key(
    state: State<'_, AppState>,
    api_key: String,
) -> Result<VerifyOutcome, String> {
    let runtime = state.runtime();
    Ok(runtime.orchestrator.client().verify(&api_key).await)
}

#[tauri::command]
pub fn apply_prompt_edit(current: String, proposed: String) -> TemplateEdit {
    apply_template_edit(&current, &proposed)
}

#[tauri::command]
pub fn hide_notification(state: State<'_, AppState>) {
    state.runtime().notifications().hide();
}

#[tauri::command]
pub fn notification_measured(state: State<'_, AppState>, token: u64, height: f64) -> bool {
    state.runtime().measurements.resolve(token, height)
}

pub async fn handle_shortcut_pressed(app_handle: AppHandle) {
    let runtime = {
        let state = app_handle.state::<AppState>();
        state.runtime()
    };

    if let InvocationOutcome::Succeeded {
        entry: Some(entry), ..
    } = runtime.orchestrator.invoke().await
    {
        emit_history_changed(&app_handle, &entry);
    }
}

async fn save_settings_impl(
    app_handle: &AppHandle,
    runtime: &RuntimeState,
    settings: AppSettings,
) -> Result<AppSettings, AppError> {
    let validated = settings.validate()?;
    validate_hotkey(&validated.hotkey)?;

    let previous = AppSettings::load(&runtime.settings);
    if !validated.api_key.is_empty() && validated.api_key != previous.api_key {
        let outcome = runtime.orchestrator.client().verify(&validated.api_key).await;
        if !outcome.success {
            return Err(AppError::Verification(outcome.error.unwrap_or_else(|| {
                "API key verification failed.".to_string()
            })));
        }
    }

    let previous_hotkey = runtime.current_hotkey.lock().await.clone();
    swap_hotkey_then_persist(
        &previous_hotkey,
        &validated.hotkey,
        |from, to| apply_hotkey_change(app_handle, from, to),
        || validated.store_into(&runtime.settings).map_err(AppError::from),
    )?;
    *runtime.current_hotkey.lock().await = validated.hotkey.clone();
    runtime
        .orchestrator
        .client()
        .provider()
        .set_model(&validated.model);

    if previous.launch_at_login != validated.launch_at_login {
        if let Err(err) = apply_launch_at_login(app_handle, validated.launch_at_login) {
            warn!("{err}");
        }
    }

    info!(
        hotkey = validated.hotkey.as_str(),
        model = validated.model.as_str(),
        "settings saved"
    );
    Ok(validated)
}

/// Registers `next` in place of `previous`, then persists. A failed persist
/// puts `previous` back so the live shortcut always matches the saved one.
fn swap_hotkey_then_persist(
    previous: &str,
    next: &str,
    mut swap: impl FnMut(&str, &str) -> Result<(), AppError>,
    persist: impl FnOnce() -> Result<(), AppError>,
) -> Result<(), AppError> {
    if previous == next {
        return persist();
    }

    swap(previous, next)?;
    if let Err(err) = persist() {
        if let Err(restore_err) = swap(next, previous) {
            warn!("failed to restore hotkey `{previous}` after settings save failed: {restore_err}");
        }
        return Err(err);
    }
    Ok(())
}

pub fn emit_history_changed(app_handle: &AppHandle, entry: &HistoryEntry) {
    if let Err(err) = app_handle.emit(HISTORY_CHANGED_EVENT, entry) {
        warn!("failed to emit history changed event: {err}");
    }
}

/// Keeps a configured hotkey when it parses, otherwise the default.
pub fn normalize_hotkey(hotkey: &str) -> String {
    let trimmed = hotkey.trim();
    if trimmed.is_empty() {
        return DEFAULT_HOTKEY.to_string();
    }

    if validate_hotkey(trimmed).is_ok() {
        return trimmed.to_string();
    }

    warn!(hotkey = trimmed, "configured hotkey is invalid; using default hotkey");
    DEFAULT_HOTKEY.to_string()
}

#[cfg(desktop)]
pub fn parse_shortcut(hotkey: &str) -> Result<tauri_plugin_global_shortcut::Shortcut, AppError> {
    hotkey
        .parse::<tauri_plugin_global_shortcut::Shortcut>()
        .map_err(|err| AppError::InvalidHotkey {
            hotkey: hotkey.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(desktop)]
fn validate_hotkey(hotkey: &str) -> Result<(), AppError> {
    parse_shortcut(hotkey).map(|_| ())
}

#[cfg(not(desktop))]
fn validate_hotkey(_hotkey: &str) -> Result<(), AppError> {
    Ok(())
}

/// Swaps the registered shortcut, restoring the previous one if the new
/// registration fails.
#[cfg(desktop)]
fn apply_hotkey_change(
    app_handle: &AppHandle,
    previous_hotkey: &str,
    next_hotkey: &str,
) -> Result<(), AppError> {
    use tauri_plugin_global_shortcut::GlobalShortcutExt;

    let manager = app_handle.global_shortcut();
    let previous_shortcut = parse_shortcut(previous_hotkey).ok();

    if let Some(shortcut) = previous_shortcut {
        if manager.is_registered(shortcut) {
            if let Err(err) = manager.unregister(shortcut) {
                warn!("failed to unregister old hotkey `{previous_hotkey}`: {err}");
            }
        }
    }

    let next_shortcut = parse_shortcut(next_hotkey)?;
    if let Err(err) = manager.register(next_shortcut) {
        if let Some(shortcut) = previous_shortcut {
            if let Err(restore_err) = manager.register(shortcut) {
                warn!("failed to restore old hotkey `{previous_hotkey}`: {restore_err}");
            }
        }
        return Err(AppError::HotkeyRegistration {
            hotkey: next_hotkey.to_string(),
            reason: err.to_string(),
        });
    }

    info!(from = previous_hotkey, to = next_hotkey, "hotkey re-registered");
    Ok(())
}

#[cfg(not(desktop))]
fn apply_hotkey_change(
    _app_handle: &AppHandle,
    _previous_hotkey: &str,
    _next_hotkey: &str,
) -> Result<(), AppError> {
    Ok(())
}

#[cfg(desktop)]
pub fn apply_launch_at_login(app_handle: &AppHandle, enabled: bool) -> Result<(), AppError> {
    use tauri_plugin_autostart::ManagerExt;

    let autolaunch = app_handle.autolaunch();
    let current = autolaunch
        .is_enabled()
        .map_err(|err| AppError::Autostart(err.to_string()))?;
    if current == enabled {
        return Ok(());
    }

    let result = if enabled {
        autolaunch.enable()
    } else {
        autolaunch.disable()
    };
    result.map_err(|err| AppError::Autostart(err.to_string()))?;
    info!(enabled, "launch at login updated");
    Ok(())
}

#[cfg(not(desktop))]
pub fn apply_launch_at_login(_app_handle: &AppHandle, _enabled: bool) -> Result<(), AppError> {
    Ok(())
}

#[cfg(all(test, desktop))]
mod tests {
    use copywizz_core::SettingsError;

    use super::*;

    #[test]
    fn default_hotkey_parses() {
        assert!(parse_shortcut(DEFAULT_HOTKEY).is_ok());
    }

    #[test]
    fn invalid_hotkeys_fall_back_to_default() {
        assert_eq!(normalize_hotkey(""), DEFAULT_HOTKEY);
        assert_eq!(normalize_hotkey("Ctrl+Banana+"), DEFAULT_HOTKEY);
        assert_eq!(normalize_hotkey(" Alt+Space "), "Alt+Space");
    }

    fn write_failure() -> AppError {
        AppError::Settings(SettingsError::Invalid("disk full".to_string()))
    }

    #[test]
    fn failed_persist_restores_previous_hotkey() {
        let mut swaps = Vec::new();

        let result = swap_hotkey_then_persist(
            DEFAULT_HOTKEY,
            "Alt+Space",
            |from, to| {
                swaps.push((from.to_string(), to.to_string()));
                Ok(())
            },
            || Err(write_failure()),
        );

        assert!(matches!(result, Err(AppError::Settings(_))));
        assert_eq!(
            swaps,
            vec![
                (DEFAULT_HOTKEY.to_string(), "Alt+Space".to_string()),
                ("Alt+Space".to_string(), DEFAULT_HOTKEY.to_string()),
            ]
        );
    }

    #[test]
    fn failed_registration_skips_persist() {
        let mut persisted = false;

        let result = swap_hotkey_then_persist(
            DEFAULT_HOTKEY,
            "Alt+Space",
            |_, to| {
                Err(AppError::HotkeyRegistration {
                    hotkey: to.to_string(),
                    reason: "already registered".to_string(),
                })
            },
            || {
                persisted = true;
                Ok(())
            },
        );

        assert!(matches!(result, Err(AppError::HotkeyRegistration { .. })));
        assert!(!persisted);
    }

    #[test]
    fn unchanged_hotkey_only_persists() {
        let mut swaps = 0;
        let mut persisted = false;

        swap_hotkey_then_persist(
            DEFAULT_HOTKEY,
            DEFAULT_HOTKEY,
            |_, _| {
                swaps += 1;
                Ok(())
            },
            || {
                persisted = true;
                Ok(())
            },
        )
        .expect("save succeeds");

        assert_eq!(swaps, 0);
        assert!(persisted);
    }
}
