use copywizz_core::SettingsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid hotkey `{hotkey}`: {reason}")]
    InvalidHotkey { hotkey: String, reason: String },
    #[error("failed to register hotkey `{hotkey}`: {reason}")]
    HotkeyRegistration { hotkey: String, reason: String },
    #[error("{0}")]
    Verification(String),
    #[error("launch at login could not be updated: {0}")]
    Autostart(String),
}
