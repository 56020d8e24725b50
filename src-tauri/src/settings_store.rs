use std::path::Path;

use copywizz_core::settings::{API_KEY, JsonSettingsStore, SettingsError, SettingsStore};
use serde_json::Value;
use tracing::{info, warn};

use crate::secure_storage;

const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"];

/// Where the API key lives when the OS keychain is usable.
pub trait CredentialVault: Send + Sync {
    fn read(&self) -> Result<Option<String>, SettingsError>;
    fn write(&self, api_key: &str) -> Result<(), SettingsError>;
}

pub struct KeyringVault;

impl CredentialVault for KeyringVault {
    fn read(&self) -> Result<Option<String>, SettingsError> {
        secure_storage::read_api_key()
    }

    fn write(&self, api_key: &str) -> Result<(), SettingsError> {
        secure_storage::write_and_confirm_api_key(api_key)
    }
}

/// `config.json` for plain settings, the keychain for `apiKey`.
///
/// A key found in plaintext config is moved into the keychain on open. When
/// the keychain is unavailable the key stays in config so the app keeps
/// working, and `GEMINI_API_KEY` / `VITE_GEMINI_API_KEY` fill in when neither
/// holds one.
pub struct SecureSettingsStore<V = KeyringVault> {
    config: JsonSettingsStore,
    vault: V,
}

impl SecureSettingsStore<KeyringVault> {
    pub fn open(config_dir: &Path) -> Result<Self, SettingsError> {
        Self::with_vault(config_dir, KeyringVault)
    }
}

impl<V: CredentialVault> SecureSettingsStore<V> {
    pub fn with_vault(config_dir: &Path, vault: V) -> Result<Self, SettingsError> {
        let store = Self {
            config: JsonSettingsStore::in_dir(config_dir)?,
            vault,
        };
        store.migrate_plaintext_key();
        Ok(store)
    }

    fn plaintext_key(&self) -> Option<String> {
        match self.config.get(API_KEY) {
            Some(Value::String(key)) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => None,
        }
    }

    fn migrate_plaintext_key(&self) {
        let Some(plaintext) = self.plaintext_key() else {
            return;
        };

        match self.vault.read() {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(err) = self.vault.write(&plaintext) {
                    warn!("failed to migrate API key into secure storage: {err}");
                    return;
                }
                info!("migrated API key from config into secure storage");
            }
            Err(err) => {
                warn!("secure storage unavailable; keeping API key in config: {err}");
                return;
            }
        }

        if let Err(err) = self.config.remove(API_KEY) {
            warn!("failed to remove plaintext API key from config: {err}");
        }
    }

    fn read_api_key(&self) -> Option<String> {
        match self.vault.read() {
            Ok(Some(key)) => return Some(key.trim().to_string()),
            Ok(None) => {}
            Err(err) => warn!("failed to read API key from secure storage; using config fallback: {err}"),
        }

        self.plaintext_key().or_else(read_api_key_from_environment)
    }

    fn write_api_key(&self, api_key: &str) -> Result<(), SettingsError> {
        match self.vault.write(api_key) {
            Ok(()) => self.config.remove(API_KEY),
            Err(err) => {
                warn!("failed to write API key into secure storage, fallback to config persistence: {err}");
                self.config
                    .set(API_KEY, Value::String(api_key.trim().to_string()))
            }
        }
    }
}

impl<V: CredentialVault> SettingsStore for SecureSettingsStore<V> {
    fn get(&self, key: &str) -> Option<Value> {
        if key == API_KEY {
            return self.read_api_key().map(Value::String);
        }
        self.config.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        if key == API_KEY {
            let api_key = value.as_str().unwrap_or_default();
            return self.write_api_key(api_key);
        }
        self.config.set(key, value)
    }
}

fn read_api_key_from_environment() -> Option<String> {
    API_KEY_ENV_VARS.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
