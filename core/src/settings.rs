//! Key/value configuration store and the typed settings built on top of it.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::completion::gemini::DEFAULT_MODEL;
use crate::prompt::validate_template;

pub const API_KEY: &str = "apiKey";
pub const LAUNCH_AT_LOGIN: &str = "launchAtLogin";
pub const CUSTOM_PROMPT: &str = "customPrompt";
pub const THEME: &str = "theme";
pub const HOTKEY: &str = "hotkey";
pub const MODEL: &str = "model";

pub const DEFAULT_HOTKEY: &str = "CommandOrControl+Shift+G";
pub const DEFAULT_THEME: &str = "light";
pub const CONFIG_FILE_NAME: &str = "config.json";
const THEMES: [&str; 2] = ["light", "dark"];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("secure storage error: {0}")]
    SecureStorage(String),
    #[error("{0}")]
    Invalid(String),
}

/// Credential/configuration store with a `get(key)` / `set(key, value)` contract.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError>;

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(value)) => value,
            _ => default.to_string(),
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(value)) => value,
            _ => default,
        }
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for Arc<S> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        (**self).set(key, value)
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        lock(&self.values).insert(key.to_string(), value.into());
        self
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings persisted as one JSON object. Every `set` rewrites the file
/// through a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!(path = %path.display(), "settings file is not a JSON object; starting from defaults");
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::open(dir.as_ref().join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(&self, key: &str) -> Result<(), SettingsError> {
        let mut values = lock(&self.values);
        if !values.contains_key(key) {
            return Ok(());
        }

        let mut next = values.clone();
        next.remove(key);
        write_atomically(&self.path, &next)?;
        *values = next;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut values = lock(&self.values);
        let mut next = values.clone();
        next.insert(key.to_string(), value);
        write_atomically(&self.path, &next)?;
        *values = next;
        Ok(())
    }
}

fn write_atomically(path: &Path, values: &Map<String, Value>) -> Result<(), SettingsError> {
    let serialized = serde_json::to_vec_pretty(values)?;
    let write_err = |source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = fs::File::create(&temp).map_err(write_err)?;
    file.write_all(&serialized).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    fs::rename(&temp, path).map_err(write_err)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_launch_at_login")]
    pub launch_at_login: bool,
    #[serde(default)]
    pub custom_prompt: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_hotkey")]
    pub hotkey: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            launch_at_login: default_launch_at_login(),
            custom_prompt: String::new(),
            theme: default_theme(),
            hotkey: default_hotkey(),
            model: default_model(),
        }
    }
}

fn default_launch_at_login() -> bool {
    true
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

fn default_hotkey() -> String {
    DEFAULT_HOTKEY.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl AppSettings {
    /// Reads every known key, replacing missing or unusable values with defaults.
    pub fn load(store: &impl SettingsStore) -> Self {
        let defaults = Self::default();
        let mut settings = Self {
            api_key: store.get_string(API_KEY, "").trim().to_string(),
            launch_at_login: store.get_bool(LAUNCH_AT_LOGIN, defaults.launch_at_login),
            custom_prompt: store.get_string(CUSTOM_PROMPT, &defaults.custom_prompt),
            theme: store.get_string(THEME, &defaults.theme),
            hotkey: store.get_string(HOTKEY, &defaults.hotkey),
            model: store.get_string(MODEL, &defaults.model),
        };

        if !THEMES.contains(&settings.theme.as_str()) {
            warn!(theme = settings.theme.as_str(), "unknown theme in settings; using default");
            settings.theme = defaults.theme;
        }
        if settings.hotkey.trim().is_empty() {
            settings.hotkey = defaults.hotkey;
        }
        if settings.model.trim().is_empty() {
            settings.model = defaults.model;
        }
        settings
    }

    pub fn validate(mut self) -> Result<Self, SettingsError> {
        self.api_key = self.api_key.trim().to_string();

        validate_template(&self.custom_prompt)
            .map_err(|err| SettingsError::Invalid(err.to_string()))?;

        self.theme = self.theme.trim().to_lowercase();
        if !THEMES.contains(&self.theme.as_str()) {
            return Err(SettingsError::Invalid(
                "theme must be one of: light, dark".to_string(),
            ));
        }

        self.hotkey = self.hotkey.trim().to_string();
        if self.hotkey.is_empty() {
            return Err(SettingsError::Invalid("hotkey cannot be empty".to_string()));
        }

        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            self.model = default_model();
        }

        Ok(self)
    }

    /// Writes every key. Stops at the first store failure.
    pub fn store_into(&self, store: &impl SettingsStore) -> Result<(), SettingsError> {
        store.set(API_KEY, Value::String(self.api_key.clone()))?;
        store.set(LAUNCH_AT_LOGIN, Value::Bool(self.launch_at_login))?;
        store.set(CUSTOM_PROMPT, Value::String(self.custom_prompt.clone()))?;
        store.set(THEME, Value::String(self.theme.clone()))?;
        store.set(HOTKEY, Value::String(self.hotkey.clone()))?;
        store.set(MODEL, Value::String(self.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn typed_getters_fall_back_on_missing_or_mistyped_values() {
        let store = MemorySettingsStore::new()
            .with(THEME, "dark")
            .with(LAUNCH_AT_LOGIN, "yes");

        assert_eq!(store.get_string(THEME, DEFAULT_THEME), "dark");
        assert_eq!(store.get_string(CUSTOM_PROMPT, "fallback"), "fallback");
        assert!(store.get_bool(LAUNCH_AT_LOGIN, true));
        assert!(!store.get_bool(LAUNCH_AT_LOGIN, false));
    }

    #[test]
    fn load_uses_defaults_for_empty_store() {
        let settings = AppSettings::load(&MemorySettingsStore::new());
        assert_eq!(settings, AppSettings::default());
        assert!(settings.launch_at_login);
        assert_eq!(settings.hotkey, DEFAULT_HOTKEY);
    }

    #[test]
    fn load_repairs_unknown_theme() {
        let store = MemorySettingsStore::new()
            .with(THEME, "solarized")
            .with(API_KEY, "  key  ");
        let settings = AppSettings::load(&store);
        assert_eq!(settings.theme, DEFAULT_THEME);
        assert_eq!(settings.api_key, "key");
    }

    #[test]
    fn validate_rejects_long_prompt_and_bad_theme() {
        let long_prompt = AppSettings {
            custom_prompt: "word ".repeat(121),
            ..AppSettings::default()
        };
        assert!(matches!(
            long_prompt.validate(),
            Err(SettingsError::Invalid(message)) if message.contains("120")
        ));

        let bad_theme = AppSettings {
            theme: "neon".to_string(),
            ..AppSettings::default()
        };
        assert!(bad_theme.validate().is_err());
    }

    #[test]
    fn validate_normalizes_fields() {
        let settings = AppSettings {
            api_key: " key ".to_string(),
            theme: " Dark ".to_string(),
            hotkey: " Alt+Space ".to_string(),
            model: " ".to_string(),
            ..AppSettings::default()
        }
        .validate()
        .expect("settings should validate");

        assert_eq!(settings.api_key, "key");
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.hotkey, "Alt+Space");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonSettingsStore::in_dir(dir.path()).expect("open store");
        let settings = AppSettings {
            custom_prompt: "Summarize briefly.".to_string(),
            launch_at_login: false,
            ..AppSettings::default()
        };
        settings.store_into(&store).expect("store settings");

        let reopened = JsonSettingsStore::in_dir(dir.path()).expect("reopen store");
        assert_eq!(AppSettings::load(&reopened), settings);
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[test]
    fn json_store_treats_garbage_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{not json").expect("write garbage");

        let store = JsonSettingsStore::in_dir(dir.path()).expect("open store");
        assert_eq!(store.get(THEME), None);

        store.set(THEME, Value::from("dark")).expect("set theme");
        let content = fs::read_to_string(store.path()).expect("read back");
        assert!(content.contains("\"theme\": \"dark\""));
    }

    #[test]
    fn json_store_remove_drops_key() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonSettingsStore::in_dir(dir.path()).expect("open store");
        store.set(API_KEY, Value::from("plaintext")).expect("set key");

        store.remove(API_KEY).expect("remove key");

        let reopened = JsonSettingsStore::in_dir(dir.path()).expect("reopen store");
        assert_eq!(reopened.get(API_KEY), None);
    }

    #[test]
    fn json_store_keeps_memory_in_step_with_disk_when_writes_fail() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonSettingsStore::in_dir(dir.path()).expect("open store");
        store.set(THEME, Value::from("light")).expect("set theme");
        fs::create_dir(dir.path().join("config.json.tmp")).expect("block temp file");

        assert!(matches!(
            store.set(THEME, Value::from("dark")),
            Err(SettingsError::Write { .. })
        ));
        assert_eq!(store.get(THEME), Some(Value::from("light")));

        assert!(store.remove(THEME).is_err());
        assert_eq!(store.get(THEME), Some(Value::from("light")));

        let reopened = JsonSettingsStore::in_dir(dir.path()).expect("reopen store");
        assert_eq!(reopened.get(THEME), Some(Value::from("light")));
    }
}
