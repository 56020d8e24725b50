use copywizz_core::SettingsError;

const SERVICE_NAME: &str = "com.copywizz.app";
const API_KEY_ACCOUNT: &str = "gemini_api_key";

fn entry() -> Result<keyring::Entry, SettingsError> {
    keyring::Entry::new(SERVICE_NAME, API_KEY_ACCOUNT)
        .map_err(|err| SettingsError::SecureStorage(err.to_string()))
}

pub fn read_api_key() -> Result<Option<String>, SettingsError> {
    match entry()?.get_password() {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(SettingsError::SecureStorage(format!(
            "failed to read API key: {err}"
        ))),
    }
}

/// Stores `api_key`, or deletes the credential when it is blank.
pub fn write_api_key(api_key: &str) -> Result<(), SettingsError> {
    let entry = entry()?;
    let trimmed = api_key.trim();

    if trimmed.is_empty() {
        return match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(SettingsError::SecureStorage(format!(
                "failed to clear API key: {err}"
            ))),
        };
    }

    entry
        .set_password(trimmed)
        .map_err(|err| SettingsError::SecureStorage(format!("failed to save API key: {err}")))
}

/// Writes the key and reads it back. Some platform backends accept writes
/// they cannot serve later.
pub fn write_and_confirm_api_key(api_key: &str) -> Result<(), SettingsError> {
    write_api_key(api_key)?;
    if api_key.trim().is_empty() {
        return Ok(());
    }

    match read_api_key()? {
        Some(saved) if saved.trim() == api_key.trim() => Ok(()),
        _ => Err(SettingsError::SecureStorage(
            "saved API key could not be read back".to_string(),
        )),
    }
}
