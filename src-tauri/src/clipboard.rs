use copywizz_core::{CaptureError, TextSource};
use tauri::AppHandle;
use tauri_plugin_clipboard_manager::ClipboardExt;

/// Reads the system clipboard through the clipboard-manager plugin.
pub struct ClipboardText {
    app_handle: AppHandle,
}

impl ClipboardText {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl TextSource for ClipboardText {
    fn read_text(&self) -> Result<String, CaptureError> {
        self.app_handle
            .clipboard()
            .read_text()
            .map_err(|err| CaptureError(err.to_string()))
    }
}
