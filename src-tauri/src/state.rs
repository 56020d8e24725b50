use std::sync::Arc;

use copywizz_core::{GeminiProvider, HistoryStore, NotificationHandle, QueryOrchestrator};
use tokio::sync::Mutex;

use crate::clipboard::ClipboardText;
use crate::overlay::MeasurementSlot;
use crate::settings_store::SecureSettingsStore;

pub type AppOrchestrator =
    QueryOrchestrator<GeminiProvider, ClipboardText, Arc<SecureSettingsStore>>;

pub struct RuntimeState {
    pub orchestrator: AppOrchestrator,
    pub settings: Arc<SecureSettingsStore>,
    pub measurements: Arc<MeasurementSlot>,
    pub current_hotkey: Mutex<String>,
}

#[derive(Clone)]
pub struct AppState {
    runtime: Arc<RuntimeState>,
}

impl AppState {
    pub fn new(
        orchestrator: AppOrchestrator,
        settings: Arc<SecureSettingsStore>,
        measurements: Arc<MeasurementSlot>,
        hotkey: String,
    ) -> Self {
        let runtime = RuntimeState {
            orchestrator,
            settings,
            measurements,
            current_hotkey: Mutex::new(hotkey),
        };
        Self {
            runtime: Arc::new(runtime),
        }
    }

    pub fn runtime(&self) -> Arc<RuntimeState> {
        Arc::clone(&self.runtime)
    }
}

impl RuntimeState {
    pub fn history(&self) -> Arc<HistoryStore> {
        self.orchestrator.history()
    }

    pub fn notifications(&self) -> &NotificationHandle {
        self.orchestrator.notifications()
    }
}
