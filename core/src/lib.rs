//! Hotkey-to-explanation pipeline: clipboard capture, prompt assembly, retrying
//! Gemini client, notification surface state machine and the local history log.

pub mod capture;
pub mod completion;
pub mod error;
pub mod history;
pub mod metrics;
pub mod notification;
pub mod orchestrator;
pub mod prompt;
pub mod settings;
pub mod utils;

pub use capture::{CaptureError, CapturedQuery, StaticText, TextSource};
pub use completion::{
    CompletionError, CompletionProvider, CompletionResult, GeminiConfig, GeminiProvider,
    ProviderError, RetryPolicy, RetryableCompletionClient, VerifyOutcome,
};
#[cfg(any(test, feature = "test-support"))]
pub use completion::ScriptedProvider;
pub use error::ErrorKind;
pub use history::{HistoryEntry, HistoryError, HistoryStore};
pub use metrics::{PerformanceReport, RuntimeMetrics};
pub use notification::{
    NotificationContent, NotificationHandle, NotificationState, NotificationSurface,
    SurfaceBackend, SurfaceConfig, SurfaceError, SurfaceEvent, SurfaceMessage, SurfacePhase,
};
pub use orchestrator::{InvocationOutcome, QueryOrchestrator};
pub use prompt::{Prompt, PromptError, TemplateEdit, apply_template_edit, build_prompt};
pub use settings::{AppSettings, JsonSettingsStore, MemorySettingsStore, SettingsError, SettingsStore};
