use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capture::{CapturedQuery, TextSource};
use crate::completion::{CompletionProvider, RetryableCompletionClient};
use crate::error::ErrorKind;
use crate::history::{HistoryEntry, HistoryStore};
use crate::metrics::RuntimeMetrics;
use crate::notification::{NotificationContent, NotificationHandle};
use crate::prompt::build_prompt;
use crate::settings::{API_KEY, CUSTOM_PROMPT, SettingsStore};

pub const APP_TITLE: &str = "CopyWizz";
pub const RESPONSE_TITLE: &str = "Gemini Response";
pub const ERROR_TITLE: &str = "Error";
pub const PENDING_MESSAGE: &str = "Getting info...";
pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "API key is missing. Add your Gemini API key in Settings.";
pub const EMPTY_INPUT_MESSAGE: &str = "Clipboard is empty. Copy some text first!";
pub const PROVIDER_ERROR_MESSAGE: &str = "An error occurred while contacting Gemini.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum InvocationOutcome {
    MissingCredential,
    EmptyInput,
    /// `entry` is `None` when the history write failed.
    Succeeded {
        response: String,
        entry: Option<HistoryEntry>,
    },
    Failed {
        kind: ErrorKind,
    },
}

/// Runs one hotkey invocation end to end: capture, guard, prompt, request,
/// notify, record.
pub struct QueryOrchestrator<P, T, S> {
    client: RetryableCompletionClient<P>,
    source: T,
    settings: S,
    history: Arc<HistoryStore>,
    notifications: NotificationHandle,
    metrics: Arc<Mutex<RuntimeMetrics>>,
}

impl<P, T, S> QueryOrchestrator<P, T, S>
where
    P: CompletionProvider,
    T: TextSource,
    S: SettingsStore,
{
    pub fn new(
        client: RetryableCompletionClient<P>,
        source: T,
        settings: S,
        history: Arc<HistoryStore>,
        notifications: NotificationHandle,
    ) -> Self {
        Self {
            client,
            source,
            settings,
            history,
            notifications,
            metrics: Arc::new(Mutex::new(RuntimeMetrics::new())),
        }
    }

    pub fn client(&self) -> &RetryableCompletionClient<P> {
        &self.client
    }

    pub fn history(&self) -> Arc<HistoryStore> {
        Arc::clone(&self.history)
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn notifications(&self) -> &NotificationHandle {
        &self.notifications
    }

    pub fn metrics(&self) -> Arc<Mutex<RuntimeMetrics>> {
        Arc::clone(&self.metrics)
    }

    pub async fn invoke(&self) -> InvocationOutcome {
        let started = Instant::now();
        self.metrics.lock().await.record_invocation();
        debug!(phase = "capturing", "invocation started");

        let credential = self.settings.get_string(API_KEY, "");
        if credential.trim().is_empty() {
            info!("invocation stopped: api key is not configured");
            self.notifications
                .show_result(NotificationContent::new(APP_TITLE, MISSING_CREDENTIAL_MESSAGE));
            self.metrics.lock().await.record_missing_credential();
            return InvocationOutcome::MissingCredential;
        }

        let raw = self.source.read_text().unwrap_or_else(|err| {
            warn!("treating unreadable clipboard as empty: {err}");
            String::new()
        });
        let Some(query) = CapturedQuery::new(&raw) else {
            info!("invocation stopped: captured text is empty");
            self.notifications
                .show_result(NotificationContent::new(APP_TITLE, EMPTY_INPUT_MESSAGE));
            self.metrics.lock().await.record_empty_input();
            return InvocationOutcome::EmptyInput;
        };

        self.notifications.show_pending(
            NotificationContent::new(APP_TITLE, PENDING_MESSAGE).with_query(query.as_str()),
        );

        debug!(phase = "building", query_chars = query.as_str().chars().count(), "building prompt");
        let template = self.settings.get_string(CUSTOM_PROMPT, "");
        let prompt = build_prompt(&template, &query);

        debug!(phase = "requesting", "sending completion request");
        let request_started = Instant::now();
        let result = self.client.complete(&prompt, &credential).await;
        self.metrics
            .lock()
            .await
            .record_completion(elapsed_ms(request_started));

        match result {
            Ok(response) => {
                self.notifications.show_result(
                    NotificationContent::new(RESPONSE_TITLE, response.clone())
                        .with_query(query.as_str()),
                );
                let entry = self.history.append(query.as_str(), &response).await;

                let mut metrics = self.metrics.lock().await;
                if entry.is_none() {
                    metrics.record_history_write_failure();
                }
                metrics.record_success(elapsed_ms(started));
                info!(
                    phase = "succeeded",
                    elapsed_ms = elapsed_ms(started),
                    saved = entry.is_some(),
                    "invocation finished"
                );
                InvocationOutcome::Succeeded { response, entry }
            }
            Err(err) => {
                let kind = err.kind();
                error!(phase = "failed", kind = %kind, "invocation failed: {err}");
                self.notifications.show_result(
                    NotificationContent::new(ERROR_TITLE, PROVIDER_ERROR_MESSAGE)
                        .with_query(query.as_str()),
                );
                self.metrics.lock().await.record_failure(elapsed_ms(started));
                InvocationOutcome::Failed { kind }
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
