pub mod client;
pub mod gemini;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::prompt::Prompt;

pub use client::RetryableCompletionClient;
pub use gemini::{GeminiConfig, GeminiProvider};
pub use retry::RetryPolicy;
#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedProvider;

/// Failure reported by a single provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider is temporarily overloaded: {0}")]
    Overloaded(String),
    #[error("api key was rejected: {0}")]
    InvalidCredential(String),
    #[error("request was rejected: {0}")]
    BadRequest(String),
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Overloaded(_) => ErrorKind::TransientProviderError,
            _ => ErrorKind::PermanentProviderError,
        }
    }
}

/// Terminal outcome of a [`RetryableCompletionClient::complete`] call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("api key is not configured")]
    MissingCredential,
    #[error("completion failed: {0}")]
    Provider(ProviderError),
    #[error("completion failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ProviderError },
}

impl CompletionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::Provider(err) => err.kind(),
            Self::RetriesExhausted { .. } => ErrorKind::PermanentProviderError,
        }
    }
}

pub type CompletionResult = Result<String, CompletionError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// External text-completion service.
pub trait CompletionProvider: Send + Sync {
    fn complete(
        &self,
        prompt: &Prompt,
        credential: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// One minimal, low-cost call that only checks the credential is accepted.
    fn verify(&self, credential: &str) -> impl Future<Output = Result<(), ProviderError>> + Send;
}
