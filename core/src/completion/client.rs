use tracing::{info, warn};

use super::{
    CompletionError, CompletionProvider, CompletionResult, ProviderError, RetryPolicy,
    VerifyOutcome,
};
use crate::prompt::Prompt;

/// Runs one completion request against a provider, retrying overload
/// failures according to a [`RetryPolicy`].
pub struct RetryableCompletionClient<P> {
    provider: P,
    policy: RetryPolicy,
}

impl<P: CompletionProvider> RetryableCompletionClient<P> {
    pub fn new(provider: P) -> Self {
        Self::with_policy(provider, RetryPolicy::default())
    }

    pub fn with_policy(provider: P, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn complete(&self, prompt: &Prompt, credential: &str) -> CompletionResult {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(CompletionError::MissingCredential);
        }

        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let err = match self.provider.complete(prompt, credential).await {
                Ok(text) => {
                    if attempt > 1 {
                        info!(attempt, "completion succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(err) => err,
            };

            if !self.policy.is_retryable(&err) {
                warn!(attempt, "completion failed with non-retryable error: {err}");
                return Err(CompletionError::Provider(err));
            }

            let Some(delay) = self.policy.delay_after(attempt) else {
                warn!(attempt, "completion retries exhausted: {err}");
                return Err(CompletionError::RetriesExhausted {
                    attempts: attempt,
                    last: err,
                });
            };

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "provider overloaded, retrying: {err}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Checks a credential with a single provider call. Never retries.
    pub async fn verify(&self, credential: &str) -> VerifyOutcome {
        let credential = credential.trim();
        if credential.is_empty() {
            return VerifyOutcome::failed("API key cannot be empty.");
        }

        match self.provider.verify(credential).await {
            Ok(()) => VerifyOutcome::ok(),
            Err(ProviderError::InvalidCredential(_)) => {
                VerifyOutcome::failed("The API key was rejected by Gemini.")
            }
            Err(err) => {
                warn!("api key verification failed: {err}");
                VerifyOutcome::failed(err.to_string())
            }
        }
    }
}
