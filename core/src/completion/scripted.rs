//! Provider that replays a fixed list of outcomes instead of calling a network
//! service. Only compiled for tests and the `test-support` feature.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::time::Instant;

use super::{CompletionProvider, ProviderError};
use crate::prompt::Prompt;

type Outcome = Result<String, ProviderError>;

pub struct ScriptedProvider {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    verify_result: Result<(), ProviderError>,
    calls: Mutex<Vec<(Instant, String)>>,
    verify_calls: Mutex<usize>,
}

impl ScriptedProvider {
    /// Replays `script` in order; once exhausted every call reports an error.
    pub fn new(script: Vec<Outcome>) -> Self {
        Self::build(
            script,
            Err(ProviderError::BadRequest("script exhausted".to_string())),
        )
    }

    /// Returns the same outcome for every call.
    pub fn always(outcome: Outcome) -> Self {
        Self::build(Vec::new(), outcome)
    }

    fn build(script: Vec<Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            verify_result: Ok(()),
            calls: Mutex::new(Vec::new()),
            verify_calls: Mutex::new(0),
        }
    }

    pub fn with_verify(mut self, result: Result<(), ProviderError>) -> Self {
        self.verify_result = result;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        lock(&self.calls).iter().map(|(at, _)| *at).collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn verify_count(&self) -> usize {
        *lock(&self.verify_calls)
    }

    fn next_outcome(&self, prompt: &Prompt) -> Outcome {
        lock(&self.calls).push((Instant::now(), prompt.as_str().to_string()));
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl CompletionProvider for ScriptedProvider {
    fn complete(
        &self,
        prompt: &Prompt,
        _credential: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        let outcome = self.next_outcome(prompt);
        async move { outcome }
    }

    fn verify(&self, _credential: &str) -> impl Future<Output = Result<(), ProviderError>> + Send {
        *lock(&self.verify_calls) += 1;
        let outcome = self.verify_result.clone();
        async move { outcome }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
