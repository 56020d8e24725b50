use std::collections::VecDeque;

use serde::Serialize;

use crate::utils::now_epoch_ms;

const DEFAULT_WINDOW_SIZE: usize = 128;
const COMPLETION_P95_TARGET_MS: u64 = 8_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub samples: usize,
    pub average_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl MetricSummary {
    fn empty() -> Self {
        Self {
            samples: 0,
            average_ms: 0,
            p95_ms: 0,
            max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub generated_at_ms: u64,
    pub completion: MetricSummary,
    pub end_to_end: MetricSummary,
    pub invocations: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub missing_credential: u64,
    pub empty_input: u64,
    pub history_write_failures: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct RollingMetric {
    values: VecDeque<u64>,
    capacity: usize,
}

impl RollingMetric {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn record(&mut self, value_ms: u64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value_ms);
    }

    fn summary(&self) -> MetricSummary {
        if self.values.is_empty() {
            return MetricSummary::empty();
        }

        let samples = self.values.len();
        let sum: u64 = self.values.iter().sum();
        let mut sorted = self.values.iter().copied().collect::<Vec<_>>();
        sorted.sort_unstable();
        let p95_index = ((samples as f64 * 0.95).ceil() as usize)
            .saturating_sub(1)
            .min(samples - 1);

        MetricSummary {
            samples,
            average_ms: sum / samples as u64,
            p95_ms: sorted[p95_index],
            max_ms: sorted[samples - 1],
        }
    }
}

/// Latency windows and outcome counters for hotkey invocations.
#[derive(Debug)]
pub struct RuntimeMetrics {
    completion_ms: RollingMetric,
    end_to_end_ms: RollingMetric,
    invocations: u64,
    succeeded: u64,
    failed: u64,
    missing_credential: u64,
    empty_input: u64,
    history_write_failures: u64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW_SIZE)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            completion_ms: RollingMetric::new(window),
            end_to_end_ms: RollingMetric::new(window),
            invocations: 0,
            succeeded: 0,
            failed: 0,
            missing_credential: 0,
            empty_input: 0,
            history_write_failures: 0,
        }
    }

    pub fn record_invocation(&mut self) {
        self.invocations += 1;
    }

    pub fn record_completion(&mut self, latency_ms: u64) {
        self.completion_ms.record(latency_ms);
    }

    pub fn record_success(&mut self, end_to_end_ms: u64) {
        self.succeeded += 1;
        self.end_to_end_ms.record(end_to_end_ms);
    }

    pub fn record_failure(&mut self, end_to_end_ms: u64) {
        self.failed += 1;
        self.end_to_end_ms.record(end_to_end_ms);
    }

    pub fn record_missing_credential(&mut self) {
        self.missing_credential += 1;
    }

    pub fn record_empty_input(&mut self) {
        self.empty_input += 1;
    }

    pub fn record_history_write_failure(&mut self) {
        self.history_write_failures += 1;
    }

    pub fn report(&self) -> PerformanceReport {
        let completion = self.completion_ms.summary();
        let end_to_end = self.end_to_end_ms.summary();

        let mut warnings = Vec::new();
        if completion.samples > 0 && completion.p95_ms > COMPLETION_P95_TARGET_MS {
            warnings.push(format!(
                "Completion P95 latency {}ms exceeded target {}ms.",
                completion.p95_ms, COMPLETION_P95_TARGET_MS
            ));
        }
        if self.failed > 0 {
            warnings.push(format!(
                "{} of {} requests failed after contacting Gemini.",
                self.failed,
                self.succeeded + self.failed
            ));
        }
        if self.history_write_failures > 0 {
            warnings.push(format!(
                "{} responses could not be saved to history.",
                self.history_write_failures
            ));
        }

        PerformanceReport {
            generated_at_ms: now_epoch_ms(),
            completion,
            end_to_end,
            invocations: self.invocations,
            succeeded: self.succeeded,
            failed: self.failed,
            missing_credential: self.missing_credential,
            empty_input: self.empty_input,
            history_write_failures: self.history_write_failures,
            warnings,
        }
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_report_zeroes() {
        let report = RuntimeMetrics::new().report();
        assert_eq!(report.completion, MetricSummary::empty());
        assert_eq!(report.invocations, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn summary_tracks_average_p95_and_max() {
        let mut metrics = RuntimeMetrics::new();
        for latency in 1..=20 {
            metrics.record_completion(latency * 100);
        }

        let summary = metrics.report().completion;
        assert_eq!(summary.samples, 20);
        assert_eq!(summary.average_ms, 1_050);
        assert_eq!(summary.p95_ms, 1_900);
        assert_eq!(summary.max_ms, 2_000);
    }

    #[test]
    fn window_drops_oldest_samples() {
        let mut metrics = RuntimeMetrics::with_window(3);
        for latency in [50_000, 10, 20, 30] {
            metrics.record_completion(latency);
        }

        let summary = metrics.report().completion;
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.max_ms, 30);
    }

    #[test]
    fn slow_completions_and_failures_raise_warnings() {
        let mut metrics = RuntimeMetrics::new();
        metrics.record_completion(15_000);
        metrics.record_failure(15_010);
        metrics.record_history_write_failure();

        let report = metrics.report();
        assert_eq!(report.failed, 1);
        assert_eq!(report.warnings.len(), 3);
    }
}
