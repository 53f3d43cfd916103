//! Per-operation counters and timers.
//!
//! One `MetricsRecorder` is owned by the long-lived service instances (via
//! `Arc`) and injected at construction — no module-level globals. Counters are
//! mutated in place on every adapter call and never persisted; their lifetime
//! is the process lifetime.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Counters for one named operation (e.g. `"transcription.gemini"`).
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct OperationStats {
    /// Duration of the most recent successful call, in seconds.
    pub last_duration_secs: f64,
    /// Terminal successes.
    pub success: u64,
    /// Terminal errors (after retries were exhausted or skipped).
    pub error: u64,
    /// Individual re-attempts inside the retry loop.
    pub retry: u64,
    /// Provider fallbacks triggered by this operation.
    pub fallback: u64,
    /// Characters processed on success (input or output, per capability).
    pub chars: u64,
}

/// Thread-safe recorder keyed by operation name.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: Mutex<HashMap<String, OperationStats>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal success with its duration and character volume.
    pub fn record_success(&self, operation: &str, duration: Duration, chars: usize) {
        let mut map = self.inner.lock().expect("metrics lock poisoned");
        let stats = map.entry(operation.to_string()).or_default();
        stats.success += 1;
        stats.last_duration_secs = duration.as_secs_f64();
        stats.chars += chars as u64;
    }

    /// Record a terminal error.
    pub fn record_error(&self, operation: &str) {
        let mut map = self.inner.lock().expect("metrics lock poisoned");
        map.entry(operation.to_string()).or_default().error += 1;
    }

    /// Record one re-attempt inside the retry loop.
    pub fn record_retry(&self, operation: &str) {
        let mut map = self.inner.lock().expect("metrics lock poisoned");
        map.entry(operation.to_string()).or_default().retry += 1;
    }

    /// Record a fallback to the next provider (or a substituted model).
    pub fn record_fallback(&self, operation: &str) {
        let mut map = self.inner.lock().expect("metrics lock poisoned");
        map.entry(operation.to_string()).or_default().fallback += 1;
    }

    /// Clone the current counters for inspection or export.
    pub fn snapshot(&self) -> HashMap<String, OperationStats> {
        self.inner.lock().expect("metrics lock poisoned").clone()
    }

    /// Counters for a single operation, if any were recorded.
    pub fn stats(&self, operation: &str) -> Option<OperationStats> {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .get(operation)
            .cloned()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
