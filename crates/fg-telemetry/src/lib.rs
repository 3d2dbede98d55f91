// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Metrics for authorization decisions: one [`DecisionRecord`] per gated
//! field, aggregated by a [`DecisionCollector`] into a [`DecisionSummary`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// DecisionRecord
// ---------------------------------------------------------------------------

/// How a single check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The rule evaluated true.
    Allowed,
    /// The rule evaluated false.
    Denied,
    /// The rule evaluated false because a predicate needed a caller.
    AuthenticationRequired,
    /// The check did not produce a decision (lookup fault or deadline).
    Failed,
}

impl DecisionOutcome {
    /// Whether the field stayed hidden from the caller.
    pub fn is_denial(&self) -> bool {
        !matches!(self, DecisionOutcome::Allowed)
    }
}

/// Metrics captured for one `(type, field)` check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    /// `Type.field` that was checked.
    pub site: String,
    /// Result of the check.
    pub outcome: DecisionOutcome,
    /// Wall-clock evaluation time in microseconds.
    pub duration_us: u64,
    /// Predicates actually invoked.
    pub predicate_calls: u32,
    /// Leaves answered from a cache.
    pub cache_hits: u32,
}

// ---------------------------------------------------------------------------
// DecisionSummary
// ---------------------------------------------------------------------------

/// Aggregated statistics across many checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecisionSummary {
    /// Number of checks recorded.
    pub count: usize,
    /// Checks that allowed.
    pub allowed: usize,
    /// Checks that denied for any reason other than a missing caller.
    pub denied: usize,
    /// Checks that denied for want of a caller.
    pub authentication_required: usize,
    /// Checks that failed without a decision.
    pub failed: usize,
    /// Mean evaluation time in microseconds.
    pub mean_duration_us: f64,
    /// Median (p50) evaluation time in microseconds.
    pub p50_duration_us: f64,
    /// 99th-percentile evaluation time in microseconds.
    pub p99_duration_us: f64,
    /// Cache hits over all leaf resolutions (hits + calls).
    pub cache_hit_rate: f64,
    /// Denials per site (deterministic ordering).
    pub denials_by_site: BTreeMap<String, usize>,
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// DecisionCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector for decision records. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct DecisionCollector {
    inner: Arc<Mutex<Vec<DecisionRecord>>>,
}

impl DecisionCollector {
    /// Create a new, empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision.
    pub fn record(&self, record: DecisionRecord) {
        let mut data = self.inner.lock().expect("decision lock poisoned");
        data.push(record);
    }

    /// Return all recorded decisions, oldest first.
    pub fn decisions(&self) -> Vec<DecisionRecord> {
        let data = self.inner.lock().expect("decision lock poisoned");
        data.clone()
    }

    /// Number of decisions recorded so far.
    pub fn len(&self) -> usize {
        let data = self.inner.lock().expect("decision lock poisoned");
        data.len()
    }

    /// Whether the collector has no recorded decisions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded decisions.
    pub fn summary(&self) -> DecisionSummary {
        let data = self.inner.lock().expect("decision lock poisoned");
        if data.is_empty() {
            return DecisionSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_us).collect();
        durations.sort_unstable();
        let total: u64 = durations.iter().sum();

        let mut summary = DecisionSummary {
            count,
            mean_duration_us: total as f64 / count as f64,
            p50_duration_us: percentile(&durations, 50.0),
            p99_duration_us: percentile(&durations, 99.0),
            ..DecisionSummary::default()
        };

        let mut hits = 0u64;
        let mut resolutions = 0u64;
        for r in data.iter() {
            match r.outcome {
                DecisionOutcome::Allowed => summary.allowed += 1,
                DecisionOutcome::Denied => summary.denied += 1,
                DecisionOutcome::AuthenticationRequired => summary.authentication_required += 1,
                DecisionOutcome::Failed => summary.failed += 1,
            }
            if r.outcome.is_denial() {
                *summary.denials_by_site.entry(r.site.clone()).or_insert(0) += 1;
            }
            hits += u64::from(r.cache_hits);
            resolutions += u64::from(r.cache_hits) + u64::from(r.predicate_calls);
        }
        if resolutions > 0 {
            summary.cache_hit_rate = hits as f64 / resolutions as f64;
        }
        summary
    }

    /// Log the current summary at `info` level.
    pub fn emit(&self) {
        let s = self.summary();
        info!(
            target: "fieldgate.telemetry",
            count = s.count,
            allowed = s.allowed,
            denied = s.denied,
            authentication_required = s.authentication_required,
            failed = s.failed,
            p99_us = s.p99_duration_us,
            "decision summary"
        );
    }

    /// Clear all recorded decisions.
    pub fn clear(&self) {
        let mut data = self.inner.lock().expect("decision lock poisoned");
        data.clear();
    }
}

// ---------------------------------------------------------------------------
// TelemetryExporter
// ---------------------------------------------------------------------------

/// Trait for exporting collected metrics.
pub trait TelemetryExporter: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &DecisionSummary) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl TelemetryExporter for JsonExporter {
    fn export(&self, summary: &DecisionSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
