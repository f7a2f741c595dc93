//! Per-platform health cache.
//!
//! Tracks success/error/throttle counters per platform label and an adaptive
//! limit on how many jobs for that platform may run at once. The worker pool
//! consults it before claiming a job and feeds every outcome back into it.

mod persist;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub use persist::PersistedPlatformPolicy;

/// Throughput (bytes/sec) above which a clean run lets the limit step up.
const THROUGHPUT_GOOD_BPS: f64 = 1_000_000.0;

/// Starting concurrency for a platform with no history.
const DEFAULT_ADAPTIVE_LIMIT: usize = 2;

/// Observations for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEntry {
    pub success_events: u32,
    pub error_events: u32,
    pub throttled_events: u32,
    #[serde(default)]
    pub last_throughput_bytes_per_sec: Option<f64>,
    pub adaptive_limit: usize,
}

impl PlatformEntry {
    fn new(limit: usize) -> Self {
        Self {
            success_events: 0,
            error_events: 0,
            throttled_events: 0,
            last_throughput_bytes_per_sec: None,
            adaptive_limit: limit,
        }
    }
}

/// How one job ended, as far as platform health is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Throttled,
    Error,
}

#[derive(Debug, Clone)]
pub struct PlatformPolicy {
    entries: BTreeMap<String, PlatformEntry>,
    min_limit: usize,
    max_limit: usize,
}

impl PlatformPolicy {
    pub fn new(min_limit: usize, max_limit: usize) -> Self {
        let min = min_limit.max(1);
        let max = max_limit.max(min);
        Self {
            entries: BTreeMap::new(),
            min_limit: min,
            max_limit: max,
        }
    }

    pub fn get(&self, platform: &str) -> Option<&PlatformEntry> {
        self.entries.get(platform)
    }

    fn default_limit(&self) -> usize {
        DEFAULT_ADAPTIVE_LIMIT.clamp(self.min_limit, self.max_limit)
    }

    fn entry_mut(&mut self, platform: &str) -> &mut PlatformEntry {
        let default = self.default_limit();
        self.entries
            .entry(platform.to_string())
            .or_insert_with(|| PlatformEntry::new(default))
    }

    /// Jobs of this platform that may run concurrently.
    pub fn recommended_limit(&self, platform: &str) -> usize {
        self.entries
            .get(platform)
            .map(|e| e.adaptive_limit)
            .unwrap_or_else(|| self.default_limit())
            .clamp(self.min_limit, self.max_limit)
    }

    /// Record a finished job. Clean fast runs step the limit up by one;
    /// throttling halves it; plain errors only count.
    pub fn record_outcome(
        &mut self,
        platform: &str,
        outcome: JobOutcome,
        bytes: u64,
        duration: Duration,
    ) {
        let (min, max) = (self.min_limit, self.max_limit);
        let entry = self.entry_mut(platform);
        match outcome {
            JobOutcome::Success => {
                entry.success_events = entry.success_events.saturating_add(1);
                let secs = duration.as_secs_f64();
                let bps = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
                entry.last_throughput_bytes_per_sec = Some(bps);
                if bps >= THROUGHPUT_GOOD_BPS {
                    entry.adaptive_limit = (entry.adaptive_limit + 1).min(max);
                }
            }
            JobOutcome::Throttled => {
                entry.throttled_events = entry.throttled_events.saturating_add(1);
                entry.adaptive_limit = (entry.adaptive_limit / 2).max(min);
                tracing::info!(platform, limit = entry.adaptive_limit, "platform throttled; lowering limit");
            }
            JobOutcome::Error => {
                entry.error_events = entry.error_events.saturating_add(1);
            }
        }
    }

    /// Platforms whose in-flight count has reached the recommended limit.
    pub fn saturated_platforms(&self, in_flight: &HashMap<String, usize>) -> Vec<String> {
        let mut out: Vec<String> = in_flight
            .iter()
            .filter(|(p, n)| **n >= self.recommended_limit(p))
            .map(|(p, _)| p.clone())
            .collect();
        out.sort();
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &PlatformEntry)> {
        self.entries.iter()
    }
}
