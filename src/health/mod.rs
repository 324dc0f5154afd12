//! Health Tracker
//!
//! Maintains a rolling reachability/latency signal per source so the
//! locator can try currently-failing providers last. Counters live in a
//! tumbling window of the last `WINDOW_SIZE` attempts: state is recomputed
//! from the window on every recorded outcome, and the window clears at
//! rollover. Purely in-memory; recording never blocks on I/O and tolerates
//! one concurrent writer per in-flight resolution.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::{AssetClass, HealthRecord, HealthState, Source, SourceKind};
use crate::sources::SourceRegistry;

/// Attempts per tumbling window.
pub const WINDOW_SIZE: u32 = 50;

/// Outcomes required before a source can leave `Healthy`; keeps a single
/// cold-start failure from marking a provider down.
const MIN_SAMPLES: u32 = 4;

const DOWN_FAILURE_RATE: f64 = 0.8;
const DEGRADED_FAILURE_RATE: f64 = 0.3;

#[derive(Debug, Clone, Default)]
struct SourceWindow {
    successes: u32,
    failures: u32,
    latency_total_ms: u64,
    latency_samples: u32,
    last_checked_at: Option<DateTime<Utc>>,
    state: Option<HealthState>,
}

impl SourceWindow {
    fn attempts(&self) -> u32 {
        self.successes + self.failures
    }

    fn compute_state(&self) -> HealthState {
        let attempts = self.attempts();
        if attempts < MIN_SAMPLES {
            return HealthState::Healthy;
        }
        let failure_rate = self.failures as f64 / attempts as f64;
        if failure_rate > DOWN_FAILURE_RATE {
            HealthState::Down
        } else if failure_rate > DEGRADED_FAILURE_RATE {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

#[derive(Clone)]
pub struct HealthTracker {
    registry: SourceRegistry,
    windows: Arc<RwLock<HashMap<String, SourceWindow>>>,
}

impl HealthTracker {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record one resolution attempt against a source. Rolls the window
    /// over (clearing all counters) once it reaches `WINDOW_SIZE`.
    pub async fn record_outcome(&self, source_name: &str, success: bool, latency_ms: u64) {
        let mut windows = self.windows.write().await;
        let window = windows.entry(source_name.to_string()).or_default();

        if window.attempts() >= WINDOW_SIZE {
            debug!("Health window rollover for source '{}'", source_name);
            *window = SourceWindow::default();
        }

        if success {
            window.successes += 1;
            window.latency_total_ms += latency_ms;
            window.latency_samples += 1;
        } else {
            window.failures += 1;
        }
        window.last_checked_at = Some(Utc::now());

        let previous = window.state;
        let next = window.compute_state();
        window.state = Some(next);

        if let Some(prev) = previous {
            if prev != next {
                warn!(
                    "Source '{}' health changed {:?} -> {:?} ({}/{} failures in window)",
                    source_name,
                    prev,
                    next,
                    window.failures,
                    window.attempts()
                );
            }
        }
    }

    /// Registry order for a class with `Down` remotes stably moved behind
    /// the other remotes. The terminal kinds (`LocalStore`,
    /// `BundledFallback`) stay last: they never fail, so anything placed
    /// after them would never be probed again. Keeping Down remotes ahead
    /// of the terminals means they still receive probes and their window
    /// can roll over once the provider recovers. Never removes a source.
    pub async fn ordered_sources(&self, class: AssetClass) -> Vec<Source> {
        let sources = self.registry.sources_for(class).await;
        let windows = self.windows.read().await;

        let (remotes, terminal): (Vec<Source>, Vec<Source>) = sources
            .into_iter()
            .partition(|s| s.kind == SourceKind::Remote);

        let (up, down): (Vec<Source>, Vec<Source>) = remotes.into_iter().partition(|s| {
            windows
                .get(&s.name)
                .and_then(|w| w.state)
                .map(|state| state != HealthState::Down)
                .unwrap_or(true)
        });

        let mut ordered = up;
        ordered.extend(down);
        ordered.extend(terminal);
        ordered
    }

    pub async fn state_of(&self, source_name: &str) -> HealthState {
        let windows = self.windows.read().await;
        windows
            .get(source_name)
            .and_then(|w| w.state)
            .unwrap_or(HealthState::Healthy)
    }

    /// Snapshot of every known source window, including sources that have
    /// not been probed yet (reported as healthy with empty counters).
    pub async fn records(&self) -> Vec<HealthRecord> {
        let names = self.registry.all_source_names().await;
        let windows = self.windows.read().await;

        names
            .into_iter()
            .map(|name| {
                let window = windows.get(&name).cloned().unwrap_or_default();
                let avg_latency_ms = (window.latency_samples > 0)
                    .then(|| window.latency_total_ms / window.latency_samples as u64);
                HealthRecord {
                    state: window.state.unwrap_or(HealthState::Healthy),
                    source_name: name,
                    window_successes: window.successes,
                    window_failures: window.failures,
                    avg_latency_ms,
                    last_checked_at: window.last_checked_at,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tracker() -> HealthTracker {
        let config = Config::default();
        let registry = SourceRegistry::new(&config.sources, "http://localhost:8080");
        HealthTracker::new(registry)
    }

    #[tokio::test]
    async fn nine_failures_one_success_is_down() {
        let tracker = tracker();
        for _ in 0..9 {
            tracker.record_outcome("game-cdn", false, 0).await;
        }
        tracker.record_outcome("game-cdn", true, 120).await;
        assert_eq!(tracker.state_of("game-cdn").await, HealthState::Down);
    }

    #[tokio::test]
    async fn two_failures_eight_successes_is_healthy() {
        let tracker = tracker();
        for _ in 0..2 {
            tracker.record_outcome("game-cdn", false, 0).await;
        }
        for _ in 0..8 {
            tracker.record_outcome("game-cdn", true, 80).await;
        }
        assert_eq!(tracker.state_of("game-cdn").await, HealthState::Healthy);
    }

    #[tokio::test]
    async fn half_failures_is_degraded() {
        let tracker = tracker();
        for _ in 0..5 {
            tracker.record_outcome("game-cdn", false, 0).await;
            tracker.record_outcome("game-cdn", true, 90).await;
        }
        assert_eq!(tracker.state_of("game-cdn").await, HealthState::Degraded);
    }

    #[tokio::test]
    async fn unknown_source_defaults_healthy() {
        assert_eq!(
            tracker().state_of("never-probed").await,
            HealthState::Healthy
        );
    }

    #[tokio::test]
    async fn down_source_moves_behind_remotes_but_ahead_of_terminals() {
        let tracker = tracker();
        for _ in 0..10 {
            tracker.record_outcome("game-cdn", false, 0).await;
        }

        let ordered = tracker.ordered_sources(AssetClass::Portrait).await;
        let total = tracker
            .registry
            .sources_for(AssetClass::Portrait)
            .await
            .len();
        assert_eq!(ordered.len(), total);
        assert_ne!(ordered[0].name, "game-cdn");

        // Still ahead of the never-failing terminal kinds, so it keeps
        // getting probed and can recover
        let cdn_pos = ordered.iter().position(|s| s.name == "game-cdn").unwrap();
        let store_pos = ordered
            .iter()
            .position(|s| s.kind == SourceKind::LocalStore)
            .unwrap();
        assert!(cdn_pos < store_pos);
        assert_eq!(
            ordered.last().map(|s| s.kind),
            Some(SourceKind::BundledFallback)
        );
    }

    #[tokio::test]
    async fn window_rolls_over_and_resets_counters() {
        let tracker = tracker();
        for _ in 0..WINDOW_SIZE {
            tracker.record_outcome("game-cdn", false, 0).await;
        }
        assert_eq!(tracker.state_of("game-cdn").await, HealthState::Down);

        // First outcome past the window clears the old counters
        tracker.record_outcome("game-cdn", true, 50).await;
        let records = tracker.records().await;
        let record = records
            .iter()
            .find(|r| r.source_name == "game-cdn")
            .unwrap();
        assert_eq!(record.window_failures, 0);
        assert_eq!(record.window_successes, 1);
        assert_eq!(record.state, HealthState::Healthy);
    }

    #[tokio::test]
    async fn records_cover_unprobed_sources() {
        let tracker = tracker();
        let records = tracker.records().await;
        assert!(records
            .iter()
            .any(|r| r.source_name == crate::sources::BUNDLED_FALLBACK_SOURCE));
        assert!(records.iter().all(|r| r.state == HealthState::Healthy));
    }

    #[tokio::test]
    async fn concurrent_writers_are_tolerated() {
        let tracker = tracker();
        let mut handles = Vec::new();
        for i in 0..20 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.record_outcome("game-cdn", i % 2 == 0, 10).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let records = tracker.records().await;
        let record = records
            .iter()
            .find(|r| r.source_name == "game-cdn")
            .unwrap();
        assert_eq!(record.window_successes + record.window_failures, 20);
    }
}
