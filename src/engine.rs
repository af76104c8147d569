// src/engine.rs
// One detection cycle: fetch -> extract -> diff -> notify -> record -> clean.
// The engine owns all of its state (no process-wide globals) and enforces
// single-flight execution with an atomic guard: a trigger that arrives while
// a cycle is running is dropped, never queued.

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::extract::{CandidateItem, ItemSource};
use crate::fingerprint::Fingerprint;
use crate::notify::{render_message, NotifierMux};
use crate::store::{FingerprintStore, StoreError};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cycle_runs_total", "Detection cycles started.");
        describe_counter!("cycle_errors_total", "Detection cycles that failed.");
        describe_counter!(
            "cycle_skipped_total",
            "Triggers dropped because a cycle was already running."
        );
        describe_counter!("items_new_total", "Items judged new and notified.");
        describe_counter!(
            "items_suppressed_total",
            "Items suppressed by the fingerprint store."
        );
        describe_counter!(
            "items_stale_total",
            "Items discarded for being older than the lookback window."
        );
        describe_counter!(
            "rows_dropped_total",
            "Rows dropped due to per-row extraction failures."
        );
        describe_counter!(
            "notify_failures_total",
            "New items whose delivery failed on every sink."
        );
        describe_counter!("hashes_purged_total", "Expired fingerprints deleted.");
        describe_gauge!("cycle_last_run_ts", "Unix ts of the last cycle start.");
    });
}

/// Where the current (or last) cycle is in its lifecycle. Read-only
/// projection for the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Fetching,
    Extracting,
    Diffing,
    Notifying,
    Recording,
    Cleaning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Rows that extracted cleanly, before the stale filter.
    pub candidates: usize,
    /// Rows dropped by per-row extraction failures.
    pub dropped_rows: usize,
    /// Candidates older than the lookback window.
    pub stale_skipped: usize,
    /// Candidates whose fingerprint was already in the active set.
    pub already_seen: usize,
    /// Distinct new items for which notification was attempted.
    pub notified: usize,
    /// New items where every sink failed; their fingerprints are still recorded.
    pub delivery_failures: usize,
    /// Expired fingerprints removed by the cleanup pass.
    pub purged: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fetch from {source} failed: {error:#}")]
    Fetch {
        source: &'static str,
        #[source]
        error: anyhow::Error,
    },
    #[error("fingerprint store failed: {0}")]
    Store(#[from] StoreError),
}

/// Result of asking the engine to run.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    Failed(CycleError),
    /// A cycle was already in flight; this trigger was dropped.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub is_running: bool,
    pub phase: CyclePhase,
    pub last_summary: Option<CycleSummary>,
}

#[derive(Debug)]
struct StatusInner {
    last_run: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    consecutive_errors: u32,
    phase: CyclePhase,
    last_summary: Option<CycleSummary>,
}

pub struct DetectionEngine {
    sources: Vec<Box<dyn ItemSource>>,
    store: Arc<dyn FingerprintStore>,
    mux: NotifierMux,
    lookback: Duration,
    retention: Duration,
    running: AtomicBool,
    status: Mutex<StatusInner>,
}

impl DetectionEngine {
    pub fn new(
        sources: Vec<Box<dyn ItemSource>>,
        store: Arc<dyn FingerprintStore>,
        mux: NotifierMux,
        cfg: &AppConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            sources,
            store,
            mux,
            lookback: Duration::hours(cfg.lookback_hours),
            retention: Duration::days(cfg.retention_days),
            running: AtomicBool::new(false),
            status: Mutex::new(StatusInner {
                last_run: None,
                last_success: None,
                consecutive_errors: 0,
                phase: CyclePhase::Idle,
                last_summary: None,
            }),
        }
    }

    pub fn status(&self) -> EngineStatus {
        let inner = self.status.lock().expect("status mutex poisoned");
        EngineStatus {
            last_run: inner.last_run,
            last_success: inner.last_success,
            consecutive_errors: inner.consecutive_errors,
            is_running: self.running.load(Ordering::SeqCst),
            phase: inner.phase,
            last_summary: inner.last_summary.clone(),
        }
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.status.lock().expect("status mutex poisoned").phase = phase;
    }

    /// Run one cycle unless one is already in flight.
    pub async fn try_run(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("cycle already running, dropping trigger");
            counter!("cycle_skipped_total").increment(1);
            return CycleOutcome::Skipped;
        }

        let now = Utc::now();
        counter!("cycle_runs_total").increment(1);
        gauge!("cycle_last_run_ts").set(now.timestamp() as f64);
        self.status.lock().expect("status mutex poisoned").last_run = Some(now);

        let outcome = match self.run_cycle(now).await {
            Ok(summary) => {
                {
                    let mut inner = self.status.lock().expect("status mutex poisoned");
                    inner.last_success = Some(Utc::now());
                    inner.consecutive_errors = 0;
                    inner.last_summary = Some(summary.clone());
                    inner.phase = CyclePhase::Idle;
                }
                tracing::info!(
                    new = summary.notified,
                    suppressed = summary.already_seen,
                    stale = summary.stale_skipped,
                    dropped = summary.dropped_rows,
                    purged = summary.purged,
                    "cycle completed"
                );
                CycleOutcome::Completed(summary)
            }
            Err(e) => {
                counter!("cycle_errors_total").increment(1);
                {
                    let mut inner = self.status.lock().expect("status mutex poisoned");
                    inner.consecutive_errors += 1;
                    inner.phase = CyclePhase::Idle;
                }
                tracing::error!(error = %e, "cycle failed");
                self.mux.notify_error(&e.to_string()).await;
                CycleOutcome::Failed(e)
            }
        };

        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, CycleError> {
        let mut summary = CycleSummary::default();

        // Fetching: any source failing aborts the whole cycle before dedup
        // state is touched.
        self.set_phase(CyclePhase::Fetching);
        let mut rows = Vec::new();
        for source in &self.sources {
            let batch = source
                .fetch_latest()
                .await
                .map_err(|error| CycleError::Fetch {
                    source: source.name(),
                    error,
                })?;
            rows.extend(batch);
        }

        // Extracting: one bad row drops only that row.
        self.set_phase(CyclePhase::Extracting);
        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Ok(item) => candidates.push(item),
                Err(reason) => {
                    summary.dropped_rows += 1;
                    counter!("rows_dropped_total").increment(1);
                    tracing::debug!(%reason, "dropping unextractable row");
                }
            }
        }

        // Stale filter: publish times older than the lookback window are out
        // of scope this cycle, never fingerprinted.
        let lookback_cutoff = now - self.lookback;
        let mut current: Vec<CandidateItem> = Vec::with_capacity(candidates.len());
        for item in candidates {
            if item.published_at >= lookback_cutoff {
                current.push(item);
            } else {
                summary.stale_skipped += 1;
            }
        }
        summary.candidates = current.len() + summary.stale_skipped;
        counter!("items_stale_total").increment(summary.stale_skipped as u64);

        // Diffing against everything recorded inside the retention window.
        // Retention is wider than lookback, so an item re-surfacing within a
        // day is still suppressed by last week's fingerprint.
        self.set_phase(CyclePhase::Diffing);
        let seen = self.store.recent(now - self.retention)?;

        self.set_phase(CyclePhase::Notifying);
        let mut to_record: HashSet<Fingerprint> = HashSet::new();
        for item in &current {
            let digest = Fingerprint::of_item(item);
            if seen.contains(&digest) {
                summary.already_seen += 1;
                counter!("items_suppressed_total").increment(1);
                continue;
            }
            if !to_record.insert(digest) {
                // Same item surfaced twice within this batch.
                summary.already_seen += 1;
                counter!("items_suppressed_total").increment(1);
                continue;
            }
            summary.notified += 1;
            counter!("items_new_total").increment(1);
            // At-most-once: the fingerprint is recorded whether or not the
            // delivery went through, so a flaky sink cannot cause re-delivery
            // storms on later cycles.
            let delivered = self.mux.notify(&render_message(item)).await;
            if !delivered && !self.mux.is_empty() {
                summary.delivery_failures += 1;
                counter!("notify_failures_total").increment(1);
            }
        }

        // Recording: one transaction for the whole batch.
        self.set_phase(CyclePhase::Recording);
        self.store.insert(&to_record)?;

        // Cleaning: bound the store to the retention window.
        self.set_phase(CyclePhase::Cleaning);
        summary.purged = self.store.purge(now - self.retention)?;
        counter!("hashes_purged_total").increment(summary.purged as u64);

        Ok(summary)
    }
}
