// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fingerprint;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::engine::{CycleOutcome, CycleSummary, DetectionEngine};
pub use crate::fingerprint::Fingerprint;
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::store::{FingerprintStore, SqliteStore};
