use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use thiserror::Error;

use crate::diagnostics::{DiagnosticsLog, Severity};
use crate::models::JobRecord;
use crate::normalize::normalize;
use crate::source::{CONNECTIVITY_PROBE_URL, JobSource};
use crate::store::FeedStore;

// Why a fetch cycle failed. Every variant is caught inside run_cycle and
// surfaced as the store's error message; none of them propagate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("{0}")]
    Network(String),
    #[error("Request failed with status {0}")]
    Status(u16),
    #[error("Invalid jobs response format. Expected an array.")]
    Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    // A cycle was already in flight; this invocation had no effect.
    Skipped,
    Completed { loaded: usize },
    Failed { message: String },
}

/// Runs one acquisition cycle at a time: reachability probes, the jobs
/// request, shape validation, then snapshot replacement or failure state.
/// The atomic guard keeps scheduled ticks and manual retries from
/// overlapping.
pub struct Fetcher<S> {
    source: S,
    store: Arc<Mutex<FeedStore>>,
    diagnostics: Arc<Mutex<DiagnosticsLog>>,
    in_flight: AtomicBool,
}

impl<S: JobSource> Fetcher<S> {
    pub fn new(
        source: S,
        store: Arc<Mutex<FeedStore>>,
        diagnostics: Arc<Mutex<DiagnosticsLog>>,
    ) -> Self {
        Self {
            source,
            store,
            diagnostics,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        self.source.base_url()
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CycleOutcome::Skipped;
        }

        self.store().begin_cycle();

        let outcome = match self.acquire().await {
            Ok(jobs) => {
                let loaded = jobs.len();
                self.store().apply_snapshot(jobs);
                self.log(Severity::Success, format!("Loaded {loaded} jobs"));
                CycleOutcome::Completed { loaded }
            }
            Err(err) => {
                let message = err.to_string();
                self.store().apply_failure(&message);
                self.log(Severity::Error, format!("Fetch failed: {message}"));
                CycleOutcome::Failed { message }
            }
        };

        self.store().end_cycle();
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn acquire(&self) -> Result<Vec<JobRecord>, CycleError> {
        let base = self.source.base_url();
        let jobs_url = format!("{base}/jobs");

        self.log(Severity::Info, format!("Trying API: {jobs_url}"));

        // Both probes are advisory: their outcome is logged but never stops
        // the jobs request itself.
        self.log(Severity::Info, format!("Checking backend health: {base}/"));
        match self.source.health().await {
            Ok(status) => self.log(
                status_severity(status),
                format!("Backend health returned status {status}"),
            ),
            Err(err) => self.log(
                Severity::Error,
                format!("Backend health check failed: {err:#}"),
            ),
        }

        self.log(
            Severity::Info,
            format!("Checking internet path: {CONNECTIVITY_PROBE_URL}"),
        );
        match self.source.connectivity().await {
            Ok(status) => self.log(
                status_severity(status),
                format!("Connectivity probe status {status}"),
            ),
            Err(err) => self.log(Severity::Error, format!("Connectivity probe failed: {err:#}")),
        }

        self.log(Severity::Info, format!("Fetching jobs from {jobs_url}"));
        let (status, body) = self
            .source
            .fetch_jobs()
            .await
            .map_err(|err| CycleError::Network(format!("{err:#}")))?;

        self.log(
            status_severity(status),
            format!("Jobs endpoint status {status}"),
        );
        if !(200..300).contains(&status) {
            return Err(CycleError::Status(status));
        }

        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(_) => return Err(self.shape_mismatch()),
        };

        // Two accepted shapes: a bare array, or an object wrapping one
        // under "jobs". Anything else fails closed.
        let records = match payload {
            Value::Array(records) => records,
            Value::Object(mut map) => match map.remove("jobs") {
                Some(Value::Array(records)) => records,
                _ => return Err(self.shape_mismatch()),
            },
            _ => return Err(self.shape_mismatch()),
        };

        Ok(records
            .iter()
            .enumerate()
            .map(|(index, raw)| normalize(raw, index))
            .collect())
    }

    fn shape_mismatch(&self) -> CycleError {
        self.log(
            Severity::Error,
            "Payload shape mismatch (expected array or { jobs: [] })",
        );
        CycleError::Shape
    }

    fn store(&self) -> MutexGuard<'_, FeedStore> {
        self.store.lock().expect("feed store lock poisoned")
    }

    fn log(&self, severity: Severity, message: impl Into<String>) {
        self.diagnostics
            .lock()
            .expect("diagnostics lock poisoned")
            .record(severity, message);
    }
}

fn status_severity(status: u16) -> Severity {
    if (200..300).contains(&status) {
        Severity::Success
    } else {
        Severity::Error
    }
}
