use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::diagnostics::{DiagnosticsLog, Severity};
use crate::fetch::Fetcher;
use crate::source::JobSource;

pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Owns the poll loop. `start` fires one cycle immediately, then one per
/// interval; `stop` cancels future ticks but lets an in-flight cycle finish.
pub struct Poller {
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            handle: None,
            stop_tx: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    // No-op if the poller is already running, so repeated activation can
    // never stack a second timer.
    pub fn start<S>(&mut self, fetcher: Arc<Fetcher<S>>, diagnostics: Arc<Mutex<DiagnosticsLog>>)
    where
        S: JobSource + 'static,
    {
        if self.handle.is_some() {
            return;
        }

        diagnostics
            .lock()
            .expect("diagnostics lock poisoned")
            .record(
                Severity::Info,
                format!(
                    "Polling started. Auto-retry every {}s. API base: {}",
                    POLL_INTERVAL.as_secs_f32(),
                    fetcher.base_url()
                ),
            );

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut tick = interval(POLL_INTERVAL);
            // A slow cycle delays later ticks rather than bursting to
            // catch up; overlaps would only hit the re-entrancy guard.
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        fetcher.run_cycle().await;
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        self.handle = Some(handle);
        self.stop_tx = Some(stop_tx);
    }

    // Cooperative: signals the loop and detaches. The loop exits at its next
    // suspension point; a cycle already past the tick completes and commits
    // its result.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        self.handle.take();
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FeedStore;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl JobSource for CountingSource {
        fn base_url(&self) -> &str {
            "http://stub"
        }

        async fn health(&self) -> Result<u16> {
            Ok(200)
        }

        async fn connectivity(&self) -> Result<u16> {
            Ok(204)
        }

        async fn fetch_jobs(&self) -> Result<(u16, String)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((200, "[]".to_string()))
        }
    }

    // Completed cycles equal jobs-endpoint hits; the stub never fails.
    fn fetcher() -> (Arc<Fetcher<CountingSource>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Arc::new(Fetcher::new(
            CountingSource {
                calls: Arc::clone(&calls),
            },
            Arc::new(Mutex::new(FeedStore::new())),
            Arc::new(Mutex::new(DiagnosticsLog::new())),
        ));
        (fetcher, calls)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fires_immediately_then_per_interval() {
        let (fetcher, calls) = fetcher();
        let diagnostics = Arc::new(Mutex::new(DiagnosticsLog::new()));
        let mut poller = Poller::new();

        poller.start(Arc::clone(&fetcher), diagnostics);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(POLL_INTERVAL).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(POLL_INTERVAL).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_a_single_timer() {
        let (fetcher, calls) = fetcher();
        let diagnostics = Arc::new(Mutex::new(DiagnosticsLog::new()));
        let mut poller = Poller::new();

        poller.start(Arc::clone(&fetcher), Arc::clone(&diagnostics));
        poller.start(Arc::clone(&fetcher), Arc::clone(&diagnostics));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(POLL_INTERVAL).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_cycles() {
        let (fetcher, calls) = fetcher();
        let diagnostics = Arc::new(Mutex::new(DiagnosticsLog::new()));
        let mut poller = Poller::new();

        poller.start(Arc::clone(&fetcher), diagnostics);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poller.stop();
        assert!(!poller.is_active());

        tokio::time::advance(POLL_INTERVAL).await;
        tokio::time::advance(POLL_INTERVAL).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_polls_again() {
        let (fetcher, calls) = fetcher();
        let diagnostics = Arc::new(Mutex::new(DiagnosticsLog::new()));
        let mut poller = Poller::new();

        poller.start(Arc::clone(&fetcher), Arc::clone(&diagnostics));
        settle().await;
        poller.stop();
        settle().await;

        poller.start(Arc::clone(&fetcher), diagnostics);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        poller.stop();
    }
}
