//! Search session coordination.
//!
//! The coordinator owns one search session at a time: it sizes the
//! collision table from the puzzle difficulty, prepares the shared prefix
//! state, launches the worker pool, and waits for the first result or for
//! cancellation. The first triple to arrive wins; everything after it is
//! drained and discarded. Workers are always joined before `search`
//! returns, so nothing can touch the table once the session concludes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collider::digest::PrefixState;
use crate::collider::kernel::{CollisionKernel, ScalarKernel};
use crate::collider::table::CollisionTable;
use crate::collider::worker::{self, WorkerEvent};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::types::{HeaderPrefix, TrialRate, Triple};

/// Accumulated trials between throughput reports.
const REPORT_TRIALS: u64 = 100_000_000;

/// A throughput sample delivered to an attached telemetry consumer.
#[derive(Debug, Clone, Copy)]
pub struct ThroughputSample {
    /// Total trials accumulated across all workers this session.
    pub trials_so_far: u64,
    /// Wall-clock time since the previous sample.
    pub elapsed: Duration,
}

/// Runs collision search sessions over a fixed-size worker pool.
pub struct Coordinator {
    workers: usize,
    max_table_bits: u32,
    telemetry: Option<mpsc::Sender<ThroughputSample>>,
}

impl Coordinator {
    pub fn new(workers: usize, max_table_bits: u32) -> Self {
        Self {
            workers: workers.max(1),
            max_table_bits,
            telemetry: None,
        }
    }

    /// Attach a telemetry channel that receives a sample at every
    /// throughput report. Samples are dropped, not waited on, when the
    /// consumer lags.
    pub fn with_telemetry(mut self, tx: mpsc::Sender<ThroughputSample>) -> Self {
        self.telemetry = Some(tx);
        self
    }

    /// Search for a collision triple under `prefix` until one is found or
    /// `shutdown` is cancelled. Returns `Ok(None)` on cancellation.
    pub async fn search(
        &self,
        prefix: &HeaderPrefix,
        shutdown: CancellationToken,
    ) -> Result<Option<Triple>> {
        self.search_with(prefix, shutdown, |state, version| {
            Box::new(ScalarKernel::new(state, version))
        })
        .await
    }

    /// Search with a caller-supplied kernel; `make_kernel` runs once per
    /// worker. This is the substitution point for accelerated backends.
    pub async fn search_with<F>(
        &self,
        prefix: &HeaderPrefix,
        shutdown: CancellationToken,
        make_kernel: F,
    ) -> Result<Option<Triple>>
    where
        F: Fn(PrefixState, u8) -> Box<dyn CollisionKernel>,
    {
        let table = Arc::new(CollisionTable::new(prefix.difficulty, self.max_table_bits));
        let state = PrefixState::prepare(prefix);

        info!(
            difficulty = prefix.difficulty,
            slots = table.slots(),
            workers = self.workers,
            "Starting collision search"
        );

        // Cancelling the session token stops this search only; it also
        // follows `shutdown` through the parent link.
        let session = shutdown.child_token();
        let (event_tx, mut event_rx) = mpsc::channel::<WorkerEvent>(100);

        let mut handles = Vec::with_capacity(self.workers);
        let mut spawn_error = None;
        for worker in 0..self.workers {
            let kernel = make_kernel(state.clone(), prefix.version);
            let table = Arc::clone(&table);
            let cancel = session.clone();
            let event_tx = event_tx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("collider-{}", worker))
                .spawn(move || worker::run_search_loop(worker, kernel, table, cancel, event_tx));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(Error::WorkerSpawn(e.to_string()));
                    break;
                }
            }
        }

        // The workers now hold the only senders; the channel closes when
        // the last one exits.
        drop(event_tx);

        if let Some(err) = spawn_error {
            session.cancel();
            Self::drain_and_join(&mut event_rx, handles).await;
            return Err(err);
        }

        let mut stats = SessionStats::default();
        let mut result = None;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(WorkerEvent::Solved { worker, triple }) => {
                            debug!(worker, "First result; stopping session");
                            result = Some(triple);
                            session.cancel();
                            break;
                        }
                        Some(WorkerEvent::Progress { trials }) => {
                            stats.record(trials, self.telemetry.as_ref());
                        }
                        // All workers exited without a result.
                        None => break,
                    }
                }
                _ = shutdown.cancelled() => {
                    debug!("Search cancelled");
                    session.cancel();
                    break;
                }
            }
        }

        Self::drain_and_join(&mut event_rx, handles).await;
        stats.log_summary(result.is_some());
        Ok(result)
    }

    /// Drain remaining events so no worker stays blocked on a send, then
    /// join every thread.
    async fn drain_and_join(
        event_rx: &mut mpsc::Receiver<WorkerEvent>,
        handles: Vec<std::thread::JoinHandle<()>>,
    ) {
        while let Some(event) = event_rx.recv().await {
            if let WorkerEvent::Solved { worker, .. } = event {
                trace!(worker, "Late triple discarded");
            }
        }
        for handle in handles {
            if handle.join().is_err() {
                error!("Collision worker panicked");
            }
        }
    }
}

/// Trial statistics for one search session.
struct SessionStats {
    start_time: Instant,
    total_trials: u64,
    last_report: Instant,
    last_total: u64,
}

impl Default for SessionStats {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            total_trials: 0,
            last_report: now,
            last_total: 0,
        }
    }
}

impl SessionStats {
    /// Fold in a progress batch, logging and sampling at report milestones.
    fn record(&mut self, trials: u64, telemetry: Option<&mpsc::Sender<ThroughputSample>>) {
        self.total_trials += trials;
        if self.total_trials - self.last_total < REPORT_TRIALS {
            return;
        }

        let elapsed = self.last_report.elapsed();
        let rate = TrialRate::from_trials(self.total_trials - self.last_total, elapsed);
        info!(trials = self.total_trials, rate = %rate, "Search progress");

        if let Some(tx) = telemetry {
            let _ = tx.try_send(ThroughputSample {
                trials_so_far: self.total_trials,
                elapsed,
            });
        }

        self.last_total = self.total_trials;
        self.last_report = Instant::now();
    }

    fn log_summary(&self, solved: bool) {
        let elapsed = self.start_time.elapsed();
        let rate = TrialRate::from_trials(self.total_trials, elapsed);
        info!(
            trials = self.total_trials,
            elapsed_secs = elapsed.as_secs(),
            rate = %rate,
            solved,
            "Collision search ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::digest::{difficulty_mask, truncated};
    use crate::collider::table::DEFAULT_MAX_TABLE_BITS;

    fn test_prefix(difficulty: u64) -> HeaderPrefix {
        HeaderPrefix {
            parent_id: [0x55; 32],
            root: [0x66; 32],
            difficulty,
            timestamp: 1_700_000_000_000_000_000,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_search_finds_valid_triple_end_to_end() {
        // Difficulty 20 needs roughly 2^14 trials, well inside a single
        // worker slice, so the session ends almost immediately.
        let prefix = test_prefix(20);
        let coordinator = Coordinator::new(4, DEFAULT_MAX_TABLE_BITS);

        let triple = coordinator
            .search(&prefix, CancellationToken::new())
            .await
            .unwrap()
            .expect("difficulty 20 must be solvable");

        assert!(triple.is_pairwise_distinct());

        // All three nonces must reach the same truncated value.
        let state = PrefixState::prepare(&prefix);
        let mask = difficulty_mask(prefix.difficulty);
        let values: Vec<u64> = triple
            .nonces()
            .iter()
            .map(|&nonce| truncated(&state.digest(nonce, prefix.version), mask))
            .collect();
        assert_eq!(values[0], values[1]);
        assert_eq!(values[1], values[2]);
    }

    #[tokio::test]
    async fn test_cancellation_ends_search_promptly() {
        // Difficulty 60 is unsolvable on test timescales; only the
        // cancellation path can end this session.
        let prefix = test_prefix(60);
        let coordinator = Coordinator::new(2, 16);
        let shutdown = CancellationToken::new();

        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown.cancel();
            })
        };

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            coordinator.search(&prefix, shutdown),
        )
        .await
        .expect("search must return promptly after cancellation")
        .unwrap();

        assert!(result.is_none());
        canceller.await.unwrap();
    }

    struct FixedKernel(Option<Triple>);

    impl CollisionKernel for FixedKernel {
        fn run_batch(
            &mut self,
            _start_nonce: u64,
            _iters: u64,
            _table: &CollisionTable,
        ) -> Option<Triple> {
            self.0.take()
        }
    }

    #[tokio::test]
    async fn test_custom_kernel_drives_search() {
        let prefix = test_prefix(40);
        let coordinator = Coordinator::new(3, 16);
        let triple = Triple {
            nonce_a: 7,
            nonce_b: 8,
            nonce_c: 9,
        };

        let found = coordinator
            .search_with(&prefix, CancellationToken::new(), move |_state, _version| {
                Box::new(FixedKernel(Some(triple)))
            })
            .await
            .unwrap();

        assert_eq!(found, Some(triple));
    }

    struct IdleKernel;

    impl CollisionKernel for IdleKernel {
        fn run_batch(
            &mut self,
            _start_nonce: u64,
            _iters: u64,
            _table: &CollisionTable,
        ) -> Option<Triple> {
            None
        }
    }

    #[tokio::test]
    async fn test_telemetry_reports_accumulated_trials() {
        // An idle kernel completes batches instantly, so the report
        // threshold is crossed in well under a second of wall time.
        let prefix = test_prefix(40);
        let shutdown = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(8);
        let coordinator = Coordinator::new(1, 16).with_telemetry(tx);

        let sampler = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let sample = rx.recv().await;
                shutdown.cancel();
                sample
            })
        };

        let result = coordinator
            .search_with(&prefix, shutdown, |_state, _version| Box::new(IdleKernel))
            .await
            .unwrap();
        assert!(result.is_none());

        let sample = sampler.await.unwrap().expect("one sample");
        assert!(sample.trials_so_far >= REPORT_TRIALS);
    }
}
