//! Collision search worker.
//!
//! Each worker runs in a dedicated `std::thread` so the CPU-bound trial
//! loop never stalls the Tokio runtime. Trials run through the kernel in
//! slices small enough to bound cancellation latency; progress is reported
//! once per full batch. Every batch starts from a fresh random nonce and
//! walks upward, which keeps concurrent workers on disjoint runs without
//! any coordination.
//!
//! A worker never sends a shutdown event: it drops its sender on exit and
//! the coordinator detects channel closure. The coordinator keeps draining
//! the channel until every worker is gone, so `blocking_send` here cannot
//! deadlock against cancellation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collider::kernel::CollisionKernel;
use crate::collider::table::CollisionTable;
use crate::tracing::prelude::*;
use crate::types::Triple;

/// Trials per progress report.
const PROGRESS_BATCH: u64 = 1_000_000;

/// Trials between cancellation polls.
const POLL_SLICE: u64 = PROGRESS_BATCH / 16;

/// Events a worker sends to the coordinator.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// A full batch of trials completed without a triple.
    Progress { trials: u64 },

    /// Triple found; the worker exits after sending this.
    Solved { worker: usize, triple: Triple },
}

/// Run trials until a triple is found or the session is cancelled.
pub(crate) fn run_search_loop(
    worker: usize,
    mut kernel: Box<dyn CollisionKernel>,
    table: Arc<CollisionTable>,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<WorkerEvent>,
) {
    loop {
        let start: u64 = rand::random();
        let mut done: u64 = 0;

        while done < PROGRESS_BATCH {
            if cancel.is_cancelled() {
                trace!(worker, "Search worker cancelled");
                return;
            }

            let slice_start = start.wrapping_add(done);
            if let Some(triple) = kernel.run_batch(slice_start, POLL_SLICE, &table) {
                debug!(worker, nonces = ?triple.nonces(), "Collision triple found");
                if event_tx
                    .blocking_send(WorkerEvent::Solved { worker, triple })
                    .is_err()
                {
                    // Coordinator already concluded the session.
                    trace!(worker, "Late triple discarded");
                }
                return;
            }

            done += POLL_SLICE;
        }

        if event_tx
            .blocking_send(WorkerEvent::Progress { trials: PROGRESS_BATCH })
            .is_err()
        {
            return;
        }
    }
}
