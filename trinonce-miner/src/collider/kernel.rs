//! Batch trial kernel.
//!
//! The worker's hot loop is factored behind [`CollisionKernel`] so an
//! accelerated backend (vectorized SHA-256, GPU batching) can replace the
//! portable one without touching the worker loop or the coordinator
//! protocol. A kernel runs a bounded batch of trials against the shared
//! table and reports the completed triple, if any.

use crate::collider::digest::{truncated, PrefixState};
use crate::collider::table::CollisionTable;
use crate::types::Triple;

/// A bounded batch of collision trials.
///
/// Implementations must feed every probe through [`CollisionTable::insert`]
/// (or preserve its exact triple-detection contract) and must cover the
/// nonces `start_nonce..start_nonce + iters` (wrapping), stopping early
/// only on a completed triple.
pub trait CollisionKernel: Send {
    /// Run `iters` trials starting at `start_nonce`.
    fn run_batch(&mut self, start_nonce: u64, iters: u64, table: &CollisionTable)
        -> Option<Triple>;
}

/// Portable kernel: one cloned digest state and one table probe per trial.
pub struct ScalarKernel {
    prefix: PrefixState,
    version: u8,
}

impl ScalarKernel {
    pub fn new(prefix: PrefixState, version: u8) -> Self {
        Self { prefix, version }
    }
}

impl CollisionKernel for ScalarKernel {
    fn run_batch(
        &mut self,
        start_nonce: u64,
        iters: u64,
        table: &CollisionTable,
    ) -> Option<Triple> {
        let mask = table.value_mask();
        let mut nonce = start_nonce;

        for _ in 0..iters {
            let digest = self.prefix.digest(nonce, self.version);
            if let Some(triple) = table.insert(truncated(&digest, mask), nonce) {
                return Some(triple);
            }
            nonce = nonce.wrapping_add(1);
        }

        None
    }
}
