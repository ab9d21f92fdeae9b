//! Shared collision table.
//!
//! A fixed arena of slots, sized from the difficulty per the generalized
//! birthday bound and filled monotonically over one search session. Workers
//! insert (truncated value, nonce) pairs; the third distinct nonce to arrive
//! with a value already held twice completes a triple.
//!
//! Locking is striped: the arena is partitioned into 256 slabs, each behind
//! its own mutex, so lock memory stays constant as the table grows. A
//! bucket's slab is derived from the bucket index, which keeps the required
//! invariant that all inserts against one slot serialize on one lock.

use std::sync::Mutex;

use crate::collider::digest::difficulty_mask;
use crate::types::Triple;

/// Cap on the table size exponent, bounding the arena to 2^28 slots.
pub const DEFAULT_MAX_TABLE_BITS: u32 = 28;

/// Stripe count exponent: 256 locks regardless of table size.
const STRIPE_BITS: u32 = 8;

/// One table slot.
///
/// `value` is meaningless until `nonce_a` is set. The nonce fields carry
/// explicit presence so that nonce 0 is an ordinary nonce, not an "empty"
/// marker.
#[derive(Debug, Clone, Default)]
struct Entry {
    value: u64,
    nonce_a: Option<u64>,
    nonce_b: Option<u64>,
}

/// Lock-striped table of candidate digests for one search session.
///
/// Bucket `b` lives in slab `b & stripe_mask` at index `b >> stripe_bits`,
/// so any two inserts touching the same slot contend on the same mutex while
/// adjacent buckets spread across all stripes.
pub struct CollisionTable {
    /// Mask selecting the difficulty's low digest bits.
    value_mask: u64,

    /// Slot count minus one; bucket = value & bucket_mask.
    bucket_mask: u64,

    stripe_mask: u64,
    stripe_bits: u32,
    stripes: Vec<Mutex<Box<[Entry]>>>,
}

/// Table size exponent: ceil(2d/3) per the expected trial count of a 3-way
/// birthday search, capped to bound memory.
fn table_bits(difficulty: u64, max_table_bits: u32) -> u32 {
    let d = difficulty.min(64);
    ((2 * d).div_ceil(3) as u32).min(max_table_bits)
}

impl CollisionTable {
    /// Allocate the arena for a session at the given difficulty.
    pub fn new(difficulty: u64, max_table_bits: u32) -> Self {
        let bits = table_bits(difficulty, max_table_bits);
        let size: usize = 1 << bits;

        let stripe_bits = bits.min(STRIPE_BITS);
        let stripe_count: usize = 1 << stripe_bits;
        let slab_len = size >> stripe_bits;

        let stripes = (0..stripe_count)
            .map(|_| Mutex::new(vec![Entry::default(); slab_len].into_boxed_slice()))
            .collect();

        Self {
            value_mask: difficulty_mask(difficulty),
            bucket_mask: (size - 1) as u64,
            stripe_mask: (stripe_count - 1) as u64,
            stripe_bits,
            stripes,
        }
    }

    /// Mask workers apply to raw digests before inserting.
    pub fn value_mask(&self) -> u64 {
        self.value_mask
    }

    /// Total slot count.
    pub fn slots(&self) -> usize {
        (self.bucket_mask + 1) as usize
    }

    /// Record a trial; returns the completed triple when this nonce is the
    /// third distinct one to arrive with a value the slot already holds
    /// twice.
    ///
    /// A slot belongs to the first value stored in it for the whole session:
    /// probes whose value aliases to an occupied bucket without matching its
    /// stored value are dropped, as are probes replaying a nonce the slot
    /// already holds. Exactly one of any set of concurrent inserts into a
    /// slot can observe the triple-completing transition.
    pub fn insert(&self, value: u64, nonce: u64) -> Option<Triple> {
        let bucket = value & self.bucket_mask;
        let stripe = (bucket & self.stripe_mask) as usize;
        let index = (bucket >> self.stripe_bits) as usize;

        let mut slab = self.stripes[stripe].lock().unwrap();
        let entry = &mut slab[index];

        let Some(nonce_a) = entry.nonce_a else {
            entry.value = value;
            entry.nonce_a = Some(nonce);
            return None;
        };

        if entry.value != value {
            // Bucket alias: a different value owns this slot.
            return None;
        }

        if nonce_a == nonce || entry.nonce_b == Some(nonce) {
            // Duplicate trial; the final triple must be pairwise distinct.
            return None;
        }

        match entry.nonce_b {
            None => {
                entry.nonce_b = Some(nonce);
                None
            }
            Some(nonce_b) => Some(Triple {
                nonce_a,
                nonce_b,
                nonce_c: nonce,
            }),
        }
    }
}
