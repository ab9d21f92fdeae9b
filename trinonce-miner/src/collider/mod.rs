//! Collision search engine.
//!
//! Finds three distinct nonces whose truncated header digests agree, which
//! is the proof of work for this chain. The search is a generalized
//! birthday problem: holding candidate values in a table of about
//! `2^(2d/3)` slots brings the expected work for a `d`-bit space down from
//! `2^d` to roughly `2^(2d/3)` trials.
//!
//! The engine splits into a shared digest prefix state (`digest`), a
//! lock-striped match detector (`table`), a batch trial kernel (`kernel`),
//! per-thread search loops (`worker`) and the session coordinator that
//! ties them together.

mod coordinator;
mod digest;
mod kernel;
mod table;
mod worker;

pub use coordinator::{Coordinator, ThroughputSample};
pub use digest::{block_digest, difficulty_mask, truncated, PrefixState};
pub use kernel::{CollisionKernel, ScalarKernel};
pub use table::{CollisionTable, DEFAULT_MAX_TABLE_BITS};
