//! Miner for a proof-of-work chain whose puzzle is a 3-way collision on
//! truncated SHA-256 digests.
//!
//! Instead of grinding for a single low digest, a block here commits to
//! three distinct nonces whose digests agree on their low `difficulty`
//! bits. The search engine in [`collider`] exploits the birthday structure
//! of that puzzle; [`upstream`] talks to the puzzle server; [`daemon`]
//! ties both into a long-running miner.

pub mod collider;
pub mod config;
pub mod daemon;
pub mod error;
pub mod tracing;
pub mod types;
pub mod upstream;
