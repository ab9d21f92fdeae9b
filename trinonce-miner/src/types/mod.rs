//! Core types for trinonce-miner.
//!
//! This module provides a unified location for the domain types used
//! throughout the miner: the immutable header prefix a search session runs
//! against, and the nonce triple a successful session produces.

mod rate;

pub use rate::TrialRate;

/// The fixed part of a block header, immutable for the duration of one
/// search session.
///
/// The first 80 bytes of every digest input are derived from this struct via
/// [`HeaderPrefix::prefix_bytes`]; the version byte is appended after the
/// nonce rather than being part of the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPrefix {
    /// Identifier of the block being extended.
    pub parent_id: [u8; 32],

    /// SHA-256 of the block contents.
    pub root: [u8; 32],

    /// Difficulty `d`: the number of low digest bits that must collide.
    pub difficulty: u64,

    /// Unix timestamp in nanoseconds.
    pub timestamp: u64,

    /// Header format version byte.
    pub version: u8,
}

impl HeaderPrefix {
    /// Serialize the fixed prefix: parent_id, root, difficulty and
    /// timestamp, the integers big-endian.
    pub fn prefix_bytes(&self) -> [u8; 80] {
        let mut buf = [0u8; 80];
        buf[..32].copy_from_slice(&self.parent_id);
        buf[32..64].copy_from_slice(&self.root);
        buf[64..72].copy_from_slice(&self.difficulty.to_be_bytes());
        buf[72..80].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }
}

/// Three pairwise-distinct nonces whose digests share one truncated value.
///
/// The fields are in table order: `nonce_a` landed in the slot first,
/// `nonce_b` second, and `nonce_c` completed the triple. Submission preserves
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple {
    pub nonce_a: u64,
    pub nonce_b: u64,
    pub nonce_c: u64,
}

impl Triple {
    /// The nonces in table order.
    pub fn nonces(&self) -> [u64; 3] {
        [self.nonce_a, self.nonce_b, self.nonce_c]
    }

    /// Whether no two nonces share a value.
    pub fn is_pairwise_distinct(&self) -> bool {
        self.nonce_a != self.nonce_b
            && self.nonce_a != self.nonce_c
            && self.nonce_b != self.nonce_c
    }
}
