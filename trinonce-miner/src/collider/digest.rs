//! Digest computation for the collision search.
//!
//! Every trial hashes an 89-byte header: an 80-byte prefix that is fixed for
//! the whole session, followed by the 8-byte nonce and the version byte. The
//! prefix is absorbed into a SHA-256 state exactly once per session
//! ([`PrefixState::prepare`]); each trial clones that state and absorbs only
//! the 9 variable bytes. The hot loop runs on the order of 10^7 to 10^9
//! trials per session, so not re-hashing the prefix per trial is the main
//! performance lever of the whole search.

use sha2::{Digest, Sha256};

use crate::types::{HeaderPrefix, Triple};

/// Mask selecting the low `difficulty` bits of a truncated digest.
///
/// Saturates to the full 64-bit word at difficulty 64 and above.
pub fn difficulty_mask(difficulty: u64) -> u64 {
    if difficulty >= 64 {
        u64::MAX
    } else {
        (1u64 << difficulty) - 1
    }
}

/// SHA-256 state with the 80-byte header prefix already absorbed.
///
/// Cloning reproduces the exact compression state, so a clone plus 9 absorbed
/// bytes finalizes to the same digest as hashing all 89 bytes from scratch.
/// Clones are independently owned and safe to use from concurrent workers.
#[derive(Clone)]
pub struct PrefixState {
    state: Sha256,
}

impl PrefixState {
    /// Absorb the fixed prefix bytes once.
    pub fn prepare(prefix: &HeaderPrefix) -> Self {
        let mut state = Sha256::new();
        state.update(prefix.prefix_bytes());
        Self { state }
    }

    /// Digest of the full header: prefix, big-endian nonce, version byte.
    pub fn digest(&self, nonce: u64, version: u8) -> [u8; 32] {
        let mut state = self.state.clone();
        let mut tail = [0u8; 9];
        tail[..8].copy_from_slice(&nonce.to_be_bytes());
        tail[8] = version;
        state.update(tail);
        state.finalize().into()
    }
}

/// Extract the collision key from a digest: the last 8 bytes interpreted as a
/// big-endian integer, masked to the difficulty.
pub fn truncated(digest: &[u8; 32], mask: u64) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[24..]);
    u64::from_be_bytes(tail) & mask
}

/// Digest of the fully-populated header: prefix, the three nonces in table
/// order, then the version byte. This is the block id once a solve lands.
pub fn block_digest(prefix: &HeaderPrefix, triple: &Triple) -> [u8; 32] {
    let mut state = Sha256::new();
    state.update(prefix.prefix_bytes());
    for nonce in triple.nonces() {
        state.update(nonce.to_be_bytes());
    }
    state.update([prefix.version]);
    state.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_prefix() -> HeaderPrefix {
        HeaderPrefix {
            parent_id: [0x16; 32],
            root: [0x97; 32],
            difficulty: 36,
            timestamp: 1_461_000_000_000_000_000,
            version: 0,
        }
    }

    /// Hash the full 89-byte header without the incremental construction.
    fn digest_from_scratch(prefix: &HeaderPrefix, nonce: u64, version: u8) -> [u8; 32] {
        let mut buf = Vec::with_capacity(89);
        buf.extend_from_slice(&prefix.prefix_bytes());
        buf.extend_from_slice(&nonce.to_be_bytes());
        buf.push(version);
        Sha256::digest(&buf).into()
    }

    #[test]
    fn test_incremental_matches_from_scratch() {
        let prefix = test_prefix();
        let state = PrefixState::prepare(&prefix);

        for nonce in [0u64, 1, 42, 0xdead_beef, u64::MAX] {
            assert_eq!(
                state.digest(nonce, prefix.version),
                digest_from_scratch(&prefix, nonce, prefix.version),
                "nonce {nonce:#x}"
            );
        }
    }

    #[test]
    fn test_digest_idempotent() {
        let prefix = test_prefix();
        let state = PrefixState::prepare(&prefix);

        let first = state.digest(12345, 0);
        let second = state.digest(12345, 0);
        assert_eq!(first, second);

        // A clone of the state must produce the same bytes too.
        let cloned = state.clone();
        assert_eq!(cloned.digest(12345, 0), first);
    }

    #[test]
    fn test_version_byte_changes_digest() {
        let prefix = test_prefix();
        let state = PrefixState::prepare(&prefix);
        assert_ne!(state.digest(1, 0), state.digest(1, 1));
    }

    #[test]
    fn test_truncated_reads_big_endian_tail() {
        let mut digest = [0u8; 32];
        digest[24..].copy_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);

        assert_eq!(truncated(&digest, u64::MAX), 0x0102030405060708);
        assert_eq!(truncated(&digest, difficulty_mask(20)), 0x060708 & 0xf_ffff);
        assert_eq!(truncated(&digest, 0), 0);
    }

    #[test]
    fn test_block_digest_covers_all_105_bytes() {
        let prefix = test_prefix();
        let triple = Triple {
            nonce_a: 0x1111,
            nonce_b: 0x2222,
            nonce_c: 0x3333,
        };

        let mut buf = Vec::with_capacity(105);
        buf.extend_from_slice(&prefix.prefix_bytes());
        for nonce in triple.nonces() {
            buf.extend_from_slice(&nonce.to_be_bytes());
        }
        buf.push(prefix.version);

        let expected: [u8; 32] = Sha256::digest(&buf).into();
        assert_eq!(block_digest(&prefix, &triple), expected);

        // Nonce order is part of the block identity.
        let swapped = Triple {
            nonce_a: 0x2222,
            nonce_b: 0x1111,
            nonce_c: 0x3333,
        };
        assert_ne!(block_digest(&prefix, &swapped), expected);
    }

    #[test]
    fn test_difficulty_mask_boundaries() {
        assert_eq!(difficulty_mask(0), 0);
        assert_eq!(difficulty_mask(1), 1);
        assert_eq!(difficulty_mask(20), 0xf_ffff);
        assert_eq!(difficulty_mask(63), u64::MAX >> 1);
        assert_eq!(difficulty_mask(64), u64::MAX);
        assert_eq!(difficulty_mask(200), u64::MAX);
    }
}
