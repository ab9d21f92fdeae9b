//! Wire types for the puzzle server.
//!
//! The server speaks JSON over HTTP: `GET /next` hands out the header to
//! mine under and `POST /add` accepts a solved block. Digest fields travel
//! as lowercase hex strings; the server's field names are all lowercase
//! with no separators.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{HeaderPrefix, Triple};

/// A block header in the server's representation.
///
/// `parentid` and `root` are hex-encoded SHA-256 digests. Unsolved headers
/// arrive with `nonces` zeroed, `null` or missing entirely, depending on
/// the server; a submission always carries the solved triple in table
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleHeader {
    pub parentid: String,
    pub root: String,
    pub difficulty: u64,
    pub timestamp: u64,
    pub nonces: Option<Vec<u64>>,
    pub version: u8,
}

impl PuzzleHeader {
    /// Decode the digest fields into a search prefix.
    pub fn to_prefix(&self) -> Result<HeaderPrefix> {
        Ok(HeaderPrefix {
            parent_id: decode_digest("parentid", &self.parentid)?,
            root: decode_digest("root", &self.root)?,
            difficulty: self.difficulty,
            timestamp: self.timestamp,
            version: self.version,
        })
    }

    /// Build the submission header for a solved search.
    pub fn from_solution(prefix: &HeaderPrefix, triple: &Triple) -> Self {
        Self {
            parentid: hex::encode(prefix.parent_id),
            root: hex::encode(prefix.root),
            difficulty: prefix.difficulty,
            timestamp: prefix.timestamp,
            nonces: Some(triple.nonces().to_vec()),
            version: prefix.version,
        }
    }
}

/// A solved block: the header plus the contents string it commits to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: PuzzleHeader,
    pub block: String,
}

fn decode_digest(field: &'static str, hex_str: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| Error::Header(format!("{} is not valid hex: {}", field, e)))?;
    bytes
        .try_into()
        .map_err(|_| Error::Header(format!("{} is not a 32-byte digest", field)))
}
