//! Puzzle server integration.
//!
//! The upstream server hands out block headers to mine under and accepts
//! solved blocks. Wire representations live in `messages`; the two-endpoint
//! HTTP client lives in `client`. The miner runs fully offline when no
//! upstream url is configured, so nothing in here is on the search path.

mod client;
mod messages;

pub use client::UpstreamClient;
pub use messages::{Block, PuzzleHeader};
