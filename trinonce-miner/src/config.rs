//! Miner configuration.
//!
//! Parses environment variables into the runtime configuration. Every
//! variable has a default, so an empty environment yields a working
//! offline miner.

use crate::collider::DEFAULT_MAX_TABLE_BITS;

/// Runtime configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Base url of the puzzle server. `None` runs the miner offline
    /// against self-generated headers.
    pub upstream_url: Option<String>,

    /// Contents string committed to by the blocks this miner builds.
    pub contents: String,

    /// Number of collision search workers.
    pub workers: usize,

    /// Difficulty for offline headers. Online, the server's header wins.
    pub difficulty: u64,

    /// Cap on the collision table size exponent.
    ///
    /// The table wants `2^ceil(2d/3)` slots; this bounds the allocation
    /// when the difficulty asks for more than fits in memory.
    pub max_table_bits: u32,
}

impl MinerConfig {
    /// Parse configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TRINONCE_UPSTREAM_URL`: Puzzle server base url (unset mines offline)
    /// - `TRINONCE_CONTENTS`: Block contents string (default: "trinonce")
    /// - `TRINONCE_WORKERS`: Search worker count (default: available cores)
    /// - `TRINONCE_DIFFICULTY`: Offline difficulty (default: 32)
    /// - `TRINONCE_MAX_TABLE_BITS`: Table size cap exponent (default: 28, clamped to 1-32)
    pub fn from_env() -> Self {
        let upstream_url = std::env::var("TRINONCE_UPSTREAM_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let contents = std::env::var("TRINONCE_CONTENTS")
            .ok()
            .unwrap_or_else(|| "trinonce".to_string());

        let workers = std::env::var("TRINONCE_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_workers)
            .max(1);

        let difficulty = std::env::var("TRINONCE_DIFFICULTY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(32);

        let max_table_bits = std::env::var("TRINONCE_MAX_TABLE_BITS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_TABLE_BITS)
            .clamp(1, 32);

        Self {
            upstream_url,
            contents,
            workers,
            difficulty,
            max_table_bits,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(12)
}
