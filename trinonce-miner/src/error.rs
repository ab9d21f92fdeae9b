//! Crate-level error type.

/// Errors surfaced across module boundaries.
///
/// Modules map their internal failures (I/O, JSON, hex) into these variants
/// with enough context for an operator-facing log line. The daemon treats all
/// of them as round failures, never as process failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Malformed puzzle header: {0}")]
    Header(String),

    #[error("Failed to spawn collision worker: {0}")]
    WorkerSpawn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
