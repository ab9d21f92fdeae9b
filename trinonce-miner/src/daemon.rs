//! Daemon lifecycle management for trinonce-miner.
//!
//! This module handles daemon startup, the mining round loop, signal
//! handling, and graceful shutdown.

use std::time::Duration;

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::signal::unix::{self, SignalKind};
use tokio::time::MissedTickBehavior;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::collider::{block_digest, difficulty_mask, truncated, Coordinator, PrefixState};
use crate::config::MinerConfig;
use crate::error::Result;
use crate::tracing::prelude::*;
use crate::types::{HeaderPrefix, Triple};
use crate::upstream::{Block, PuzzleHeader, UpstreamClient};

/// Minimum round period. The timer runs alongside the search, so a fast
/// solve still waits out the remainder before the next round.
const ROUND_INTERVAL: Duration = Duration::from_secs(15);

/// The main daemon.
pub struct Daemon {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Run the daemon until shutdown is requested.
    pub async fn run(self) -> anyhow::Result<()> {
        let config = MinerConfig::from_env();
        info!(
            workers = config.workers,
            max_table_bits = config.max_table_bits,
            "Miner configured"
        );

        let upstream = match &config.upstream_url {
            Some(url) => {
                info!(url = %url, "Submitting to upstream server");
                Some(UpstreamClient::new(url)?)
            }
            None => {
                info!("Mining offline (set TRINONCE_UPSTREAM_URL to submit blocks)");
                None
            }
        };

        self.tracker
            .spawn(mining_task(self.shutdown.clone(), config, upstream));
        self.tracker.close();

        info!("Started.");
        info!("For debugging, set RUST_LOG=trinonce_miner=debug or trace.");

        // Install signal handlers
        let mut sigint = unix::signal(SignalKind::interrupt())?;
        let mut sigterm = unix::signal(SignalKind::terminate())?;

        // Wait for shutdown signal
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT.");
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM.");
            },
        }

        // Initiate shutdown
        self.shutdown.cancel();

        // Wait for all tasks to complete
        self.tracker.wait().await;
        info!("Exiting.");

        Ok(())
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive mining rounds until shutdown.
///
/// Round failures are logged and retried; the round timer keeps a failing
/// upstream from being hammered.
async fn mining_task(running: CancellationToken, config: MinerConfig, upstream: Option<UpstreamClient>) {
    let coordinator = Coordinator::new(config.workers, config.max_table_bits);
    let root: [u8; 32] = Sha256::digest(config.contents.as_bytes()).into();

    let mut rounds = tokio::time::interval(ROUND_INTERVAL);
    rounds.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = rounds.tick() => {}
            _ = running.cancelled() => break,
        }

        if let Err(e) = run_round(&coordinator, &config, upstream.as_ref(), root, running.clone()).await
        {
            warn!("Mining round failed: {}", e);
        }
    }

    info!("Mining task exiting");
}

/// Mine one block: pick a header, search it, verify and submit the result.
async fn run_round(
    coordinator: &Coordinator,
    config: &MinerConfig,
    upstream: Option<&UpstreamClient>,
    root: [u8; 32],
    running: CancellationToken,
) -> Result<()> {
    let prefix = match upstream {
        Some(client) => {
            let header = client.next_header().await?;
            let mut prefix = header.to_prefix()?;
            // The block is mined with our own contents and a fresh expiry;
            // only parent, difficulty and version carry over.
            prefix.root = root;
            prefix.timestamp = fresh_timestamp();
            prefix
        }
        None => HeaderPrefix {
            parent_id: rand::random(),
            root,
            difficulty: config.difficulty,
            timestamp: fresh_timestamp(),
            version: 0,
        },
    };

    info!(
        parent = %hex::encode(prefix.parent_id),
        difficulty = prefix.difficulty,
        "Mining round starting"
    );

    let Some(triple) = coordinator.search(&prefix, running).await? else {
        info!("Mining round cancelled");
        return Ok(());
    };

    if !verify_triple(&prefix, &triple) {
        error!(nonces = ?triple.nonces(), "Solution failed verification; not submitting");
        return Ok(());
    }

    let block_id = hex::encode(block_digest(&prefix, &triple));
    match upstream {
        Some(client) => {
            let block = Block {
                header: PuzzleHeader::from_solution(&prefix, &triple),
                block: config.contents.clone(),
            };
            let reply = client.submit(&block).await?;
            info!(reply = %reply, "Submission reply");
            info!(block = %block_id, "Block committed");
        }
        None => {
            info!(block = %block_id, nonces = ?triple.nonces(), "Block solved offline");
        }
    }

    Ok(())
}

/// Recompute every digest of the triple the long way and check the
/// collision before anything leaves the machine.
fn verify_triple(prefix: &HeaderPrefix, triple: &Triple) -> bool {
    let state = PrefixState::prepare(prefix);
    let mask = difficulty_mask(prefix.difficulty);

    let mut values = [0u64; 3];
    for (i, nonce) in triple.nonces().into_iter().enumerate() {
        let digest = state.digest(nonce, prefix.version);
        info!(nonce, digest = %hex::encode(digest), "Solution digest");
        values[i] = truncated(&digest, mask);
    }

    triple.is_pairwise_distinct() && values[0] == values[1] && values[1] == values[2]
}

/// Header timestamp: two minutes ahead of the wall clock, in Unix
/// nanoseconds. The server rejects headers stamped too far in the past.
fn fresh_timestamp() -> u64 {
    let expiry = OffsetDateTime::now_utc() + time::Duration::minutes(2);
    expiry.unix_timestamp_nanos() as u64
}
