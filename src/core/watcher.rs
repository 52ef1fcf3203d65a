// Copyright (c) 2026 Namechain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Base-chain watcher: the single pipeline that turns base-chain commitments
//! into applied sidechain blocks.
//!
//! Per base-chain height: find the transaction spending the last commitment,
//! find its paying child in the same block, read the content id from the
//! child's data output, fetch, apply, then advance the checkpoint. Chain state
//! is committed before the checkpoint, so a crash re-delivers at most one
//! block, which the engine acknowledges as already known.

use crate::chain::source::{BaseChain, BaseTx, ChainSourceError};
use crate::core::codec::BlockError;
use crate::core::codec::DecodeError;
use crate::core::state::checkpoint_store::{Checkpoint, CheckpointError, CheckpointStore};
use crate::core::state::engine::{Applied, ChainEngine, EngineError, ValidationError};
use crate::core::types::{ContentId, Txid};
use crate::monitoring::metrics::Metrics;
use crate::networking::fetcher::{BlockFetcher, FetchError};
use crate::networking::swarm::ContentSwarm;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Output script prefix: OP_RETURN followed by a 20-byte push.
pub const CONTENT_ID_MARKER: [u8; 2] = [0x6a, 0x14];
/// First base-chain height considered is `DEFAULT_GENESIS_HEIGHT + 1`.
pub const DEFAULT_GENESIS_HEIGHT: u64 = 670_000;
/// Placeholder commitment the first sidechain block spends.
pub const DEFAULT_GENESIS_COMMITMENT: Txid = Txid::from_bytes([0xaa; 32]);
/// Wait before re-polling a height the base chain has not reached.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);
/// First restart delay after a retryable failure.
pub const RETRY_BASE: Duration = Duration::from_secs(5);
/// Longest restart delay.
pub const RETRY_MAX: Duration = Duration::from_secs(300);

/// Watcher parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Height the scan starts after when no checkpoint exists.
    pub genesis_height: u64,
    /// Commitment id used when no checkpoint exists.
    pub genesis_commitment: Txid,
    /// Backoff while the base chain has not reached the next height.
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            genesis_height: DEFAULT_GENESIS_HEIGHT,
            genesis_commitment: DEFAULT_GENESIS_COMMITMENT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WatcherConfig {
    /// Checkpoint used when none is stored.
    pub fn genesis(&self) -> Checkpoint {
        Checkpoint {
            scanned_height: self.genesis_height,
            last_commitment: self.genesis_commitment,
        }
    }
}

/// First transaction, in block order, with an input spending `last`.
pub fn find_commitment<'a>(txs: &'a [BaseTx], last: &Txid) -> Option<&'a BaseTx> {
    txs.iter().find(|tx| tx.spends(last))
}

/// First transaction, in block order, spending an output of `commitment`.
pub fn find_paying_child<'a>(txs: &'a [BaseTx], commitment: &Txid) -> Option<&'a BaseTx> {
    txs.iter().find(|tx| tx.spends(commitment))
}

/// Content id from the first output carrying the data marker. `None` if no
/// output is marked or the first marked one is cut short.
pub fn extract_content_id(tx: &BaseTx) -> Option<ContentId> {
    const START: usize = CONTENT_ID_MARKER.len();
    const END: usize = START + ContentId::LEN;
    tx.outputs
        .iter()
        .find(|s| s.starts_with(&CONTENT_ID_MARKER))
        .and_then(|s| s.get(START..END))
        .and_then(ContentId::from_slice)
}

/// Protocol violations by the block producer or a sidechain block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusViolation {
    #[error("commitment {commitment} at height {height} has no paying child in the same block")]
    MissingPayingChild { height: u64, commitment: Txid },
    #[error("paying child {child} at height {height} carries no content id")]
    MissingContentId { height: u64, child: Txid },
    #[error("sidechain block rejected: {0}")]
    InvalidBlock(ValidationError),
}

/// How the supervisor should treat a watcher error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Stored or received data fails an integrity check.
    Integrity,
    /// Producer or block broke the protocol.
    Consensus,
    /// Block could not be retrieved within the ceiling.
    FetchTimeout,
    /// Block bytes are malformed.
    Decode,
    /// Base chain or swarm failure that may clear up.
    Transient,
    /// Local database failure.
    Storage,
}

/// Watcher errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatcherError {
    #[error("checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("consensus violation: {0}")]
    Consensus(#[from] ConsensusViolation),
    #[error("base chain: {0}")]
    Chain(#[from] ChainSourceError),
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    #[error("engine: {0}")]
    Engine(EngineError),
}

impl From<EngineError> for WatcherError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Invalid(v) => Self::Consensus(ConsensusViolation::InvalidBlock(v)),
            other => Self::Engine(other),
        }
    }
}

impl WatcherError {
    /// Classification for supervisor policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Checkpoint(CheckpointError::Store(_)) => ErrorClass::Storage,
            Self::Checkpoint(_) => ErrorClass::Integrity,
            Self::Consensus(_) => ErrorClass::Consensus,
            Self::Chain(_) => ErrorClass::Transient,
            Self::Fetch(FetchError::Timeout { .. }) => ErrorClass::FetchTimeout,
            Self::Fetch(_) => ErrorClass::Transient,
            Self::Engine(EngineError::Block(BlockError::Decode(_))) => ErrorClass::Decode,
            Self::Engine(EngineError::Store(_)) => ErrorClass::Storage,
            Self::Engine(_) => ErrorClass::Integrity,
        }
    }

    /// True if restarting from the persisted checkpoint may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Decode failure, if this is one.
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            Self::Engine(EngineError::Block(BlockError::Decode(d))) => Some(d),
            _ => None,
        }
    }
}

/// Result of scanning one base-chain height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Base chain has not reached `height`; nothing changed.
    NotYetAvailable {
        /// Height requested.
        height: u64,
    },
    /// No commitment at this height; height advanced.
    Empty {
        /// New checkpoint.
        checkpoint: Checkpoint,
    },
    /// A sidechain block was applied (or was already applied).
    Applied {
        /// New checkpoint.
        checkpoint: Checkpoint,
        /// Engine outcome.
        applied: Applied,
    },
    /// Shutdown was requested mid-step; nothing changed.
    Shutdown,
}

/// Resolve once shutdown is signalled. Never resolves if the sender is gone.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Base-chain watcher.
pub struct BaseChainWatcher<C: BaseChain, S: ContentSwarm> {
    chain: C,
    fetcher: BlockFetcher<S>,
    engine: ChainEngine,
    checkpoints: CheckpointStore,
    cfg: WatcherConfig,
    metrics: Option<Metrics>,
}

impl<C: BaseChain, S: ContentSwarm> BaseChainWatcher<C, S> {
    /// Wire a watcher from its collaborators.
    pub fn new(
        chain: C,
        fetcher: BlockFetcher<S>,
        engine: ChainEngine,
        checkpoints: CheckpointStore,
        cfg: WatcherConfig,
    ) -> Self {
        Self {
            chain,
            fetcher,
            engine,
            checkpoints,
            cfg,
            metrics: None,
        }
    }

    /// Report progress into `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Stored checkpoint or genesis.
    pub fn checkpoint(&self) -> Result<Checkpoint, WatcherError> {
        Ok(self.checkpoints.load_or(self.cfg.genesis())?)
    }

    fn save(&self, cp: Checkpoint) -> Result<(), WatcherError> {
        self.checkpoints.save(&cp)?;
        if let Some(m) = &self.metrics {
            m.scanned_height.set(cp.scanned_height as i64);
        }
        Ok(())
    }

    /// Process the height after `cp`.
    pub async fn scan_next(
        &self,
        cp: Checkpoint,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ScanOutcome, WatcherError> {
        let height = cp.scanned_height + 1;
        let Some(hash) = self.chain.block_hash_at(height).await? else {
            return Ok(ScanOutcome::NotYetAvailable { height });
        };
        let block = self.chain.block_by_hash(&hash).await?;

        let Some(commitment) = find_commitment(&block.txs, &cp.last_commitment) else {
            let next = Checkpoint {
                scanned_height: height,
                last_commitment: cp.last_commitment,
            };
            self.save(next)?;
            debug!(height, "no commitment");
            return Ok(ScanOutcome::Empty { checkpoint: next });
        };
        let commitment = commitment.txid;
        info!(height, commitment = %commitment, "commitment transaction found");
        if let Some(m) = &self.metrics {
            m.commitments_total.inc();
        }

        let child = find_paying_child(&block.txs, &commitment)
            .ok_or(ConsensusViolation::MissingPayingChild { height, commitment })?;
        let id = extract_content_id(child).ok_or(ConsensusViolation::MissingContentId {
            height,
            child: child.txid,
        })?;

        let bytes = tokio::select! {
            r = self.fetcher.fetch(id) => r.map_err(|e| self.note_fetch_error(e))?,
            _ = shutdown_requested(shutdown) => return Ok(ScanOutcome::Shutdown),
        };

        let applied = match self.engine.add_block(&bytes) {
            Ok(a) => a,
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.blocks_rejected_total.inc();
                }
                warn!(height, content_id = %id, error = %e, "sidechain block not applied");
                return Err(e.into());
            }
        };
        if let (Some(m), Applied::Accepted { height: h, .. }) = (&self.metrics, applied) {
            m.blocks_applied_total.inc();
            m.chain_height.set(h as i64);
        }

        let next = Checkpoint {
            scanned_height: height,
            last_commitment: commitment,
        };
        self.save(next)?;
        Ok(ScanOutcome::Applied {
            checkpoint: next,
            applied,
        })
    }

    fn note_fetch_error(&self, e: FetchError) -> FetchError {
        if let Some(m) = &self.metrics {
            match e {
                FetchError::Timeout { .. } => m.fetch_timeouts_total.inc(),
                FetchError::ContentMismatch { .. } => m.fetch_mismatch_total.inc(),
                _ => {}
            }
        }
        e
    }

    /// Scan until shutdown or a non-recoverable error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WatcherError> {
        let mut cp = self.checkpoint()?;
        info!(
            scanned_height = cp.scanned_height,
            last_commitment = %cp.last_commitment,
            "base-chain watcher started"
        );
        loop {
            if *shutdown.borrow() {
                info!(scanned_height = cp.scanned_height, "base-chain watcher stopped");
                return Ok(());
            }
            match self.scan_next(cp, &mut shutdown).await? {
                ScanOutcome::NotYetAvailable { height } => {
                    debug!(height, wait = ?self.cfg.poll_interval, "height not reached yet");
                    tokio::select! {
                        _ = tokio::time::sleep(self.cfg.poll_interval) => {}
                        _ = shutdown_requested(&mut shutdown) => {}
                    }
                }
                ScanOutcome::Empty { checkpoint } | ScanOutcome::Applied { checkpoint, .. } => {
                    cp = checkpoint;
                }
                ScanOutcome::Shutdown => {}
            }
        }
    }
}

/// Restart delay for retryable failures. Doubles up to `max`; back to `base`
/// after `reset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    next: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RETRY_BASE, RETRY_MAX)
    }
}

impl Backoff {
    /// Start at `base`, never exceed `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            next: base.min(max),
        }
    }

    /// Delay to wait now; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let d = self.next;
        self.next = (self.next * 2).min(self.max);
        d
    }

    /// Forget earlier failures.
    pub fn reset(&mut self) {
        self.next = self.base.min(self.max);
    }
}

/// Run `watcher` until shutdown, restarting it from the persisted checkpoint
/// after retryable failures. The delay resets whenever the failed run had
/// advanced the checkpoint. Anything non-retryable is returned.
pub async fn supervise<C: BaseChain, S: ContentSwarm>(
    watcher: &BaseChainWatcher<C, S>,
    mut shutdown: watch::Receiver<bool>,
    mut backoff: Backoff,
) -> Result<(), WatcherError> {
    loop {
        let before = watcher.checkpoint()?.scanned_height;
        match watcher.run(shutdown.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() => {
                if watcher.checkpoint()?.scanned_height > before {
                    backoff.reset();
                }
                let delay = backoff.next_delay();
                warn!(error = %e, class = ?e.class(), retry_in = ?delay, "watcher failed, restarting from checkpoint");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_requested(&mut shutdown) => return Ok(()),
                }
            }
            Err(e) => {
                error!(error = %e, class = ?e.class(), "watcher halted, operator action required");
                return Err(e);
            }
        }
    }
}
