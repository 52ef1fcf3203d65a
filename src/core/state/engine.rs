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

//! Chain-state engine: validates registry transactions and applies accepted blocks.
//!
//! Validation is staged over an in-memory view of the registry, so each
//! transaction sees the effects of the ones before it in the same block. A block
//! is either applied completely in one store transaction or not at all.

use crate::core::codec::{Block, BlockError, Transaction, TxKind};
use crate::core::state::chain_store::{BlockCommit, ChainStore, NameRecord, UndoRecord};
use crate::core::state::kv::StoreError;
use crate::core::types::{ContentId, OwnerKey, PublishHash, H256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How many recent blocks a Renew may reference.
pub const RENEW_WINDOW: usize = 10;

/// Authorization refused by the `Authorizer`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Denied(pub String);

/// Authorization granted by the `Authorizer`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grant {
    /// New owner for a Transfer. Ignored for other kinds.
    pub recipient: Option<OwnerKey>,
}

impl Grant {
    /// Plain owner approval.
    pub fn owner() -> Self {
        Self { recipient: None }
    }

    /// Owner approval handing the name to `recipient`.
    pub fn transfer_to(recipient: OwnerKey) -> Self {
        Self {
            recipient: Some(recipient),
        }
    }
}

/// Ownership proof check for Transfer, Renew and Publish.
///
/// The wire format carries no witness, so the scheme is supplied by the node.
pub trait Authorizer: Send + Sync {
    /// Decide whether `owner` authorized `tx`.
    fn authorize(&self, tx: &Transaction, owner: &OwnerKey) -> Result<Grant, Denied>;
}

/// Refuses every owner-gated transaction. Used until a signature scheme is chosen.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn authorize(&self, _tx: &Transaction, _owner: &OwnerKey) -> Result<Grant, Denied> {
        Err(Denied("no signature scheme configured".into()))
    }
}

/// Why a single transaction is invalid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("name hash {0} already registered")]
    NameTaken(H256),
    #[error("name hash {0} not registered")]
    UnknownName(H256),
    #[error("not authorized: {0}")]
    Unauthorized(Denied),
    #[error("transfer authorization carries no recipient")]
    MissingRecipient,
    #[error("reference block {0} is not among the recent blocks")]
    StaleReference(H256),
}

/// First invalid transaction of a block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transaction {index} ({kind:?}) rejected: {reason}")]
pub struct ValidationError {
    /// Position in the block.
    pub index: usize,
    /// Transaction kind.
    pub kind: TxKind,
    /// Reason.
    pub reason: Rejection,
}

/// Engine errors. None of them leave partial state behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("no block to undo")]
    NothingToUndo,
    #[error("undo journal missing at height {0}")]
    MissingUndo(u64),
}

/// Outcome of `add_block`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Newly accepted at `height`.
    Accepted {
        /// New chain height.
        height: u64,
        /// Block content id.
        content_id: ContentId,
    },
    /// Already applied earlier (restart re-delivery); nothing changed.
    AlreadyKnown {
        /// Block content id.
        content_id: ContentId,
    },
}

/// Registry entries touched by one block plus the recent-block window.
#[derive(Clone, Debug, Default)]
pub struct RegistryView {
    original: BTreeMap<H256, Option<NameRecord>>,
    current: BTreeMap<H256, Option<NameRecord>>,
    recent: Vec<H256>,
}

impl RegistryView {
    /// View with the given recent block hashes and no entries loaded.
    pub fn new(recent: Vec<H256>) -> Self {
        Self {
            recent,
            ..Self::default()
        }
    }

    /// Seed an entry as loaded from the store.
    pub fn load(&mut self, name_hash: H256, record: Option<NameRecord>) {
        self.original.entry(name_hash).or_insert_with(|| record.clone());
        self.current.entry(name_hash).or_insert(record);
    }

    /// Current value of an entry.
    pub fn get(&self, name_hash: &H256) -> Option<&NameRecord> {
        self.current.get(name_hash).and_then(Option::as_ref)
    }

    /// True if `hash` is one of the recent block hashes.
    pub fn is_recent(&self, hash: &H256) -> bool {
        self.recent.contains(hash)
    }

    fn set(&mut self, name_hash: H256, record: NameRecord) {
        self.current.insert(name_hash, Some(record));
    }

    fn into_delta(self) -> BlockDelta {
        let mut delta = BlockDelta::default();
        for (k, cur) in self.current {
            let orig = self.original.get(&k).cloned().flatten();
            if cur != orig {
                if let Some(rec) = cur {
                    delta.writes.push((k, rec));
                    delta.prior.push((k, orig));
                }
            }
        }
        delta
    }
}

/// Registry effects of a validated block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockDelta {
    /// Final value of each changed entry.
    pub writes: Vec<(H256, NameRecord)>,
    /// Value of each changed entry before the block.
    pub prior: Vec<(H256, Option<NameRecord>)>,
}

/// Chain-state engine. Cheap to clone; all clones share one store.
///
/// Only the pipeline calls `add_block` and `undo_block`; other holders use the
/// read-only methods.
#[derive(Clone)]
pub struct ChainEngine {
    store: ChainStore,
    authorizer: Arc<dyn Authorizer>,
}

impl ChainEngine {
    /// Create an engine over `store`.
    pub fn new(store: ChainStore, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { store, authorizer }
    }

    /// Number of accepted blocks.
    pub fn height(&self) -> Result<u64, EngineError> {
        Ok(self.store.height()?)
    }

    /// Registry entry by name hash.
    pub fn name(&self, name_hash: &H256) -> Result<Option<NameRecord>, EngineError> {
        Ok(self.store.record(name_hash)?)
    }

    /// Content id of the block at `height`.
    pub fn content_id_at(&self, height: u64) -> Result<Option<ContentId>, EngineError> {
        Ok(self.store.content_id_at(height)?)
    }

    /// Raw bytes of an accepted block.
    pub fn block_bytes(&self, id: &ContentId) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.store.block_bytes(id)?)
    }

    /// Decoded block at `height`, for height-ordered replay.
    pub fn block_at(&self, height: u64) -> Result<Option<Block>, EngineError> {
        let Some(id) = self.store.content_id_at(height)? else {
            return Ok(None);
        };
        let bytes = self
            .store
            .block_bytes(&id)?
            .ok_or_else(|| StoreError::Corrupt(format!("block {id} indexed but missing")))?;
        Ok(Some(Block::decode(&bytes)?))
    }

    /// Check one transaction against `view`, returning its registry write if any.
    pub fn validate_transaction(
        &self,
        tx: &Transaction,
        view: &RegistryView,
    ) -> Result<Option<(H256, NameRecord)>, Rejection> {
        let name_hash = tx.name_hash();
        match tx {
            Transaction::Acquire { owner, .. } => {
                if view.get(&name_hash).is_some() {
                    return Err(Rejection::NameTaken(name_hash));
                }
                Ok(Some((
                    name_hash,
                    NameRecord {
                        owner: *owner,
                        name: Vec::new(),
                        publish_hash: PublishHash::default(),
                    },
                )))
            }
            Transaction::Transfer { .. } => {
                let (record, grant) = self.authorized(tx, &name_hash, view)?;
                let recipient = grant.recipient.ok_or(Rejection::MissingRecipient)?;
                let mut next = record.clone();
                next.owner = recipient;
                Ok(Some((name_hash, next)))
            }
            Transaction::Renew { ref_block, .. } => {
                self.authorized(tx, &name_hash, view)?;
                if !view.is_recent(ref_block) {
                    return Err(Rejection::StaleReference(*ref_block));
                }
                Ok(None)
            }
            Transaction::Publish { publish_hash, name } => {
                let (record, _) = self.authorized(tx, &name_hash, view)?;
                let mut next = record.clone();
                next.name = name.as_bytes().to_vec();
                next.publish_hash = *publish_hash;
                Ok(Some((name_hash, next)))
            }
        }
    }

    fn authorized<'v>(
        &self,
        tx: &Transaction,
        name_hash: &H256,
        view: &'v RegistryView,
    ) -> Result<(&'v NameRecord, Grant), Rejection> {
        let record = view.get(name_hash).ok_or(Rejection::UnknownName(*name_hash))?;
        let grant = self
            .authorizer
            .authorize(tx, &record.owner)
            .map_err(Rejection::Unauthorized)?;
        Ok((record, grant))
    }

    /// Validate every transaction in order against current state.
    ///
    /// Stops at the first invalid transaction. Pure with respect to the store.
    pub fn validate_block(&self, block: &Block) -> Result<BlockDelta, EngineError> {
        let mut view = RegistryView::new(self.store.recent_block_hashes(RENEW_WINDOW)?);
        for tx in block.transactions() {
            let h = tx.name_hash();
            if view.current.contains_key(&h) {
                continue;
            }
            view.load(h, self.store.record(&h)?);
        }

        for (index, tx) in block.transactions().iter().enumerate() {
            match self.validate_transaction(tx, &view) {
                Ok(Some((h, rec))) => view.set(h, rec),
                Ok(None) => {}
                Err(reason) => {
                    return Err(ValidationError {
                        index,
                        kind: tx.kind(),
                        reason,
                    }
                    .into())
                }
            }
        }
        Ok(view.into_delta())
    }

    /// Decode and validate without applying.
    pub fn check_block(&self, bytes: &[u8]) -> Result<Block, EngineError> {
        let block = Block::decode(bytes)?;
        self.validate_block(&block)?;
        Ok(block)
    }

    /// Decode, validate and apply a block.
    ///
    /// A block already applied (same content id) is acknowledged without changes.
    pub fn add_block(&self, bytes: &[u8]) -> Result<Applied, EngineError> {
        let block = Block::decode(bytes)?;
        let content_id = *block.content_id();
        if self.store.has_block(&content_id)? {
            debug!(content_id = %content_id, "block already applied");
            return Ok(Applied::AlreadyKnown { content_id });
        }

        let delta = self.validate_block(&block)?;
        let height = self.store.height()? + 1;
        self.store.commit_block(&BlockCommit {
            height,
            content_id,
            block_hash: *block.block_hash(),
            bytes,
            writes: delta.writes,
            undo: UndoRecord {
                content_id,
                prior: delta.prior,
            },
        })?;

        info!(
            height,
            content_id = %content_id,
            block_hash = %block.block_hash(),
            txs = block.transactions().len(),
            "sidechain block accepted"
        );
        Ok(Applied::Accepted { height, content_id })
    }

    /// Roll back the most recent block. Returns the new height.
    pub fn undo_block(&self) -> Result<u64, EngineError> {
        let height = self.store.height()?;
        if height == 0 {
            return Err(EngineError::NothingToUndo);
        }
        let undo = self
            .store
            .undo_record(height)?
            .ok_or(EngineError::MissingUndo(height))?;
        self.store.revert_block(height, &undo)?;
        warn!(height, content_id = %undo.content_id, "sidechain block rolled back");
        Ok(height - 1)
    }
}
