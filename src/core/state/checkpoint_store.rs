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

//! Base-chain scan checkpoint.
//!
//! Two keys written together: the last fully scanned base-chain height and the
//! txid of the last commitment transaction seen. Either both exist or neither.

use crate::core::state::kv::{KvOp, KvSpace, StoreError};
use crate::core::types::Txid;
use thiserror::Error;

/// Tree holding the checkpoint.
pub const CHECKPOINT_TREE: &str = "checkpoint";
/// Key of the scanned height (u64, big endian).
pub const KEY_SCANNED_HEIGHT: &[u8] = b"last-scanned-block";
/// Key of the last commitment txid (32 bytes).
pub const KEY_LAST_COMMITMENT: &[u8] = b"last-seen-txid";

/// Checkpoint errors. Everything but `Store` is an integrity failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("partial checkpoint: {present} present without {missing}")]
    Partial {
        present: &'static str,
        missing: &'static str,
    },
    #[error("malformed checkpoint field {0}")]
    Malformed(&'static str),
    #[error("checkpoint regression: stored height {stored}, new height {new}")]
    Regression { stored: u64, new: u64 },
}

/// Scan position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Highest base-chain height fully processed.
    pub scanned_height: u64,
    /// Commitment transaction the next sidechain block must spend.
    pub last_commitment: Txid,
}

/// Persisted checkpoint.
#[derive(Clone)]
pub struct CheckpointStore {
    kv: KvSpace,
}

impl CheckpointStore {
    /// Open the checkpoint tree.
    pub fn open(db: &sled::Db) -> Result<Self, CheckpointError> {
        Ok(Self {
            kv: KvSpace::open(db, CHECKPOINT_TREE)?,
        })
    }

    /// Load the checkpoint, if one was ever saved.
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let height = self.kv.get(KEY_SCANNED_HEIGHT)?;
        let txid = self.kv.get(KEY_LAST_COMMITMENT)?;
        match (height, txid) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(CheckpointError::Partial {
                present: "scanned height",
                missing: "last commitment",
            }),
            (None, Some(_)) => Err(CheckpointError::Partial {
                present: "last commitment",
                missing: "scanned height",
            }),
            (Some(h), Some(t)) => {
                let h: [u8; 8] = h
                    .as_slice()
                    .try_into()
                    .map_err(|_| CheckpointError::Malformed("scanned height"))?;
                let last_commitment = Txid::from_slice(&t)
                    .ok_or(CheckpointError::Malformed("last commitment"))?;
                Ok(Some(Checkpoint {
                    scanned_height: u64::from_be_bytes(h),
                    last_commitment,
                }))
            }
        }
    }

    /// Load the checkpoint, or fall back to `genesis` when none exists.
    pub fn load_or(&self, genesis: Checkpoint) -> Result<Checkpoint, CheckpointError> {
        Ok(self.load()?.unwrap_or(genesis))
    }

    /// Persist both fields atomically. Heights never move backwards.
    pub fn save(&self, cp: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(stored) = self.load()? {
            if cp.scanned_height < stored.scanned_height {
                return Err(CheckpointError::Regression {
                    stored: stored.scanned_height,
                    new: cp.scanned_height,
                });
            }
        }
        self.kv.commit_atomic(&[
            KvOp::put(KEY_SCANNED_HEIGHT, cp.scanned_height.to_be_bytes().to_vec()),
            KvOp::put(KEY_LAST_COMMITMENT, cp.last_commitment.as_bytes().to_vec()),
        ])?;
        Ok(())
    }
}
