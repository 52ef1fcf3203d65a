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

//! Chain-state key space.
//!
//! Layout (one sled tree, prefix-partitioned):
//! - `r/<name_hash>`   -> NameRecord
//! - `b/<content_id>`  -> raw block bytes
//! - `i/<height be>`   -> content id
//! - `h/<height be>`   -> block hash
//! - `u/<height be>`   -> UndoRecord
//! - `m/height`        -> u64 be

use crate::core::state::kv::{KvOp, KvSpace, StoreError};
use crate::core::types::{
    decode_canonical_limited, encode_canonical, ContentId, OwnerKey, PublishHash, H256,
};
use serde::{Deserialize, Serialize};

/// Tree holding chain state.
pub const CHAIN_TREE: &str = "chainstate";

const P_REGISTRY: &[u8] = b"r/";
const P_BLOCK: &[u8] = b"b/";
const P_INDEX: &[u8] = b"i/";
const P_HASH: &[u8] = b"h/";
const P_UNDO: &[u8] = b"u/";
const K_HEIGHT: &[u8] = b"m/height";

const MAX_RECORD_BYTES: usize = 1024;
const MAX_UNDO_BYTES: usize = 2 * 1024 * 1024;

/// Registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Current owner.
    pub owner: OwnerKey,
    /// Raw published name; empty until published.
    pub name: Vec<u8>,
    /// Hash of published data; zero until published.
    pub publish_hash: PublishHash,
}

/// Prior registry values overwritten by one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRecord {
    /// Block applied at this height.
    pub content_id: ContentId,
    /// Each touched key with its value before the block.
    pub prior: Vec<(H256, Option<NameRecord>)>,
}

/// Everything one accepted block writes.
#[derive(Clone, Debug)]
pub struct BlockCommit<'a> {
    /// Height the block lands at.
    pub height: u64,
    /// Block content id.
    pub content_id: ContentId,
    /// Block hash.
    pub block_hash: H256,
    /// Raw block bytes.
    pub bytes: &'a [u8],
    /// Final value of each touched key.
    pub writes: Vec<(H256, NameRecord)>,
    /// Undo journal for the block.
    pub undo: UndoRecord,
}

fn key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(prefix.len() + suffix.len());
    k.extend_from_slice(prefix);
    k.extend_from_slice(suffix);
    k
}

fn corrupt(what: &str) -> StoreError {
    StoreError::Corrupt(what.to_string())
}

/// Persisted chain state.
#[derive(Clone)]
pub struct ChainStore {
    kv: KvSpace,
}

impl ChainStore {
    /// Open the chain-state tree.
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            kv: KvSpace::open(db, CHAIN_TREE)?,
        })
    }

    /// Number of accepted blocks.
    pub fn height(&self) -> Result<u64, StoreError> {
        match self.kv.get(K_HEIGHT)? {
            None => Ok(0),
            Some(v) => {
                let b: [u8; 8] = v.as_slice().try_into().map_err(|_| corrupt("height"))?;
                Ok(u64::from_be_bytes(b))
            }
        }
    }

    /// Registry lookup.
    pub fn record(&self, name_hash: &H256) -> Result<Option<NameRecord>, StoreError> {
        self.kv
            .get(&key(P_REGISTRY, name_hash.as_bytes()))?
            .map(|v| {
                decode_canonical_limited(&v, MAX_RECORD_BYTES)
                    .map_err(|_| corrupt(&format!("registry {name_hash}")))
            })
            .transpose()
    }

    /// True if a block with this content id was accepted.
    pub fn has_block(&self, id: &ContentId) -> Result<bool, StoreError> {
        self.kv.contains(&key(P_BLOCK, id.as_bytes()))
    }

    /// Raw bytes of an accepted block.
    pub fn block_bytes(&self, id: &ContentId) -> Result<Option<Vec<u8>>, StoreError> {
        self.kv.get(&key(P_BLOCK, id.as_bytes()))
    }

    /// Content id of the block at `height` (1-based).
    pub fn content_id_at(&self, height: u64) -> Result<Option<ContentId>, StoreError> {
        self.kv
            .get(&key(P_INDEX, &height.to_be_bytes()))?
            .map(|v| ContentId::from_slice(&v).ok_or_else(|| corrupt("block index")))
            .transpose()
    }

    /// Hashes of up to `n` most recent blocks, newest first.
    pub fn recent_block_hashes(&self, n: usize) -> Result<Vec<H256>, StoreError> {
        self.kv
            .last_values(P_HASH, n)?
            .into_iter()
            .map(|v| H256::from_slice(&v).ok_or_else(|| corrupt("block hash index")))
            .collect()
    }

    /// Undo journal of the block at `height`.
    pub fn undo_record(&self, height: u64) -> Result<Option<UndoRecord>, StoreError> {
        self.kv
            .get(&key(P_UNDO, &height.to_be_bytes()))?
            .map(|v| {
                decode_canonical_limited(&v, MAX_UNDO_BYTES).map_err(|_| corrupt("undo journal"))
            })
            .transpose()
    }

    /// Persist an accepted block and its registry effects in one transaction.
    pub fn commit_block(&self, c: &BlockCommit<'_>) -> Result<(), StoreError> {
        let h = c.height.to_be_bytes();
        let mut ops = Vec::with_capacity(c.writes.len() + 5);
        for (name_hash, record) in &c.writes {
            let value = encode_canonical(record).map_err(|_| corrupt("registry encode"))?;
            ops.push(KvOp::put(key(P_REGISTRY, name_hash.as_bytes()), value));
        }
        let undo = encode_canonical(&c.undo).map_err(|_| corrupt("undo encode"))?;
        ops.push(KvOp::put(key(P_BLOCK, c.content_id.as_bytes()), c.bytes));
        ops.push(KvOp::put(key(P_INDEX, &h), c.content_id.as_bytes().to_vec()));
        ops.push(KvOp::put(key(P_HASH, &h), c.block_hash.as_bytes().to_vec()));
        ops.push(KvOp::put(key(P_UNDO, &h), undo));
        ops.push(KvOp::put(K_HEIGHT, h.to_vec()));
        self.kv.commit_atomic(&ops)
    }

    /// Remove the block at `height` and restore the registry from `undo`.
    pub fn revert_block(&self, height: u64, undo: &UndoRecord) -> Result<(), StoreError> {
        let h = height.to_be_bytes();
        let mut ops = Vec::with_capacity(undo.prior.len() + 5);
        for (name_hash, prior) in &undo.prior {
            let k = key(P_REGISTRY, name_hash.as_bytes());
            match prior {
                Some(record) => {
                    let value = encode_canonical(record).map_err(|_| corrupt("registry encode"))?;
                    ops.push(KvOp::put(k, value));
                }
                None => ops.push(KvOp::del(k)),
            }
        }
        ops.push(KvOp::del(key(P_BLOCK, undo.content_id.as_bytes())));
        ops.push(KvOp::del(key(P_INDEX, &h)));
        ops.push(KvOp::del(key(P_HASH, &h)));
        ops.push(KvOp::del(key(P_UNDO, &h)));
        ops.push(KvOp::put(K_HEIGHT, (height - 1).to_be_bytes().to_vec()));
        self.kv.commit_atomic(&ops)
    }
}
