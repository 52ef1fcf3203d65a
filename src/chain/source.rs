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

//! The view of the base chain the watcher needs: block hash by height and
//! block contents by hash.

use crate::core::types::{Txid, H256};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Reference to an output of an earlier transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Transaction holding the output.
    pub txid: Txid,
    /// Output index.
    pub vout: u32,
}

/// Base-chain transaction, reduced to what commitment scanning reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseTx {
    /// Transaction id.
    pub txid: Txid,
    /// Spent outputs, in input order. Coinbase inputs are omitted.
    pub inputs: Vec<OutPoint>,
    /// Locking scripts, in output order.
    pub outputs: Vec<Vec<u8>>,
}

impl BaseTx {
    /// True if any input spends an output of `txid`.
    pub fn spends(&self, txid: &Txid) -> bool {
        self.inputs.iter().any(|i| &i.txid == txid)
    }
}

/// Base-chain block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseBlock {
    /// Block hash.
    pub hash: H256,
    /// Block height.
    pub height: u64,
    /// Transactions in block order.
    pub txs: Vec<BaseTx>,
}

/// Base-chain source errors. All of them are transient from the watcher's view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainSourceError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unknown block {0}")]
    UnknownBlock(H256),
}

/// Base-chain data source.
#[async_trait]
pub trait BaseChain: Send + Sync {
    /// Hash of the block at `height`, or `None` if the chain has not reached it.
    async fn block_hash_at(&self, height: u64) -> Result<Option<H256>, ChainSourceError>;

    /// Block contents by hash.
    async fn block_by_hash(&self, hash: &H256) -> Result<BaseBlock, ChainSourceError>;
}

#[async_trait]
impl<T: BaseChain + ?Sized> BaseChain for Arc<T> {
    async fn block_hash_at(&self, height: u64) -> Result<Option<H256>, ChainSourceError> {
        (**self).block_hash_at(height).await
    }

    async fn block_by_hash(&self, hash: &H256) -> Result<BaseBlock, ChainSourceError> {
        (**self).block_by_hash(hash).await
    }
}

/// In-process base chain. Blocks are appended by height; the tip grows as
/// blocks are pushed.
#[derive(Clone, Default)]
pub struct MemoryChain {
    blocks: Arc<RwLock<BTreeMap<u64, BaseBlock>>>,
}

impl MemoryChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `txs` as the block at `height`. The block hash is derived from
    /// the height so it is stable across runs.
    pub fn push(&self, height: u64, txs: Vec<BaseTx>) -> H256 {
        let mut h = [0u8; 32];
        h[..8].copy_from_slice(&height.to_be_bytes());
        h[31] = 0xb1;
        let hash = H256::from_bytes(h);
        if let Ok(mut g) = self.blocks.write() {
            g.insert(height, BaseBlock { hash, height, txs });
        }
        hash
    }

    /// Highest stored height.
    pub fn tip(&self) -> Option<u64> {
        self.blocks.read().ok().and_then(|g| g.keys().next_back().copied())
    }
}

#[async_trait]
impl BaseChain for MemoryChain {
    async fn block_hash_at(&self, height: u64) -> Result<Option<H256>, ChainSourceError> {
        let g = self
            .blocks
            .read()
            .map_err(|_| ChainSourceError::Transport("poisoned".into()))?;
        Ok(g.get(&height).map(|b| b.hash))
    }

    async fn block_by_hash(&self, hash: &H256) -> Result<BaseBlock, ChainSourceError> {
        let g = self
            .blocks
            .read()
            .map_err(|_| ChainSourceError::Transport("poisoned".into()))?;
        g.values()
            .find(|b| &b.hash == hash)
            .cloned()
            .ok_or(ChainSourceError::UnknownBlock(*hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_chain_reports_unreached_heights() {
        let chain = MemoryChain::new();
        let hash = chain.push(5, vec![]);
        assert_eq!(chain.block_hash_at(5).await.unwrap(), Some(hash));
        assert_eq!(chain.block_hash_at(6).await.unwrap(), None);
        assert_eq!(chain.block_by_hash(&hash).await.unwrap().height, 5);
        assert_eq!(chain.tip(), Some(5));
    }

    #[test]
    fn spends_matches_any_input() {
        let a = Txid::from_bytes([1; 32]);
        let tx = BaseTx {
            txid: Txid::from_bytes([2; 32]),
            inputs: vec![
                OutPoint { txid: Txid::from_bytes([9; 32]), vout: 0 },
                OutPoint { txid: a, vout: 3 },
            ],
            outputs: vec![],
        };
        assert!(tx.spends(&a));
        assert!(!tx.spends(&Txid::from_bytes([7; 32])));
    }
}
