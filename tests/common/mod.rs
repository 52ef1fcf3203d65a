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

#![allow(dead_code)]

use namechain::chain::{BaseTx, OutPoint};
use namechain::core::codec::transaction::name_hash;
use namechain::core::codec::{Block, Name, Transaction};
use namechain::core::state::chain_store::ChainStore;
use namechain::core::state::checkpoint_store::CheckpointStore;
use namechain::core::state::engine::{Authorizer, ChainEngine, Denied, Grant};
use namechain::core::state::kv::open_db;
use namechain::core::types::{ContentId, OwnerKey, PublishHash, Txid, H256};
use namechain::core::watcher::CONTENT_ID_MARKER;
use std::sync::Arc;

/// Grants every owner-gated transaction, handing transfers to `recipient`.
pub struct AllowAll {
    pub recipient: OwnerKey,
}

impl Authorizer for AllowAll {
    fn authorize(&self, _tx: &Transaction, _owner: &OwnerKey) -> Result<Grant, Denied> {
        Ok(Grant::transfer_to(self.recipient))
    }
}

pub struct Node {
    pub dir: tempfile::TempDir,
    pub db: sled::Db,
    pub engine: ChainEngine,
    pub checkpoints: CheckpointStore,
}

pub fn node(auth: Arc<dyn Authorizer>) -> Node {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path().join("db")).unwrap();
    let engine = ChainEngine::new(ChainStore::open(&db).unwrap(), auth);
    let checkpoints = CheckpointStore::open(&db).unwrap();
    Node {
        dir,
        db,
        engine,
        checkpoints,
    }
}

pub fn key(b: u8) -> OwnerKey {
    OwnerKey::from_bytes([b; 32])
}

pub fn acquire(owner: u8, name: &str) -> Transaction {
    Transaction::Acquire {
        owner: key(owner),
        name_hash: name_hash(name),
    }
}

pub fn transfer(name: &str) -> Transaction {
    Transaction::Transfer {
        name_hash: name_hash(name),
    }
}

pub fn renew(name: &str, ref_block: H256) -> Transaction {
    Transaction::Renew {
        name_hash: name_hash(name),
        ref_block,
    }
}

pub fn publish(name: &str, data: u8) -> Transaction {
    Transaction::Publish {
        publish_hash: PublishHash::from_bytes([data; 20]),
        name: Name::new(name).unwrap(),
    }
}

/// Block whose bytes are unique per `salt`.
pub fn block(salt: u8, txs: Vec<Transaction>) -> Block {
    Block::new(ContentId::from_bytes([salt; 20]), txs).unwrap()
}

pub fn txid(b: u8) -> Txid {
    Txid::from_bytes([b; 32])
}

/// Base-chain transaction spending output 0 of each of `spends`.
pub fn base_tx(id: u8, spends: &[Txid], outputs: Vec<Vec<u8>>) -> BaseTx {
    BaseTx {
        txid: txid(id),
        inputs: spends
            .iter()
            .map(|t| OutPoint { txid: *t, vout: 0 })
            .collect(),
        outputs,
    }
}

pub fn data_output(id: &ContentId) -> Vec<u8> {
    let mut s = CONTENT_ID_MARKER.to_vec();
    s.extend_from_slice(id.as_bytes());
    s
}

/// Commitment spending `prev` plus its paying child announcing `id`.
pub fn commitment_pair(commit: u8, prev: Txid, child: u8, id: &ContentId) -> Vec<BaseTx> {
    vec![
        base_tx(commit, &[prev], vec![vec![0x51]]),
        base_tx(child, &[txid(commit)], vec![vec![0x51], data_output(id)]),
    ]
}
