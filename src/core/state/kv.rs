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

//! Key spaces over sled trees with atomic multi-key commits.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("db open")]
    DbOpen,
    #[error("db io")]
    DbIo,
    #[error("corrupt value at {0}")]
    Corrupt(String),
}

/// State operation.
#[derive(Clone, Debug)]
pub enum KvOp {
    /// Put key/value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete key.
    Del { key: Vec<u8> },
}

impl KvOp {
    /// Shorthand for `Put`.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        KvOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Shorthand for `Del`.
    pub fn del(key: impl Into<Vec<u8>>) -> Self {
        KvOp::Del { key: key.into() }
    }
}

/// Open the node database (directory).
pub fn open_db(path: impl AsRef<Path>) -> Result<sled::Db, StoreError> {
    sled::open(path).map_err(|_| StoreError::DbOpen)
}

/// One named key space.
#[derive(Clone)]
pub struct KvSpace {
    tree: sled::Tree,
}

impl KvSpace {
    /// Open (or create) the tree `name` in `db`.
    pub fn open(db: &sled::Db, name: &str) -> Result<Self, StoreError> {
        let tree = db.open_tree(name).map_err(|_| StoreError::DbOpen)?;
        Ok(Self { tree })
    }

    /// Get value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let v = self.tree.get(key).map_err(|_| StoreError::DbIo)?;
        Ok(v.map(|iv| iv.to_vec()))
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.tree.contains_key(key).map_err(|_| StoreError::DbIo)
    }

    /// Up to `limit` values under `prefix`, highest key first.
    pub fn last_values(&self, prefix: &[u8], limit: usize) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.tree.scan_prefix(prefix).rev().take(limit) {
            let (_k, v) = item.map_err(|_| StoreError::DbIo)?;
            out.push(v.to_vec());
        }
        Ok(out)
    }

    /// Apply all ops in one sled transaction, then flush to disk.
    pub fn commit_atomic(&self, ops: &[KvOp]) -> Result<(), StoreError> {
        self.tree
            .transaction(|t| {
                for op in ops {
                    match op {
                        KvOp::Put { key, value } => {
                            t.insert(key.as_slice(), value.as_slice())?;
                        }
                        KvOp::Del { key } => {
                            t.remove(key.as_slice())?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<StoreError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(se) => se,
                TransactionError::Storage(_) => StoreError::DbIo,
            })?;
        self.tree.flush().map_err(|_| StoreError::DbIo)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_is_visible_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path()).unwrap();
        let kv = KvSpace::open(&db, "t").unwrap();
        kv.commit_atomic(&[
            KvOp::put(b"h/1".to_vec(), b"one".to_vec()),
            KvOp::put(b"h/2".to_vec(), b"two".to_vec()),
            KvOp::put(b"x".to_vec(), b"other".to_vec()),
        ])
        .unwrap();
        assert_eq!(kv.get(b"h/1").unwrap(), Some(b"one".to_vec()));
        assert_eq!(
            kv.last_values(b"h/", 10).unwrap(),
            vec![b"two".to_vec(), b"one".to_vec()]
        );

        kv.commit_atomic(&[KvOp::del(b"h/2".to_vec())]).unwrap();
        assert!(!kv.contains(b"h/2").unwrap());
    }
}
