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

//! Sidechain blocks.

use super::{content_id, DecodeError, Transaction};
use crate::core::crypto::{Digest32, Sha256};
use crate::core::state::merkle::{merkle_root, MerkleTree};
use crate::core::types::{ContentId, H256};
use thiserror::Error;

/// Length of the previous-block field.
pub const PREVIOUS_LEN: usize = ContentId::LEN;
/// Length of the fixed header (previous block id + block hash).
pub const HEADER_LEN: usize = PREVIOUS_LEN + H256::LEN;
/// Largest accepted serialized block.
pub const MAX_BLOCK_SIZE: usize = 200_000;

/// Block decoding failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// Structurally malformed bytes.
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    /// Well-formed bytes whose stored hash does not match their contents.
    #[error("block hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch {
        /// Hash field found in the bytes.
        stored: H256,
        /// `H(previous || merkle_root)` recomputed from the transactions.
        computed: H256,
    },
}

/// A decoded, self-consistent sidechain block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    previous: ContentId,
    merkle_root: H256,
    block_hash: H256,
    transactions: Vec<Transaction>,
    content_id: ContentId,
}

/// `H(previous || merkle_root)`.
pub fn compute_block_hash(previous: &ContentId, merkle_root: &H256) -> H256 {
    H256::from_bytes(Sha256::digest_pair(
        previous.as_bytes(),
        merkle_root.as_bytes(),
    ))
}

impl Block {
    /// Assemble a block on top of `previous`. Fails if the encoding would exceed
    /// `MAX_BLOCK_SIZE`.
    pub fn new(previous: ContentId, transactions: Vec<Transaction>) -> Result<Self, DecodeError> {
        let merkle_root = H256::from_bytes(merkle_root::<Sha256, _>(&transactions));
        let block_hash = compute_block_hash(&previous, &merkle_root);
        let mut block = Self {
            previous,
            merkle_root,
            block_hash,
            transactions,
            content_id: ContentId::default(),
        };
        let bytes = block.encode();
        if bytes.len() > MAX_BLOCK_SIZE {
            return Err(DecodeError::BlockTooLarge(bytes.len()));
        }
        block.content_id = content_id(&bytes);
        Ok(block)
    }

    /// Parse and integrity-check serialized bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, BlockError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::BlockTooShort(bytes.len()).into());
        }
        if bytes.len() > MAX_BLOCK_SIZE {
            return Err(DecodeError::BlockTooLarge(bytes.len()).into());
        }

        let previous = ContentId::from_slice(&bytes[..PREVIOUS_LEN])
            .ok_or(DecodeError::BlockTooShort(bytes.len()))?;
        let stored = H256::from_slice(&bytes[PREVIOUS_LEN..HEADER_LEN])
            .ok_or(DecodeError::BlockTooShort(bytes.len()))?;

        let mut transactions = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < bytes.len() {
            let len = bytes[offset] as usize;
            let start = offset + 1;
            let end = start + len;
            if end > bytes.len() {
                return Err(DecodeError::Truncated(offset).into());
            }
            let tx = Transaction::from_bytes(&bytes[start..end]).map_err(|e| {
                DecodeError::Transaction {
                    index: transactions.len(),
                    reason: Box::new(e),
                }
            })?;
            transactions.push(tx);
            offset = end;
        }

        let merkle_root = H256::from_bytes(merkle_root::<Sha256, _>(&transactions));
        let computed = compute_block_hash(&previous, &merkle_root);
        if computed != stored {
            return Err(BlockError::HashMismatch { stored, computed });
        }

        Ok(Self {
            previous,
            merkle_root,
            block_hash: computed,
            transactions,
            content_id: content_id(bytes),
        })
    }

    /// Canonical serialization; the exact inverse of `decode`.
    pub fn encode(&self) -> Vec<u8> {
        let body: usize = self
            .transactions
            .iter()
            .map(|t| 1 + t.encoded_len())
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + body);
        out.extend_from_slice(self.previous.as_bytes());
        out.extend_from_slice(self.block_hash.as_bytes());
        for tx in &self.transactions {
            let b = tx.to_bytes();
            // Transaction encodings are bounded by MAX_TX_SIZE.
            out.push(b.len() as u8);
            out.extend_from_slice(&b);
        }
        out
    }

    /// Content id of the previous block.
    pub fn previous(&self) -> &ContentId {
        &self.previous
    }

    /// Merkle root over transaction content hashes.
    pub fn merkle_root(&self) -> &H256 {
        &self.merkle_root
    }

    /// `H(previous || merkle_root)`.
    pub fn block_hash(&self) -> &H256 {
        &self.block_hash
    }

    /// Transactions in block order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Swarm address of the canonical bytes.
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    /// Full Merkle tree, for inclusion proofs.
    pub fn merkle_tree(&self) -> MerkleTree<Sha256> {
        MerkleTree::build(&self.transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::transaction::name_hash;
    use crate::core::state::merkle::verify_proof;
    use crate::core::types::OwnerKey;

    fn sample() -> Block {
        Block::new(
            ContentId::from_bytes([9; 20]),
            vec![
                Transaction::Acquire {
                    owner: OwnerKey::from_bytes([1; 32]),
                    name_hash: name_hash("alice"),
                },
                Transaction::Transfer {
                    name_hash: name_hash("alice"),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn decode_inverts_encode() {
        let block = sample();
        let bytes = block.encode();
        assert_eq!(Block::decode(&bytes).unwrap(), block);
    }

    #[test]
    fn empty_block_is_header_only() {
        let block = Block::new(ContentId::default(), vec![]).unwrap();
        let bytes = block.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Block::decode(&bytes).unwrap().transactions().len(), 0);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let mut bytes = sample().encode();
        bytes.pop();
        assert!(matches!(
            Block::decode(&bytes),
            Err(BlockError::Decode(DecodeError::Truncated(_)))
        ));
    }

    #[test]
    fn tampered_previous_is_hash_mismatch() {
        let mut bytes = sample().encode();
        bytes[0] ^= 1;
        assert!(matches!(
            Block::decode(&bytes),
            Err(BlockError::HashMismatch { .. })
        ));
    }

    #[test]
    fn inclusion_proofs_verify() {
        let block = sample();
        let tree = block.merkle_tree();
        for i in 0..block.transactions().len() {
            let proof = tree.proof(i).unwrap();
            assert!(verify_proof::<Sha256>(*block.merkle_root().as_bytes(), &proof));
        }
    }
}
