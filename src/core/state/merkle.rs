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

//! Merkle tree over block transactions.
//!
//! leaf = H(content bytes)
//! node = H(left || right)
//!
//! A level with an odd number of nodes pairs its last node with itself, including
//! a lone leaf. The root of an empty sequence is the zero hash.

use crate::core::crypto::Digest32;
use crate::core::types::Hash32;
use std::marker::PhantomData;

/// Anything that can be committed to as a Merkle leaf.
pub trait MerkleContent {
    /// Canonical bytes hashed into the leaf.
    fn leaf_bytes(&self) -> Vec<u8>;

    /// Leaf hash under hasher `H`.
    fn content_hash<H: Digest32>(&self) -> Hash32 {
        H::digest(&self.leaf_bytes())
    }
}

/// Side of sibling in proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Side {
    /// Sibling is left.
    Left,
    /// Sibling is right.
    Right,
}

/// One proof item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofItem {
    /// Whether sibling is left or right of current hash.
    pub side: Side,
    /// Sibling hash.
    pub sibling: Hash32,
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Leaf hash.
    pub leaf: Hash32,
    /// Path items from leaf to root.
    pub path: Vec<ProofItem>,
}

/// Merkle tree with every level materialized, hashed with `H`.
#[derive(Clone, Debug)]
pub struct MerkleTree<H: Digest32> {
    levels: Vec<Vec<Hash32>>,
    _hasher: PhantomData<H>,
}

impl<H: Digest32> MerkleTree<H> {
    /// Build a tree over `items`, preserving their order.
    pub fn build<C: MerkleContent>(items: &[C]) -> Self {
        let leaves: Vec<Hash32> = items.iter().map(|c| c.content_hash::<H>()).collect();
        Self::from_leaves(leaves)
    }

    /// Build a tree from precomputed leaf hashes.
    pub fn from_leaves(leaves: Vec<Hash32>) -> Self {
        let mut levels = Vec::new();
        if leaves.is_empty() {
            return Self {
                levels,
                _hasher: PhantomData,
            };
        }
        levels.push(leaves);
        loop {
            let level = &levels[levels.len() - 1];
            if level.len() == 1 && levels.len() > 1 {
                break;
            }
            let next = next_level::<H>(level);
            levels.push(next);
        }
        Self {
            levels,
            _hasher: PhantomData,
        }
    }

    /// Root hash (zero for an empty tree).
    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|l| l.first().copied())
            .unwrap_or([0u8; 32])
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// True when built over no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        if index >= leaves.len() {
            return None;
        }
        let mut idx = index;
        let mut path = Vec::with_capacity(self.levels.len());
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right = idx % 2 == 1;
            let sib_idx = if is_right { idx - 1 } else { idx + 1 };
            let sibling = level.get(sib_idx).copied().unwrap_or(level[idx]);
            path.push(ProofItem {
                side: if is_right { Side::Left } else { Side::Right },
                sibling,
            });
            idx /= 2;
        }
        Some(MerkleProof {
            leaf: leaves[index],
            path,
        })
    }
}

fn next_level<H: Digest32>(level: &[Hash32]) -> Vec<Hash32> {
    level
        .chunks(2)
        .map(|pair| {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);
            H::digest_pair(&left, &right)
        })
        .collect()
}

/// Merkle root over `items` in order.
pub fn merkle_root<H: Digest32, C: MerkleContent>(items: &[C]) -> Hash32 {
    MerkleTree::<H>::build(items).root()
}

/// Verify proof against root.
pub fn verify_proof<H: Digest32>(root: Hash32, proof: &MerkleProof) -> bool {
    let mut cur = proof.leaf;
    for item in proof.path.iter() {
        cur = match item.side {
            Side::Left => H::digest_pair(&item.sibling, &cur),
            Side::Right => H::digest_pair(&cur, &item.sibling),
        };
    }
    cur == root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::{sha256, Sha256};

    struct Blob(&'static [u8]);

    impl MerkleContent for Blob {
        fn leaf_bytes(&self) -> Vec<u8> {
            self.0.to_vec()
        }
    }

    #[test]
    fn empty_root_is_zero() {
        assert_eq!(merkle_root::<Sha256, Blob>(&[]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_pairs_with_itself() {
        let leaf = sha256(b"a");
        assert_eq!(
            merkle_root::<Sha256, _>(&[Blob(b"a")]),
            Sha256::digest_pair(&leaf, &leaf)
        );
    }

    #[test]
    fn odd_level_duplicates_last() {
        let (a, b, c) = (sha256(b"a"), sha256(b"b"), sha256(b"c"));
        let ab = Sha256::digest_pair(&a, &b);
        let cc = Sha256::digest_pair(&c, &c);
        let expected = Sha256::digest_pair(&ab, &cc);
        assert_eq!(
            merkle_root::<Sha256, _>(&[Blob(b"a"), Blob(b"b"), Blob(b"c")]),
            expected
        );
    }

    #[test]
    fn order_matters() {
        let r1 = merkle_root::<Sha256, _>(&[Blob(b"a"), Blob(b"b")]);
        let r2 = merkle_root::<Sha256, _>(&[Blob(b"b"), Blob(b"a")]);
        assert_ne!(r1, r2);
    }
}
