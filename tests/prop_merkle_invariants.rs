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

use proptest::prelude::*;

use namechain::core::crypto::{sha256, Digest32, Sha256};
use namechain::core::state::merkle::{merkle_root, verify_proof, MerkleContent, MerkleTree};

#[derive(Clone, Debug)]
struct Leaf(Vec<u8>);

impl MerkleContent for Leaf {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }
}

fn leaves() -> impl Strategy<Value = Vec<Leaf>> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..80).prop_map(Leaf), 1..64)
}

proptest! {
    #[test]
    fn proof_verifies_for_every_index(items in leaves()) {
        let tree = MerkleTree::<Sha256>::build(&items);
        let root = tree.root();
        prop_assert_eq!(root, merkle_root::<Sha256, _>(&items));
        for i in 0..items.len() {
            let proof = tree.proof(i).unwrap();
            prop_assert_eq!(proof.leaf, sha256(&items[i].0));
            prop_assert!(verify_proof::<Sha256>(root, &proof));
        }
        prop_assert!(tree.proof(items.len()).is_none());
    }

    #[test]
    fn tampered_proof_fails(items in leaves(), which in any::<prop::sample::Index>(), bit in 0usize..256) {
        let tree = MerkleTree::<Sha256>::build(&items);
        let i = which.index(items.len());
        let mut proof = tree.proof(i).unwrap();
        proof.leaf[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(!verify_proof::<Sha256>(tree.root(), &proof));
    }

    #[test]
    fn root_depends_on_order(items in leaves()) {
        prop_assume!(items.len() >= 2);
        prop_assume!(items[0].0 != items[1].0);
        let mut swapped = items.clone();
        swapped.swap(0, 1);
        prop_assert_ne!(merkle_root::<Sha256, _>(&items), merkle_root::<Sha256, _>(&swapped));
    }
}

#[test]
fn odd_level_duplicates_last_node() {
    let items = vec![Leaf(b"a".to_vec()), Leaf(b"b".to_vec()), Leaf(b"c".to_vec())];
    let (a, b, c) = (sha256(b"a"), sha256(b"b"), sha256(b"c"));
    let ab = Sha256::digest_pair(&a, &b);
    let cc = Sha256::digest_pair(&c, &c);
    assert_eq!(merkle_root::<Sha256, _>(&items), Sha256::digest_pair(&ab, &cc));
}
