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

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use namechain::core::crypto::Sha256;
use namechain::core::state::merkle::{verify_proof, MerkleTree};

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    leaves: Vec<[u8; 32]>,
    index: u16,
}

fuzz_target!(|inp: Input| {
    let tree = MerkleTree::<Sha256>::from_leaves(inp.leaves);
    if tree.is_empty() {
        return;
    }
    let idx = (inp.index as usize) % tree.len();
    if let Some(p) = tree.proof(idx) {
        assert!(verify_proof::<Sha256>(tree.root(), &p));
    }
});
