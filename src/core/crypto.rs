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

//! Hash functions.

use crate::core::types::Hash32;
use ring::digest;

/// A 32-byte hashing capability, bound at compile time by Merkle and block code.
pub trait Digest32 {
    /// Hash a byte string.
    fn digest(data: &[u8]) -> Hash32;

    /// Hash the concatenation `left || right`.
    fn digest_pair(left: &[u8], right: &[u8]) -> Hash32 {
        let mut buf = Vec::with_capacity(left.len() + right.len());
        buf.extend_from_slice(left);
        buf.extend_from_slice(right);
        Self::digest(&buf)
    }
}

/// SHA-256 (the sidechain's consensus hash).
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256;

impl Digest32 for Sha256 {
    fn digest(data: &[u8]) -> Hash32 {
        sha256(data)
    }

    fn digest_pair(left: &[u8], right: &[u8]) -> Hash32 {
        let mut ctx = digest::Context::new(&digest::SHA256);
        ctx.update(left);
        ctx.update(right);
        let mut out = [0u8; 32];
        out.copy_from_slice(ctx.finish().as_ref());
        out
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash32 {
    let d = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// SHA-1 of `data`. Only used for swarm info-hashes, never for consensus.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let d = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data);
    let mut out = [0u8; 20];
    out.copy_from_slice(d.as_ref());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha1_known_vector() {
        assert_eq!(
            hex::encode(sha1(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn pair_matches_concatenation() {
        assert_eq!(Sha256::digest_pair(b"ab", b"c"), sha256(b"abc"));
    }
}
