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

//! Fixed-size identifiers and canonical encoding helpers.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw 32-byte digest.
pub type Hash32 = [u8; 32];

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("serialization")]
    Serialize,
    #[error("deserialization")]
    Deserialize,
    #[error("size limit exceeded")]
    TooLarge,
}

/// Hex parsing error for identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("invalid hex")]
    Hex,
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    // Fixint encoding provides a stable integer representation.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode a stored value with deterministic rules.
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CanonicalError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CanonicalError::Serialize)
}

/// Decode a stored value with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CanonicalError> {
    if bytes.len() > max {
        return Err(CanonicalError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CanonicalError::Deserialize)
}

fn parse_hex<const N: usize>(s: &str) -> Result<[u8; N], IdParseError> {
    let raw = hex::decode(s.trim()).map_err(|_| IdParseError::Hex)?;
    if raw.len() != N {
        return Err(IdParseError::Length {
            expected: N,
            got: raw.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&raw);
    Ok(out)
}

macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Byte length.
            pub const LEN: usize = $len;

            /// Construct from raw bytes.
            pub const fn from_bytes(b: [u8; $len]) -> Self {
                Self(b)
            }

            /// Construct from a slice of exactly `LEN` bytes.
            pub fn from_slice(b: &[u8]) -> Option<Self> {
                let arr: [u8; $len] = b.try_into().ok()?;
                Some(Self(arr))
            }

            /// Return bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex rendering.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex::<$len>(s).map(Self)
            }
        }
    };
}

fixed_id!(
    /// 256-bit hash (block hashes, Merkle roots, name hashes).
    H256,
    32
);

fixed_id!(
    /// Content identifier of a sidechain block in the distribution swarm
    /// (also used as the previous-block link).
    ContentId,
    20
);

fixed_id!(
    /// Base-chain transaction id, kept in the byte order the node RPC renders it.
    Txid,
    32
);

fixed_id!(
    /// Registry owner public key.
    OwnerKey,
    32
);

fixed_id!(
    /// Hash of data published under a name.
    PublishHash,
    20
);
