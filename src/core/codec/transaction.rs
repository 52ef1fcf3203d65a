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

//! Registry transactions.
//!
//! | kind     | tag | size   | layout                                        |
//! |----------|-----|--------|-----------------------------------------------|
//! | Acquire  | 1   | 66     | tag, owner(32), 0x00, name_hash(32)           |
//! | Transfer | 2   | 33     | tag, name_hash(32)                            |
//! | Renew    | 3   | 66     | tag, name_hash(32), 0x00, ref_block(32)       |
//! | Publish  | 4   | 23-255 | tag, publish_hash(20), 0x00, name(1..=233)    |
//!
//! Publish names are opaque bytes; only their length is checked.

use super::DecodeError;
use crate::core::crypto::sha256;
use crate::core::state::merkle::MerkleContent;
use crate::core::types::{OwnerKey, PublishHash, H256};
use std::fmt;

/// Acquire tag.
pub const TAG_ACQUIRE: u8 = 1;
/// Transfer tag.
pub const TAG_TRANSFER: u8 = 2;
/// Renew tag.
pub const TAG_RENEW: u8 = 3;
/// Publish tag.
pub const TAG_PUBLISH: u8 = 4;

/// Upper bound of any serialized transaction (one-byte length prefix).
pub const MAX_TX_SIZE: usize = u8::MAX as usize;
const PAIR_SIZE: usize = 66;
const TRANSFER_SIZE: usize = 33;
const PUBLISH_HEADER: usize = 22;
/// Longest publishable name in bytes.
pub const MAX_NAME_LEN: usize = MAX_TX_SIZE - PUBLISH_HEADER;

/// A registry name: 1..=MAX_NAME_LEN raw bytes, not necessarily UTF-8.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    /// Validate and wrap a name.
    pub fn new(name: impl Into<Vec<u8>>) -> Result<Self, DecodeError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(DecodeError::NameLength(name.len()));
        }
        Ok(Self(name))
    }

    /// Raw name bytes as carried on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Name as text, with invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Registry key for this name.
    pub fn hash(&self) -> H256 {
        name_hash(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => fmt::Debug::fmt(s, f),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Registry key of a raw name: SHA-256 of its bytes.
pub fn name_hash(name: impl AsRef<[u8]>) -> H256 {
    H256::from_bytes(sha256(name.as_ref()))
}

/// Transaction kind, for logs and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxKind {
    /// Claim an unowned name hash.
    Acquire,
    /// Hand a name to a new owner.
    Transfer,
    /// Keep a name alive.
    Renew,
    /// Attach a name and data hash to an acquired hash.
    Publish,
}

/// A sidechain registry transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// Claim `name_hash` for `owner`.
    Acquire {
        /// Acquirer's public key.
        owner: OwnerKey,
        /// SHA-256 of the name being claimed.
        name_hash: H256,
    },
    /// Transfer the name at `name_hash`; the recipient comes with the authorization.
    Transfer {
        /// Target name hash.
        name_hash: H256,
    },
    /// Renew `name_hash` against a recent block.
    Renew {
        /// Name hash being renewed.
        name_hash: H256,
        /// Hash of one of the most recent accepted blocks.
        ref_block: H256,
    },
    /// Publish `name` with a data hash.
    Publish {
        /// Hash of the published data.
        publish_hash: PublishHash,
        /// Plain name; its SHA-256 is the registry key.
        name: Name,
    },
}

impl Transaction {
    /// Wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            Transaction::Acquire { .. } => TAG_ACQUIRE,
            Transaction::Transfer { .. } => TAG_TRANSFER,
            Transaction::Renew { .. } => TAG_RENEW,
            Transaction::Publish { .. } => TAG_PUBLISH,
        }
    }

    /// Kind without payload.
    pub fn kind(&self) -> TxKind {
        match self {
            Transaction::Acquire { .. } => TxKind::Acquire,
            Transaction::Transfer { .. } => TxKind::Transfer,
            Transaction::Renew { .. } => TxKind::Renew,
            Transaction::Publish { .. } => TxKind::Publish,
        }
    }

    /// Registry key this transaction operates on.
    pub fn name_hash(&self) -> H256 {
        match self {
            Transaction::Acquire { name_hash, .. }
            | Transaction::Transfer { name_hash }
            | Transaction::Renew { name_hash, .. } => *name_hash,
            Transaction::Publish { name, .. } => name.hash(),
        }
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Transaction::Acquire { .. } | Transaction::Renew { .. } => PAIR_SIZE,
            Transaction::Transfer { .. } => TRANSFER_SIZE,
            Transaction::Publish { name, .. } => PUBLISH_HEADER + name.as_bytes().len(),
        }
    }

    /// Serialize. Always at most `MAX_TX_SIZE` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.tag());
        match self {
            Transaction::Acquire { owner, name_hash } => {
                out.extend_from_slice(owner.as_bytes());
                out.push(0);
                out.extend_from_slice(name_hash.as_bytes());
            }
            Transaction::Transfer { name_hash } => {
                out.extend_from_slice(name_hash.as_bytes());
            }
            Transaction::Renew {
                name_hash,
                ref_block,
            } => {
                out.extend_from_slice(name_hash.as_bytes());
                out.push(0);
                out.extend_from_slice(ref_block.as_bytes());
            }
            Transaction::Publish { publish_hash, name } => {
                out.extend_from_slice(publish_hash.as_bytes());
                out.push(0);
                out.extend_from_slice(name.as_bytes());
            }
        }
        out
    }

    /// Parse one transaction record body.
    pub fn from_bytes(b: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, _) = b.split_first().ok_or(DecodeError::EmptyTransaction)?;
        let size_ok = match tag {
            TAG_ACQUIRE | TAG_RENEW => b.len() == PAIR_SIZE,
            TAG_TRANSFER => b.len() == TRANSFER_SIZE,
            TAG_PUBLISH => (PUBLISH_HEADER + 1..=MAX_TX_SIZE).contains(&b.len()),
            other => return Err(DecodeError::UnknownTag(other)),
        };
        if !size_ok {
            return Err(DecodeError::BadSize { tag, size: b.len() });
        }

        match tag {
            TAG_ACQUIRE => {
                separator(b, 33)?;
                Ok(Transaction::Acquire {
                    owner: OwnerKey::from_bytes(array(&b[1..33])),
                    name_hash: H256::from_bytes(array(&b[34..66])),
                })
            }
            TAG_TRANSFER => Ok(Transaction::Transfer {
                name_hash: H256::from_bytes(array(&b[1..33])),
            }),
            TAG_RENEW => {
                separator(b, 33)?;
                Ok(Transaction::Renew {
                    name_hash: H256::from_bytes(array(&b[1..33])),
                    ref_block: H256::from_bytes(array(&b[34..66])),
                })
            }
            _ => {
                separator(b, 21)?;
                Ok(Transaction::Publish {
                    publish_hash: PublishHash::from_bytes(array(&b[1..21])),
                    name: Name::new(&b[PUBLISH_HEADER..])?,
                })
            }
        }
    }
}

impl MerkleContent for Transaction {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.to_bytes()
    }
}

fn separator(b: &[u8], at: usize) -> Result<(), DecodeError> {
    if b[at] != 0 {
        return Err(DecodeError::BadSeparator);
    }
    Ok(())
}

// Callers slice exactly N bytes after the size check.
fn array<const N: usize>(s: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(s);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(name: &str) -> Transaction {
        Transaction::Publish {
            publish_hash: PublishHash::from_bytes([7; 20]),
            name: Name::new(name).unwrap(),
        }
    }

    #[test]
    fn sizes_match_table() {
        let acquire = Transaction::Acquire {
            owner: OwnerKey::from_bytes([1; 32]),
            name_hash: name_hash("alice"),
        };
        assert_eq!(acquire.to_bytes().len(), 66);
        assert_eq!(
            Transaction::Transfer {
                name_hash: name_hash("alice")
            }
            .to_bytes()
            .len(),
            33
        );
        assert_eq!(publish("a").to_bytes().len(), 23);
        assert_eq!(publish(&"x".repeat(MAX_NAME_LEN)).to_bytes().len(), 255);
    }

    #[test]
    fn publish_name_hash_is_sha256_of_name() {
        assert_eq!(publish("alice").name_hash(), name_hash("alice"));
    }

    #[test]
    fn rejects_overlong_name() {
        assert_eq!(
            Name::new("x".repeat(MAX_NAME_LEN + 1)),
            Err(DecodeError::NameLength(MAX_NAME_LEN + 1))
        );
    }

    #[test]
    fn rejects_nonzero_separator() {
        let mut b = publish("bob").to_bytes();
        b[21] = 1;
        assert_eq!(Transaction::from_bytes(&b), Err(DecodeError::BadSeparator));
    }

    #[test]
    fn non_utf8_name_round_trips() {
        let mut b = publish("bob").to_bytes();
        b[22] = 0xff;
        let tx = Transaction::from_bytes(&b).unwrap();
        assert_eq!(tx.name_hash(), name_hash([0xffu8, b'o', b'b']));
        assert_eq!(tx.to_bytes(), b);
    }
}
