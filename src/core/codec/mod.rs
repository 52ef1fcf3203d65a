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

//! Sidechain wire format.
//!
//! A block is `previous(20) || block_hash(32) || records`, where each record is a
//! one-byte length followed by that many transaction bytes.

use thiserror::Error;

/// Block wire format.
pub mod block;
/// Swarm content identifiers.
pub mod content_id;
/// Transaction wire format.
pub mod transaction;

pub use block::{Block, BlockError};
pub use content_id::content_id;
pub use transaction::{Name, Transaction, TxKind};

/// Malformed bytes. Never fatal on its own: the caller may re-fetch and retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty transaction record")]
    EmptyTransaction,
    #[error("unknown transaction tag {0}")]
    UnknownTag(u8),
    #[error("invalid size {size} for transaction tag {tag}")]
    BadSize { tag: u8, size: usize },
    #[error("non-zero separator byte")]
    BadSeparator,
    #[error("name length {0} outside 1..={}", transaction::MAX_NAME_LEN)]
    NameLength(usize),
    #[error("block too short ({0} bytes)")]
    BlockTooShort(usize),
    #[error("block too large ({0} bytes)")]
    BlockTooLarge(usize),
    #[error("truncated transaction record at offset {0}")]
    Truncated(usize),
    #[error("transaction {index}: {reason}")]
    Transaction { index: usize, reason: Box<DecodeError> },
}
