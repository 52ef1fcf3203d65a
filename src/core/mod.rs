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

//! Core protocol primitives.

/// Hash functions and the Merkle hashing capability.
pub mod crypto;
/// Sidechain block and transaction wire format.
pub mod codec;
/// Persistent state: Merkle tree, stores, chain-state engine.
pub mod state;
/// Fixed-size identifiers and canonical encoding helpers.
pub mod types;
/// Base-chain watcher driving the block pipeline.
pub mod watcher;
