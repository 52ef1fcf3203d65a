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

//! Namechain - a name registry sidechain anchored to Bitcoin.
//!
//! This crate provides:
//! - The sidechain block/transaction wire codec with Merkle integrity checks
//! - A sled-backed chain-state engine that validates and applies registry operations
//! - A content-addressed block fetcher over a libp2p swarm
//! - The base-chain watcher that follows commitment transactions and checkpoints progress
//! - Control-plane RPC dispatch and Prometheus metrics

/// Base-chain data sources (Bitcoin Core RPC).
pub mod chain;
/// Node configuration.
pub mod config;
/// Core protocol primitives (types, codec, state, watcher).
pub mod core;
/// Observability (metrics).
pub mod monitoring;
/// Block distribution networking (swarm, fetcher, reputation).
pub mod networking;
/// Control-plane request dispatch.
pub mod rpc;
