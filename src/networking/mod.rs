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
#![allow(missing_docs)]

//! Networking: content swarm seam, block fetcher, libp2p swarm and provider scoring.

pub mod fetcher;
pub mod p2p;
pub mod p2p_identity;
pub mod peer_score;
pub mod swarm;

pub use fetcher::{BlockFetcher, FetchError, FetcherConfig};
pub use swarm::{ContentSwarm, MemorySwarm, SwarmError, SwarmHandle};
