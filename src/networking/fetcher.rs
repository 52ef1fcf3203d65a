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

//! Block retrieval by content id.
//!
//! One retrieval per content id is in flight at a time; later callers attach
//! to it. After completion the handle keeps serving peers for a grace window.

use crate::core::codec::content_id;
use crate::core::types::ContentId;
use crate::networking::swarm::{ContentSwarm, SwarmError, SwarmHandle};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Ceiling on a single retrieval.
pub const FETCH_CEILING: Duration = Duration::from_secs(10 * 60);
/// How long a completed block keeps being served.
pub const SEED_GRACE: Duration = Duration::from_secs(30 * 60);

/// Fetch errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch of {id} timed out after {after:?}")]
    Timeout { id: ContentId, after: Duration },
    #[error("swarm: {0}")]
    Swarm(SwarmError),
    #[error("content mismatch: requested {requested}, received {received}")]
    ContentMismatch {
        requested: ContentId,
        received: ContentId,
    },
    #[error("fetch task aborted")]
    Aborted,
}

/// Fetcher timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Retrieval ceiling.
    pub ceiling: Duration,
    /// Post-completion seeding window.
    pub grace: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ceiling: FETCH_CEILING,
            grace: SEED_GRACE,
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Vec<u8>>, FetchError>>>;
type Inflight = Arc<Mutex<HashMap<ContentId, SharedFetch>>>;

/// Block fetcher over a `ContentSwarm`.
pub struct BlockFetcher<S: ContentSwarm> {
    swarm: Arc<S>,
    cfg: FetcherConfig,
    inflight: Inflight,
}

impl<S: ContentSwarm> Clone for BlockFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            swarm: self.swarm.clone(),
            cfg: self.cfg,
            inflight: self.inflight.clone(),
        }
    }
}

fn lock(inflight: &Inflight) -> MutexGuard<'_, HashMap<ContentId, SharedFetch>> {
    inflight.lock().unwrap_or_else(|e| e.into_inner())
}

impl<S: ContentSwarm> BlockFetcher<S> {
    /// Fetcher with the given timing.
    pub fn new(swarm: Arc<S>, cfg: FetcherConfig) -> Self {
        Self {
            swarm,
            cfg,
            inflight: Arc::default(),
        }
    }

    /// Underlying swarm.
    pub fn swarm(&self) -> &Arc<S> {
        &self.swarm
    }

    /// Retrievals currently in flight.
    pub fn inflight(&self) -> usize {
        lock(&self.inflight).len()
    }

    /// Retrieve the block with content id `id`, verifying the bytes against it.
    pub async fn fetch(&self, id: ContentId) -> Result<Arc<Vec<u8>>, FetchError> {
        let fut = {
            let mut g = lock(&self.inflight);
            match g.get(&id) {
                Some(f) => {
                    debug!(content_id = %id, "joining in-flight fetch");
                    f.clone()
                }
                None => {
                    let task = tokio::spawn(retrieve(
                        self.swarm.clone(),
                        self.cfg,
                        id,
                        self.inflight.clone(),
                    ));
                    let f = async move { task.await.unwrap_or(Err(FetchError::Aborted)) }
                        .boxed()
                        .shared();
                    g.insert(id, f.clone());
                    f
                }
            }
        };
        fut.await
    }

    /// Serve locally produced block bytes to peers.
    pub async fn seed(&self, bytes: Vec<u8>) -> Result<ContentId, FetchError> {
        self.swarm.seed(bytes).await.map_err(FetchError::Swarm)
    }
}

async fn retrieve<S: ContentSwarm>(
    swarm: Arc<S>,
    cfg: FetcherConfig,
    id: ContentId,
    inflight: Inflight,
) -> Result<Arc<Vec<u8>>, FetchError> {
    let result = download(&*swarm, cfg, id).await;
    lock(&inflight).remove(&id);
    result
}

async fn download<S: ContentSwarm>(
    swarm: &S,
    cfg: FetcherConfig,
    id: ContentId,
) -> Result<Arc<Vec<u8>>, FetchError> {
    info!(content_id = %id, "downloading sidechain block");
    let handle = swarm.announce(id).await.map_err(FetchError::Swarm)?;
    let bytes = match handle.await_complete(cfg.ceiling).await {
        Ok(b) => b,
        Err(e) => {
            handle.release().await;
            return Err(match e {
                SwarmError::Timeout(_) => FetchError::Timeout {
                    id,
                    after: cfg.ceiling,
                },
                other => FetchError::Swarm(other),
            });
        }
    };

    let received = content_id(&bytes);
    if received != id {
        warn!(requested = %id, received = %received, "fetched bytes do not match content id");
        handle.release().await;
        return Err(FetchError::ContentMismatch {
            requested: id,
            received,
        });
    }

    debug!(content_id = %id, len = bytes.len(), grace = ?cfg.grace, "block complete, seeding");
    let grace = cfg.grace;
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        handle.release().await;
        debug!(content_id = %handle.content_id(), "stopped seeding");
    });
    Ok(Arc::new(bytes))
}
