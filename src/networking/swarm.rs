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

//! Content-addressed distribution network seam.

use crate::core::codec::content_id;
use crate::core::types::ContentId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// Swarm errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwarmError {
    #[error("swarm unavailable")]
    Unavailable,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transfer: {0}")]
    Transfer(String),
}

/// Participation in one content swarm.
#[async_trait]
pub trait SwarmHandle: Send + Sync + 'static {
    /// Content this handle tracks.
    fn content_id(&self) -> ContentId;

    /// Resolve once every piece is held locally.
    async fn completed(&self) -> Result<Vec<u8>, SwarmError>;

    /// `completed` bounded by `timeout`.
    async fn await_complete(&self, timeout: Duration) -> Result<Vec<u8>, SwarmError> {
        match tokio::time::timeout(timeout, self.completed()).await {
            Ok(r) => r,
            Err(_) => Err(SwarmError::Timeout(timeout)),
        }
    }

    /// Stop serving the content and free its resources.
    async fn release(&self);
}

/// Content-addressed distribution network.
#[async_trait]
pub trait ContentSwarm: Send + Sync + 'static {
    /// Handle type.
    type Handle: SwarmHandle;

    /// Join the swarm for `id` and start retrieving.
    async fn announce(&self, id: ContentId) -> Result<Self::Handle, SwarmError>;

    /// Serve `bytes` to peers. Returns their content id.
    async fn seed(&self, bytes: Vec<u8>) -> Result<ContentId, SwarmError>;
}

#[derive(Default)]
struct MemoryState {
    content: HashMap<ContentId, Vec<u8>>,
    announces: HashMap<ContentId, usize>,
    releases: HashMap<ContentId, usize>,
}

struct MemoryInner {
    state: Mutex<MemoryState>,
    arrived: Notify,
    transfer_delay: Duration,
}

/// In-process swarm. Content becomes available once some peer provides it
/// and arrives `transfer_delay` after completion is awaited.
#[derive(Clone)]
pub struct MemorySwarm {
    inner: Arc<MemoryInner>,
}

impl Default for MemorySwarm {
    fn default() -> Self {
        Self::with_transfer_delay(Duration::ZERO)
    }
}

impl MemorySwarm {
    /// Swarm with instant transfers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Swarm where every transfer takes `delay`.
    pub fn with_transfer_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState::default()),
                arrived: Notify::new(),
                transfer_delay: delay,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A remote peer starts providing `bytes`.
    pub fn provide(&self, bytes: Vec<u8>) -> ContentId {
        let id = content_id(&bytes);
        self.provide_as(id, bytes);
        id
    }

    /// A remote peer starts providing `bytes` under `id`, matching or not.
    pub fn provide_as(&self, id: ContentId, bytes: Vec<u8>) {
        self.state().content.insert(id, bytes);
        self.inner.arrived.notify_waiters();
    }

    /// Times `id` was announced.
    pub fn announce_count(&self, id: &ContentId) -> usize {
        self.state().announces.get(id).copied().unwrap_or(0)
    }

    /// Times a handle for `id` was released.
    pub fn release_count(&self, id: &ContentId) -> usize {
        self.state().releases.get(id).copied().unwrap_or(0)
    }
}

/// Handle into a `MemorySwarm`.
pub struct MemoryHandle {
    id: ContentId,
    swarm: MemorySwarm,
}

#[async_trait]
impl SwarmHandle for MemoryHandle {
    fn content_id(&self) -> ContentId {
        self.id
    }

    async fn completed(&self) -> Result<Vec<u8>, SwarmError> {
        let bytes = loop {
            let arrived = self.swarm.inner.arrived.notified();
            let ready = self.swarm.state().content.get(&self.id).cloned();
            if let Some(b) = ready {
                break b;
            }
            arrived.await;
        };
        tokio::time::sleep(self.swarm.inner.transfer_delay).await;
        Ok(bytes)
    }

    async fn release(&self) {
        *self.swarm.state().releases.entry(self.id).or_default() += 1;
    }
}

#[async_trait]
impl ContentSwarm for MemorySwarm {
    type Handle = MemoryHandle;

    async fn announce(&self, id: ContentId) -> Result<MemoryHandle, SwarmError> {
        *self.state().announces.entry(id).or_default() += 1;
        Ok(MemoryHandle {
            id,
            swarm: self.clone(),
        })
    }

    async fn seed(&self, bytes: Vec<u8>) -> Result<ContentId, SwarmError> {
        Ok(self.provide(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn await_complete_times_out_on_slow_transfer() {
        let swarm = MemorySwarm::with_transfer_delay(Duration::from_millis(500));
        let id = swarm.provide(vec![1, 2, 3]);
        let h = swarm.announce(id).await.unwrap();
        let r = h.await_complete(Duration::from_millis(20)).await;
        assert_eq!(r, Err(SwarmError::Timeout(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn content_provided_after_announce_is_delivered() {
        let swarm = MemorySwarm::new();
        let bytes = vec![9u8; 64];
        let id = content_id(&bytes);
        let h = swarm.announce(id).await.unwrap();
        let s2 = swarm.clone();
        let b2 = bytes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            s2.provide(b2);
        });
        assert_eq!(h.await_complete(Duration::from_secs(5)).await.unwrap(), bytes);
        assert_eq!(swarm.announce_count(&id), 1);
    }
}
