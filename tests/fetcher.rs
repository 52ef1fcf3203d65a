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

use namechain::core::codec::content_id;
use namechain::core::types::ContentId;
use namechain::networking::fetcher::{BlockFetcher, FetchError, FetcherConfig};
use namechain::networking::swarm::{ContentSwarm, MemorySwarm};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fetcher(swarm: &Arc<MemorySwarm>, ceiling: Duration) -> BlockFetcher<MemorySwarm> {
    BlockFetcher::new(
        swarm.clone(),
        FetcherConfig {
            ceiling,
            grace: Duration::from_millis(20),
        },
    )
}

#[tokio::test]
async fn slow_transfer_hits_the_ceiling() {
    let swarm = Arc::new(MemorySwarm::with_transfer_delay(Duration::from_millis(500)));
    let id = swarm.provide(vec![3u8; 64]);
    let f = fetcher(&swarm, Duration::from_millis(50));

    let started = Instant::now();
    match f.fetch(id).await {
        Err(FetchError::Timeout { id: got, after }) => {
            assert_eq!(got, id);
            assert_eq!(after, Duration::from_millis(50));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(swarm.release_count(&id), 1);
    assert_eq!(f.inflight(), 0);
}

#[tokio::test]
async fn concurrent_fetches_share_one_download() {
    let swarm = Arc::new(MemorySwarm::with_transfer_delay(Duration::from_millis(50)));
    let bytes = vec![9u8; 256];
    let id = swarm.provide(bytes.clone());
    let f = fetcher(&swarm, Duration::from_secs(2));

    let g = f.clone();
    let (a, b, c) = tokio::join!(f.fetch(id), f.fetch(id), g.fetch(id));
    assert_eq!(*a.unwrap(), bytes);
    assert_eq!(*b.unwrap(), bytes);
    assert_eq!(*c.unwrap(), bytes);
    assert_eq!(swarm.announce_count(&id), 1);
    assert_eq!(f.inflight(), 0);

    // A later request starts a fresh download.
    f.fetch(id).await.unwrap();
    assert_eq!(swarm.announce_count(&id), 2);
}

#[tokio::test]
async fn content_provided_late_still_arrives() {
    let swarm = Arc::new(MemorySwarm::new());
    let bytes = b"late block".to_vec();
    let id = content_id(&bytes);
    let f = fetcher(&swarm, Duration::from_secs(2));

    let provider = swarm.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        provider.provide(bytes);
    });
    assert_eq!(*f.fetch(id).await.unwrap(), b"late block".to_vec());
}

#[tokio::test]
async fn wrong_bytes_are_not_accepted() {
    let swarm = Arc::new(MemorySwarm::new());
    let id = ContentId::from_bytes([0x42; 20]);
    swarm.provide_as(id, vec![0u8; 10]);
    let f = fetcher(&swarm, Duration::from_secs(1));

    match f.fetch(id).await {
        Err(FetchError::ContentMismatch {
            requested,
            received,
        }) => {
            assert_eq!(requested, id);
            assert_eq!(received, content_id(&[0u8; 10]));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn completed_block_is_seeded_for_the_grace_window() {
    let swarm = Arc::new(MemorySwarm::new());
    let id = swarm.provide(vec![1u8; 32]);
    let f = fetcher(&swarm, Duration::from_secs(1));

    f.fetch(id).await.unwrap();
    assert_eq!(swarm.release_count(&id), 0);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(swarm.release_count(&id), 1);
}

#[tokio::test]
async fn seeded_bytes_become_fetchable() {
    let swarm = Arc::new(MemorySwarm::new());
    let f = fetcher(&swarm, Duration::from_secs(1));
    let id = f.seed(vec![5u8; 48]).await.unwrap();
    assert_eq!(id, content_id(&[5u8; 48]));
    assert_eq!(swarm.seed(vec![5u8; 48]).await.unwrap(), id);
    assert_eq!(*f.fetch(id).await.unwrap(), vec![5u8; 48]);
}
