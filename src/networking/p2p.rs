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

//! libp2p content swarm.
//!
//! Providers of a block are found through Kademlia provider records keyed by
//! content id. The bytes move over a CBOR request/response protocol. Every
//! response is hashed before it is accepted, and providers that serve bad
//! bytes are banned for a while. Held blocks are announced as provider
//! records until released.

use crate::core::codec::content_id;
use crate::core::types::ContentId;
use crate::monitoring::metrics::Metrics;
use crate::networking::peer_score::{
    ProviderScore, ScoreParams, BAD_CONTENT, FAILED_REQUEST, SERVED_BLOCK,
};
use crate::networking::swarm::{ContentSwarm, SwarmError, SwarmHandle};
use async_trait::async_trait;
use futures::StreamExt;
use libp2p::{
    identify, identity,
    kad::{self, store::MemoryStore, GetProvidersOk, QueryId, QueryResult, RecordKey},
    multiaddr::Protocol,
    noise, ping,
    request_response::{self, OutboundRequestId, ProtocolSupport, ResponseChannel},
    swarm::{NetworkBehaviour, SwarmEvent},
    tcp, yamux, Multiaddr, PeerId, StreamProtocol, Swarm,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

/// Block transfer protocol.
pub const BLOCK_PROTOCOL: StreamProtocol = StreamProtocol::new("/namechain/block/1");
const IDENTIFY_PROTOCOL: &str = "/namechain/id/1";

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("config: {0}")]
    Config(String),
}

/// Runtime configuration for the swarm.
#[derive(Clone, Debug)]
pub struct P2pConfig {
    /// Listen address (e.g. "/ip4/0.0.0.0/tcp/24336").
    pub listen_addr: String,
    /// Bootstrap peers, each ending in `/p2p/<peer id>`.
    pub bootstrap: Vec<String>,
    /// Concurrent block requests per content id.
    pub max_parallel: usize,
    /// How often unresolved fetches re-query providers.
    pub requery_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/24336".into(),
            bootstrap: Vec::new(),
            max_parallel: 3,
            requery_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Request for a block by content id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    /// Requested content id.
    pub content_id: ContentId,
}

/// Block bytes, or `None` if the peer no longer holds them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResponse {
    /// Raw block bytes.
    pub block: Option<Vec<u8>>,
}

#[derive(NetworkBehaviour)]
struct BlockBehaviour {
    kad: kad::Behaviour<MemoryStore>,
    blocks: request_response::cbor::Behaviour<BlockRequest, BlockResponse>,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

type FetchReply = oneshot::Sender<Result<Vec<u8>, SwarmError>>;

enum Command {
    Fetch { id: ContentId, reply: FetchReply },
    Seed { bytes: Vec<u8>, reply: oneshot::Sender<ContentId> },
    Release { id: ContentId },
}

#[derive(Default)]
struct Pending {
    waiters: Vec<FetchReply>,
    candidates: Vec<PeerId>,
    tried: HashSet<PeerId>,
    in_flight: usize,
    querying: bool,
}

fn record_key(id: &ContentId) -> RecordKey {
    RecordKey::new(id.as_bytes())
}

fn content_key(key: &RecordKey) -> Option<ContentId> {
    ContentId::from_slice(key.as_ref())
}

/// Client side of the swarm driver. Cheap to clone.
#[derive(Clone)]
pub struct P2pSwarm {
    cmd: mpsc::Sender<Command>,
    peer_id: PeerId,
}

impl P2pSwarm {
    /// Local peer id.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

enum HandleState {
    Waiting(oneshot::Receiver<Result<Vec<u8>, SwarmError>>),
    Done(Result<Vec<u8>, SwarmError>),
}

/// Handle for one content id in the libp2p swarm.
pub struct P2pHandle {
    id: ContentId,
    state: Mutex<HandleState>,
    cmd: mpsc::Sender<Command>,
}

#[async_trait]
impl SwarmHandle for P2pHandle {
    fn content_id(&self) -> ContentId {
        self.id
    }

    async fn completed(&self) -> Result<Vec<u8>, SwarmError> {
        let mut g = self.state.lock().await;
        if let HandleState::Waiting(rx) = &mut *g {
            let r = rx.await.unwrap_or(Err(SwarmError::Unavailable));
            *g = HandleState::Done(r);
        }
        match &*g {
            HandleState::Done(r) => r.clone(),
            HandleState::Waiting(_) => Err(SwarmError::Unavailable),
        }
    }

    async fn release(&self) {
        let _ = self.cmd.send(Command::Release { id: self.id }).await;
    }
}

#[async_trait]
impl ContentSwarm for P2pSwarm {
    type Handle = P2pHandle;

    async fn announce(&self, id: ContentId) -> Result<P2pHandle, SwarmError> {
        let (reply, rx) = oneshot::channel();
        self.cmd
            .send(Command::Fetch { id, reply })
            .await
            .map_err(|_| SwarmError::Unavailable)?;
        Ok(P2pHandle {
            id,
            state: Mutex::new(HandleState::Waiting(rx)),
            cmd: self.cmd.clone(),
        })
    }

    async fn seed(&self, bytes: Vec<u8>) -> Result<ContentId, SwarmError> {
        let (reply, rx) = oneshot::channel();
        self.cmd
            .send(Command::Seed { bytes, reply })
            .await
            .map_err(|_| SwarmError::Unavailable)?;
        rx.await.map_err(|_| SwarmError::Unavailable)
    }
}

fn peer_of(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|p| match p {
        Protocol::P2p(id) => Some(id),
        _ => None,
    })
}

/// Start the swarm driver. Must be called inside a tokio runtime.
pub fn spawn_p2p(
    cfg: P2pConfig,
    keypair: identity::Keypair,
    metrics: Option<Metrics>,
) -> Result<(P2pSwarm, tokio::task::JoinHandle<()>), P2pError> {
    let peer_id = PeerId::from(keypair.public());
    let request_timeout = cfg.request_timeout;

    let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .with_dns()
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .with_behaviour(|key| {
            let local = PeerId::from(key.public());
            let mut kad = kad::Behaviour::new(local, MemoryStore::new(local));
            kad.set_mode(Some(kad::Mode::Server));
            BlockBehaviour {
                kad,
                blocks: request_response::cbor::Behaviour::new(
                    [(BLOCK_PROTOCOL, ProtocolSupport::Full)],
                    request_response::Config::default().with_request_timeout(request_timeout),
                ),
                identify: identify::Behaviour::new(identify::Config::new(
                    IDENTIFY_PROTOCOL.into(),
                    key.public(),
                )),
                ping: ping::Behaviour::new(ping::Config::new()),
            }
        })
        .map_err(|e| P2pError::Config(e.to_string()))?
        .with_swarm_config(|c| c.with_idle_connection_timeout(Duration::from_secs(120)))
        .build();

    let listen: Multiaddr = cfg
        .listen_addr
        .parse()
        .map_err(|e| P2pError::Config(format!("listen_addr: {e}")))?;
    swarm
        .listen_on(listen)
        .map_err(|e| P2pError::Transport(e.to_string()))?;

    for b in &cfg.bootstrap {
        let addr: Multiaddr = b
            .parse()
            .map_err(|e| P2pError::Config(format!("bootstrap {b}: {e}")))?;
        let peer = peer_of(&addr)
            .ok_or_else(|| P2pError::Config(format!("bootstrap {b}: missing /p2p/<peer id>")))?;
        swarm.behaviour_mut().kad.add_address(&peer, addr.clone());
        if let Err(e) = swarm.dial(addr) {
            warn!(peer = %peer, error = %e, "bootstrap dial failed");
        }
    }
    if !cfg.bootstrap.is_empty() {
        let _ = swarm.behaviour_mut().kad.bootstrap();
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let driver = Driver {
        swarm,
        cmd_rx,
        cfg,
        local: peer_id,
        held: HashMap::new(),
        pending: HashMap::new(),
        queries: HashMap::new(),
        requests: HashMap::new(),
        scores: ProviderScore::new(ScoreParams::default()),
        metrics,
    };
    info!(peer_id = %peer_id, "swarm started");
    let join = tokio::spawn(driver.run());
    Ok((
        P2pSwarm {
            cmd: cmd_tx,
            peer_id,
        },
        join,
    ))
}

struct Driver {
    swarm: Swarm<BlockBehaviour>,
    cmd_rx: mpsc::Receiver<Command>,
    cfg: P2pConfig,
    local: PeerId,
    held: HashMap<ContentId, Arc<Vec<u8>>>,
    pending: HashMap<ContentId, Pending>,
    queries: HashMap<QueryId, ContentId>,
    requests: HashMap<OutboundRequestId, (ContentId, PeerId)>,
    scores: ProviderScore<PeerId>,
    metrics: Option<Metrics>,
}

impl Driver {
    async fn run(mut self) {
        let mut requery = tokio::time::interval(self.cfg.requery_interval);
        requery.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(c) => self.on_command(c),
                    None => break,
                },
                ev = self.swarm.select_next_some() => self.on_swarm_event(ev),
                _ = requery.tick() => self.requery(),
            }
        }
        debug!("swarm driver stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Fetch { id, reply } => {
                if let Some(b) = self.held.get(&id) {
                    let _ = reply.send(Ok(b.to_vec()));
                    return;
                }
                let p = self.pending.entry(id).or_default();
                p.waiters.push(reply);
                if !p.querying && p.in_flight == 0 {
                    self.query(id);
                }
            }
            Command::Seed { bytes, reply } => {
                let id = content_id(&bytes);
                self.hold(id, bytes);
                let _ = reply.send(id);
            }
            Command::Release { id } => {
                if self.held.remove(&id).is_some() {
                    self.swarm.behaviour_mut().kad.stop_providing(&record_key(&id));
                    debug!(content_id = %id, "released");
                }
                // Dropping the waiters resolves their handles as unavailable.
                self.pending.remove(&id);
            }
        }
    }

    fn query(&mut self, id: ContentId) {
        let qid = self.swarm.behaviour_mut().kad.get_providers(record_key(&id));
        self.queries.insert(qid, id);
        if let Some(p) = self.pending.get_mut(&id) {
            p.querying = true;
        }
    }

    fn requery(&mut self) {
        let idle: Vec<ContentId> = self
            .pending
            .iter()
            .filter(|(_, p)| !p.querying && p.in_flight == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in idle {
            if let Some(p) = self.pending.get_mut(&id) {
                p.tried.clear();
            }
            debug!(content_id = %id, "re-querying providers");
            self.query(id);
        }
    }

    fn hold(&mut self, id: ContentId, bytes: Vec<u8>) {
        let bytes = Arc::new(bytes);
        self.held.insert(id, bytes.clone());
        if let Err(e) = self.swarm.behaviour_mut().kad.start_providing(record_key(&id)) {
            warn!(content_id = %id, error = ?e, "cannot announce provider record");
        }
        if let Some(p) = self.pending.remove(&id) {
            for w in p.waiters {
                let _ = w.send(Ok(bytes.to_vec()));
            }
        }
    }

    fn dispatch(&mut self, id: ContentId) {
        let now = Instant::now();
        let Some(p) = self.pending.get_mut(&id) else {
            return;
        };
        let candidates = std::mem::take(&mut p.candidates);
        let mut ranked = self.scores.rank(candidates, now).into_iter();
        while p.in_flight < self.cfg.max_parallel {
            let Some(peer) = ranked.next() else { break };
            p.tried.insert(peer);
            p.in_flight += 1;
            let rid = self
                .swarm
                .behaviour_mut()
                .blocks
                .send_request(&peer, BlockRequest { content_id: id });
            self.requests.insert(rid, (id, peer));
            debug!(content_id = %id, peer = %peer, "block requested");
        }
        p.candidates.extend(ranked);
    }

    fn on_response(&mut self, rid: OutboundRequestId, block: Option<Vec<u8>>) {
        let Some((id, peer)) = self.requests.remove(&rid) else {
            return;
        };
        if let Some(p) = self.pending.get_mut(&id) {
            p.in_flight = p.in_flight.saturating_sub(1);
        }
        let now = Instant::now();
        match block {
            Some(bytes) if content_id(&bytes) == id => {
                self.scores.observe_good(peer, now, SERVED_BLOCK);
                info!(content_id = %id, peer = %peer, len = bytes.len(), "block received");
                self.hold(id, bytes);
            }
            Some(_) => {
                warn!(content_id = %id, peer = %peer, "provider served mismatched bytes");
                self.scores.observe_bad(peer, now, BAD_CONTENT);
                if let Some(m) = &self.metrics {
                    m.fetch_mismatch_total.inc();
                }
                self.dispatch(id);
            }
            None => {
                self.scores.observe_bad(peer, now, FAILED_REQUEST);
                self.dispatch(id);
            }
        }
    }

    fn on_failure(&mut self, rid: OutboundRequestId, error: String) {
        let Some((id, peer)) = self.requests.remove(&rid) else {
            return;
        };
        debug!(content_id = %id, peer = %peer, error = %error, "block request failed");
        if let Some(p) = self.pending.get_mut(&id) {
            p.in_flight = p.in_flight.saturating_sub(1);
        }
        self.scores.observe_bad(peer, Instant::now(), FAILED_REQUEST);
        self.dispatch(id);
    }

    fn on_request(&mut self, req: BlockRequest, channel: ResponseChannel<BlockResponse>) {
        let block = self.held.get(&req.content_id).map(|b| b.to_vec());
        debug!(content_id = %req.content_id, found = block.is_some(), "block request served");
        if self
            .swarm
            .behaviour_mut()
            .blocks
            .send_response(channel, BlockResponse { block })
            .is_err()
        {
            debug!(content_id = %req.content_id, "requester went away");
        }
    }

    fn on_kad(&mut self, ev: kad::Event) {
        let kad::Event::OutboundQueryProgressed { id: qid, result, step, .. } = ev else {
            return;
        };
        let QueryResult::GetProviders(res) = result else {
            return;
        };
        let Some(&id) = self.queries.get(&qid) else {
            return;
        };
        match res {
            Ok(GetProvidersOk::FoundProviders { key, providers }) => {
                if content_key(&key) != Some(id) {
                    return;
                }
                if let Some(p) = self.pending.get_mut(&id) {
                    for peer in providers {
                        if peer != self.local
                            && !p.tried.contains(&peer)
                            && !p.candidates.contains(&peer)
                        {
                            p.candidates.push(peer);
                        }
                    }
                }
                self.dispatch(id);
            }
            Ok(GetProvidersOk::FinishedWithNoAdditionalRecord { .. }) => {}
            Err(e) => debug!(content_id = %id, error = %e, "provider query failed"),
        }
        if step.last {
            self.queries.remove(&qid);
            if let Some(p) = self.pending.get_mut(&id) {
                p.querying = false;
            }
        }
    }

    fn on_swarm_event(&mut self, ev: SwarmEvent<BlockBehaviourEvent>) {
        match ev {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(address = %address, "swarm listening");
            }
            SwarmEvent::ConnectionEstablished { .. } | SwarmEvent::ConnectionClosed { .. } => {
                if let Some(m) = &self.metrics {
                    m.swarm_peers.set(self.swarm.connected_peers().count() as i64);
                }
            }
            SwarmEvent::Behaviour(BlockBehaviourEvent::Kad(e)) => self.on_kad(e),
            SwarmEvent::Behaviour(BlockBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                for addr in info.listen_addrs {
                    self.swarm.behaviour_mut().kad.add_address(&peer_id, addr);
                }
            }
            SwarmEvent::Behaviour(BlockBehaviourEvent::Blocks(e)) => match e {
                request_response::Event::Message { message, .. } => match message {
                    request_response::Message::Request {
                        request, channel, ..
                    } => self.on_request(request, channel),
                    request_response::Message::Response {
                        request_id,
                        response,
                    } => self.on_response(request_id, response.block),
                },
                request_response::Event::OutboundFailure {
                    request_id, error, ..
                } => self.on_failure(request_id, error.to_string()),
                _ => {}
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_round_trips_content_id() {
        let id = ContentId::from_bytes([0x42; 20]);
        assert_eq!(content_key(&record_key(&id)), Some(id));
    }

    #[test]
    fn bootstrap_addr_must_name_peer() {
        let pid = PeerId::random();
        let with: Multiaddr = format!("/ip4/10.0.0.1/tcp/24336/p2p/{pid}").parse().unwrap();
        let without: Multiaddr = "/ip4/10.0.0.1/tcp/24336".parse().unwrap();
        assert_eq!(peer_of(&with), Some(pid));
        assert_eq!(peer_of(&without), None);
    }
}
