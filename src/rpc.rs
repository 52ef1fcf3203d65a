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

//! Control plane: `{id, method, params}` requests answered with
//! `{id, result}` or `{id, error: {code, message}}`, served as JSON over
//! `POST /rpc`, plus `GET /metrics`.
//!
//! The control plane only reads chain state. `publishblock` checks a block
//! and seeds it into the swarm; the watcher applies it once its commitment
//! appears on the base chain.

use crate::core::codec::transaction::name_hash;
use crate::core::codec::{Block, Transaction};
use crate::core::state::checkpoint_store::{Checkpoint, CheckpointStore};
use crate::core::state::engine::{ChainEngine, EngineError};
use crate::core::types::H256;
use crate::monitoring::metrics::Metrics;
use crate::networking::fetcher::BlockFetcher;
use crate::networking::swarm::ContentSwarm;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Malformed JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Bad or missing params.
pub const INVALID_PARAMS: i64 = -32602;
/// Node-side failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// Block failed decoding or validation.
pub const BLOCK_REJECTED: i64 = -32000;

/// Request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Echoed back in the response.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// Error body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Response envelope. Exactly one of `result` and `error` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Request id.
    pub id: Value,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, e: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorBody {
                code: e.code(),
                message: e.to_string(),
            }),
        }
    }
}

/// Method failures.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("block rejected: {0}")]
    Rejected(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RpcError {
    /// Wire code.
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Rejected(_) => BLOCK_REJECTED,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<EngineError> for RpcError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Block(_) | EngineError::Invalid(_) => Self::Rejected(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct PublishParams {
    block: String,
}

#[derive(Deserialize)]
struct HeightParams {
    height: u64,
}

#[derive(Deserialize)]
struct NameParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hash: Option<String>,
}

fn params<T: serde::de::DeserializeOwned>(v: Value) -> Result<T, RpcError> {
    serde_json::from_value(v).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn tx_json(tx: &Transaction) -> Value {
    match tx {
        Transaction::Acquire { owner, name_hash } => json!({
            "kind": "acquire", "owner": owner.to_hex(), "name_hash": name_hash.to_hex()
        }),
        Transaction::Transfer { name_hash } => json!({
            "kind": "transfer", "name_hash": name_hash.to_hex()
        }),
        Transaction::Renew {
            name_hash,
            ref_block,
        } => json!({
            "kind": "renew", "name_hash": name_hash.to_hex(), "ref_block": ref_block.to_hex()
        }),
        Transaction::Publish { publish_hash, name } => json!({
            "kind": "publish", "name": name.to_string_lossy(), "name_hex": hex::encode(name.as_bytes()),
            "publish_hash": publish_hash.to_hex(),
            "name_hash": tx.name_hash().to_hex()
        }),
    }
}

fn block_json(height: u64, b: &Block) -> Value {
    json!({
        "height": height,
        "content_id": b.content_id().to_hex(),
        "block_hash": b.block_hash().to_hex(),
        "previous": b.previous().to_hex(),
        "merkle_root": b.merkle_root().to_hex(),
        "transactions": b.transactions().iter().map(tx_json).collect::<Vec<_>>()
    })
}

/// Method dispatcher over read-only node state.
pub struct RpcService<S: ContentSwarm> {
    engine: ChainEngine,
    checkpoints: CheckpointStore,
    genesis: Checkpoint,
    fetcher: BlockFetcher<S>,
}

impl<S: ContentSwarm> RpcService<S> {
    /// Build a dispatcher.
    pub fn new(
        engine: ChainEngine,
        checkpoints: CheckpointStore,
        genesis: Checkpoint,
        fetcher: BlockFetcher<S>,
    ) -> Self {
        Self {
            engine,
            checkpoints,
            genesis,
            fetcher,
        }
    }

    /// Parse a raw body and answer it.
    pub async fn handle_raw(&self, body: &str) -> RpcResponse {
        match serde_json::from_str::<RpcRequest>(body) {
            Ok(req) => self.dispatch(req).await,
            Err(e) => RpcResponse::err(Value::Null, RpcError::Parse(e.to_string())),
        }
    }

    /// Answer a parsed request.
    pub async fn dispatch(&self, req: RpcRequest) -> RpcResponse {
        debug!(method = %req.method, "rpc request");
        match self.call(&req.method, req.params).await {
            Ok(v) => RpcResponse::ok(req.id, v),
            Err(e) => {
                debug!(method = %req.method, error = %e, "rpc error");
                RpcResponse::err(req.id, e)
            }
        }
    }

    async fn call(&self, method: &str, p: Value) -> Result<Value, RpcError> {
        match method {
            "getinfo" => self.getinfo(),
            "publishblock" => self.publishblock(params(p)?).await,
            "getblock" => self.getblock(params(p)?),
            "getname" => self.getname(params(p)?),
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }

    fn getinfo(&self) -> Result<Value, RpcError> {
        let height = self.engine.height()?;
        let tip = self.engine.content_id_at(height)?;
        let cp = self
            .checkpoints
            .load_or(self.genesis)
            .map_err(|e| RpcError::Internal(e.to_string()))?;
        Ok(json!({
            "height": height,
            "tip": tip.map(|t| t.to_hex()),
            "scanned_height": cp.scanned_height,
            "last_commitment": cp.last_commitment.to_hex(),
            "fetches_in_flight": self.fetcher.inflight()
        }))
    }

    async fn publishblock(&self, p: PublishParams) -> Result<Value, RpcError> {
        let bytes = hex::decode(p.block.trim()).map_err(|e| RpcError::InvalidParams(e.to_string()))?;
        let block = self.engine.check_block(&bytes)?;
        let id = self
            .fetcher
            .seed(bytes)
            .await
            .map_err(|e| RpcError::Internal(e.to_string()))?;
        info!(
            content_id = %id,
            block_hash = %block.block_hash(),
            txs = block.transactions().len(),
            "block published to swarm"
        );
        Ok(json!({
            "content_id": id.to_hex(),
            "block_hash": block.block_hash().to_hex(),
            "transactions": block.transactions().len()
        }))
    }

    fn getblock(&self, p: HeightParams) -> Result<Value, RpcError> {
        match self.engine.block_at(p.height)? {
            Some(b) => Ok(block_json(p.height, &b)),
            None => Err(RpcError::InvalidParams(format!("no block at height {}", p.height))),
        }
    }

    fn getname(&self, p: NameParams) -> Result<Value, RpcError> {
        let hash = match (p.name, p.hash) {
            (Some(n), None) => name_hash(&n),
            (None, Some(h)) => h
                .parse::<H256>()
                .map_err(|e| RpcError::InvalidParams(e.to_string()))?,
            _ => {
                return Err(RpcError::InvalidParams(
                    "exactly one of name or hash is required".into(),
                ))
            }
        };
        Ok(match self.engine.name(&hash)? {
            Some(r) => json!({
                "name_hash": hash.to_hex(),
                "owner": r.owner.to_hex(),
                "name": String::from_utf8_lossy(&r.name),
                "name_hex": hex::encode(&r.name),
                "publish_hash": r.publish_hash.to_hex()
            }),
            None => Value::Null,
        })
    }
}

struct AppState<S: ContentSwarm> {
    svc: Arc<RpcService<S>>,
    metrics: Metrics,
}

impl<S: ContentSwarm> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            svc: self.svc.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

async fn rpc_handler<S: ContentSwarm>(
    State(st): State<AppState<S>>,
    body: String,
) -> Json<RpcResponse> {
    Json(st.svc.handle_raw(&body).await)
}

async fn metrics_handler<S: ContentSwarm>(
    State(st): State<AppState<S>>,
) -> Result<String, StatusCode> {
    st.metrics
        .render()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// HTTP routes: `POST /rpc` and `GET /metrics`.
pub fn router<S: ContentSwarm>(svc: Arc<RpcService<S>>, metrics: Metrics) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler::<S>))
        .route("/metrics", get(metrics_handler::<S>))
        .with_state(AppState { svc, metrics })
}
