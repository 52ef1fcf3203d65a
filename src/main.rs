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

//! Namechain node entrypoint (systemd-friendly).
//! Follows the base chain, fetches and applies sidechain blocks, serves the
//! control plane, and restarts the watcher on transient failures.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use namechain::chain::BitcoindClient;
use namechain::config::NodeConfig;
use namechain::core::state::chain_store::ChainStore;
use namechain::core::state::checkpoint_store::CheckpointStore;
use namechain::core::state::engine::{ChainEngine, DenyAll};
use namechain::core::state::kv::open_db;
use namechain::core::watcher::{shutdown_requested, supervise, Backoff, BaseChainWatcher};
use namechain::monitoring::metrics::Metrics;
use namechain::networking::fetcher::BlockFetcher;
use namechain::networking::p2p::spawn_p2p;
use namechain::networking::p2p_identity::load_or_create_identity;
use namechain::rpc::{router, RpcService};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);
    let _ = if env("NAMED_LOG_JSON", "0") == "1" {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let data_dir = PathBuf::from(env("NAMED_DATA_DIR", "./data"));
    let cfg = NodeConfig::load_or_init(&data_dir).context("load config")?;
    if cfg!(feature = "production") && cfg.p2p.bootstrap.is_empty() {
        bail!("production build requires at least one p2p.bootstrap peer");
    }
    let wcfg = cfg.watcher()?;

    let metrics = Metrics::new()?;
    let db = open_db(data_dir.join("db")).context("open database")?;
    let engine = ChainEngine::new(ChainStore::open(&db)?, Arc::new(DenyAll));
    let checkpoints = CheckpointStore::open(&db)?;
    metrics.chain_height.set(engine.height()? as i64);

    let (peer_id, keypair) = load_or_create_identity(&data_dir)?;
    info!(data_dir = %data_dir.display(), peer_id = %peer_id, "namechain node starting");

    let (swarm, p2p_join) = spawn_p2p(cfg.p2p(), keypair, Some(metrics.clone()))?;
    let fetcher = BlockFetcher::new(Arc::new(swarm), cfg.fetcher());
    let chain = BitcoindClient::new(&cfg.bitcoin.rpc_url)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let svc = Arc::new(RpcService::new(
        engine.clone(),
        checkpoints.clone(),
        wcfg.genesis(),
        fetcher.clone(),
    ));
    let rpc_addr = cfg.rpc_addr()?;
    let listener = tokio::net::TcpListener::bind(rpc_addr)
        .await
        .with_context(|| format!("bind {rpc_addr}"))?;
    info!(addr = %rpc_addr, "control plane listening");
    let mut http_shutdown = shutdown_rx.clone();
    let app = router(svc, metrics.clone());
    let http = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown_requested(&mut http_shutdown).await })
            .await
    });

    let watcher = BaseChainWatcher::new(chain, fetcher, engine, checkpoints, wcfg)
        .with_metrics(metrics);
    let mut supervisor =
        tokio::spawn(async move { supervise(&watcher, shutdown_rx, Backoff::default()).await });

    let outcome = tokio::select! {
        r = &mut supervisor => r,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
            supervisor.await
        }
    };
    let _ = shutdown_tx.send(true);
    if let Ok(Err(e)) = http.await {
        warn!(error = %e, "control plane stopped with error");
    }
    p2p_join.abort();

    outcome.context("watcher task")??;
    info!("namechain node stopped");
    Ok(())
}
