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

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Last base-chain height scanned.
    pub scanned_height: IntGauge,
    /// Sidechain height.
    pub chain_height: IntGauge,
    /// Connected swarm peers.
    pub swarm_peers: IntGauge,

    /// Commitment transactions seen.
    pub commitments_total: IntCounter,
    /// Sidechain blocks applied.
    pub blocks_applied_total: IntCounter,
    /// Sidechain blocks rejected by decode or validation.
    pub blocks_rejected_total: IntCounter,
    /// Fetches that hit the ceiling.
    pub fetch_timeouts_total: IntCounter,
    /// Fetched payloads that did not match their content id.
    pub fetch_mismatch_total: IntCounter,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    let g = IntGauge::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(g.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(g)
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let c = IntCounter::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(c.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(c)
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        Ok(Self {
            scanned_height: gauge(&registry, "named_scanned_height", "Last base-chain height scanned")?,
            chain_height: gauge(&registry, "named_chain_height", "Sidechain height")?,
            swarm_peers: gauge(&registry, "named_swarm_peers", "Connected swarm peers")?,
            commitments_total: counter(&registry, "named_commitments_total", "Commitment transactions seen")?,
            blocks_applied_total: counter(&registry, "named_blocks_applied_total", "Sidechain blocks applied")?,
            blocks_rejected_total: counter(&registry, "named_blocks_rejected_total", "Sidechain blocks rejected")?,
            fetch_timeouts_total: counter(&registry, "named_fetch_timeouts_total", "Block fetches that timed out")?,
            fetch_mismatch_total: counter(
                &registry,
                "named_fetch_mismatch_total",
                "Fetched payloads not matching their content id",
            )?,
            registry,
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|_| MetricsError::Prom)?;
        String::from_utf8(buf).map_err(|_| MetricsError::Prom)
    }
}
