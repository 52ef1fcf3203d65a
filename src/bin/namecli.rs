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

//! Control-plane client: `namecli <method> [key=value ...]`.
//!
//! Values that parse as JSON (numbers, booleans) are sent as such, everything
//! else as strings. The endpoint comes from `NAMECLI_RPC`.

use anyhow::{anyhow, bail, Result};
use namechain::rpc::{RpcRequest, RpcResponse};
use serde_json::{Map, Value};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:24335/rpc";

fn parse_params(args: &[String]) -> Result<Value> {
    let mut map = Map::new();
    for a in args {
        let (k, v) = a
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got {a}"))?;
        let value = match serde_json::from_str::<Value>(v) {
            Ok(j @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => j,
            _ => Value::String(v.to_string()),
        };
        map.insert(k.to_string(), value);
    }
    Ok(Value::Object(map))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((method, rest)) = args.split_first() else {
        bail!("usage: namecli <getinfo|publishblock|getblock|getname> [key=value ...]");
    };
    let endpoint = std::env::var("NAMECLI_RPC").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

    let req = RpcRequest {
        id: Value::from(1),
        method: method.clone(),
        params: parse_params(rest)?,
    };
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let resp: RpcResponse = client.post(&endpoint).json(&req).send().await?.json().await?;

    if let Some(e) = resp.error {
        bail!("{} (code {})", e.message, e.code);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&resp.result.unwrap_or(Value::Null))?
    );
    Ok(())
}
