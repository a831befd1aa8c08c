// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Async JSON-RPC client for NEAR nodes.
//!
//! Only the `block` method is used. A query either yields a header or one of
//! the two error causes the relayer reacts to (`UNKNOWN_BLOCK`,
//! `NOT_SYNCED_YET`); anything else becomes a typed `RelayerError`.

use crate::error::{RelayerError, RelayerResult};
use crate::metrics::RelayerMetrics;
use crate::types::{BlockId, BlockRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const UNKNOWN_BLOCK_CAUSE: &str = "UNKNOWN_BLOCK";
pub const NOT_SYNCED_YET_CAUSE: &str = "NOT_SYNCED_YET";

/// Which configured node a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Primary,
    Archival,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Primary => "primary",
            EndpointKind::Archival => "archival",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single `block` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockQueryOutcome {
    Found(BlockRef),
    UnknownBlock,
    NotSyncedYet,
}

#[async_trait]
pub trait NearRpcApi: Send + Sync {
    fn kind(&self) -> EndpointKind;

    fn url(&self) -> &str;

    async fn block(&self, block_id: &BlockId) -> RelayerResult<BlockQueryOutcome>;

    /// Height of the latest block with optimistic finality.
    async fn latest_block_height(&self) -> RelayerResult<u64>;
}

/// Queries a block and turns the two recognized error causes into errors.
pub async fn require_block<C: NearRpcApi + ?Sized>(
    client: &C,
    block_id: &BlockId,
) -> RelayerResult<BlockRef> {
    match client.block(block_id).await? {
        BlockQueryOutcome::Found(block) => Ok(block),
        BlockQueryOutcome::UnknownBlock => Err(RelayerError::UnknownBlock(format!(
            "{} node does not know block {}",
            client.kind(),
            block_id
        ))),
        BlockQueryOutcome::NotSyncedYet => Err(RelayerError::NotSyncedYet(format!(
            "{} node is not synced up to block {}",
            client.kind(),
            block_id
        ))),
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<BlockResult>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    header: BlockRef,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    cause: Option<ErrorCause>,
}

#[derive(Debug, Deserialize)]
struct ErrorCause {
    name: String,
}

/// Interprets a raw `block` response body.
pub(crate) fn parse_block_response(body: &str) -> RelayerResult<BlockQueryOutcome> {
    let response: JsonRpcResponse = serde_json::from_str(body)
        .map_err(|e| RelayerError::ParseError(format!("Invalid block response: {}", e)))?;

    if let Some(error) = response.error {
        let cause = error.cause.map(|c| c.name);
        return match cause.as_deref() {
            Some(UNKNOWN_BLOCK_CAUSE) => Ok(BlockQueryOutcome::UnknownBlock),
            Some(NOT_SYNCED_YET_CAUSE) => Ok(BlockQueryOutcome::NotSyncedYet),
            other => Err(RelayerError::UnexpectedError(format!(
                "RPC error {} (cause {}): {}",
                error.name.unwrap_or_default(),
                other.unwrap_or("none"),
                error.message.unwrap_or_default()
            ))),
        };
    }

    match response.result {
        Some(result) => Ok(BlockQueryOutcome::Found(result.header)),
        None => Err(RelayerError::ParseError(
            "Block response has neither result nor error".to_string(),
        )),
    }
}

#[derive(Clone, Debug)]
pub struct NearRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    kind: EndpointKind,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl NearRpcClient {
    pub fn new(
        rpc_url: impl Into<String>,
        kind: EndpointKind,
        timeout: Duration,
    ) -> RelayerResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()
            .map_err(|e| RelayerError::InternalError(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            kind,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<RelayerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn query_block(&self, params: Value) -> RelayerResult<BlockQueryOutcome> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "dontcare",
            method: "block",
            params,
        };
        tracing::debug!("[NearRPC:{}] >>> block {}", self.kind, request.params);

        let _timer = self.metrics.as_ref().map(|m| {
            m.near_rpc_queries
                .with_label_values(&["block", self.kind.as_str()])
                .inc();
            m.near_rpc_queries_latency
                .with_label_values(&["block", self.kind.as_str()])
                .start_timer()
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RelayerError::InternalError(format!("{} node request failed: {}", self.kind, e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RelayerError::InternalError(format!("{} node body read failed: {}", self.kind, e))
        })?;

        // Some providers wrap handler errors in a non-2xx status; the cause
        // in the body still decides the outcome when it is recognizable.
        let outcome = match parse_block_response(&body) {
            Ok(outcome) => outcome,
            Err(_) if !status.is_success() => {
                return Err(RelayerError::InternalError(format!(
                    "{} node HTTP error {}: {}",
                    self.kind, status, body
                )));
            }
            Err(e) => return Err(e),
        };

        if let Some(m) = &self.metrics {
            let cause = match &outcome {
                BlockQueryOutcome::Found(_) => None,
                BlockQueryOutcome::UnknownBlock => Some(UNKNOWN_BLOCK_CAUSE),
                BlockQueryOutcome::NotSyncedYet => Some(NOT_SYNCED_YET_CAUSE),
            };
            if let Some(cause) = cause {
                m.near_rpc_errors
                    .with_label_values(&[self.kind.as_str(), cause])
                    .inc();
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl NearRpcApi for NearRpcClient {
    fn kind(&self) -> EndpointKind {
        self.kind
    }

    fn url(&self) -> &str {
        &self.rpc_url
    }

    async fn block(&self, block_id: &BlockId) -> RelayerResult<BlockQueryOutcome> {
        self.query_block(json!({ "block_id": block_id })).await
    }

    async fn latest_block_height(&self) -> RelayerResult<u64> {
        match self.query_block(json!({ "finality": "optimistic" })).await? {
            BlockQueryOutcome::Found(block) => Ok(block.height),
            other => Err(RelayerError::UnexpectedError(format!(
                "{} node could not report its head: {:?}",
                self.kind, other
            ))),
        }
    }
}
