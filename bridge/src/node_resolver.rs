// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chooses between the primary (pruned) and the archival NEAR node.
//!
//! Primary nodes only keep a bounded recent window of blocks, so anything
//! older than `archival_retention_epochs` epochs behind the archival head, or
//! anything the primary reports as unknown, is served by the archival node.

use crate::error::{RelayerError, RelayerResult};
use crate::metrics::RelayerMetrics;
use crate::near_rpc_client::{BlockQueryOutcome, EndpointKind, NearRpcApi};
use crate::types::BlockId;
use std::sync::Arc;
use tracing::{debug, info};

/// Epoch length of NEAR mainnet, in blocks.
pub const DEFAULT_EPOCH_LENGTH: u64 = 43200;
/// Epochs of history a primary node is assumed to retain.
pub const DEFAULT_ARCHIVAL_RETENTION_EPOCHS: u64 = 3;

/// Working endpoint selected for the downstream queries of one operation.
#[derive(Clone)]
pub struct RpcEndpoint {
    kind: EndpointKind,
    client: Arc<dyn NearRpcApi>,
}

impl RpcEndpoint {
    pub fn new(client: Arc<dyn NearRpcApi>) -> Self {
        Self {
            kind: client.kind(),
            client,
        }
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn client(&self) -> &dyn NearRpcApi {
        self.client.as_ref()
    }
}

impl std::fmt::Debug for RpcEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEndpoint")
            .field("kind", &self.kind)
            .field("url", &self.client.url())
            .finish()
    }
}

pub struct NodeResolver {
    primary: Arc<dyn NearRpcApi>,
    archival: Arc<dyn NearRpcApi>,
    epoch_length: u64,
    archival_retention_epochs: u64,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl NodeResolver {
    pub fn new(
        primary: Arc<dyn NearRpcApi>,
        archival: Arc<dyn NearRpcApi>,
        epoch_length: u64,
        archival_retention_epochs: u64,
    ) -> Self {
        Self {
            primary,
            archival,
            epoch_length,
            archival_retention_epochs,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RelayerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn archival(&self) -> RpcEndpoint {
        RpcEndpoint::new(self.archival.clone())
    }

    /// Resolves the endpoint to use for the block identified by exactly one
    /// of `hash` or `height`. Performs no retries.
    pub async fn resolve(
        &self,
        hash: Option<&str>,
        height: Option<u64>,
    ) -> RelayerResult<RpcEndpoint> {
        let block_id = match (hash, height) {
            (Some(hash), None) => BlockId::Hash(hash.to_string()),
            (None, Some(height)) => BlockId::Height(height),
            (Some(_), Some(_)) => {
                return Err(RelayerError::InvalidArgument(
                    "Only one of hash or height may be supplied".to_string(),
                ))
            }
            (None, None) => {
                return Err(RelayerError::InvalidArgument(
                    "Either hash or height must be supplied".to_string(),
                ))
            }
        };

        let endpoint = self.select(&block_id).await.map_err(normalize_error)?;
        info!("[Resolver] Using {} node for block {}", endpoint.kind(), block_id);
        if let Some(m) = &self.metrics {
            m.resolver_selections
                .with_label_values(&[endpoint.kind().as_str()])
                .inc();
        }
        Ok(endpoint)
    }

    async fn select(&self, block_id: &BlockId) -> RelayerResult<RpcEndpoint> {
        let target = match self.primary.block(block_id).await? {
            BlockQueryOutcome::Found(block) => block,
            BlockQueryOutcome::UnknownBlock => {
                debug!(
                    "[Resolver] Primary node does not know block {}, asking archival",
                    block_id
                );
                return match self.archival.block(block_id).await? {
                    BlockQueryOutcome::Found(_) => Ok(self.archival()),
                    BlockQueryOutcome::UnknownBlock => Err(RelayerError::UnknownBlock(format!(
                        "Block {} is unknown to both primary and archival nodes",
                        block_id
                    ))),
                    BlockQueryOutcome::NotSyncedYet => Err(RelayerError::NotSyncedYet(format!(
                        "Archival node is not synced up to block {}",
                        block_id
                    ))),
                };
            }
            BlockQueryOutcome::NotSyncedYet => {
                return Err(RelayerError::NotSyncedYet(format!(
                    "Primary node is not synced up to block {}",
                    block_id
                )));
            }
        };

        let latest = self.archival.latest_block_height().await?;
        let retained_from =
            latest.saturating_sub(self.archival_retention_epochs * self.epoch_length);
        if target.height < retained_from {
            debug!(
                "[Resolver] Block height {} is older than primary retention (head {}, retained from {})",
                target.height, latest, retained_from
            );
            Ok(self.archival())
        } else {
            Ok(RpcEndpoint::new(self.primary.clone()))
        }
    }
}

/// Recognized kinds propagate unchanged; anything else is reported as
/// `UnexpectedError` carrying the original message.
fn normalize_error(err: RelayerError) -> RelayerError {
    match err {
        RelayerError::InvalidArgument(_)
        | RelayerError::ParseError(_)
        | RelayerError::InternalError(_)
        | RelayerError::UnexpectedError(_)
        | RelayerError::UnknownBlock(_)
        | RelayerError::NotSyncedYet(_)
        | RelayerError::BlockNotProduced(_) => err,
        RelayerError::LedgerError(_)
        | RelayerError::BusError(_)
        | RelayerError::ProverError(_)
        | RelayerError::StorageError(_) => RelayerError::UnexpectedError(err.to_string()),
    }
}
