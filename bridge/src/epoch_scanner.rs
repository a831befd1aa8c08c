// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reconstructs NEAR epoch boundaries from sequential block queries.
//!
//! A NEAR block's `epoch_id` is the hash of the last block of epoch i-2 and
//! its `next_epoch_id` the hash of the last block of epoch i-1. The scanner
//! relies only on that linkage, never on a dedicated boundary RPC field, so
//! re-running a scan from the same checkpoint always yields the same link.

use crate::error::{RelayerError, RelayerResult};
use crate::eth_ledger_client::CheckpointLedger;
use crate::metrics::RelayerMetrics;
use crate::near_rpc_client::{require_block, BlockQueryOutcome, NearRpcApi};
use crate::node_resolver::RpcEndpoint;
use crate::types::{BlockEpochLink, BlockId, BlockRef, EpochChainLink};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_BOUNDARY_DRIFT: u64 = 20;

pub struct EpochBoundaryScanner {
    ledger: Arc<dyn CheckpointLedger>,
    epoch_length: u64,
    max_boundary_drift: u64,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl EpochBoundaryScanner {
    pub fn new(
        ledger: Arc<dyn CheckpointLedger>,
        epoch_length: u64,
        max_boundary_drift: u64,
    ) -> Self {
        Self {
            ledger,
            epoch_length,
            max_boundary_drift,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RelayerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Finds the first block of the epoch following the one recorded at
    /// checkpoint `current_height`, together with the hashes needed to prove
    /// the transition.
    pub async fn scan_epoch_boundary(
        &self,
        endpoint: &RpcEndpoint,
        current_height: u64,
    ) -> RelayerResult<EpochChainLink> {
        let client = endpoint.client();
        let saved = self.ledger.read_epoch_hashes(current_height).await?;
        let lkb = require_block(client, &BlockId::Hash(saved.current_hash.clone())).await?;
        debug!(
            "[Scanner] Checkpoint {} starts at block {} (epoch {})",
            current_height, lkb.hash, lkb.epoch_id
        );

        let expected_last = current_height + self.epoch_length - 1;
        let (last, first, drift) = self.find_boundary(client, &lkb, expected_last).await?;

        let previous = require_block(client, &BlockId::Hash(saved.previous_hash.clone())).await?;

        info!(
            "[Scanner] Epoch boundary after checkpoint {} found at height {} (drift {})",
            current_height, first.height, drift
        );
        if let Some(m) = &self.metrics {
            m.scanner_last_drift.set(drift as i64);
        }

        Ok(EpochChainLink {
            current_epoch_hash: first.hash,
            prev_epoch_start_hash: saved.current_hash,
            prev_epoch_end_hash: last.hash,
            prev_epoch_minus1_end_hash: saved.previous_hash,
            prev_epoch_minus2_end_hash: previous.next_epoch_id,
            boundary_height: first.height,
        })
    }

    async fn find_boundary(
        &self,
        client: &dyn NearRpcApi,
        lkb: &BlockRef,
        expected_last: u64,
    ) -> RelayerResult<(BlockRef, BlockRef, u64)> {
        for drift in 0..self.max_boundary_drift {
            let last_height = expected_last + drift;
            let first_height = last_height + 1;
            if let Some(m) = &self.metrics {
                m.scanner_probes.inc();
            }

            let last = fetch_produced(client, last_height).await?;
            let first = fetch_produced(client, first_height).await?;
            let (Some(last), Some(first)) = (last, first) else {
                debug!(
                    "[Scanner] Block {} or {} not produced yet",
                    last_height, first_height
                );
                continue;
            };

            if lkb.epoch_id == last.epoch_id
                && last.hash == first.next_epoch_id
                && last.hash == first.prev_hash
            {
                return Ok((last, first, drift));
            }
            debug!(
                "[Scanner] Heights {}/{} are not an epoch boundary",
                last_height, first_height
            );
        }

        Err(RelayerError::BlockNotProduced(format!(
            "No epoch boundary within {} blocks of height {}",
            self.max_boundary_drift, expected_last
        )))
    }

    /// Epoch anchors for proving an arbitrary block: the last block of epoch
    /// i-2 (the block's `epoch_id`) and the first block produced after it.
    pub async fn scan_block_epochs(
        &self,
        endpoint: &RpcEndpoint,
        block: &BlockRef,
    ) -> RelayerResult<BlockEpochLink> {
        let client = endpoint.client();
        let end = require_block(client, &BlockId::Hash(block.epoch_id.clone())).await?;

        for offset in 1..=self.max_boundary_drift {
            let Some(candidate) = fetch_produced(client, end.height + offset).await? else {
                continue;
            };
            if candidate.prev_hash == end.hash {
                debug!(
                    "[Scanner] Block {} belongs to the epoch after the one starting at {}",
                    block.hash, candidate.hash
                );
                return Ok(BlockEpochLink {
                    current_block_hash: block.hash.clone(),
                    previous_epoch_start_hash: candidate.hash,
                    previous_epoch_end_hash: end.hash,
                });
            }
        }

        Err(RelayerError::BlockNotProduced(format!(
            "No successor of epoch block {} within {} blocks",
            end.hash, self.max_boundary_drift
        )))
    }
}

/// `None` when no block exists at `height` yet.
async fn fetch_produced(client: &dyn NearRpcApi, height: u64) -> RelayerResult<Option<BlockRef>> {
    match client.block(&BlockId::Height(height)).await? {
        BlockQueryOutcome::Found(block) => Ok(Some(block)),
        BlockQueryOutcome::UnknownBlock => Ok(None),
        BlockQueryOutcome::NotSyncedYet => Err(RelayerError::NotSyncedYet(format!(
            "{} node is not synced up to height {}",
            client.kind(),
            height
        ))),
    }
}
