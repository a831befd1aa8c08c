// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dispatch of single-block proving tasks and lookup of their records.

use crate::epoch_scanner::EpochBoundaryScanner;
use crate::error::{RelayerError, RelayerResult};
use crate::eth_ledger_client::ProofSubmitter;
use crate::near_rpc_client::require_block;
use crate::node_resolver::NodeResolver;
use crate::proof_store::ProofStore;
use crate::proving_bus::ProvingTaskBus;
use crate::task_builder::build_block_task;
use crate::types::{BlockId, ProofRecord, ProofStatus, ProvingTask};
use crate::utils::now_millis;
use std::sync::Arc;
use tracing::{error, info};

pub struct ProofService {
    resolver: Arc<NodeResolver>,
    scanner: Arc<EpochBoundaryScanner>,
    bus: Arc<dyn ProvingTaskBus>,
    store: Arc<dyn ProofStore>,
    ledger: Arc<dyn ProofSubmitter>,
}

impl ProofService {
    pub fn new(
        resolver: Arc<NodeResolver>,
        scanner: Arc<EpochBoundaryScanner>,
        bus: Arc<dyn ProvingTaskBus>,
        store: Arc<dyn ProofStore>,
        ledger: Arc<dyn ProofSubmitter>,
    ) -> Self {
        Self {
            resolver,
            scanner,
            bus,
            store,
            ledger,
        }
    }

    /// Records the block with `hash` as `IN-PROCESSING` and publishes its
    /// proving task. The record exists before the task does, so a result
    /// can never arrive for an unknown hash. A task the bus rejects leaves
    /// the record `ERROR`. A block the ledger already holds a proof for is
    /// recorded as `DONE` without publishing.
    pub async fn create_proving_task(&self, hash: &str) -> RelayerResult<ProofRecord> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(RelayerError::InvalidArgument(
                "Block hash must not be empty".to_string(),
            ));
        }

        let endpoint = self.resolver.resolve(Some(hash), None).await?;
        let block = require_block(endpoint.client(), &BlockId::Hash(hash.to_string())).await?;

        if self.ledger.is_proofed_hash(&block.hash).await? {
            info!("[ProofService] Block {} is already proofed on the ledger", block.hash);
            let record = ProofRecord {
                status: ProofStatus::Done,
                ..ProofRecord::in_processing(&block, now_millis())
            };
            self.store.upsert(record.clone()).await?;
            return Ok(record);
        }

        let link = self.scanner.scan_block_epochs(&endpoint, &block).await?;
        let task = build_block_task(&block, &link)?;

        let record = ProofRecord::in_processing(&block, now_millis());
        self.store.upsert(record.clone()).await?;
        if let Err(e) = self.bus.publish(&ProvingTask::RandomBlock(task)).await {
            error!(
                "[ProofService] Failed to publish proving task for block {}: {}",
                record.hash, e
            );
            self.store
                .update_status(&record.hash, ProofStatus::Error)
                .await?;
            return Err(e);
        }
        info!(
            "[ProofService] Dispatched proving task for block {} at height {}",
            record.hash, record.height
        );
        Ok(record)
    }

    pub async fn get_proof_status(&self, hash: &str) -> RelayerResult<Option<ProofRecord>> {
        self.store.get(hash.trim()).await
    }
}
