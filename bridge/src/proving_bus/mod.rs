// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Proving task dispatch and result handling over the message bus.

use crate::error::RelayerResult;
use crate::eth_ledger_client::ProofSubmitter;
use crate::metrics::RelayerMetrics;
use crate::proof_store::ProofStore;
use crate::types::{ProofStatus, ProvingResult, ProvingTask, ResultStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod nats;

pub use nats::{NatsBusConfig, NatsProvingBus};

#[async_trait]
pub trait ProvingTaskBus: Send + Sync {
    /// Publishes onto the durable task subject. Returns once the bus has
    /// accepted the task.
    async fn publish(&self, task: &ProvingTask) -> RelayerResult<()>;
}

/// Delivery guarantee of the result subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultDelivery {
    /// Plain subscription. A result being processed when the process dies
    /// is lost.
    #[default]
    AtMostOnce,
    /// Durable consumer acknowledged after processing. Redelivered results
    /// for `DONE` records are not submitted again.
    AtLeastOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    Done,
    Error,
    Skipped,
}

/// Applies proving results to proof records, submitting successful proofs
/// to the ledger.
pub struct ResultProcessor {
    store: Arc<dyn ProofStore>,
    submitter: Arc<dyn ProofSubmitter>,
    metrics: Arc<RelayerMetrics>,
}

impl ResultProcessor {
    pub fn new(
        store: Arc<dyn ProofStore>,
        submitter: Arc<dyn ProofSubmitter>,
        metrics: Arc<RelayerMetrics>,
    ) -> Self {
        Self {
            store,
            submitter,
            metrics,
        }
    }

    pub async fn process_payload(&self, payload: &[u8]) -> RelayerResult<ResultOutcome> {
        let result = ProvingResult::from_json_slice(payload)?;
        self.process(result).await
    }

    pub async fn process(&self, result: ProvingResult) -> RelayerResult<ResultOutcome> {
        let hash = result.matching_hash().to_string();
        let status = result.status();
        self.metrics
            .bus_results_received
            .with_label_values(&[String::from(status).as_str()])
            .inc();

        let Some(record) = self.store.get(&hash).await? else {
            warn!("[ResultProcessor] No proof record for {}, skipping result", hash);
            return Ok(ResultOutcome::Skipped);
        };
        if record.status == ProofStatus::Done {
            info!("[ResultProcessor] Proof for {} already done, skipping", hash);
            return Ok(ResultOutcome::Skipped);
        }

        let target = match (status, &result) {
            (ResultStatus::Ok, ProvingResult::RandomBlock(block_result)) => {
                match self
                    .submitter
                    .verify_and_save_proof(&block_result.journal, &block_result.proof)
                    .await
                {
                    Ok(()) => {
                        self.metrics.proof_submissions_ok.inc();
                        ProofStatus::Done
                    }
                    Err(e) => {
                        error!("[ResultProcessor] Proof submission for {} failed: {}", hash, e);
                        self.metrics.proof_submissions_err.inc();
                        ProofStatus::Error
                    }
                }
            }
            (ResultStatus::Ok, ProvingResult::Epoch(_)) => {
                warn!(
                    "[ResultProcessor] Epoch result for {} on the result subject, checkpoints are committed by the epoch processor",
                    hash
                );
                return Ok(ResultOutcome::Skipped);
            }
            (ResultStatus::Error, _) => {
                warn!("[ResultProcessor] Prover reported failure for {}", hash);
                ProofStatus::Error
            }
        };

        self.store.update_status(&hash, target).await?;
        self.metrics
            .proof_status_transitions
            .with_label_values(&[target.as_str()])
            .inc();
        info!("[ResultProcessor] Proof {} is now {}", hash, target.as_str());

        Ok(match target {
            ProofStatus::Done => ResultOutcome::Done,
            _ => ResultOutcome::Error,
        })
    }
}
