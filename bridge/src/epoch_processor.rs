// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Continuous checkpoint advancement.
//!
//! Each iteration reads the ledger checkpoint, finds the next epoch
//! boundary, has the epoch prover prove the transition and commits the new
//! checkpoint. Nothing is written before the proof succeeds, so a failed
//! iteration can be retried from the same checkpoint and yields the same
//! task.

use crate::epoch_prover_client::EpochProver;
use crate::epoch_scanner::EpochBoundaryScanner;
use crate::error::{RelayerError, RelayerResult};
use crate::eth_ledger_client::CheckpointLedger;
use crate::metrics::RelayerMetrics;
use crate::node_resolver::NodeResolver;
use crate::retry::RetryPolicy;
use crate::task_builder::build_epoch_task;
use crate::types::{EpochBlockProvingTask, ResultStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Processing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub previous_checkpoint: u64,
    pub committed_checkpoint: u64,
    pub task: EpochBlockProvingTask,
}

pub struct EpochProcessor {
    resolver: Arc<NodeResolver>,
    scanner: Arc<EpochBoundaryScanner>,
    ledger: Arc<dyn CheckpointLedger>,
    prover: Arc<dyn EpochProver>,
    retry_policy: RetryPolicy,
    metrics: Arc<RelayerMetrics>,
    state: ProcessorState,
    last_checkpoint: Option<u64>,
}

impl EpochProcessor {
    pub fn new(
        resolver: Arc<NodeResolver>,
        scanner: Arc<EpochBoundaryScanner>,
        ledger: Arc<dyn CheckpointLedger>,
        prover: Arc<dyn EpochProver>,
        retry_policy: RetryPolicy,
        metrics: Arc<RelayerMetrics>,
    ) -> Self {
        Self {
            resolver,
            scanner,
            ledger,
            prover,
            retry_policy,
            metrics,
            state: ProcessorState::Idle,
            last_checkpoint: None,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Checkpoint read by the latest iteration.
    pub fn last_checkpoint(&self) -> Option<u64> {
        self.last_checkpoint
    }

    pub async fn run_iteration(&mut self) -> RelayerResult<IterationReport> {
        self.state = ProcessorState::Processing;
        let result = self.process_next_epoch().await;
        self.state = ProcessorState::Idle;
        result
    }

    async fn process_next_epoch(&mut self) -> RelayerResult<IterationReport> {
        let height = self.ledger.read_checkpoint().await?;
        self.last_checkpoint = Some(height);
        info!("[EpochProcessor] Fetched latest checkpoint {}", height);

        let endpoint = self.resolver.resolve(None, Some(height)).await?;
        let link = self.scanner.scan_epoch_boundary(&endpoint, height).await?;
        let task = build_epoch_task(&link)?;
        info!("[EpochProcessor] Sending task to epoch prover: {:?}", task);

        let result = self.prover.prove_epoch(&task).await?;
        if result.status != ResultStatus::Ok {
            return Err(RelayerError::ProverError(format!(
                "Epoch proof for checkpoint {} failed with status {}",
                height,
                String::from(result.status)
            )));
        }
        if result.current_block_height <= height {
            return Err(RelayerError::ProverError(format!(
                "Epoch prover reported height {} which does not advance checkpoint {}",
                result.current_block_height, height
            )));
        }

        self.ledger
            .commit_checkpoint(
                &result.previous_block_hash,
                &result.current_block_hash,
                result.current_block_height,
            )
            .await?;
        let committed = self.ledger.read_checkpoint().await?;
        self.last_checkpoint = Some(committed);
        self.metrics.last_committed_checkpoint.set(committed as i64);
        self.metrics.epoch_iterations_ok.inc();
        info!(
            "[EpochProcessor] Processed checkpoint {}: {} {} -> {}",
            height, result.previous_block_hash, result.current_block_hash, committed
        );

        Ok(IterationReport {
            previous_checkpoint: height,
            committed_checkpoint: committed,
            task,
        })
    }

    /// Runs iterations until cancelled, or until the retry policy gives up.
    pub async fn run(&mut self, cancel: CancellationToken) -> RelayerResult<()> {
        info!("[EpochProcessor] Starting with retry policy {:?}", self.retry_policy);
        let mut backoff = self.retry_policy.build_backoff();
        let mut consecutive_failures: u32 = 0;
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    // The dropped iteration may have been mid-flight.
                    self.state = ProcessorState::Idle;
                    info!("[EpochProcessor] Cancelled");
                    return Ok(());
                }
                outcome = self.run_iteration() => outcome,
            };

            let err = match outcome {
                Ok(_) => {
                    consecutive_failures = 0;
                    backoff.reset();
                    continue;
                }
                Err(err) => err,
            };
            consecutive_failures = consecutive_failures.saturating_add(1);
            self.metrics
                .epoch_iterations_err
                .with_label_values(&[err.error_type()])
                .inc();

            let Some(delay) = self
                .retry_policy
                .next_delay(&mut *backoff, &err, consecutive_failures) else {
                error!(
                    "[EpochProcessor] Giving up on checkpoint {:?} after {} failures: {}",
                    self.last_checkpoint, consecutive_failures, err
                );
                return Err(err);
            };
            error!(
                "[EpochProcessor] Failed to generate epoch proof for checkpoint {:?}: {}, retrying in {:?}",
                self.last_checkpoint, err, delay
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[EpochProcessor] Cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
