// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RelayerError, RelayerResult};
use crate::types::{EpochBlockProvingResult, EpochBlockProvingTask};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Synchronous epoch rollup prover.
#[async_trait]
pub trait EpochProver: Send + Sync {
    async fn prove_epoch(
        &self,
        task: &EpochBlockProvingTask,
    ) -> RelayerResult<EpochBlockProvingResult>;
}

#[derive(Clone, Debug)]
pub struct HttpEpochProver {
    client: reqwest::Client,
    proof_url: String,
}

impl HttpEpochProver {
    pub fn new(base_url: &str, timeout: Duration) -> RelayerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayerError::InternalError(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            client,
            proof_url: format!("{}/epoch/proof", base_url.trim_end_matches('/')),
        })
    }

    pub fn proof_url(&self) -> &str {
        &self.proof_url
    }
}

#[async_trait]
impl EpochProver for HttpEpochProver {
    async fn prove_epoch(
        &self,
        task: &EpochBlockProvingTask,
    ) -> RelayerResult<EpochBlockProvingResult> {
        debug!("Sending epoch task to {}: {:?}", self.proof_url, task);
        let response = self
            .client
            .post(&self.proof_url)
            .json(task)
            .send()
            .await
            .map_err(|e| RelayerError::ProverError(format!("Epoch prover unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayerError::ProverError(format!(
                "Epoch prover returned {}: {}",
                status, body
            )));
        }
        Ok(response.json::<EpochBlockProvingResult>().await?)
    }
}
