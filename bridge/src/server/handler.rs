// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::RelayerResult;
use crate::proof_service::ProofService;
use crate::types::ProofRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait ProofRequestHandlerTrait {
    // Dispatches a proving task for the block with the given hash and
    // returns the freshly created record
    async fn handle_generate_proof(&self, hash: String) -> RelayerResult<ProofRecord>;
    // Looks up the record of a previously dispatched task
    async fn handle_proof_status(&self, hash: String) -> RelayerResult<Option<ProofRecord>>;
}

pub struct ProofRequestHandler {
    service: Arc<ProofService>,
}

impl ProofRequestHandler {
    pub fn new(service: Arc<ProofService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProofRequestHandlerTrait for ProofRequestHandler {
    async fn handle_generate_proof(&self, hash: String) -> RelayerResult<ProofRecord> {
        info!("[Server] Generate proof request for {}", hash);
        self.service.create_proving_task(&hash).await
    }

    async fn handle_proof_status(&self, hash: String) -> RelayerResult<Option<ProofRecord>> {
        self.service.get_proof_status(&hash).await
    }
}
