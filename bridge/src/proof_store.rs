// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Proof record store shared by the proof service and the result consumer.

use crate::error::{RelayerError, RelayerResult};
use crate::types::{ProofRecord, ProofStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Inserts or replaces the record keyed by its hash. Re-dispatching a
    /// task for the same hash resets the record.
    async fn upsert(&self, record: ProofRecord) -> RelayerResult<()>;

    async fn get(&self, hash: &str) -> RelayerResult<Option<ProofRecord>>;

    /// Fails with `StorageError` when no record exists for `hash`.
    async fn update_status(&self, hash: &str, status: ProofStatus) -> RelayerResult<ProofRecord>;
}

/// Records live for the lifetime of the process. Updates are
/// last-writer-wins per record.
#[derive(Default)]
pub struct InMemoryProofStore {
    records: RwLock<HashMap<String, ProofRecord>>,
}

impl InMemoryProofStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ProofStore for InMemoryProofStore {
    async fn upsert(&self, record: ProofRecord) -> RelayerResult<()> {
        debug!(
            "Storing proof record {} at height {} as {}",
            record.hash,
            record.height,
            record.status.as_str()
        );
        self.records
            .write()
            .await
            .insert(record.hash.clone(), record);
        Ok(())
    }

    async fn get(&self, hash: &str) -> RelayerResult<Option<ProofRecord>> {
        Ok(self.records.read().await.get(hash).cloned())
    }

    async fn update_status(&self, hash: &str, status: ProofStatus) -> RelayerResult<ProofRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(hash)
            .ok_or_else(|| RelayerError::StorageError(format!("No proof record for {}", hash)))?;
        record.status = status;
        Ok(record.clone())
    }
}
