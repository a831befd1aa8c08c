// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Test doubles shared by the unit tests of the relayer components.

use crate::epoch_prover_client::EpochProver;
use crate::error::{RelayerError, RelayerResult};
use crate::eth_ledger_client::{CheckpointLedger, ProofSubmitter};
use crate::near_rpc_client::{BlockQueryOutcome, EndpointKind, NearRpcApi};
use crate::proving_bus::ProvingTaskBus;
use crate::types::{
    BlockId, BlockRef, Checkpoint, EpochBlockProvingResult, EpochBlockProvingTask, EpochHashes,
    ProvingTask, ResultStatus,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GENESIS_EPOCH_ID: &str = "11111111111111111111111111111111";

/// Deterministic NEAR-like chain. Block `h` has hash `H{h}`; epochs start at
/// the configured heights and follow NEAR linkage: a block's `epoch_id` is
/// the last block of epoch i-2 and its `next_epoch_id` the last block of
/// epoch i-1.
#[derive(Clone, Debug)]
pub struct SyntheticChain {
    epoch_starts: Vec<u64>,
    skipped: HashSet<u64>,
    head: u64,
}

impl SyntheticChain {
    pub fn with_epoch_starts(epoch_starts: Vec<u64>, head: u64) -> Self {
        assert!(!epoch_starts.is_empty());
        Self {
            epoch_starts,
            skipped: HashSet::new(),
            head,
        }
    }

    /// Epochs of `epoch_length` blocks starting at `first_start`, produced up
    /// to `head`.
    pub fn uniform(epoch_length: u64, first_start: u64, head: u64) -> Self {
        let starts = (0..)
            .map(|i| first_start + i * epoch_length)
            .take_while(|start| *start <= head)
            .collect();
        Self::with_epoch_starts(starts, head)
    }

    /// Marks a height as skipped by block producers.
    pub fn skip(mut self, height: u64) -> Self {
        self.skipped.insert(height);
        self
    }

    pub fn hash_at(height: u64) -> String {
        format!("H{}", height)
    }

    fn is_produced(&self, height: u64) -> bool {
        height <= self.head && height >= self.epoch_starts[0] && !self.skipped.contains(&height)
    }

    fn last_block_before(&self, height: u64) -> String {
        (self.epoch_starts[0]..height)
            .rev()
            .find(|h| self.is_produced(*h))
            .map(Self::hash_at)
            .unwrap_or_else(|| GENESIS_EPOCH_ID.to_string())
    }

    pub fn block_at(&self, height: u64) -> Option<BlockRef> {
        if !self.is_produced(height) {
            return None;
        }
        let epoch = self
            .epoch_starts
            .iter()
            .rposition(|start| *start <= height)?;
        let epoch_id = if epoch >= 1 {
            self.last_block_before(self.epoch_starts[epoch - 1])
        } else {
            GENESIS_EPOCH_ID.to_string()
        };
        Some(BlockRef {
            hash: Self::hash_at(height),
            height,
            epoch_id,
            prev_hash: self.last_block_before(height),
            next_epoch_id: self.last_block_before(self.epoch_starts[epoch]),
            timestamp: height * 1_000_000_000,
        })
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<BlockRef> {
        let height = hash.strip_prefix('H')?.parse().ok()?;
        self.block_at(height)
    }
}

/// `NearRpcApi` backed by a `SyntheticChain`, with per-block overrides and a
/// log of every queried block id.
pub struct MockNearRpc {
    kind: EndpointKind,
    url: String,
    chain: Mutex<SyntheticChain>,
    outcomes: Mutex<HashMap<BlockId, RelayerResult<BlockQueryOutcome>>>,
    requested: Mutex<Vec<BlockId>>,
    latest_height_queries: AtomicUsize,
}

impl MockNearRpc {
    pub fn new(kind: EndpointKind, chain: SyntheticChain) -> Self {
        Self {
            kind,
            url: format!("http://{}.near.test", kind),
            chain: Mutex::new(chain),
            outcomes: Default::default(),
            requested: Default::default(),
            latest_height_queries: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, block_id: BlockId, outcome: RelayerResult<BlockQueryOutcome>) {
        self.outcomes.lock().unwrap().insert(block_id, outcome);
    }

    pub fn requested(&self) -> Vec<BlockId> {
        self.requested.lock().unwrap().clone()
    }

    pub fn requested_heights(&self) -> Vec<u64> {
        self.requested()
            .into_iter()
            .filter_map(|id| match id {
                BlockId::Height(h) => Some(h),
                BlockId::Hash(_) => None,
            })
            .collect()
    }

    pub fn latest_height_queries(&self) -> usize {
        self.latest_height_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NearRpcApi for MockNearRpc {
    fn kind(&self) -> EndpointKind {
        self.kind
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn block(&self, block_id: &BlockId) -> RelayerResult<BlockQueryOutcome> {
        self.requested.lock().unwrap().push(block_id.clone());
        if let Some(outcome) = self.outcomes.lock().unwrap().get(block_id) {
            return outcome.clone();
        }
        let chain = self.chain.lock().unwrap();
        let block = match block_id {
            BlockId::Height(height) => chain.block_at(*height),
            BlockId::Hash(hash) => chain.block_by_hash(hash),
        };
        Ok(block.map_or(BlockQueryOutcome::UnknownBlock, BlockQueryOutcome::Found))
    }

    async fn latest_block_height(&self) -> RelayerResult<u64> {
        self.latest_height_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain.lock().unwrap().head)
    }
}

/// In-memory ledger contract.
#[derive(Default)]
pub struct MockLedger {
    checkpoint: AtomicU64,
    epoch_hashes: Mutex<HashMap<u64, EpochHashes>>,
    commits: Mutex<Vec<Checkpoint>>,
    commit_failures: Mutex<VecDeque<RelayerError>>,
    proof_outcomes: Mutex<VecDeque<RelayerResult<()>>>,
    submitted_proofs: Mutex<Vec<(String, String)>>,
    proofed_hashes: Mutex<BTreeSet<String>>,
}

impl MockLedger {
    /// Ledger whose checkpoint is the first block of the epoch starting at
    /// `height`, linked to the block right before it.
    pub fn at_checkpoint(height: u64) -> Self {
        let ledger = Self::default();
        ledger.checkpoint.store(height, Ordering::SeqCst);
        ledger.epoch_hashes.lock().unwrap().insert(
            height,
            EpochHashes {
                previous_hash: SyntheticChain::hash_at(height.saturating_sub(1)),
                current_hash: SyntheticChain::hash_at(height),
            },
        );
        ledger
    }

    pub fn fail_next_commit(&self, err: RelayerError) {
        self.commit_failures.lock().unwrap().push_back(err);
    }

    pub fn push_proof_outcome(&self, outcome: RelayerResult<()>) {
        self.proof_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn commits(&self) -> Vec<Checkpoint> {
        self.commits.lock().unwrap().clone()
    }

    pub fn submitted_proofs(&self) -> Vec<(String, String)> {
        self.submitted_proofs.lock().unwrap().clone()
    }

    pub fn mark_proofed(&self, hash: &str) {
        self.proofed_hashes.lock().unwrap().insert(hash.to_string());
    }
}

#[async_trait]
impl CheckpointLedger for MockLedger {
    async fn read_checkpoint(&self) -> RelayerResult<u64> {
        Ok(self.checkpoint.load(Ordering::SeqCst))
    }

    async fn read_epoch_hashes(&self, height: u64) -> RelayerResult<EpochHashes> {
        self.epoch_hashes
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .ok_or_else(|| RelayerError::LedgerError(format!("No epoch hashes at {}", height)))
    }

    async fn commit_checkpoint(
        &self,
        previous_hash: &str,
        current_hash: &str,
        height: u64,
    ) -> RelayerResult<()> {
        if let Some(err) = self.commit_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.epoch_hashes.lock().unwrap().insert(
            height,
            EpochHashes {
                previous_hash: previous_hash.to_string(),
                current_hash: current_hash.to_string(),
            },
        );
        self.commits.lock().unwrap().push(Checkpoint {
            height,
            previous_hash: previous_hash.to_string(),
            current_hash: current_hash.to_string(),
        });
        self.checkpoint.store(height, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProofSubmitter for MockLedger {
    async fn verify_and_save_proof(&self, journal: &str, proof: &str) -> RelayerResult<()> {
        self.submitted_proofs
            .lock()
            .unwrap()
            .push((journal.to_string(), proof.to_string()));
        self.proof_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn is_proofed_hash(&self, hash: &str) -> RelayerResult<bool> {
        Ok(self.proofed_hashes.lock().unwrap().contains(hash))
    }
}

/// Bus that keeps every published task in memory.
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<ProvingTask>>,
    failures: Mutex<VecDeque<RelayerError>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<ProvingTask> {
        self.published.lock().unwrap().clone()
    }

    pub fn fail_next_publish(&self, err: RelayerError) {
        self.failures.lock().unwrap().push_back(err);
    }
}

#[async_trait]
impl ProvingTaskBus for RecordingBus {
    async fn publish(&self, task: &ProvingTask) -> RelayerResult<()> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.published.lock().unwrap().push(task.clone());
        Ok(())
    }
}

/// Epoch prover that answers with scripted responses first, then with an
/// `OK` result derived from the task (`H{n}` hashes carry their height).
#[derive(Default)]
pub struct ScriptedEpochProver {
    responses: Mutex<VecDeque<RelayerResult<EpochBlockProvingResult>>>,
    received: Mutex<Vec<EpochBlockProvingTask>>,
    stalled: AtomicBool,
}

impl ScriptedEpochProver {
    /// Every following request is recorded and then never answered.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn push_response(&self, response: RelayerResult<EpochBlockProvingResult>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn received(&self) -> Vec<EpochBlockProvingTask> {
        self.received.lock().unwrap().clone()
    }

    pub fn ok_result_for(task: &EpochBlockProvingTask) -> EpochBlockProvingResult {
        let current_block_height = task
            .current_epoch_hash
            .strip_prefix('H')
            .and_then(|h| h.parse().ok())
            .unwrap_or_default();
        EpochBlockProvingResult {
            current_block_hash: task.current_epoch_hash.clone(),
            previous_block_hash: task.prev_epoch_end_hash.clone(),
            current_block_height,
            status: ResultStatus::Ok,
        }
    }
}

#[async_trait]
impl EpochProver for ScriptedEpochProver {
    async fn prove_epoch(
        &self,
        task: &EpochBlockProvingTask,
    ) -> RelayerResult<EpochBlockProvingResult> {
        self.received.lock().unwrap().push(task.clone());
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(Self::ok_result_for(task)),
        }
    }
}

pub fn mock_endpoint(kind: EndpointKind, chain: SyntheticChain) -> Arc<MockNearRpc> {
    Arc::new(MockNearRpc::new(kind, chain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_chain_linkage() {
        let chain = SyntheticChain::with_epoch_starts(vec![0, 100, 200, 300], 400);

        let first = chain.block_at(200).unwrap();
        assert_eq!(first.prev_hash, "H199");
        assert_eq!(first.next_epoch_id, "H199");
        assert_eq!(first.epoch_id, "H99");

        let last = chain.block_at(199).unwrap();
        assert_eq!(last.epoch_id, GENESIS_EPOCH_ID);
        assert_eq!(last.next_epoch_id, "H99");

        assert!(chain.block_at(401).is_none());
        assert_eq!(chain.block_by_hash("H250"), chain.block_at(250));
    }

    #[test]
    fn test_skipped_height_links_to_previous_produced() {
        let chain = SyntheticChain::with_epoch_starts(vec![0, 100], 200).skip(150);
        assert!(chain.block_at(150).is_none());
        assert_eq!(chain.block_at(151).unwrap().prev_hash, "H149");
    }
}
