// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Client for the checkpoint ledger contract on Ethereum.

use crate::abi::NearCheckpointLedger;
use crate::error::{RelayerError, RelayerResult};
use crate::types::EpochHashes;
use crate::utils::{
    bytes32_to_near_hash, decode_hex_payload, near_hash_to_bytes, near_hash_to_bytes32, EthSigner,
};
use async_trait::async_trait;
use ethers::contract::ContractCall;
use ethers::types::{Address as EthAddress, TxHash, U256, U64};
use std::sync::Arc;
use tracing::{info, warn};

/// Read/advance access to the monotonic checkpoint. Only the epoch
/// processing loop commits.
#[async_trait]
pub trait CheckpointLedger: Send + Sync {
    async fn read_checkpoint(&self) -> RelayerResult<u64>;

    async fn read_epoch_hashes(&self, height: u64) -> RelayerResult<EpochHashes>;

    /// Sends the commit transaction and waits for its inclusion.
    async fn commit_checkpoint(
        &self,
        previous_hash: &str,
        current_hash: &str,
        height: u64,
    ) -> RelayerResult<()>;
}

#[async_trait]
pub trait ProofSubmitter: Send + Sync {
    async fn verify_and_save_proof(&self, journal: &str, proof: &str) -> RelayerResult<()>;

    async fn is_proofed_hash(&self, hash: &str) -> RelayerResult<bool>;
}

pub struct EthLedgerClient {
    contract: NearCheckpointLedger<EthSigner>,
}

impl EthLedgerClient {
    pub fn new(signer: Arc<EthSigner>, ledger_address: EthAddress) -> Self {
        Self {
            contract: NearCheckpointLedger::new(ledger_address, signer),
        }
    }

    pub fn address(&self) -> EthAddress {
        self.contract.address()
    }

    async fn send_and_confirm(
        &self,
        call: ContractCall<EthSigner, ()>,
        method: &str,
    ) -> RelayerResult<TxHash> {
        let pending = call.send().await.map_err(|e| {
            RelayerError::LedgerError(format!("Failed to send {}: {}", method, e))
        })?;
        let tx_hash = *pending;
        let receipt = pending.await.map_err(|e| {
            RelayerError::LedgerError(format!(
                "Failed to get receipt of {} tx {:?}: {}",
                method, tx_hash, e
            ))
        })?;
        match receipt {
            Some(receipt) if receipt.status == Some(U64::from(1)) => Ok(receipt.transaction_hash),
            Some(receipt) => Err(RelayerError::LedgerError(format!(
                "{} tx {:?} reverted in block {:?}",
                method, receipt.transaction_hash, receipt.block_number
            ))),
            None => Err(RelayerError::LedgerError(format!(
                "{} tx {:?} dropped from mempool",
                method, tx_hash
            ))),
        }
    }
}

fn to_u64(value: U256, what: &str) -> RelayerResult<u64> {
    if value > U256::from(u64::MAX) {
        return Err(RelayerError::ParseError(format!(
            "{} {} does not fit in u64",
            what, value
        )));
    }
    Ok(value.as_u64())
}

#[async_trait]
impl CheckpointLedger for EthLedgerClient {
    async fn read_checkpoint(&self) -> RelayerResult<u64> {
        let height = self
            .contract
            .get_latest_checkpoint()
            .call()
            .await
            .map_err(|e| RelayerError::LedgerError(format!("getLatestCheckpoint: {}", e)))?;
        to_u64(height, "Checkpoint height")
    }

    async fn read_epoch_hashes(&self, height: u64) -> RelayerResult<EpochHashes> {
        let (previous, current) = self
            .contract
            .get_epoch_hashes_by_height(U256::from(height))
            .call()
            .await
            .map_err(|e| RelayerError::LedgerError(format!("getEpochHashesByHeight: {}", e)))?;
        if previous == [0u8; 32] || current == [0u8; 32] {
            return Err(RelayerError::LedgerError(format!(
                "No epoch hashes saved for height {}",
                height
            )));
        }
        Ok(EpochHashes {
            previous_hash: bytes32_to_near_hash(&previous),
            current_hash: bytes32_to_near_hash(&current),
        })
    }

    async fn commit_checkpoint(
        &self,
        previous_hash: &str,
        current_hash: &str,
        height: u64,
    ) -> RelayerResult<()> {
        let call = self.contract.save_epoch_hashes_and_set_checkpoint(
            near_hash_to_bytes32(previous_hash)?,
            near_hash_to_bytes32(current_hash)?,
            U256::from(height),
        );
        let tx_hash = self
            .send_and_confirm(call, "saveEpochHashesAndSetCheckpoint")
            .await?;
        info!(
            "[Ledger] Committed checkpoint {} ({} -> {}) in tx {:?}",
            height, previous_hash, current_hash, tx_hash
        );
        Ok(())
    }
}

#[async_trait]
impl ProofSubmitter for EthLedgerClient {
    async fn verify_and_save_proof(&self, journal: &str, proof: &str) -> RelayerResult<()> {
        let call = self.contract.verify_and_save_proof(
            decode_hex_payload("journal", journal)?,
            decode_hex_payload("proof", proof)?,
        );
        match self.send_and_confirm(call, "verifyAndSaveProof").await {
            Ok(tx_hash) => {
                info!("[Ledger] Proof verified and saved in tx {:?}", tx_hash);
                Ok(())
            }
            Err(e) => {
                warn!("[Ledger] Proof submission failed: {}", e);
                Err(e)
            }
        }
    }

    async fn is_proofed_hash(&self, hash: &str) -> RelayerResult<bool> {
        self.contract
            .is_proofed_hash(near_hash_to_bytes(hash)?)
            .call()
            .await
            .map_err(|e| RelayerError::LedgerError(format!("isProofedHash: {}", e)))
    }
}
