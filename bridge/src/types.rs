// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RelayerError, RelayerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a block in a `block` RPC query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Height(height) => write!(f, "height {}", height),
            BlockId::Hash(hash) => write!(f, "hash {}", hash),
        }
    }
}

/// Header snapshot returned by a `block` query. Only the fields the relayer
/// reads are kept; everything else in the node response is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub hash: String,
    pub height: u64,
    pub epoch_id: String,
    /// Hash of the parent block.
    pub prev_hash: String,
    pub next_epoch_id: String,
    /// Block timestamp in nanoseconds.
    pub timestamp: u64,
}

/// Hashes describing two consecutive epoch transitions, as required by the
/// epoch rollup prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochChainLink {
    /// First block of the newly discovered epoch.
    pub current_epoch_hash: String,
    /// First block of the epoch recorded by the last checkpoint.
    pub prev_epoch_start_hash: String,
    /// Last block of the epoch recorded by the last checkpoint.
    pub prev_epoch_end_hash: String,
    pub prev_epoch_minus1_end_hash: String,
    pub prev_epoch_minus2_end_hash: String,
    /// Height of `current_epoch_hash`. Diagnostic only.
    pub boundary_height: u64,
}

/// Epoch anchors needed to prove a single arbitrary block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEpochLink {
    pub current_block_hash: String,
    /// First block of the epoch preceding the block's epoch.
    pub previous_epoch_start_hash: String,
    /// Last block of the epoch two back, which is the block's `epoch_id`.
    pub previous_epoch_end_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomBlockProvingTask {
    pub current_block_hash: String,
    pub previous_epoch_start_hash: String,
    pub previous_epoch_end_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochBlockProvingTask {
    pub current_epoch_hash: String,
    pub prev_epoch_start_hash: String,
    pub prev_epoch_end_hash: String,
    pub prev_epoch_minus1_end_hash: String,
    pub prev_epoch_minus2_end_hash: String,
}

/// Task payload as it travels over the bus or to the prover service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvingTask {
    Epoch(EpochBlockProvingTask),
    RandomBlock(RandomBlockProvingTask),
}

impl ProvingTask {
    /// Hash the matching result will be reported under.
    pub fn matching_hash(&self) -> &str {
        match self {
            ProvingTask::Epoch(task) => &task.current_epoch_hash,
            ProvingTask::RandomBlock(task) => &task.current_block_hash,
        }
    }

    pub fn to_json_bytes(&self) -> RelayerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RelayerError::ParseError(e.to_string()))
    }
}

impl From<EpochBlockProvingTask> for ProvingTask {
    fn from(task: EpochBlockProvingTask) -> Self {
        ProvingTask::Epoch(task)
    }
}

impl From<RandomBlockProvingTask> for ProvingTask {
    fn from(task: RandomBlockProvingTask) -> Self {
        ProvingTask::RandomBlock(task)
    }
}

/// Prover status. Anything other than `OK` is treated as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultStatus {
    Ok,
    Error,
}

impl From<String> for ResultStatus {
    fn from(status: String) -> Self {
        if status == "OK" {
            ResultStatus::Ok
        } else {
            ResultStatus::Error
        }
    }
}

impl From<ResultStatus> for String {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Ok => "OK".to_string(),
            ResultStatus::Error => "ERROR".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomBlockProvingResult {
    pub current_block_hash: String,
    pub journal: String,
    pub proof: String,
    pub status: ResultStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochBlockProvingResult {
    pub current_block_hash: String,
    pub previous_block_hash: String,
    pub current_block_height: u64,
    pub status: ResultStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvingResult {
    RandomBlock(RandomBlockProvingResult),
    Epoch(EpochBlockProvingResult),
}

impl ProvingResult {
    pub fn matching_hash(&self) -> &str {
        match self {
            ProvingResult::RandomBlock(result) => &result.current_block_hash,
            ProvingResult::Epoch(result) => &result.current_block_hash,
        }
    }

    pub fn status(&self) -> ResultStatus {
        match self {
            ProvingResult::RandomBlock(result) => result.status,
            ProvingResult::Epoch(result) => result.status,
        }
    }

    pub fn from_json_slice(payload: &[u8]) -> RelayerResult<Self> {
        serde_json::from_slice(payload).map_err(|e| RelayerError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofStatus {
    #[serde(rename = "IN-PROCESSING")]
    InProcessing,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "ERROR")]
    Error,
}

impl ProofStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStatus::InProcessing => "IN-PROCESSING",
            ProofStatus::Done => "DONE",
            ProofStatus::Error => "ERROR",
        }
    }
}

/// Tracks one dispatched single-block proving task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRecord {
    pub hash: String,
    pub height: u64,
    pub epoch_id: String,
    pub timestamp: u64,
    pub status: ProofStatus,
    /// Milliseconds since the unix epoch.
    pub date_created: u64,
}

impl ProofRecord {
    pub fn in_processing(block: &BlockRef, date_created: u64) -> Self {
        Self {
            hash: block.hash.clone(),
            height: block.height,
            epoch_id: block.epoch_id.clone(),
            timestamp: block.timestamp,
            status: ProofStatus::InProcessing,
            date_created,
        }
    }
}

/// Epoch hash pair the ledger stores for a checkpoint height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochHashes {
    pub previous_hash: String,
    pub current_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub height: u64,
    pub previous_hash: String,
    pub current_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epoch_task_wire_names() {
        let task = ProvingTask::Epoch(EpochBlockProvingTask {
            current_epoch_hash: "a".into(),
            prev_epoch_start_hash: "b".into(),
            prev_epoch_end_hash: "c".into(),
            prev_epoch_minus1_end_hash: "d".into(),
            prev_epoch_minus2_end_hash: "e".into(),
        });
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({
                "currentEpochHash": "a",
                "prevEpochStartHash": "b",
                "prevEpochEndHash": "c",
                "prevEpochMinus1EndHash": "d",
                "prevEpochMinus2EndHash": "e",
            })
        );
    }

    #[test]
    fn test_random_task_wire_names() {
        let task = ProvingTask::RandomBlock(RandomBlockProvingTask {
            current_block_hash: "x".into(),
            previous_epoch_start_hash: "y".into(),
            previous_epoch_end_hash: "z".into(),
        });
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({
                "currentBlockHash": "x",
                "previousEpochStartHash": "y",
                "previousEpochEndHash": "z",
            })
        );
        assert_eq!(task.matching_hash(), "x");
    }

    #[test]
    fn test_result_union_picks_shape() {
        let random = ProvingResult::from_json_slice(
            br#"{"currentBlockHash":"h","journal":"0x01","proof":"0x02","status":"OK"}"#,
        )
        .unwrap();
        assert!(matches!(random, ProvingResult::RandomBlock(_)));
        assert_eq!(random.status(), ResultStatus::Ok);

        let epoch = ProvingResult::from_json_slice(
            br#"{"currentBlockHash":"h","previousBlockHash":"p","currentBlockHeight":86400,"status":"OK"}"#,
        )
        .unwrap();
        match epoch {
            ProvingResult::Epoch(result) => assert_eq!(result.current_block_height, 86400),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_unknown_status_is_error() {
        let result = ProvingResult::from_json_slice(
            br#"{"currentBlockHash":"h","journal":"","proof":"","status":"FAILED"}"#,
        )
        .unwrap();
        assert_eq!(result.status(), ResultStatus::Error);
        assert_eq!(result.matching_hash(), "h");
    }

    #[test]
    fn test_malformed_result_is_parse_error() {
        let err = ProvingResult::from_json_slice(b"{\"status\":\"OK\"}").unwrap_err();
        assert_eq!(err.error_type(), "parse_error");
    }

    #[test]
    fn test_proof_record_serialization() {
        let record = ProofRecord {
            hash: "h".into(),
            height: 7,
            epoch_id: "e".into(),
            timestamp: 1,
            status: ProofStatus::InProcessing,
            date_created: 2,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "IN-PROCESSING");
        assert_eq!(value["epochId"], "e");
        assert_eq!(value["dateCreated"], 2);
    }

    #[test]
    fn test_block_id_serializes_raw() {
        assert_eq!(serde_json::to_value(BlockId::Height(5)).unwrap(), json!(5));
        assert_eq!(
            serde_json::to_value(BlockId::Hash("abc".into())).unwrap(),
            json!("abc")
        );
    }
}
