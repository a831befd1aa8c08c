// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RelayerError, RelayerResult};
use crate::types::{
    BlockEpochLink, BlockRef, EpochBlockProvingTask, EpochChainLink, RandomBlockProvingTask,
};

fn require_hash(field: &str, value: &str) -> RelayerResult<String> {
    if value.trim().is_empty() {
        return Err(RelayerError::ParseError(format!("Missing {}", field)));
    }
    Ok(value.to_string())
}

pub fn build_block_task(
    block: &BlockRef,
    link: &BlockEpochLink,
) -> RelayerResult<RandomBlockProvingTask> {
    let current_block_hash = require_hash("currentBlockHash", &block.hash)?;
    if link.current_block_hash != current_block_hash {
        return Err(RelayerError::ParseError(format!(
            "Epoch link for {} does not belong to block {}",
            link.current_block_hash, current_block_hash
        )));
    }
    Ok(RandomBlockProvingTask {
        current_block_hash,
        previous_epoch_start_hash: require_hash(
            "previousEpochStartHash",
            &link.previous_epoch_start_hash,
        )?,
        previous_epoch_end_hash: require_hash(
            "previousEpochEndHash",
            &link.previous_epoch_end_hash,
        )?,
    })
}

pub fn build_epoch_task(link: &EpochChainLink) -> RelayerResult<EpochBlockProvingTask> {
    Ok(EpochBlockProvingTask {
        current_epoch_hash: require_hash("currentEpochHash", &link.current_epoch_hash)?,
        prev_epoch_start_hash: require_hash("prevEpochStartHash", &link.prev_epoch_start_hash)?,
        prev_epoch_end_hash: require_hash("prevEpochEndHash", &link.prev_epoch_end_hash)?,
        prev_epoch_minus1_end_hash: require_hash(
            "prevEpochMinus1EndHash",
            &link.prev_epoch_minus1_end_hash,
        )?,
        prev_epoch_minus2_end_hash: require_hash(
            "prevEpochMinus2EndHash",
            &link.prev_epoch_minus2_end_hash,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> EpochChainLink {
        EpochChainLink {
            current_epoch_hash: "H300".into(),
            prev_epoch_start_hash: "H200".into(),
            prev_epoch_end_hash: "H299".into(),
            prev_epoch_minus1_end_hash: "H199".into(),
            prev_epoch_minus2_end_hash: "H99".into(),
            boundary_height: 300,
        }
    }

    fn block() -> BlockRef {
        BlockRef {
            hash: "H250".into(),
            height: 250,
            epoch_id: "H99".into(),
            prev_hash: "H249".into(),
            next_epoch_id: "H199".into(),
            timestamp: 250,
        }
    }

    #[test]
    fn test_build_epoch_task() {
        let task = build_epoch_task(&link()).unwrap();
        assert_eq!(task.current_epoch_hash, "H300");
        assert_eq!(task.prev_epoch_start_hash, "H200");
        assert_eq!(task.prev_epoch_end_hash, "H299");
        assert_eq!(task.prev_epoch_minus1_end_hash, "H199");
        assert_eq!(task.prev_epoch_minus2_end_hash, "H99");
    }

    #[test]
    fn test_missing_epoch_hash_is_parse_error() {
        let mut link = link();
        link.prev_epoch_minus2_end_hash = String::new();
        let err = build_epoch_task(&link).unwrap_err();
        assert_eq!(
            err,
            RelayerError::ParseError("Missing prevEpochMinus2EndHash".into())
        );
    }

    #[test]
    fn test_build_block_task() {
        let link = BlockEpochLink {
            current_block_hash: "H250".into(),
            previous_epoch_start_hash: "H100".into(),
            previous_epoch_end_hash: "H99".into(),
        };
        let task = build_block_task(&block(), &link).unwrap();
        assert_eq!(
            task,
            RandomBlockProvingTask {
                current_block_hash: "H250".into(),
                previous_epoch_start_hash: "H100".into(),
                previous_epoch_end_hash: "H99".into(),
            }
        );
    }

    #[test]
    fn test_block_task_rejects_foreign_link() {
        let link = BlockEpochLink {
            current_block_hash: "H251".into(),
            previous_epoch_start_hash: "H100".into(),
            previous_epoch_end_hash: "H99".into(),
        };
        let err = build_block_task(&block(), &link).unwrap_err();
        assert_eq!(err.error_type(), "parse_error");
    }
}
