// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayerError {
    // Caller supplied an invalid combination of arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    // A payload could not be parsed or a required field is missing
    #[error("Parse error: {0}")]
    ParseError(String),
    // Transport or HTTP level failure talking to a node or service
    #[error("Internal error: {0}")]
    InternalError(String),
    // Anything not covered by a more specific kind, original message preserved
    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
    // Neither the primary nor the archival node knows the block
    #[error("Unknown block: {0}")]
    UnknownBlock(String),
    // The node is lagging behind the requested block
    #[error("Node is not synced yet: {0}")]
    NotSyncedYet(String),
    // The boundary scan ran past the current chain head
    #[error("Block not produced yet: {0}")]
    BlockNotProduced(String),
    // Ledger contract call or transaction failure
    #[error("Ledger error: {0}")]
    LedgerError(String),
    // Message bus connection or publish failure
    #[error("Bus error: {0}")]
    BusError(String),
    // External prover failure or non-OK result
    #[error("Prover error: {0}")]
    ProverError(String),
    // Proof record store failure
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl RelayerError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayerError::InvalidArgument(_) => "invalid_argument",
            RelayerError::ParseError(_) => "parse_error",
            RelayerError::InternalError(_) => "internal_error",
            RelayerError::UnexpectedError(_) => "unexpected_error",
            RelayerError::UnknownBlock(_) => "unknown_block",
            RelayerError::NotSyncedYet(_) => "not_synced_yet",
            RelayerError::BlockNotProduced(_) => "block_not_produced",
            RelayerError::LedgerError(_) => "ledger_error",
            RelayerError::BusError(_) => "bus_error",
            RelayerError::ProverError(_) => "prover_error",
            RelayerError::StorageError(_) => "storage_error",
        }
    }

    /// Whether retrying the same operation later can succeed without
    /// operator intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayerError::InternalError(_)
            | RelayerError::UnexpectedError(_)
            | RelayerError::NotSyncedYet(_)
            | RelayerError::BlockNotProduced(_)
            | RelayerError::LedgerError(_)
            | RelayerError::BusError(_)
            | RelayerError::ProverError(_)
            | RelayerError::StorageError(_) => true,
            RelayerError::InvalidArgument(_)
            | RelayerError::ParseError(_)
            | RelayerError::UnknownBlock(_) => false,
        }
    }
}

impl From<reqwest::Error> for RelayerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RelayerError::ParseError(err.to_string())
        } else {
            RelayerError::InternalError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RelayerError {
    fn from(err: serde_json::Error) -> Self {
        RelayerError::ParseError(err.to_string())
    }
}

pub type RelayerResult<T> = Result<T, RelayerError>;
