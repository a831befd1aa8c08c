// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::too_many_arguments, clippy::new_without_default)]

pub mod abi;
pub mod config;
pub mod epoch_processor;
pub mod epoch_prover_client;
pub mod epoch_scanner;
pub mod error;
pub mod eth_ledger_client;
pub mod metrics;
pub mod near_rpc_client;
pub mod node;
pub mod node_resolver;
pub mod proof_service;
pub mod proof_store;
pub mod proving_bus;
pub mod retry;
pub mod server;
pub mod task_builder;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod test_utils;
