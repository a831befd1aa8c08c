// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RelayerError, RelayerResult};
use anyhow::Context;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{Signer, Wallet};
use ethers::types::Bytes;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type EthSigner = SignerMiddleware<Provider<Http>, Wallet<SigningKey>>;

/// Decodes a base58 NEAR hash into the `bytes32` the ledger stores.
pub fn near_hash_to_bytes32(hash: &str) -> RelayerResult<[u8; 32]> {
    let bytes = bs58::decode(hash)
        .into_vec()
        .map_err(|e| RelayerError::ParseError(format!("Invalid base58 hash {}: {}", hash, e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        RelayerError::ParseError(format!(
            "Hash {} decodes to {} bytes, expected 32",
            hash,
            bytes.len()
        ))
    })
}

pub fn bytes32_to_near_hash(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

pub fn near_hash_to_bytes(hash: &str) -> RelayerResult<Bytes> {
    near_hash_to_bytes32(hash).map(|bytes| Bytes::from(bytes.to_vec()))
}

/// Decodes a hex payload produced by the prover, with or without `0x`.
pub fn decode_hex_payload(field: &str, payload: &str) -> RelayerResult<Bytes> {
    let trimmed = payload.strip_prefix("0x").unwrap_or(payload);
    hex::decode(trimmed)
        .map(Bytes::from)
        .map_err(|e| RelayerError::ParseError(format!("Invalid hex in {}: {}", field, e)))
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Reads a hex encoded secp256k1 private key from `path`.
pub fn read_eth_private_key(path: &Path) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ledger key from {}", path.display()))?;
    let key = content.trim().trim_start_matches("0x").to_string();
    anyhow::ensure!(
        key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit()),
        "Ledger key at {} is not a 32 byte hex string",
        path.display()
    );
    Ok(key)
}

pub async fn get_eth_signer_client(
    url: &str,
    private_key_hex: &str,
    expected_chain_id: Option<u64>,
) -> anyhow::Result<EthSigner> {
    let provider = Provider::<Http>::try_from(url)
        .with_context(|| format!("Invalid eth rpc url {}", url))?
        .interval(Duration::from_millis(2000));
    let chain_id = provider.get_chainid().await?.as_u64();
    if let Some(expected) = expected_chain_id {
        anyhow::ensure!(
            chain_id == expected,
            "Eth chain id mismatch: expected {}, node reports {}",
            expected,
            chain_id
        );
    }
    let wallet = Wallet::from_str(private_key_hex)?.with_chain_id(chain_id);
    Ok(SignerMiddleware::new(provider, wallet))
}
