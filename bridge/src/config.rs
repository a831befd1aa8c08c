// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::epoch_prover_client::HttpEpochProver;
use crate::epoch_scanner::DEFAULT_MAX_BOUNDARY_DRIFT;
use crate::eth_ledger_client::EthLedgerClient;
use crate::metrics::RelayerMetrics;
use crate::near_rpc_client::{EndpointKind, NearRpcApi, NearRpcClient};
use crate::node_resolver::{DEFAULT_ARCHIVAL_RETENTION_EPOCHS, DEFAULT_EPOCH_LENGTH};
use crate::proving_bus::nats::{
    DEFAULT_RESULT_CONSUMER, DEFAULT_RESULT_STREAM, DEFAULT_RESULT_SUBJECT, DEFAULT_TASK_STREAM,
    DEFAULT_TASK_SUBJECT,
};
use crate::proving_bus::{NatsBusConfig, ResultDelivery};
use crate::retry::RetryPolicy;
use crate::utils::{get_eth_signer_client, read_eth_private_key};
use anyhow::{anyhow, Context};
use ethers::types::Address as EthAddress;
use near_bridge_config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn default_epoch_length() -> u64 {
    DEFAULT_EPOCH_LENGTH
}

fn default_archival_retention_epochs() -> u64 {
    DEFAULT_ARCHIVAL_RETENTION_EPOCHS
}

fn default_max_boundary_drift() -> u64 {
    DEFAULT_MAX_BOUNDARY_DRIFT
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_task_subject() -> String {
    DEFAULT_TASK_SUBJECT.to_string()
}

fn default_task_stream() -> String {
    DEFAULT_TASK_STREAM.to_string()
}

fn default_result_subject() -> String {
    DEFAULT_RESULT_SUBJECT.to_string()
}

fn default_result_stream() -> String {
    DEFAULT_RESULT_STREAM.to_string()
}

fn default_result_consumer() -> String {
    DEFAULT_RESULT_CONSUMER.to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NearConfig {
    // Regular node, only keeps the most recent epochs
    pub primary_rpc_url: String,
    // Node with full history, also used for the optimistic head height
    pub archival_rpc_url: String,
    #[serde(default = "default_epoch_length")]
    pub epoch_length: u64,
    // Blocks older than this many epochs behind the head are read from the
    // archival node
    #[serde(default = "default_archival_retention_epochs")]
    pub archival_retention_epochs: u64,
    #[serde(default = "default_max_boundary_drift")]
    pub max_boundary_drift: u64,
    #[serde(default = "default_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EthConfig {
    pub eth_rpc_url: String,
    // Address of the checkpoint ledger contract
    pub ledger_address: String,
    // File holding the hex encoded key that signs ledger transactions
    pub ledger_key_path: PathBuf,
    // Checked against the node when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BusConfig {
    pub nats_url: String,
    #[serde(default = "default_task_subject")]
    pub task_subject: String,
    #[serde(default = "default_task_stream")]
    pub task_stream: String,
    #[serde(default = "default_result_subject")]
    pub result_subject: String,
    // Only used with at-least-once delivery
    #[serde(default = "default_result_stream")]
    pub result_stream: String,
    #[serde(default)]
    pub result_delivery: ResultDelivery,
    #[serde(default = "default_result_consumer")]
    pub result_consumer: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl BusConfig {
    pub fn to_nats_config(&self) -> NatsBusConfig {
        NatsBusConfig {
            nats_url: self.nats_url.clone(),
            task_subject: self.task_subject.clone(),
            task_stream: self.task_stream.clone(),
            result_subject: self.result_subject.clone(),
            result_stream: self.result_stream.clone(),
            result_delivery: self.result_delivery,
            result_consumer: self.result_consumer.clone(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProverConfig {
    pub epoch_prover_url: String,
    // Epoch proofs take minutes, keep this generous
    #[serde(default = "default_prover_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_prover_timeout_secs() -> u64 {
    600
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayerNodeConfig {
    // The port that the proof API and `/metrics` are served on.
    pub server_listen_port: u16,
    pub near: NearConfig,
    pub eth: EthConfig,
    pub bus: BusConfig,
    pub prover: ProverConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Config for RelayerNodeConfig {}

impl RelayerNodeConfig {
    /// Static checks that need no network access.
    pub fn check(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("primary-rpc-url", &self.near.primary_rpc_url),
            ("archival-rpc-url", &self.near.archival_rpc_url),
            ("eth-rpc-url", &self.eth.eth_rpc_url),
            ("nats-url", &self.bus.nats_url),
            ("epoch-prover-url", &self.prover.epoch_prover_url),
        ] {
            url::Url::parse(value).with_context(|| format!("Invalid {}: {}", name, value))?;
        }
        if self.near.epoch_length == 0 {
            return Err(anyhow!("epoch-length must be greater than zero"));
        }
        if self.near.max_boundary_drift == 0 {
            return Err(anyhow!("max-boundary-drift must be greater than zero"));
        }
        self.ledger_address()?;
        Ok(())
    }

    pub fn ledger_address(&self) -> anyhow::Result<EthAddress> {
        EthAddress::from_str(&self.eth.ledger_address)
            .with_context(|| format!("Invalid ledger-address: {}", self.eth.ledger_address))
    }

    pub async fn validate(
        &self,
        metrics: Arc<RelayerMetrics>,
    ) -> anyhow::Result<RelayerServerConfig> {
        info!("Starting config validation");
        self.check()?;

        let rpc_timeout = Duration::from_secs(self.near.rpc_timeout_secs);
        let primary = NearRpcClient::new(
            self.near.primary_rpc_url.clone(),
            EndpointKind::Primary,
            rpc_timeout,
        )?
        .with_metrics(metrics.clone());
        let archival = NearRpcClient::new(
            self.near.archival_rpc_url.clone(),
            EndpointKind::Archival,
            rpc_timeout,
        )?
        .with_metrics(metrics);

        let key = read_eth_private_key(&self.eth.ledger_key_path)?;
        let signer = get_eth_signer_client(&self.eth.eth_rpc_url, &key, self.eth.chain_id).await?;
        let ledger_address = self.ledger_address()?;
        info!("Ledger contract at {:?}", ledger_address);
        let ledger = Arc::new(EthLedgerClient::new(Arc::new(signer), ledger_address));

        let epoch_prover = Arc::new(HttpEpochProver::new(
            &self.prover.epoch_prover_url,
            Duration::from_secs(self.prover.request_timeout_secs),
        )?);

        info!("Config validation complete");
        Ok(RelayerServerConfig {
            server_listen_port: self.server_listen_port,
            primary: Arc::new(primary),
            archival: Arc::new(archival),
            ledger,
            epoch_prover,
            bus: self.bus.to_nats_config(),
            epoch_length: self.near.epoch_length,
            archival_retention_epochs: self.near.archival_retention_epochs,
            max_boundary_drift: self.near.max_boundary_drift,
            retry: self.retry.clone(),
        })
    }
}

/// Live clients built from a validated `RelayerNodeConfig`.
pub struct RelayerServerConfig {
    pub server_listen_port: u16,
    pub primary: Arc<dyn NearRpcApi>,
    pub archival: Arc<dyn NearRpcApi>,
    pub ledger: Arc<EthLedgerClient>,
    pub epoch_prover: Arc<HttpEpochProver>,
    pub bus: NatsBusConfig,
    pub epoch_length: u64,
    pub archival_retention_epochs: u64,
    pub max_boundary_drift: u64,
    pub retry: RetryPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{BackoffSchedule, RetryScope};
    use std::io::Write;

    const MINIMAL_YAML: &str = r#"
server-listen-port: 9024
near:
  primary-rpc-url: "https://rpc.mainnet.near.org"
  archival-rpc-url: "https://archival-rpc.mainnet.near.org"
eth:
  eth-rpc-url: "http://127.0.0.1:8545"
  ledger-address: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
  ledger-key-path: "/tmp/does-not-exist.key"
bus:
  nats-url: "nats://127.0.0.1:4222"
prover:
  epoch-prover-url: "http://127.0.0.1:8080"
"#;

    fn write_config(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_minimal_yaml_applies_defaults() {
        let (_dir, path) = write_config("relayer.yaml", MINIMAL_YAML);
        let config = RelayerNodeConfig::load(&path).unwrap();

        assert_eq!(config.server_listen_port, 9024);
        assert_eq!(config.near.epoch_length, 43200);
        assert_eq!(config.near.archival_retention_epochs, 3);
        assert_eq!(config.near.max_boundary_drift, 20);
        assert_eq!(config.eth.chain_id, None);
        assert_eq!(config.bus.task_subject, "PROVING_TASKS");
        assert_eq!(config.bus.task_stream, "PROVING_TASKS_STREAM");
        assert_eq!(config.bus.result_subject, "PROVING_RESULTS");
        assert_eq!(config.bus.result_delivery, ResultDelivery::AtMostOnce);
        assert_eq!(config.retry, RetryPolicy::default());
        config.check().unwrap();

        let nats = config.bus.to_nats_config();
        assert_eq!(nats.reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_load_overrides() {
        let yaml = format!(
            "{}{}",
            MINIMAL_YAML.replace(
                "  nats-url: \"nats://127.0.0.1:4222\"",
                "  nats-url: \"nats://127.0.0.1:4222\"\n  result-delivery: at-least-once\n  result-consumer: relayer-a"
            ),
            r#"retry:
  retry-on: transient-only
  backoff:
    kind: exponential
    initial-ms: 1000
    multiplier: 2.0
    max-ms: 60000
  max-attempts: 10
"#
        );
        let (_dir, path) = write_config("relayer.yml", &yaml);
        let config = RelayerNodeConfig::load(&path).unwrap();

        assert_eq!(config.bus.result_delivery, ResultDelivery::AtLeastOnce);
        assert_eq!(config.bus.result_consumer, "relayer-a");
        assert_eq!(config.retry.retry_on, RetryScope::TransientOnly);
        assert_eq!(config.retry.max_attempts, Some(10));
        assert_eq!(
            config.retry.backoff,
            BackoffSchedule::Exponential {
                initial_ms: 1000,
                multiplier: 2.0,
                max_ms: 60000,
            }
        );
    }

    #[test]
    fn test_save_and_reload_json() {
        let (dir, path) = write_config("relayer.yaml", MINIMAL_YAML);
        let config = RelayerNodeConfig::load(&path).unwrap();

        let json_path = dir.path().join("relayer.json");
        config.save(&json_path).unwrap();
        let reloaded = RelayerNodeConfig::load(&json_path).unwrap();
        assert_eq!(reloaded.near.primary_rpc_url, config.near.primary_rpc_url);
        assert_eq!(reloaded.eth.ledger_address, config.eth.ledger_address);
        assert_eq!(reloaded.retry, config.retry);
    }

    #[test]
    fn test_check_rejects_invalid_values() {
        let (_dir, path) = write_config("relayer.yaml", MINIMAL_YAML);
        let config = RelayerNodeConfig::load(&path).unwrap();

        let mut bad = config.clone();
        bad.near.epoch_length = 0;
        assert!(bad.check().is_err());

        let mut bad = config.clone();
        bad.near.primary_rpc_url = "not a url".to_string();
        assert!(bad.check().unwrap_err().to_string().contains("primary-rpc-url"));

        let mut bad = config;
        bad.eth.ledger_address = "0x1234".to_string();
        assert!(bad.check().unwrap_err().to_string().contains("ledger-address"));
    }

    #[tokio::test]
    async fn test_validate_fails_without_ledger_key() {
        let (_dir, path) = write_config("relayer.yaml", MINIMAL_YAML);
        let config = RelayerNodeConfig::load(&path).unwrap();
        let err = config
            .validate(Arc::new(RelayerMetrics::new_for_testing()))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to read ledger key"));
    }
}
