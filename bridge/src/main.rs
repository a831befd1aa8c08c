// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use near_bridge_config::Config;
use near_header_bridge::config::RelayerNodeConfig;
use near_header_bridge::node::run_relayer_node;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
#[clap(name = env!("CARGO_BIN_NAME"))]
#[clap(version)]
struct Args {
    #[clap(long, env = "RELAYER_CONFIG_PATH")]
    pub config_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = RelayerNodeConfig::load(&args.config_path)?;
    info!("Loaded config from {:?}", args.config_path);

    let prometheus_registry = prometheus::Registry::new();
    let cancel = CancellationToken::new();

    let handle = run_relayer_node(config, prometheus_registry, cancel.clone()).await?;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            cancel.cancel();
        }
    });
    handle
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))
}
