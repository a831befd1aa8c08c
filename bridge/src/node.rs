// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::{RelayerNodeConfig, RelayerServerConfig},
    epoch_processor::EpochProcessor,
    epoch_scanner::EpochBoundaryScanner,
    metrics::RelayerMetrics,
    node_resolver::NodeResolver,
    proof_service::ProofService,
    proof_store::{InMemoryProofStore, ProofStore},
    proving_bus::{NatsProvingBus, ResultProcessor},
    server::{handler::ProofRequestHandler, run_server},
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Starts the epoch processing loop, the result consumer and the proof API.
/// The returned handle completes once all three have stopped. A component
/// that stops with an error cancels the others.
pub async fn run_relayer_node(
    config: RelayerNodeConfig,
    prometheus_registry: prometheus::Registry,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let metrics = Arc::new(RelayerMetrics::new(&prometheus_registry));
    let server_config = config.validate(metrics.clone()).await?;
    let RelayerServerConfig {
        server_listen_port,
        primary,
        archival,
        ledger,
        epoch_prover,
        bus,
        epoch_length,
        archival_retention_epochs,
        max_boundary_drift,
        retry,
    } = server_config;

    let resolver = Arc::new(
        NodeResolver::new(primary, archival, epoch_length, archival_retention_epochs)
            .with_metrics(metrics.clone()),
    );
    let scanner = Arc::new(
        EpochBoundaryScanner::new(ledger.clone(), epoch_length, max_boundary_drift)
            .with_metrics(metrics.clone()),
    );
    let store: Arc<dyn ProofStore> = Arc::new(InMemoryProofStore::new());
    let bus = Arc::new(NatsProvingBus::new(bus, metrics.clone()));

    let mut handles = vec![];

    let mut processor = EpochProcessor::new(
        resolver.clone(),
        scanner.clone(),
        ledger.clone(),
        epoch_prover,
        retry,
        metrics.clone(),
    );
    handles.push(tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = processor.run(cancel.clone()).await {
                error!("[EpochProcessor] Stopped: {}", e);
                cancel.cancel();
            }
        }
    }));

    let result_processor = Arc::new(ResultProcessor::new(
        store.clone(),
        ledger.clone(),
        metrics.clone(),
    ));
    handles.push(tokio::spawn({
        let bus = bus.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = bus.consume_results(result_processor, cancel.clone()).await {
                error!("[NATS] Result consumer stopped: {}", e);
                cancel.cancel();
            }
        }
    }));

    let service = Arc::new(ProofService::new(resolver, scanner, bus, store, ledger));
    let socket_address = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), server_listen_port);
    handles.push(tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = run_server(
                socket_address,
                ProofRequestHandler::new(service),
                metrics,
                prometheus_registry,
                cancel.clone(),
            )
            .await
            {
                error!("[Server] Stopped: {}", e);
                cancel.cancel();
            }
        }
    }));

    info!("Relayer node started");
    Ok(tokio::spawn(async move {
        futures::future::join_all(handles).await;
        info!("Relayer node stopped");
    }))
}
