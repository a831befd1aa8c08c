// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::with_metrics;
use crate::{
    error::RelayerError,
    metrics::RelayerMetrics,
    server::handler::{ProofRequestHandler, ProofRequestHandlerTrait},
    types::ProofRecord,
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use axum::{
    http::{header, StatusCode},
    routing::{get, post},
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

pub mod handler;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";
pub const GENERATE_PROOF_PATH: &str = "/generate-proof";
pub const PROOF_STATUS_PATH: &str = "/proof-status";

#[derive(Debug, Deserialize)]
pub struct GenerateProofRequest {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ProofStatusQuery {
    pub hash: String,
}

type ServerState<H> = (Arc<H>, Arc<RelayerMetrics>, Registry);

/// Serves the proof API until `cancel` fires.
pub async fn run_server(
    socket_address: SocketAddr,
    handler: ProofRequestHandler,
    metrics: Arc<RelayerMetrics>,
    registry: Registry,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(socket_address).await?;
    info!("[Server] Listening on {}", socket_address);
    axum::serve(
        listener,
        make_router(Arc::new(handler), metrics, registry).into_make_service(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;
    info!("[Server] Stopped");
    Ok(())
}

pub(crate) fn make_router(
    handler: Arc<impl ProofRequestHandlerTrait + Sync + Send + 'static>,
    metrics: Arc<RelayerMetrics>,
    registry: Registry,
) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route(HEALTH_PATH, get(health_check))
        .route(METRICS_PATH, get(metrics_text))
        .route(GENERATE_PROOF_PATH, post(handle_generate_proof))
        .route(PROOF_STATUS_PATH, get(handle_proof_status))
        .with_state((handler, metrics, registry))
}

impl IntoResponse for RelayerError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics_text(
    State((_, _, registry)): State<ServerState<impl ProofRequestHandlerTrait + Sync + Send>>,
) -> Result<Response, RelayerError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| RelayerError::InternalError(format!("Failed to encode metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], buffer).into_response())
}

#[instrument(level = "error", skip_all, fields(hash = %request.hash))]
async fn handle_generate_proof(
    State((handler, metrics, _)): State<ServerState<impl ProofRequestHandlerTrait + Sync + Send>>,
    Json(request): Json<GenerateProofRequest>,
) -> Result<Json<ProofRecord>, RelayerError> {
    let future = async {
        let record = handler.handle_generate_proof(request.hash).await?;
        Ok::<_, RelayerError>(Json(record))
    };
    with_metrics!(metrics.clone(), "generate_proof", future).await
}

#[instrument(level = "error", skip_all, fields(hash = %query.hash))]
async fn handle_proof_status(
    State((handler, metrics, _)): State<ServerState<impl ProofRequestHandlerTrait + Sync + Send>>,
    Query(query): Query<ProofStatusQuery>,
) -> Result<Response, RelayerError> {
    let hash = query.hash.clone();
    let future = async { handler.handle_proof_status(query.hash).await };
    let record = with_metrics!(metrics.clone(), "proof_status", future).await?;
    Ok(match record {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("No proof record for {}", hash) })),
        )
            .into_response(),
    })
}

#[macro_export]
macro_rules! with_metrics {
    ($metrics:expr, $type_:expr, $func:expr) => {
        async move {
            info!("Received {} request", $type_);
            $metrics
                .requests_received
                .with_label_values(&[$type_])
                .inc();
            $metrics
                .requests_inflight
                .with_label_values(&[$type_])
                .inc();

            let result = $func.await;

            match &result {
                Ok(_) => {
                    info!("{} request succeeded", $type_);
                    $metrics.requests_ok.with_label_values(&[$type_]).inc();
                }
                Err(e) => {
                    info!("{} request failed: {:?}", $type_, e);
                    $metrics.err_requests.with_label_values(&[$type_]).inc();
                }
            }

            $metrics
                .requests_inflight
                .with_label_values(&[$type_])
                .dec();
            result
        }
    };
}
