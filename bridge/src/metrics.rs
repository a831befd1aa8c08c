// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Registry,
};

const RPC_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0, 7.5, 10., 15., 20., 30.,
];

#[derive(Clone, Debug)]
pub struct RelayerMetrics {
    pub(crate) near_rpc_queries: IntCounterVec,
    pub(crate) near_rpc_queries_latency: HistogramVec,
    pub(crate) near_rpc_errors: IntCounterVec,

    pub(crate) resolver_selections: IntCounterVec,
    pub(crate) scanner_probes: IntCounter,
    pub(crate) scanner_last_drift: IntGauge,

    pub(crate) epoch_iterations_ok: IntCounter,
    pub(crate) epoch_iterations_err: IntCounterVec,
    pub(crate) last_committed_checkpoint: IntGauge,

    pub(crate) bus_tasks_published: IntCounter,
    pub(crate) bus_publish_errors: IntCounter,
    pub(crate) bus_results_received: IntCounterVec,
    pub(crate) proof_submissions_ok: IntCounter,
    pub(crate) proof_submissions_err: IntCounter,
    pub(crate) proof_status_transitions: IntCounterVec,

    pub(crate) requests_received: IntCounterVec,
    pub(crate) requests_ok: IntCounterVec,
    pub(crate) err_requests: IntCounterVec,
    pub(crate) requests_inflight: IntGaugeVec,
}

impl RelayerMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            near_rpc_queries: register_int_counter_vec_with_registry!(
                "relayer_near_rpc_queries",
                "Total number of queries issued to NEAR RPC nodes",
                &["method", "endpoint"],
                registry,
            )
            .unwrap(),
            near_rpc_queries_latency: register_histogram_vec_with_registry!(
                "relayer_near_rpc_queries_latency",
                "Latency of NEAR RPC queries",
                &["method", "endpoint"],
                RPC_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            near_rpc_errors: register_int_counter_vec_with_registry!(
                "relayer_near_rpc_errors",
                "Total number of NEAR RPC queries that returned an error cause",
                &["endpoint", "cause"],
                registry,
            )
            .unwrap(),
            resolver_selections: register_int_counter_vec_with_registry!(
                "relayer_resolver_selections",
                "Endpoint chosen by the node resolver",
                &["endpoint"],
                registry,
            )
            .unwrap(),
            scanner_probes: register_int_counter_with_registry!(
                "relayer_scanner_probes",
                "Total number of boundary block pairs probed by the epoch scanner",
                registry,
            )
            .unwrap(),
            scanner_last_drift: register_int_gauge_with_registry!(
                "relayer_scanner_last_drift",
                "Cursor drift of the last successful boundary scan",
                registry,
            )
            .unwrap(),
            epoch_iterations_ok: register_int_counter_with_registry!(
                "relayer_epoch_iterations_ok",
                "Total number of epoch iterations that advanced the checkpoint",
                registry,
            )
            .unwrap(),
            epoch_iterations_err: register_int_counter_vec_with_registry!(
                "relayer_epoch_iterations_err",
                "Total number of failed epoch iterations by error type",
                &["error_type"],
                registry,
            )
            .unwrap(),
            last_committed_checkpoint: register_int_gauge_with_registry!(
                "relayer_last_committed_checkpoint",
                "Checkpoint height read back from the ledger after the last commit",
                registry,
            )
            .unwrap(),
            bus_tasks_published: register_int_counter_with_registry!(
                "relayer_bus_tasks_published",
                "Total number of proving tasks published to the bus",
                registry,
            )
            .unwrap(),
            bus_publish_errors: register_int_counter_with_registry!(
                "relayer_bus_publish_errors",
                "Total number of failed task publications",
                registry,
            )
            .unwrap(),
            bus_results_received: register_int_counter_vec_with_registry!(
                "relayer_bus_results_received",
                "Total number of proving results consumed from the bus",
                &["status"],
                registry,
            )
            .unwrap(),
            proof_submissions_ok: register_int_counter_with_registry!(
                "relayer_proof_submissions_ok",
                "Total number of proofs accepted by the ledger",
                registry,
            )
            .unwrap(),
            proof_submissions_err: register_int_counter_with_registry!(
                "relayer_proof_submissions_err",
                "Total number of proofs the ledger rejected or failed to include",
                registry,
            )
            .unwrap(),
            proof_status_transitions: register_int_counter_vec_with_registry!(
                "relayer_proof_status_transitions",
                "Total number of proof record status transitions by target status",
                &["status"],
                registry,
            )
            .unwrap(),
            requests_received: register_int_counter_vec_with_registry!(
                "relayer_requests_received",
                "Total number of requests received by type",
                &["type"],
                registry,
            )
            .unwrap(),
            requests_ok: register_int_counter_vec_with_registry!(
                "relayer_requests_ok",
                "Total number of ok requests by type",
                &["type"],
                registry,
            )
            .unwrap(),
            err_requests: register_int_counter_vec_with_registry!(
                "relayer_err_requests",
                "Total number of erred requests by type",
                &["type"],
                registry,
            )
            .unwrap(),
            requests_inflight: register_int_gauge_vec_with_registry!(
                "relayer_requests_inflight",
                "Total number of inflight requests by type",
                &["type"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
