// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! NATS transport for proving tasks and results.
//!
//! Tasks go to a JetStream work-queue stream so they survive until a prover
//! takes them. Results are read either from a plain subscription
//! (at-most-once) or from a durable pull consumer acknowledged after
//! processing (at-least-once).

use super::{ProvingTaskBus, ResultDelivery, ResultProcessor};
use crate::error::{RelayerError, RelayerResult};
use crate::metrics::RelayerMetrics;
use crate::types::ProvingTask;
use async_nats::jetstream::{self, consumer::PullConsumer, stream::RetentionPolicy};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TASK_SUBJECT: &str = "PROVING_TASKS";
pub const DEFAULT_TASK_STREAM: &str = "PROVING_TASKS_STREAM";
pub const DEFAULT_RESULT_SUBJECT: &str = "PROVING_RESULTS";
pub const DEFAULT_RESULT_STREAM: &str = "PROVING_RESULTS_STREAM";
pub const DEFAULT_RESULT_CONSUMER: &str = "near-header-bridge";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct NatsBusConfig {
    pub nats_url: String,
    pub task_subject: String,
    pub task_stream: String,
    pub result_subject: String,
    pub result_stream: String,
    pub result_delivery: ResultDelivery,
    pub result_consumer: String,
    pub reconnect_delay: Duration,
}

impl NatsBusConfig {
    pub fn new(nats_url: impl Into<String>) -> Self {
        Self {
            nats_url: nats_url.into(),
            task_subject: DEFAULT_TASK_SUBJECT.to_string(),
            task_stream: DEFAULT_TASK_STREAM.to_string(),
            result_subject: DEFAULT_RESULT_SUBJECT.to_string(),
            result_stream: DEFAULT_RESULT_STREAM.to_string(),
            result_delivery: ResultDelivery::default(),
            result_consumer: DEFAULT_RESULT_CONSUMER.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

pub struct NatsProvingBus {
    config: NatsBusConfig,
    client: OnceCell<async_nats::Client>,
    jetstream: OnceCell<jetstream::Context>,
    metrics: Arc<RelayerMetrics>,
}

/// Connects, waiting `reconnect_delay` and trying exactly once more if the
/// first attempt fails.
pub async fn connect_with_retry(
    nats_url: &str,
    reconnect_delay: Duration,
) -> RelayerResult<async_nats::Client> {
    match async_nats::connect(nats_url).await {
        Ok(client) => Ok(client),
        Err(e) => {
            warn!(
                "[NATS] Failed to connect to {}: {}, retrying in {:?}",
                nats_url, e, reconnect_delay
            );
            tokio::time::sleep(reconnect_delay).await;
            async_nats::connect(nats_url).await.map_err(|e| {
                RelayerError::BusError(format!("Failed to connect to {}: {}", nats_url, e))
            })
        }
    }
}

impl NatsProvingBus {
    pub fn new(config: NatsBusConfig, metrics: Arc<RelayerMetrics>) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            jetstream: OnceCell::new(),
            metrics,
        }
    }

    async fn client(&self) -> RelayerResult<&async_nats::Client> {
        self.client
            .get_or_try_init(|| async {
                let client =
                    connect_with_retry(&self.config.nats_url, self.config.reconnect_delay).await?;
                info!("[NATS] Connected to {}", self.config.nats_url);
                Ok::<_, RelayerError>(client)
            })
            .await
    }

    /// JetStream context with the task stream in place.
    async fn task_context(&self) -> RelayerResult<&jetstream::Context> {
        self.jetstream
            .get_or_try_init(|| async {
                let context = jetstream::new(self.client().await?.clone());
                context
                    .get_or_create_stream(jetstream::stream::Config {
                        name: self.config.task_stream.clone(),
                        subjects: vec![self.config.task_subject.clone()],
                        retention: RetentionPolicy::WorkQueue,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| {
                        RelayerError::BusError(format!(
                            "Failed to create stream {}: {}",
                            self.config.task_stream, e
                        ))
                    })?;
                Ok::<_, RelayerError>(context)
            })
            .await
    }

    /// Consumes results until `cancel` fires. One message is processed at a
    /// time; a failure on one message never stops the loop.
    pub async fn consume_results(
        &self,
        processor: Arc<ResultProcessor>,
        cancel: CancellationToken,
    ) -> RelayerResult<()> {
        info!(
            "[NATS] Consuming results on {} ({:?})",
            self.config.result_subject, self.config.result_delivery
        );
        match self.config.result_delivery {
            ResultDelivery::AtMostOnce => self.consume_at_most_once(&processor, cancel).await,
            ResultDelivery::AtLeastOnce => self.consume_at_least_once(&processor, cancel).await,
        }
    }

    async fn consume_at_most_once(
        &self,
        processor: &ResultProcessor,
        cancel: CancellationToken,
    ) -> RelayerResult<()> {
        let mut subscriber = self
            .client()
            .await?
            .subscribe(self.config.result_subject.clone())
            .await
            .map_err(|e| RelayerError::BusError(format!("Subscribe failed: {}", e)))?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[NATS] Result consumer cancelled");
                    return Ok(());
                }
                message = subscriber.next() => {
                    let Some(message) = message else {
                        return Err(RelayerError::BusError(
                            "Result subscription closed".to_string(),
                        ));
                    };
                    handle_result(processor, &message.payload).await;
                }
            }
        }
    }

    async fn consume_at_least_once(
        &self,
        processor: &ResultProcessor,
        cancel: CancellationToken,
    ) -> RelayerResult<()> {
        let context = jetstream::new(self.client().await?.clone());
        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: self.config.result_stream.clone(),
                subjects: vec![self.config.result_subject.clone()],
                ..Default::default()
            })
            .await
            .map_err(|e| {
                RelayerError::BusError(format!(
                    "Failed to create stream {}: {}",
                    self.config.result_stream, e
                ))
            })?;
        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                &self.config.result_consumer,
                jetstream::consumer::pull::Config {
                    durable_name: Some(self.config.result_consumer.clone()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RelayerError::BusError(format!("Failed to create consumer: {}", e)))?;
        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| RelayerError::BusError(format!("Failed to pull results: {}", e)))?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[NATS] Result consumer cancelled");
                    return Ok(());
                }
                message = messages.next() => {
                    let message = match message {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            warn!("[NATS] Failed to receive result: {}", e);
                            continue;
                        }
                        None => {
                            return Err(RelayerError::BusError(
                                "Result consumer closed".to_string(),
                            ));
                        }
                    };
                    // transient failures stay unacked and are redelivered
                    if handle_result(processor, &message.payload).await {
                        if let Err(e) = message.ack().await {
                            warn!("[NATS] Failed to ack result: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Returns whether the message is settled and may be acknowledged.
async fn handle_result(processor: &ResultProcessor, payload: &[u8]) -> bool {
    match processor.process_payload(payload).await {
        Ok(outcome) => {
            debug!("[NATS] Result handled: {:?}", outcome);
            true
        }
        Err(e) => {
            error!("[NATS] Failed to handle result: {}", e);
            !e.is_transient()
        }
    }
}

#[async_trait]
impl ProvingTaskBus for NatsProvingBus {
    async fn publish(&self, task: &ProvingTask) -> RelayerResult<()> {
        let payload = task.to_json_bytes()?;
        let result = async {
            let ack = self
                .task_context()
                .await?
                .publish(self.config.task_subject.clone(), payload.into())
                .await
                .map_err(|e| RelayerError::BusError(format!("Publish failed: {}", e)))?;
            ack.await
                .map_err(|e| RelayerError::BusError(format!("Publish not acknowledged: {}", e)))
        }
        .await;

        match result {
            Ok(ack) => {
                self.metrics.bus_tasks_published.inc();
                info!(
                    "[NATS] Published task for {} to {} (seq {})",
                    task.matching_hash(),
                    self.config.task_subject,
                    ack.sequence
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.bus_publish_errors.inc();
                Err(e)
            }
        }
    }
}
