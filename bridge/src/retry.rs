// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Retry policy applied by the epoch processing loop between iterations.

use crate::error::RelayerError;
use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Which failures are retried at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryScope {
    #[default]
    All,
    /// Stops on permanent kinds such as `UnknownBlock`.
    TransientOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackoffSchedule {
    #[serde(rename_all = "kebab-case")]
    Fixed { delay_ms: u64 },
    #[serde(rename_all = "kebab-case")]
    Exponential {
        initial_ms: u64,
        multiplier: f64,
        max_ms: u64,
    },
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        BackoffSchedule::Fixed {
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl BackoffSchedule {
    /// Fresh delay sequence for this schedule. Delays carry no jitter and
    /// the sequence never runs out; giving up is decided by `RetryPolicy`.
    pub fn build(&self) -> Box<dyn Backoff + Send> {
        match self {
            BackoffSchedule::Fixed { delay_ms } => {
                Box::new(Constant::new(Duration::from_millis(*delay_ms)))
            }
            BackoffSchedule::Exponential {
                initial_ms,
                multiplier,
                max_ms,
            } => {
                let initial_interval = Duration::from_millis(*initial_ms);
                let mut backoff = ExponentialBackoff {
                    current_interval: initial_interval,
                    initial_interval,
                    randomization_factor: 0.0,
                    multiplier: *multiplier,
                    max_interval: Duration::from_millis(*max_ms),
                    max_elapsed_time: None,
                    ..Default::default()
                };
                backoff.reset();
                Box::new(backoff)
            }
        }
    }
}

/// Default: retry everything every 5 seconds, forever.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryPolicy {
    pub retry_on: RetryScope,
    pub backoff: BackoffSchedule,
    /// Total attempts before giving up, `None` for unlimited.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn build_backoff(&self) -> Box<dyn Backoff + Send> {
        self.backoff.build()
    }

    /// Returns the delay before retrying, drawn from `backoff`, or `None`
    /// when the caller should give up.
    pub fn next_delay<B: Backoff + ?Sized>(
        &self,
        backoff: &mut B,
        err: &RelayerError,
        consecutive_failures: u32,
    ) -> Option<Duration> {
        if self.retry_on == RetryScope::TransientOnly && !err.is_transient() {
            return None;
        }
        if let Some(max_attempts) = self.max_attempts {
            if consecutive_failures >= max_attempts {
                return None;
            }
        }
        backoff.next_backoff()
    }
}
