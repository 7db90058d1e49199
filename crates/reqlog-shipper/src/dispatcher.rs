// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch delivery with bounded retries.
//!
//! A batch is sent one event per request, strictly in order. Any failure
//! aborts the attempt and the *whole* batch is resent from its first event
//! after an exponential backoff, so the collector may see duplicates of the
//! events that made it through before the failure.
//!
//! # Retry Schedule
//!
//! With the defaults (3 attempts, 1000 ms initial delay, multiplier 2):
//!
//! ```text
//! attempt 1 --fail--> wait 1000 ms --> attempt 2 --fail--> wait 2000 ms --> attempt 3 --fail--> drop
//! ```
//!
//! An exhausted batch is logged and dropped; it never surfaces to the host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{ShipperError, TransportError};
use crate::event::{Event, WireEvent};
use crate::sanitizer::Sanitizer;
use crate::stats::ShipperStats;

/// Delivers a single wire event to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, event: &WireEvent) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            multiplier: config.backoff_multiplier,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Progress of one batch through the retry machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Attempting(u32),
    RetryScheduled(u32),
    Succeeded,
    Exhausted,
}

impl DispatchState {
    /// Next state given whether the current attempt went through.
    ///
    /// `attempt_succeeded` is only consulted in [`DispatchState::Attempting`];
    /// terminal states stay put.
    #[must_use]
    pub fn advance(self, attempt_succeeded: bool, max_attempts: u32) -> Self {
        match self {
            DispatchState::Attempting(_) if attempt_succeeded => DispatchState::Succeeded,
            DispatchState::Attempting(n) if n >= max_attempts => DispatchState::Exhausted,
            DispatchState::Attempting(n) => DispatchState::RetryScheduled(n),
            DispatchState::RetryScheduled(n) => DispatchState::Attempting(n + 1),
            terminal => terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every event was accepted; `attempts` is 0 for an empty batch
    Succeeded { attempts: u32 },
    /// Transmission is not configured, the batch was discarded unsent
    Skipped,
    Exhausted { attempts: u32 },
}

/// The batch being delivered and which attempt is in progress.
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    pub attempt: u32,
    pub batch: &'a [Event],
}

pub struct Dispatcher {
    config: Arc<Config>,
    sanitizer: Sanitizer,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    stats: Arc<ShipperStats>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        stats: Arc<ShipperStats>,
    ) -> Result<Self, ShipperError> {
        Ok(Dispatcher {
            sanitizer: Sanitizer::new(&config)?,
            retry: RetryPolicy::from_config(&config),
            config,
            transport,
            stats,
        })
    }

    /// Delivers `batch`, retrying the whole of it on any failure.
    ///
    /// Never returns an error: an exhausted batch is logged and counted as
    /// dropped.
    ///
    /// # Arguments
    ///
    /// * `batch` - Events in queue order. Each attempt restarts from the first one
    ///
    /// # Returns
    ///
    /// * `Succeeded { attempts }` - Every event was accepted
    /// * `Skipped` - API key or base URL is missing, nothing was sent
    /// * `Exhausted { attempts }` - The retry budget ran out and the batch was dropped
    pub async fn send(&self, batch: &[Event]) -> DispatchOutcome {
        if batch.is_empty() {
            return DispatchOutcome::Succeeded { attempts: 0 };
        }
        if !self.config.transmission_enabled() {
            debug!(
                "DISPATCH | API key or base URL not configured, skipping {} events",
                batch.len()
            );
            self.stats.record_skipped(batch.len());
            return DispatchOutcome::Skipped;
        }

        let mut state = DispatchState::Attempting(1);
        let mut attempts = 0;
        loop {
            state = match state {
                DispatchState::Attempting(attempt) => {
                    attempts = attempt;
                    let context = RetryContext { attempt, batch };
                    let result = self.attempt(context).await;
                    if let Err(e) = &result {
                        warn!(
                            "DISPATCH | Attempt {attempt}/{} failed: {e}",
                            self.retry.max_attempts
                        );
                    }
                    state.advance(result.is_ok(), self.retry.max_attempts)
                }
                DispatchState::RetryScheduled(attempt) => {
                    let delay = self.retry.backoff_for(attempt);
                    debug!(
                        "DISPATCH | Retrying batch of {} events in {} ms",
                        batch.len(),
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    self.stats.record_retry();
                    state.advance(false, self.retry.max_attempts)
                }
                DispatchState::Succeeded => {
                    debug!(
                        "DISPATCH | Delivered {} events in {attempts} attempt(s)",
                        batch.len()
                    );
                    self.stats.record_delivered(batch.len());
                    return DispatchOutcome::Succeeded { attempts };
                }
                DispatchState::Exhausted => {
                    let e = ShipperError::RetryBudgetExhausted {
                        attempts,
                        events: batch.len(),
                    };
                    error!("DISPATCH | {e}");
                    self.stats.record_dropped(batch.len());
                    return DispatchOutcome::Exhausted { attempts };
                }
            };
        }
    }

    /// Sends every event of the batch in order, stopping at the first failure.
    async fn attempt(&self, context: RetryContext<'_>) -> Result<(), ShipperError> {
        for (index, event) in context.batch.iter().enumerate() {
            let wire = WireEvent::from_event(event, &self.sanitizer);
            if let Err(e) = self.transport.send(&wire).await {
                debug!(
                    "DISPATCH | Event {}/{} of attempt {} failed",
                    index + 1,
                    context.batch.len(),
                    context.attempt
                );
                return Err(e.into());
            }
        }
        Ok(())
    }
}
