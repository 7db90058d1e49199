// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The host-facing handle.
//!
//! A [`LogShipper`] is constructed explicitly and can be cloned freely; every
//! clone drives the same queue. Several independent shippers can live in one
//! process.
//!
//! # Lifecycle
//!
//! ```text
//! start() --> push()* / flush()* --> drain_and_stop()
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let shipper = LogShipper::start(Arc::new(Config::from_env()?))?;
//! shipper.push(event);
//! shipper.drain_and_stop().await;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatcher::{DispatchOutcome, Dispatcher, Transport};
use crate::error::ShipperError;
use crate::event::Event;
use crate::http::HttpTransport;
use crate::scheduler::{FlushScheduler, FlushTrigger};
use crate::stats::{ShipperStats, StatsSnapshot};

#[derive(Clone)]
pub struct LogShipper {
    scheduler: Arc<FlushScheduler>,
    stats: Arc<ShipperStats>,
    timer_token: CancellationToken,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LogShipper {
    /// Starts a shipper that posts to the configured collector over HTTP.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved settings, see [`Config::from_env`]
    ///
    /// # Returns
    ///
    /// A running shipper with its flush timer started, or an error if the
    /// configuration is invalid, the HTTP client cannot be built or no
    /// runtime is available
    pub fn start(config: Arc<Config>) -> Result<Self, ShipperError> {
        let transport = HttpTransport::new(&config)?;
        Self::start_with_transport(config, Arc::new(transport))
    }

    /// Starts a shipper that delivers through `transport`.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved settings
    /// * `transport` - Where each wire event is sent
    pub fn start_with_transport(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ShipperError> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| ShipperError::Runtime(format!("no Tokio runtime available: {e}")))?;

        if !config.transmission_enabled() {
            warn!("QUEUE | API key or base URL missing, events will be discarded unsent");
        }

        let stats = Arc::new(ShipperStats::default());
        let dispatcher = Dispatcher::new(Arc::clone(&config), transport, Arc::clone(&stats))?;
        let scheduler = Arc::new(FlushScheduler::new(
            dispatcher,
            runtime,
            config.queue_capacity,
            config.batch_size,
            Arc::clone(&stats),
        ));

        let timer_token = CancellationToken::new();
        let timer = scheduler.spawn_timer(config.flush_interval, timer_token.clone());
        info!(
            "QUEUE | Shipper started (capacity {}, batch size {}, flush interval {} ms)",
            config.queue_capacity,
            config.batch_size,
            config.flush_interval.as_millis()
        );

        Ok(LogShipper {
            scheduler,
            stats,
            timer_token,
            timer: Arc::new(Mutex::new(Some(timer))),
        })
    }

    /// Queues `event` for delivery. Never blocks and never fails; after
    /// shutdown has begun the event is discarded.
    pub fn push(&self, event: Event) {
        self.scheduler.push(event);
    }

    /// Number of events currently waiting in the queue.
    #[must_use]
    pub fn size(&self) -> usize {
        self.scheduler.size()
    }

    /// Requests a flush now. Returns `false` if one is already running, the
    /// queue is empty or shutdown has begun.
    pub fn flush(&self) -> bool {
        self.scheduler.request_flush(FlushTrigger::Manual)
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.scheduler.is_shutting_down()
    }

    /// Stops the timer, refuses further events and delivers what is queued.
    ///
    /// Returns the outcome of the final dispatch, or `None` if another call
    /// already drained this shipper.
    pub async fn drain_and_stop(&self) -> Option<DispatchOutcome> {
        self.timer_token.cancel();
        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                warn!("SHUTDOWN | Flush timer task failed: {e}");
            }
        }

        let outcome = self.scheduler.drain().await;
        match &outcome {
            Some(outcome) => debug!("SHUTDOWN | Final drain finished: {outcome:?}"),
            None => debug!("SHUTDOWN | Shipper already drained"),
        }
        outcome
    }
}
