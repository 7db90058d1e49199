// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Graceful shutdown on termination signals.
//!
//! [`ShutdownCoordinator::run`] waits for SIGTERM, Ctrl+C or a programmatic
//! [`ShutdownHandle::trigger`], then performs the shipper's final drain and
//! reports what happened. The drain is bounded only by the dispatcher's
//! per-request timeout and retry budget.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::dispatcher::DispatchOutcome;
use crate::shipper::LogShipper;
use crate::stats::StatsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGTERM
    Terminate,
    /// SIGINT / Ctrl+C
    UserInterrupt,
    /// [`ShutdownHandle::trigger`]
    Requested,
}

/// Result of a completed shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    /// Outcome of the final drain; `None` if the shipper had already been
    /// drained elsewhere
    pub outcome: Option<DispatchOutcome>,
    pub stats: StatsSnapshot,
}

/// Cloneable trigger for a coordinator's shutdown sequence.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

pub struct ShutdownCoordinator {
    shipper: LogShipper,
    token: CancellationToken,
}

impl ShutdownCoordinator {
    #[must_use]
    pub fn new(shipper: LogShipper) -> Self {
        ShutdownCoordinator {
            shipper,
            token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.token.clone(),
        }
    }

    /// Waits for a shutdown request, then drains the shipper.
    pub async fn run(self) -> ShutdownReport {
        let reason = self.wait_for_shutdown().await;
        // Signals also release anyone waiting on a handle.
        self.token.cancel();
        info!("SHUTDOWN | Shutdown requested ({reason:?}), draining queue");

        let outcome = self.shipper.drain_and_stop().await;
        let stats = self.shipper.stats();
        info!(
            "SHUTDOWN | Shutdown complete: {} delivered, {} dropped, {} evicted",
            stats.delivered, stats.dropped, stats.evicted
        );
        ShutdownReport {
            reason,
            outcome,
            stats,
        }
    }

    async fn wait_for_shutdown(&self) -> ShutdownReason {
        tokio::select! {
            () = self.token.cancelled() => ShutdownReason::Requested,
            () = interrupt() => ShutdownReason::UserInterrupt,
            () = terminate() => ShutdownReason::Terminate,
        }
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("SHUTDOWN | Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("SHUTDOWN | Failed to listen for SIGTERM: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::test_support::{enabled_config, MockTransport};
    use crate::dispatcher::Transport;
    use crate::event::{Event, RequestSnapshot};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_trigger_drains_queue() {
        let transport = Arc::new(MockTransport::default());
        let shipper = LogShipper::start_with_transport(
            Arc::new(enabled_config()),
            Arc::clone(&transport) as Arc<dyn Transport>,
        )
        .unwrap();
        for i in 0..10 {
            shipper.push(Event::new(
                RequestSnapshot::new("GET", format!("/{i}")),
                Duration::from_millis(1),
            ));
        }

        let coordinator = ShutdownCoordinator::new(shipper.clone());
        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run());
        assert!(!handle.is_triggered());
        handle.trigger();

        let report = task.await.unwrap();
        assert_eq!(report.reason, ShutdownReason::Requested);
        assert_eq!(
            report.outcome,
            Some(DispatchOutcome::Succeeded { attempts: 1 })
        );
        assert_eq!(report.stats.delivered, 10);
        assert_eq!(transport.paths().len(), 10);
        assert!(shipper.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_when_already_drained() {
        let transport = Arc::new(MockTransport::default());
        let shipper = LogShipper::start_with_transport(
            Arc::new(enabled_config()),
            transport as Arc<dyn Transport>,
        )
        .unwrap();
        shipper.drain_and_stop().await;

        let coordinator = ShutdownCoordinator::new(shipper);
        coordinator.handle().trigger();
        let report = coordinator.run().await;
        assert_eq!(report.reason, ShutdownReason::Requested);
        assert!(report.outcome.is_none());
    }
}
