// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decides when the queue is drained.
//!
//! Two triggers converge on [`FlushScheduler::request_flush`]:
//!
//! 1. **Size**: a push that brings the queue to the batch threshold
//! 2. **Timer**: a periodic tick, ignored when the queue is empty
//!
//! A flush snapshots the whole queue, leaves an empty one in its place and
//! dispatches the snapshot on a spawned task. The `flushing` flag keeps a
//! second flush from starting until that task is done, so batches never
//! interleave on the wire.
//!
//! Once `shutting_down` is set the queue refuses new events and only
//! [`FlushScheduler::drain`] can empty it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::event::Event;
use crate::queue::{EventQueue, PushOutcome};
use crate::stats::ShipperStats;

/// What asked for a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Size,
    Timer,
    Manual,
}

#[derive(Debug)]
struct QueueState {
    queue: EventQueue,
    flushing: bool,
    shutting_down: bool,
    in_flight: Option<JoinHandle<()>>,
}

pub struct FlushScheduler {
    state: Mutex<QueueState>,
    /// Cancelled once the final drain has finished (or was abandoned).
    drained: CancellationToken,
    dispatcher: Dispatcher,
    runtime: Handle,
    batch_size: usize,
    stats: Arc<ShipperStats>,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        runtime: Handle,
        queue_capacity: usize,
        batch_size: usize,
        stats: Arc<ShipperStats>,
    ) -> Self {
        FlushScheduler {
            state: Mutex::new(QueueState {
                queue: EventQueue::new(queue_capacity),
                flushing: false,
                shutting_down: false,
                in_flight: None,
            }),
            drained: CancellationToken::new(),
            dispatcher,
            runtime,
            batch_size,
            stats,
        }
    }

    /// Admits `event` unless shutdown has begun. Never blocks on I/O.
    pub fn push(self: &Arc<Self>, event: Event) {
        let reached_threshold = {
            let mut state = self.state.lock();
            if state.shutting_down {
                self.stats.record_rejected();
                debug!("QUEUE | Shutting down, discarding event");
                return;
            }
            if state.queue.push(event) == PushOutcome::Evicted {
                self.stats.record_evicted();
            }
            self.stats.record_accepted();
            state.queue.len() >= self.batch_size
        };

        if reached_threshold {
            self.request_flush(FlushTrigger::Size);
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.state.lock().flushing
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Starts a flush unless one is running, the queue is empty or shutdown
    /// has begun. Returns whether a dispatch was spawned.
    ///
    /// Does not wait for the dispatch to finish.
    ///
    /// # Arguments
    ///
    /// * `trigger` - What asked for the flush, used for logging only
    pub fn request_flush(self: &Arc<Self>, trigger: FlushTrigger) -> bool {
        let mut state = self.state.lock();
        if state.flushing || state.shutting_down || state.queue.is_empty() {
            return false;
        }

        let batch = state.queue.take_all();
        state.flushing = true;
        debug!(
            "FLUSH | {trigger:?} trigger, dispatching {} events",
            batch.len()
        );

        let scheduler = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            scheduler.dispatcher.send(&batch).await;
            scheduler.finish_flush();
        });
        state.in_flight = Some(handle);
        true
    }

    fn finish_flush(&self) {
        let mut state = self.state.lock();
        state.flushing = false;
        state.in_flight = None;
    }

    /// Spawns the periodic trigger. The first tick fires one `period` after
    /// the call.
    ///
    /// The task only holds a weak reference, so it exits when `token` is
    /// cancelled or when the last strong handle to the scheduler is gone.
    pub fn spawn_timer(
        self: &Arc<Self>,
        period: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let scheduler = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(scheduler) = scheduler.upgrade() else {
                            debug!("FLUSH | Scheduler dropped, stopping flush timer");
                            break;
                        };
                        scheduler.request_flush(FlushTrigger::Timer);
                    }
                    () = token.cancelled() => {
                        debug!("FLUSH | Flush timer stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Stops admission, waits for any in-flight flush, then dispatches what
    /// is left and waits for that too.
    ///
    /// # Returns
    ///
    /// * `Some(outcome)` - For the call that performed the drain
    /// * `None` - For any other call. It still resolves only after the
    ///   first call's drain has completed.
    pub async fn drain(&self) -> Option<DispatchOutcome> {
        let claimed = {
            let mut state = self.state.lock();
            if state.shutting_down {
                None
            } else {
                state.shutting_down = true;
                Some(state.in_flight.take())
            }
        };
        let Some(in_flight) = claimed else {
            debug!("SHUTDOWN | Drain already started, waiting for it to finish");
            self.drained.cancelled().await;
            return None;
        };
        // Signals completion even if this future is dropped halfway.
        let _done = self.drained.clone().drop_guard();

        if let Some(handle) = in_flight {
            debug!("SHUTDOWN | Waiting for in-flight flush");
            if let Err(e) = handle.await {
                warn!("SHUTDOWN | In-flight flush task failed: {e}");
            }
        }

        let batch = {
            let mut state = self.state.lock();
            state.flushing = true;
            state.queue.take_all()
        };
        info!("SHUTDOWN | Draining {} queued events", batch.len());
        let outcome = self.dispatcher.send(&batch).await;
        self.state.lock().flushing = false;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatcher::test_support::{enabled_config, MockTransport};
    use crate::event::RequestSnapshot;
    use std::sync::atomic::Ordering;

    fn event(i: usize) -> Event {
        Event::new(
            RequestSnapshot::new("GET", format!("/{i}")),
            Duration::from_millis(1),
        )
    }

    fn scheduler(config: Config, transport: &Arc<MockTransport>) -> Arc<FlushScheduler> {
        let stats = Arc::new(ShipperStats::default());
        let config = Arc::new(config);
        let dispatcher = Dispatcher::new(
            Arc::clone(&config),
            Arc::clone(transport) as Arc<dyn crate::dispatcher::Transport>,
            Arc::clone(&stats),
        )
        .unwrap();
        Arc::new(FlushScheduler::new(
            dispatcher,
            Handle::current(),
            config.queue_capacity,
            config.batch_size,
            stats,
        ))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_at_threshold() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);

        for i in 0..49 {
            scheduler.push(event(i));
        }
        settle().await;
        assert!(transport.paths().is_empty());
        assert_eq!(scheduler.size(), 49);

        scheduler.push(event(49));
        assert_eq!(scheduler.size(), 0);
        assert!(scheduler.is_flushing());
        settle().await;

        let paths = transport.paths();
        assert_eq!(paths.len(), 50);
        assert_eq!(paths[0], "/0");
        assert_eq!(paths[49], "/49");
        assert!(!scheduler.is_flushing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_trigger_after_interval() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);
        let token = CancellationToken::new();
        let timer = scheduler.spawn_timer(Duration::from_millis(5000), token.clone());

        for i in 0..3 {
            scheduler.push(event(i));
        }
        tokio::time::sleep(Duration::from_millis(4999)).await;
        settle().await;
        assert!(transport.paths().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(transport.paths(), vec!["/0", "/1", "/2"]);

        token.cancel();
        timer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_tick_on_empty_queue_is_noop() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);
        let token = CancellationToken::new();
        let timer = scheduler.spawn_timer(Duration::from_millis(100), token.clone());

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert!(transport.paths().is_empty());
        assert!(!scheduler.is_flushing());

        token.cancel();
        timer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_flushed_by_timer() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);
        let token = CancellationToken::new();
        let timer = scheduler.spawn_timer(Duration::from_millis(5000), token.clone());

        scheduler.push(event(7));
        tokio::time::sleep(Duration::from_millis(4999)).await;
        settle().await;
        assert!(transport.paths().is_empty());
        assert_eq!(scheduler.size(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(transport.paths(), vec!["/7"]);
        assert_eq!(scheduler.size(), 0);

        token.cancel();
        timer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_exits_once_scheduler_is_dropped() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);
        let timer = scheduler.spawn_timer(Duration::from_millis(5000), CancellationToken::new());
        scheduler.push(event(0));

        let weak = Arc::downgrade(&scheduler);
        drop(scheduler);
        assert!(weak.upgrade().is_none());

        tokio::time::timeout(Duration::from_secs(60), timer)
            .await
            .expect("timer should stop after the scheduler is dropped")
            .unwrap();
        assert!(transport.paths().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_drain_waits_for_first_to_finish() {
        let transport = Arc::new(MockTransport::slow(Duration::from_millis(500)));
        let scheduler = scheduler(enabled_config(), &transport);
        for i in 0..4 {
            scheduler.push(event(i));
        }

        let first = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.drain().await }
        });
        settle().await;
        assert!(scheduler.is_shutting_down());
        assert_eq!(transport.paths().len(), 1);

        assert_eq!(scheduler.drain().await, None);
        assert_eq!(transport.paths().len(), 4);
        assert_eq!(
            first.await.unwrap(),
            Some(DispatchOutcome::Succeeded { attempts: 1 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_drain_still_releases_waiters() {
        let transport = Arc::new(MockTransport::slow(Duration::from_millis(500)));
        let scheduler = scheduler(enabled_config(), &transport);
        scheduler.push(event(0));

        let first = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.drain().await }
        });
        settle().await;
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        let second = tokio::time::timeout(Duration::from_secs(1), scheduler.drain()).await;
        assert_eq!(second.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reentrant_flush() {
        let transport = Arc::new(MockTransport::slow(Duration::from_millis(100)));
        let scheduler = scheduler(enabled_config(), &transport);

        scheduler.push(event(0));
        assert!(scheduler.request_flush(FlushTrigger::Manual));
        scheduler.push(event(1));
        assert!(!scheduler.request_flush(FlushTrigger::Manual));
        assert!(!scheduler.request_flush(FlushTrigger::Timer));
        assert_eq!(scheduler.size(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!scheduler.is_flushing());
        assert!(scheduler.request_flush(FlushTrigger::Manual));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(transport.paths(), vec!["/0", "/1"]);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_flush_on_empty_queue() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);
        assert!(!scheduler.request_flush(FlushTrigger::Manual));
        assert!(!scheduler.is_flushing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overload_keeps_newest_thousand() {
        let transport = Arc::new(MockTransport::default());
        // A held flushing flag turns every size trigger into a no-op.
        let config = Config {
            batch_size: 1000,
            ..enabled_config()
        };
        let scheduler = scheduler(config, &transport);
        scheduler.state.lock().flushing = true;

        for i in 0..1500 {
            scheduler.push(event(i));
        }
        assert_eq!(scheduler.size(), 1000);

        let events = scheduler.state.lock().queue.take_all();
        assert_eq!(events[0].request.path, "/500");
        assert_eq!(events[999].request.path, "/1499");
        assert_eq!(scheduler.stats.snapshot().evicted, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_in_flight_then_sends_rest() {
        let transport = Arc::new(MockTransport::slow(Duration::from_millis(50)));
        let scheduler = scheduler(enabled_config(), &transport);

        scheduler.push(event(0));
        assert!(scheduler.request_flush(FlushTrigger::Manual));
        scheduler.push(event(1));
        scheduler.push(event(2));

        let outcome = scheduler.drain().await;
        assert_eq!(outcome, Some(DispatchOutcome::Succeeded { attempts: 1 }));
        assert_eq!(transport.paths(), vec!["/0", "/1", "/2"]);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_after_shutdown_is_discarded() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(enabled_config(), &transport);

        assert!(scheduler.drain().await.is_some());
        scheduler.push(event(0));
        assert_eq!(scheduler.size(), 0);
        assert!(!scheduler.request_flush(FlushTrigger::Manual));
        assert_eq!(scheduler.stats.snapshot().rejected, 1);
        assert!(scheduler.drain().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_flush_discards_snapshot() {
        let transport = Arc::new(MockTransport::default());
        let scheduler = scheduler(Config::default(), &transport);

        for i in 0..50 {
            scheduler.push(event(i));
        }
        settle().await;
        assert_eq!(scheduler.size(), 0);
        assert!(transport.paths().is_empty());
        assert_eq!(scheduler.stats.snapshot().skipped, 50);
    }
}
