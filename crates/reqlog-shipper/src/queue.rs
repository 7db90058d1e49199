// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded in-memory buffer of captured events.
//!
//! # Memory Management
//!
//! The queue never holds more than its capacity. When full, the oldest event
//! is evicted before the new one is appended, so under sustained overload the
//! shipper keeps the most recent traffic and memory stays flat.
//!
//! The queue itself is not synchronized; [`crate::scheduler::FlushScheduler`]
//! owns it behind a mutex.

use std::collections::VecDeque;
use tracing::warn;

use crate::event::Event;

/// What happened to the queue on a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended without loss
    Admitted,
    /// Appended after the oldest event was dropped
    Evicted,
}

#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventQueue {
    /// Creates an empty queue holding at most `capacity` events.
    ///
    /// A zero capacity is rounded up to one; configuration validation rejects
    /// it before it gets here.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        EventQueue {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `event`, evicting the oldest entry when the queue is full.
    ///
    /// O(1) either way.
    pub fn push(&mut self, event: Event) -> PushOutcome {
        let outcome = if self.events.len() >= self.capacity {
            self.events.pop_front();
            warn!(
                "QUEUE | Event queue full ({} items), dropping oldest event",
                self.capacity
            );
            PushOutcome::Evicted
        } else {
            PushOutcome::Admitted
        };
        self.events.push_back(event);
        outcome
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes and returns every queued event, oldest first.
    pub fn take_all(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}
