// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Reqlog Shipper
//!
//! Ships captured HTTP request/response events to a remote collector without
//! ever blocking or failing the host application.
//!
//! ## Overview
//!
//! - [`queue`]: bounded FIFO buffer with drop-oldest eviction
//! - [`scheduler`]: size and timer triggers, one flush in flight at a time
//! - [`dispatcher`]: sequential per-event delivery with exponential backoff
//! - [`sanitizer`]: redaction, cycle-safe walking and size capping
//! - [`shutdown`]: final drain on SIGTERM / Ctrl+C
//! - [`shipper`]: the [`LogShipper`] handle tying these together
//!
//! Delivery is best effort: batches that exhaust their retry budget are
//! logged and dropped, and a retried batch may deliver some events twice.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(unused_extern_crates)]
#![deny(unreachable_pub)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod http;
pub mod logger;
pub mod queue;
pub mod sanitizer;
pub mod scheduler;
pub mod shipper;
pub mod shutdown;
pub mod stats;

pub use config::{Config, ConfigOverrides};
pub use dispatcher::{DispatchOutcome, Transport};
pub use error::{ShipperError, TransportError};
pub use event::{ErrorSnapshot, Event, RequestSnapshot, ResponseSnapshot, WireEvent};
pub use sanitizer::{CapturedValue, Sanitizer};
pub use shipper::LogShipper;
pub use shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownReason, ShutdownReport};
pub use stats::StatsSnapshot;
