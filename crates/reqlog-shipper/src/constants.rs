// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default limits and wire constants for the shipper.
//!
//! Every tunable here can be overridden through [`crate::config::Config`];
//! these values are what a fresh configuration starts from.

use std::time::Duration;

/// Maximum number of events held in memory before FIFO eviction kicks in.
///
/// Assuming ~2KB per captured request, the default bounds the queue at
/// roughly 2MB.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Queue length at which a push requests a flush without waiting for the timer.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Period of the time-based flush trigger.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);

/// Attempts per batch, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt. Later delays grow by
/// [`DEFAULT_BACKOFF_MULTIPLIER`].
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Size budget of a sanitized body, in bytes (10 KiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1_024;

/// Per-request timeout for a single transmission.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Path appended to the configured base URL.
pub const INGEST_PATH: &str = "/api/sdk/logs";

/// Value of the client identifier header sent with every transmission.
pub const CLIENT_IDENTIFIER: &str = concat!("reqlog-shipper-rust/", env!("CARGO_PKG_VERSION"));

/// Name of the client identifier header.
pub const CLIENT_HEADER: &str = "X-Reqlog-Client";

pub const REDACTED_MARKER: &str = "[REDACTED]";
pub const CIRCULAR_MARKER: &str = "[Circular Reference]";
pub const TRUNCATION_MARKER: &str = "... [TRUNCATED]";
pub const SANITIZE_FAILED_MARKER: &str = "[Unable to sanitize]";
pub const BINARY_BODY_PLACEHOLDER: &str = "[Binary or multipart content omitted]";

/// Nesting depth after which sanitization gives up and yields
/// [`SANITIZE_FAILED_MARKER`].
pub(crate) const MAX_SANITIZE_DEPTH: usize = 64;
