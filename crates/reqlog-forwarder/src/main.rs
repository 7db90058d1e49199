// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards newline-delimited JSON request events from stdin to a collector.
//!
//! Each input line is one serialized `Event`. Malformed lines are logged and
//! skipped. The queue is drained when stdin closes or on SIGTERM / Ctrl+C.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use reqlog_shipper::{logger, Config, Event, LogShipper, ShutdownCoordinator};

#[tokio::main]
pub async fn main() {
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("REQLOG | ERROR | {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logger::init(&config) {
        eprintln!("REQLOG | ERROR | {e}");
    }

    let shipper = match LogShipper::start(Arc::clone(&config)) {
        Ok(shipper) => shipper,
        Err(e) => {
            error!("Unable to start shipper: {e}");
            std::process::exit(1);
        }
    };

    let coordinator = ShutdownCoordinator::new(shipper.clone());
    let handle = coordinator.handle();
    let shutdown = tokio::spawn(coordinator.run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number: u64 = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    line_number += 1;
                    if let Some(event) = parse_line(&line, line_number) {
                        shipper.push(event);
                    }
                }
                Ok(None) => {
                    info!("Input closed after {line_number} lines");
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {e}");
                    break;
                }
            },
            () = handle.triggered() => {
                debug!("Shutdown triggered, no longer reading input");
                break;
            }
        }
    }

    handle.trigger();
    match shutdown.await {
        Ok(report) => info!(
            "Forwarder stopped ({:?}): {} accepted, {} delivered, {} dropped, {} evicted",
            report.reason,
            report.stats.accepted,
            report.stats.delivered,
            report.stats.dropped,
            report.stats.evicted
        ),
        Err(e) => error!("Shutdown task failed: {e}"),
    }
}

/// Parses one input line. Blank lines and malformed JSON yield `None`.
fn parse_line(line: &str, line_number: u64) -> Option<Event> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Event>(trimmed) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed event on line {line_number}: {e}");
            None
        }
    }
}
