// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while constructing or running a shipper.
///
/// None of these ever reach the host through `push`; they are returned from
/// fallible constructors or written to the diagnostic log.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Transient delivery failure: {0}")]
    TransientDeliveryFailure(#[from] TransportError),

    #[error("Retry budget exhausted after {attempts} attempts, dropping {events} events")]
    RetryBudgetExhausted { attempts: u32, events: usize },

    #[error("Sanitization failed: {0}")]
    SanitizationFailure(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failure of a single transmission.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}
