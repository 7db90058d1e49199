// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Captured request events and their wire representation.
//!
//! An [`Event`] is what the capture hooks hand to the shipper. It is
//! immutable once pushed. A [`WireEvent`] is built from it, through the
//! [`Sanitizer`], every time a dispatch attempt transmits it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::sanitizer::Sanitizer;

/// One observed request/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    /// Trace identifier propagated by the caller, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub request: RequestSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSnapshot {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl RequestSnapshot {
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            client_ip: None,
        }
    }
}

impl Event {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(request: RequestSnapshot, duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            correlation_id: None,
            request,
            response: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_response(mut self, response: ResponseSnapshot) -> Self {
        self.response = Some(response);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorSnapshot) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// JSON body posted to the collector for a single event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireEvent {
    pub timestamp: String,
    pub trace_id: String,
    pub request: WireRequest,
    pub response: WireResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireError {
    pub message: String,
    pub kind: Option<String>,
    pub stack: Option<String>,
}

impl WireEvent {
    /// Builds the transmission payload for `event`.
    ///
    /// Headers and bodies go through `sanitizer` again, so an event that was
    /// pushed without capture-time sanitization still leaves redacted.
    #[must_use]
    pub fn from_event(event: &Event, sanitizer: &Sanitizer) -> Self {
        let trace_id = event
            .correlation_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Without a response the status mirrors what the host would have sent.
        let status = match (&event.response, &event.error) {
            (Some(response), _) => response.status,
            (None, Some(_)) => 500,
            (None, None) => 0,
        };

        let response = WireResponse {
            status,
            headers: event
                .response
                .as_ref()
                .map(|response| sanitizer.redact_headers(&response.headers))
                .unwrap_or_default(),
            body: event
                .response
                .as_ref()
                .and_then(|response| sanitizer.body_to_wire(response.body.as_ref())),
            duration_ms: event.duration_ms,
        };

        WireEvent {
            timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            trace_id,
            request: WireRequest {
                method: event.request.method.clone(),
                path: event.request.path.clone(),
                headers: sanitizer.redact_headers(&event.request.headers),
                body: sanitizer.body_to_wire(event.request.body.as_ref()),
                ip: event.request.client_ip.clone(),
            },
            response,
            error: event.error.as_ref().map(|error| WireError {
                message: sanitizer.cap_string(&error.message),
                kind: error.kind.clone(),
                stack: error.stack.as_deref().map(|stack| sanitizer.cap_string(stack)),
            }),
        }
    }
}
