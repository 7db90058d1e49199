// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction and the collector transport.
//!
//! The client is built once per shipper with the configured request timeout,
//! connection pooling and an optional HTTPS proxy. If the proxy URL cannot be
//! parsed the transport logs an error and connects directly instead of
//! refusing to start.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, error};

use crate::config::Config;
use crate::constants::{CLIENT_HEADER, CLIENT_IDENTIFIER};
use crate::dispatcher::Transport;
use crate::error::{ShipperError, TransportError};
use crate::event::WireEvent;

/// Builds a reqwest client with the shipper's pooling and timeout settings.
pub fn build_client(
    proxy: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, ShipperError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::https(proxy)
            .map_err(|e| ShipperError::HttpClient(format!("invalid proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ShipperError::HttpClient(e.to_string()))
}

/// Posts one wire event per request to `<base_url>/api/sdk/logs`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, ShipperError> {
        let client = match build_client(config.https_proxy.as_deref(), config.request_timeout) {
            Ok(client) => client,
            Err(e) if config.https_proxy.is_some() => {
                error!("DISPATCH | {e}, falling back to direct connection");
                build_client(None, config.request_timeout)?
            }
            Err(e) => return Err(e),
        };

        Ok(HttpTransport {
            client,
            url: config.ingest_url(),
            headers: build_headers(&config.api_key)?,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn build_headers(api_key: &str) -> Result<HeaderMap, ShipperError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CLIENT_HEADER, HeaderValue::from_static(CLIENT_IDENTIFIER));
    if !api_key.is_empty() {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            ShipperError::ConfigInvalid("api key contains invalid header characters".to_string())
        })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
    }
    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, event: &WireEvent) -> Result<(), TransportError> {
        let body = serde_json::to_vec(event)?;
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("DISPATCH | Collector accepted event with status {status}");
            return Ok(());
        }

        // The body is only read to explain a failure.
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
