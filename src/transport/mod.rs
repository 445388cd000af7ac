// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport gateway to the Hubburu collector.
//!
//! The gateway either hands requests to a configured [`ReportQueue`] or
//! performs a blocking POST. It never decides whether to send; callers check
//! for an API key first.

mod queue;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::codec::gzip_base64;
use crate::config::ResolvedSettings;
use crate::error::{FailureCategory, TransportError};
use crate::isolate::warn_failure;
use crate::schema::Schema;
use crate::telemetry::ReportMetrics;

#[cfg(test)]
pub use queue::MockReportQueue;
pub use queue::{ReportQueue, TokioQueue};

/// Collector path for operation reports.
pub const OPERATION_PATH: &str = "/operation";

/// Collector path for schema snapshots.
pub const SCHEMA_PATH: &str = "/schema";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// A fully built POST request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Standard headers for every collector request.
pub fn report_headers(api_key: &str) -> Vec<(String, String)> {
    vec![
        (API_KEY_HEADER.to_string(), api_key.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ]
}

/// A printed schema and the environment it is served in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub sdl: String,
    pub environment: String,
}

impl SchemaSnapshot {
    pub fn new(sdl: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            sdl: sdl.into(),
            environment: environment.into(),
        }
    }

    /// Snapshot of `schema` as printed SDL.
    pub fn from_schema(schema: &Schema, environment: impl Into<String>) -> Self {
        Self::new(schema.print(), environment)
    }

    /// JSON body for `/schema`: the SDL is gzipped and base64 encoded.
    pub fn payload(&self) -> Result<Vec<u8>, TransportError> {
        let body = json!({
            "sdl": gzip_base64(self.sdl.as_bytes())?,
            "environment": self.environment,
        });
        Ok(serde_json::to_vec(&body)?)
    }
}

/// Sends payloads to the collector.
pub struct Gateway {
    report_url: String,
    timeout: Duration,
    queue: Option<Arc<dyn ReportQueue>>,
    client: OnceCell<Client>,
    metrics: Arc<ReportMetrics>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("report_url", &self.report_url)
            .field("timeout", &self.timeout)
            .field("queued", &self.queue.is_some())
            .finish()
    }
}

impl Gateway {
    /// Create a gateway posting to `report_url`.
    pub fn new(
        report_url: impl Into<String>,
        timeout: Duration,
        metrics: Arc<ReportMetrics>,
    ) -> Self {
        Self {
            report_url: report_url.into().trim_end_matches('/').to_string(),
            timeout,
            queue: None,
            client: OnceCell::new(),
            metrics,
        }
    }

    /// Create a gateway from resolved settings.
    pub fn from_settings(settings: &ResolvedSettings, metrics: Arc<ReportMetrics>) -> Self {
        Self::new(
            settings.report_url.clone(),
            Duration::from_millis(settings.timeout_ms),
            metrics,
        )
    }

    /// Dispatch through `queue` instead of posting inline.
    pub fn with_queue(mut self, queue: Arc<dyn ReportQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Full URL for a collector path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.report_url, path)
    }

    /// POST `body` to `path`, or enqueue it when a queue is configured.
    pub fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), TransportError> {
        let request = OutboundRequest {
            url: self.url_for(path),
            body,
            headers,
        };

        if let Some(queue) = &self.queue {
            queue.enqueue(request);
            self.metrics.record_queued();
            return Ok(());
        }

        self.post_blocking(request)
    }

    fn client(&self) -> Result<&Client, TransportError> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| TransportError::ClientBuild(e.to_string()))
        })
    }

    fn post_blocking(&self, request: OutboundRequest) -> Result<(), TransportError> {
        // The blocking client panics when driven from a runtime worker.
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(TransportError::BlockingInRuntime { url: request.url });
        }

        let client = self.client()?;

        let mut builder = client.post(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .map_err(|e| TransportError::request(request.url.as_str(), &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: request.url,
                status: status.as_u16(),
            });
        }

        debug!(url = %request.url, status = status.as_u16(), "Report delivered");
        self.metrics.record_sent();
        Ok(())
    }

    /// Publish a schema snapshot.
    ///
    /// Without an API key this logs one warning and sends nothing. Delivery
    /// failures are logged, never returned.
    pub fn publish_schema(&self, snapshot: &SchemaSnapshot, api_key: Option<&str>) {
        let Some(api_key) = api_key else {
            warn_failure(
                FailureCategory::Config,
                &self.metrics,
                "missing api_key; schema not published",
            );
            return;
        };

        let result = snapshot
            .payload()
            .and_then(|body| self.post(SCHEMA_PATH, body, report_headers(api_key)));

        if let Err(err) = result {
            warn_failure(FailureCategory::Send, &self.metrics, &err.to_string());
        }
    }
}
