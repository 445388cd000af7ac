// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Deferred dispatch of outbound requests.
//!
//! A [`ReportQueue`] takes the request off the operation's completion path.
//! Any `Fn(OutboundRequest) + Send + Sync` closure is a queue, so hosts can
//! forward into their own job system; [`TokioQueue`] sends from a tokio
//! runtime.

use std::time::Duration;

use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::{FailureCategory, TransportError};

use super::OutboundRequest;

/// Fire-and-forget sink for outbound requests.
#[cfg_attr(test, mockall::automock)]
pub trait ReportQueue: Send + Sync {
    /// Accept a request. Must not block on delivery.
    fn enqueue(&self, request: OutboundRequest);
}

impl<F> ReportQueue for F
where
    F: Fn(OutboundRequest) + Send + Sync,
{
    fn enqueue(&self, request: OutboundRequest) {
        self(request)
    }
}

/// Queue that POSTs each request from a task on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioQueue {
    handle: Handle,
    client: Client,
}

impl TokioQueue {
    /// Create a queue spawning onto `handle`.
    pub fn new(handle: Handle, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { handle, client })
    }

    /// Create a queue on the runtime of the calling context.
    pub fn current(timeout: Duration) -> Result<Self, TransportError> {
        let handle =
            Handle::try_current().map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Self::new(handle, timeout)
    }
}

impl ReportQueue for TokioQueue {
    fn enqueue(&self, request: OutboundRequest) {
        let client = self.client.clone();
        self.handle.spawn(async move {
            let mut builder = client.post(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            match builder.body(request.body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        url = %request.url,
                        status = response.status().as_u16(),
                        "Report delivered"
                    );
                }
                Ok(response) => {
                    let tag = FailureCategory::Send.tag();
                    warn!(
                        tag,
                        url = %request.url,
                        status = response.status().as_u16(),
                        "{} collector rejected report",
                        tag
                    );
                }
                Err(err) => {
                    let tag = FailureCategory::Send.tag();
                    warn!(tag, url = %request.url, "{} {}", tag, err);
                }
            }
        });
    }
}
