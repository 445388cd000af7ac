// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Explicit options passed by the host when installing the tracer.
///
/// Every field is optional; unset fields fall back to the environment and
/// then to built-in defaults. The struct deserializes from camelCase JSON so
/// hosts can keep it in their own configuration files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerOptions {
    /// Hubburu API key. Without one nothing is transmitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment tag attached to every report and schema snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Base URL of the report collector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,

    /// Publish the schema snapshot when the tracer is built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_schema_on_startup: Option<bool>,

    /// Context key whose value becomes the report's request id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id_context_key: Option<String>,

    /// Timeout for blocking HTTP sends, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Values read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub api_key: Option<String>,
    pub report_url: Option<String>,
    pub environment: Option<String>,
}

/// Fully resolved settings used by the tracer and the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub api_key: Option<String>,
    pub environment: String,
    pub report_url: String,
    pub push_schema_on_startup: bool,
    pub request_id_context_key: Option<String>,
    pub timeout_ms: u64,
}

impl ResolvedSettings {
    /// Whether reports can be transmitted at all.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for ResolvedSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            environment: super::DEFAULT_ENVIRONMENT.to_string(),
            report_url: super::DEFAULT_REPORT_URL.to_string(),
            push_schema_on_startup: false,
            request_id_context_key: None,
            timeout_ms: super::DEFAULT_TIMEOUT_MS,
        }
    }
}
