// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the Hubburu reporting agent.
//!
//! Nothing in this crate returns these errors to the instrumented operation.
//! They travel between internal steps and end up at an isolation boundary,
//! where they are logged under a [`FailureCategory`] tag and dropped.

use std::fmt;

use thiserror::Error;

/// Category of an instrumentation failure.
///
/// Every warning the crate emits carries the stable [`tag`](Self::tag) of its
/// category so log pipelines can match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureCategory {
    /// Building an error entry or seeding a report failed.
    Format,
    /// Walking provided variables for enum usage failed.
    Enum,
    /// Compression, serialization or delivery of a report failed.
    Send,
    /// The caller-supplied `should_send` predicate panicked.
    ShouldSend,
    /// No API key is configured, so nothing is transmitted.
    Config,
}

impl FailureCategory {
    /// All categories, in reporting order.
    pub const ALL: [FailureCategory; 5] = [
        Self::Format,
        Self::Enum,
        Self::Send,
        Self::ShouldSend,
        Self::Config,
    ];

    /// Stable log tag for this category.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Format => "HUBBURU_FORMAT_ERROR",
            Self::Enum => "HUBBURU_ENUM_ERROR",
            Self::Send => "HUBBURU_SEND_ERROR",
            Self::ShouldSend => "HUBBURU_SHOULD_SEND_ERROR",
            Self::Config => "HUBBURU_CONFIG_WARNING",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Errors from the gzip/base64 codec.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors while delivering a payload to the collector.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP client unavailable: {0}")]
    ClientBuild(String),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Collector responded with status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Inline send to {url} from inside an async runtime; configure a TokioQueue")]
    BlockingInRuntime { url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Build a request error from a reqwest failure.
    pub fn request(url: impl Into<String>, err: &reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            message: err.to_string(),
        }
    }
}

/// Errors raised while building or finalizing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Enum extraction exceeded the maximum input depth of {0}")]
    EnumDepthExceeded(usize),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the schema model.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid type reference '{input}': {message}")]
    InvalidTypeRef { input: String, message: String },

    #[error("Duplicate type definition: {0}")]
    DuplicateType(String),
}

impl SchemaError {
    pub(crate) fn type_ref(input: &str, message: impl Into<String>) -> Self {
        Self::InvalidTypeRef {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_category_tags_are_stable() {
        assert_eq!(FailureCategory::Send.tag(), "HUBBURU_SEND_ERROR");
        assert_eq!(FailureCategory::Format.tag(), "HUBBURU_FORMAT_ERROR");
        assert_eq!(FailureCategory::Enum.tag(), "HUBBURU_ENUM_ERROR");
        assert_eq!(format!("{}", FailureCategory::Config), "HUBBURU_CONFIG_WARNING");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Status {
            url: "https://report.hubburu.com/operation".to_string(),
            status: 503,
        };
        let display = err.to_string();
        assert!(display.contains("503"));
        assert!(display.contains("/operation"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::type_ref("[Status", "unclosed list");
        assert_eq!(
            err.to_string(),
            "Invalid type reference '[Status': unclosed list"
        );
    }
}
