// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Finalize-and-send: turn an [`OperationReport`] into a [`ReportDocument`]
//! and hand it to the gateway.

use std::time::Instant;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::{gzip_base64, to_report_ms};
use crate::error::{FailureCategory, ReportError};
use crate::isolate::{isolate, warn_failure};
use crate::operation::Operation;
use crate::transport::{OPERATION_PATH, report_headers};

use super::enums::collect_enum_usage;
use super::report::{EnumUsage, ErrorEntry, OperationReport, ReportDocument};
use super::Tracer;

/// Encoded error lists longer than this are truncated.
pub const MAX_ERROR_BYTES: usize = 1000;

/// Number of errors kept when the list is truncated.
pub const TRUNCATED_ERROR_COUNT: usize = 5;

const META_ERRORS_TOO_LARGE: &str = "errorsTooLarge";
const META_POST_PROCESSING_TIME: &str = "postProcessingTime";

impl Tracer {
    /// Finalize `report` and send it. Never fails toward the caller.
    pub fn finalize_and_send(&self, mut report: OperationReport, operation: &dyn Operation) {
        if let Some(should_send) = &self.should_send {
            let send = isolate(FailureCategory::ShouldSend, &self.metrics, false, || {
                Ok(should_send(&report))
            });
            if !send {
                debug!(operation = %report.operation_name, "Report dropped by should_send");
                self.metrics.record_skipped();
                return;
            }
        }

        let post_processing_start = Instant::now();

        let total_ms = report.start.take().map(|start| to_report_ms(start.elapsed()));
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let errors = isolate(FailureCategory::Send, &self.metrics, None, || {
            compress_errors(&report.errors, &mut report.meta)
        });

        let mut enums = EnumUsage::default();
        isolate(FailureCategory::Enum, &self.metrics, (), || {
            collect_enum_usage(operation, &mut enums).map_err(anyhow::Error::from)
        });

        let post_processing = post_processing_start.elapsed();
        report.meta.insert(
            META_POST_PROCESSING_TIME.to_string(),
            Value::from(to_report_ms(post_processing)),
        );
        self.metrics.record_finalized(post_processing);

        let document = ReportDocument {
            request_id: report.request_id,
            operation_name: report.operation_name,
            gzipped_operation_body: report.gzipped_operation_body,
            schema_hash: report.schema_hash,
            errors,
            environment: report.environment,
            total_ms,
            client_name: report.client_name,
            client_version: report.client_version,
            meta: report.meta,
            created_at,
            enums,
        };

        isolate(FailureCategory::Send, &self.metrics, (), || {
            self.send_document(&document)
        });
    }

    fn send_document(&self, document: &ReportDocument) -> anyhow::Result<()> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            warn_failure(
                FailureCategory::Config,
                &self.metrics,
                "missing api_key; operation report not sent",
            );
            return Ok(());
        };

        let body = serde_json::to_vec(document).map_err(ReportError::from)?;
        self.gateway
            .post(OPERATION_PATH, body, report_headers(api_key))
            .map_err(ReportError::from)
            .with_context(|| format!("sending report for '{}'", document.operation_name))
    }
}

/// Encode the error list, truncating it when the encoding is too large.
///
/// Returns `None` for an empty list.
fn compress_errors(
    errors: &[ErrorEntry],
    meta: &mut Map<String, Value>,
) -> anyhow::Result<Option<String>> {
    if errors.is_empty() {
        return Ok(None);
    }

    let encoded = encode_errors(errors)?;
    if encoded.len() <= MAX_ERROR_BYTES {
        return Ok(Some(encoded));
    }

    meta.insert(
        META_ERRORS_TOO_LARGE.to_string(),
        Value::from(errors.len()),
    );
    let kept = &errors[..errors.len().min(TRUNCATED_ERROR_COUNT)];
    Ok(Some(encode_errors(kept).context("encoding truncated error list")?))
}

fn encode_errors(errors: &[ErrorEntry]) -> anyhow::Result<String> {
    let json = serde_json::to_vec(errors).context("serializing error list")?;
    Ok(gzip_base64(&json)?)
}
