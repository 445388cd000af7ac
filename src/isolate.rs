// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Failure isolation for instrumentation code.
//!
//! Instrumentation is best-effort: anything that goes wrong while building or
//! sending a report is logged with its category tag, counted, and replaced by
//! a fallback value. Both error results and panics are contained.

use std::any::{type_name, Any};
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::FailureCategory;
use crate::telemetry::ReportMetrics;
use crate::tracer::ErrorEntry;

/// Maximum number of source-chain frames kept in an error entry's details.
pub const MAX_DETAIL_FRAMES: usize = 10;

/// Run `f`, returning `fallback` if it fails or panics.
pub(crate) fn isolate<T, F>(
    category: FailureCategory,
    metrics: &ReportMetrics,
    fallback: T,
    f: F,
) -> T
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            warn_failure(category, metrics, &format!("{:#}", err));
            fallback
        }
        Err(payload) => {
            let message = panic_message(&*payload).unwrap_or("unknown panic");
            warn_failure(category, metrics, &format!("panicked: {}", message));
            fallback
        }
    }
}

/// Log a tagged warning and count it.
pub(crate) fn warn_failure(category: FailureCategory, metrics: &ReportMetrics, message: &str) {
    warn!(tag = category.tag(), "{} {}", category.tag(), message);
    metrics.record_warning(category);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Error entry for an operation that returned `Err(err)`.
///
/// The message is `[Kind] description` (or just `Kind` when the error
/// displays as empty). Details hold the error's source chain, one frame per
/// paragraph.
pub(crate) fn failure_entry<E: Error>(err: &E) -> ErrorEntry {
    let kind = short_type_name(type_name::<E>());
    let description = err.to_string();
    let message = if description.is_empty() {
        kind.to_string()
    } else {
        format!("[{}] {}", kind, description)
    };

    let frames: Vec<String> = std::iter::successors(err.source(), |e| (*e).source())
        .take(MAX_DETAIL_FRAMES)
        .map(|e| e.to_string())
        .collect();
    let details = (!frames.is_empty()).then(|| frames.join("\n\n"));

    ErrorEntry::with_details(message, details)
}

/// Error entry for an operation that panicked.
pub(crate) fn panic_entry(payload: &(dyn Any + Send)) -> ErrorEntry {
    match panic_message(payload) {
        Some(message) if !message.is_empty() => ErrorEntry::message(format!("[panic] {}", message)),
        _ => ErrorEntry::message("panic"),
    }
}
