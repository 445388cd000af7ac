// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging, metrics and spans for the reporting pipeline itself.
//!
//! - **Logging**: every swallowed failure is a `tracing` warning carrying a
//!   stable `HUBBURU_*` tag (see [`FailureCategory`](crate::FailureCategory))
//! - **Metrics**: per-tracer counters in [`ReportMetrics`]
//! - **Spans**: one debug span per lifecycle phase ([`PhaseSpan`])
//!
//! ```rust,ignore
//! use hubburu::telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! ```

mod init;
pub mod metrics;
mod spans;

pub use init::{init_telemetry, TelemetryConfig};
pub use metrics::{Histogram, MetricsSnapshot, OperationMetrics, ReportMetrics};
pub use spans::PhaseSpan;
