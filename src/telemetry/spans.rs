// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span helpers for lifecycle phases.

use std::time::Instant;
use tracing::{debug_span, Span};

/// RAII guard around one lifecycle phase of one operation.
///
/// Records the phase name, operation name and duration on the span.
pub struct PhaseSpan {
    start: Instant,
    span: Span,
}

impl PhaseSpan {
    /// Start a span for `phase`.
    pub fn start(phase: &str, operation_name: Option<&str>) -> Self {
        let span = debug_span!(
            "hubburu.phase",
            phase = %phase,
            operation = operation_name.unwrap_or(""),
            duration_ms = tracing::field::Empty,
            failed = tracing::field::Empty,
        );

        Self {
            start: Instant::now(),
            span,
        }
    }

    /// Get the underlying tracing span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record whether the instrumented continuation failed.
    pub fn record_failed(&self, failed: bool) {
        self.span.record("failed", failed);
    }
}

impl Drop for PhaseSpan {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.span.record("duration_ms", duration_ms);
    }
}
