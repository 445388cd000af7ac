// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The report builder.
//!
//! A [`Tracer`] is installed once per schema and invoked by the execution
//! engine at each lifecycle phase of each operation:
//!
//! - `validate` seeds the operation's report
//! - `execute_query` finalizes only when the operation fails
//! - `execute_query_lazy` always finalizes
//! - anything else passes through
//!
//! Report state lives in the operation's [`ReportSlot`]. Instrumentation never
//! changes the value, error or panic produced by the continuation.

mod enums;
mod finalize;
mod phase;
mod report;

use std::collections::HashMap;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::codec::gzip_base64;
use crate::config::{
    EnvSettings, ResolvedSettings, TracerOptions, load_settings, resolve_settings,
};
use crate::error::FailureCategory;
use crate::isolate::{failure_entry, isolate, panic_entry};
use crate::operation::{
    CLIENT_NAME_KEY, CLIENT_VERSION_KEY, Operation, ReportableErrors, StaticError,
};
use crate::schema::Schema;
use crate::telemetry::{PhaseSpan, ReportMetrics};
use crate::transport::{Gateway, ReportQueue, SchemaSnapshot};

pub use enums::{MAX_INPUT_DEPTH, collect_enum_usage};
pub use finalize::{MAX_ERROR_BYTES, TRUNCATED_ERROR_COUNT};
pub use phase::Phase;
pub use report::{EnumUsage, ErrorEntry, OperationReport, ReportDocument, ReportSlot};

/// Extracts the signature text of an operation.
pub type SignatureFn = dyn Fn(&dyn Operation) -> String + Send + Sync;

/// Decides whether a finished report is sent.
pub type ShouldSendFn = dyn Fn(&OperationReport) -> bool + Send + Sync;

/// Builder for [`Tracer`].
#[derive(Default)]
pub struct TracerBuilder {
    options: TracerOptions,
    env: Option<EnvSettings>,
    signature: Option<Arc<SignatureFn>>,
    should_send: Option<Arc<ShouldSendFn>>,
    queue: Option<Arc<dyn ReportQueue>>,
}

impl TracerBuilder {
    /// Replace all explicit options.
    pub fn options(mut self, options: TracerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.options.api_key = Some(api_key.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.options.environment = Some(environment.into());
        self
    }

    pub fn report_url(mut self, report_url: impl Into<String>) -> Self {
        self.options.report_url = Some(report_url.into());
        self
    }

    /// Publish the schema snapshot from [`build`](Self::build).
    pub fn push_schema_on_startup(mut self, push: bool) -> Self {
        self.options.push_schema_on_startup = Some(push);
        self
    }

    /// Context key whose value becomes the report's request id.
    pub fn request_id_context_key(mut self, key: impl Into<String>) -> Self {
        self.options.request_id_context_key = Some(key.into());
        self
    }

    /// Use these environment values instead of the process environment.
    pub fn env(mut self, env: EnvSettings) -> Self {
        self.env = Some(env);
        self
    }

    /// Override the signature extractor. Defaults to the raw query text.
    pub fn signature<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Operation) -> String + Send + Sync + 'static,
    {
        self.signature = Some(Arc::new(f));
        self
    }

    /// Only send reports for which `f` returns true.
    pub fn should_send<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationReport) -> bool + Send + Sync + 'static,
    {
        self.should_send = Some(Arc::new(f));
        self
    }

    /// Dispatch payloads through `queue` instead of a blocking POST.
    pub fn queue(mut self, queue: Arc<dyn ReportQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Build a tracer for `schema`.
    pub fn build(self, schema: &Schema) -> Tracer {
        let settings = match &self.env {
            Some(env) => resolve_settings(&self.options, env),
            None => load_settings(&self.options),
        };
        let metrics = Arc::new(ReportMetrics::new());

        let mut gateway = Gateway::from_settings(&settings, Arc::clone(&metrics));
        if let Some(queue) = self.queue {
            gateway = gateway.with_queue(queue);
        }

        let tracer = Tracer {
            schema_hash: schema.hash(),
            settings,
            signature: self.signature,
            should_send: self.should_send,
            gateway,
            metrics,
        };

        debug!(
            environment = %tracer.settings.environment,
            report_url = %tracer.settings.report_url,
            has_api_key = tracer.settings.has_api_key(),
            "Hubburu tracer installed"
        );

        if tracer.settings.push_schema_on_startup {
            tracer.publish_schema(schema);
        }

        tracer
    }
}

/// Lifecycle hook that builds and sends one report per operation.
pub struct Tracer {
    settings: ResolvedSettings,
    schema_hash: String,
    signature: Option<Arc<SignatureFn>>,
    should_send: Option<Arc<ShouldSendFn>>,
    gateway: Gateway,
    metrics: Arc<ReportMetrics>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("environment", &self.settings.environment)
            .field("schema_hash", &self.schema_hash)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    pub fn builder() -> TracerBuilder {
        TracerBuilder::default()
    }

    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }

    pub fn metrics(&self) -> &ReportMetrics {
        &self.metrics
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Publish a snapshot of `schema` to the collector.
    pub fn publish_schema(&self, schema: &Schema) {
        let snapshot = SchemaSnapshot::from_schema(schema, self.settings.environment.as_str());
        self.gateway
            .publish_schema(&snapshot, self.settings.api_key.as_deref());
    }

    /// Run `continuation` as the `phase` of `operation`.
    pub fn on_phase<T, E, F>(
        &self,
        phase: impl Into<Phase>,
        operation: &dyn Operation,
        continuation: F,
    ) -> Result<T, E>
    where
        T: ReportableErrors,
        E: Error,
        F: FnOnce() -> Result<T, E>,
    {
        match phase.into() {
            Phase::Validate => self.validate(operation, continuation),
            Phase::ExecuteQuery => self.execute(operation, continuation),
            Phase::ExecuteQueryLazy => self.execute_lazy(operation, continuation),
            Phase::Other(name) => {
                trace!(phase = %name, "Passing through untraced phase");
                self.passthrough(continuation)
            }
        }
    }

    /// Run a phase the tracer does not observe.
    pub fn passthrough<R, F: FnOnce() -> R>(&self, continuation: F) -> R {
        continuation()
    }

    /// Run validation and seed the operation's report.
    ///
    /// The initial error list holds the messages of the validation result, or
    /// the failure entry when validation itself failed. An already seeded slot
    /// keeps its original report.
    pub fn validate<T, E, F>(&self, operation: &dyn Operation, continuation: F) -> Result<T, E>
    where
        T: ReportableErrors,
        E: Error,
        F: FnOnce() -> Result<T, E>,
    {
        let span = PhaseSpan::start(Phase::Validate.as_str(), operation.operation_name());
        let _entered = span.span().enter();

        let outcome = panic::catch_unwind(AssertUnwindSafe(continuation));
        span.record_failed(!matches!(outcome, Ok(Ok(_))));

        let seeded = isolate(FailureCategory::Format, &self.metrics, false, || {
            let errors = match &outcome {
                Ok(Ok(value)) => value
                    .error_messages()
                    .into_iter()
                    .map(ErrorEntry::message)
                    .collect(),
                Ok(Err(err)) => vec![failure_entry(err)],
                Err(payload) => vec![panic_entry(&**payload)],
            };
            let mut report = self.base_report(operation, Some(Instant::now()));
            report.seeded_errors = errors.len();
            report.errors = errors;
            Ok(operation.report_slot().seed(report))
        });

        if seeded {
            self.metrics.record_validated();
        } else {
            debug!(operation = operation.operation_name().unwrap_or(""), "Report not seeded");
        }

        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run eager execution. The report is finalized only if it fails.
    pub fn execute<T, E, F>(&self, operation: &dyn Operation, continuation: F) -> Result<T, E>
    where
        E: Error,
        F: FnOnce() -> Result<T, E>,
    {
        let span = PhaseSpan::start(Phase::ExecuteQuery.as_str(), operation.operation_name());
        let _entered = span.span().enter();
        self.run_guarded(operation, &span, continuation)
    }

    /// Run deferred execution, record static errors and finalize.
    pub fn execute_lazy<T, E, F>(&self, operation: &dyn Operation, continuation: F) -> Result<T, E>
    where
        E: Error,
        F: FnOnce() -> Result<T, E>,
    {
        let span = PhaseSpan::start(Phase::ExecuteQueryLazy.as_str(), operation.operation_name());
        let _entered = span.span().enter();

        let value = self.run_guarded(operation, &span, continuation)?;
        self.record_static_errors(operation);
        self.finalize_operation(operation);
        Ok(value)
    }

    /// Add a metadata entry to the operation's active report.
    ///
    /// Returns false if the report was never seeded or is already finalized.
    pub fn annotate(
        &self,
        operation: &dyn Operation,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> bool {
        let (key, value) = (key.into(), value.into());
        operation
            .report_slot()
            .with_active(|report| {
                report.meta.insert(key, value);
            })
    }

    fn run_guarded<T, E, F>(
        &self,
        operation: &dyn Operation,
        span: &PhaseSpan,
        continuation: F,
    ) -> Result<T, E>
    where
        E: Error,
        F: FnOnce() -> Result<T, E>,
    {
        match panic::catch_unwind(AssertUnwindSafe(continuation)) {
            Ok(Ok(value)) => {
                span.record_failed(false);
                Ok(value)
            }
            Ok(Err(err)) => {
                span.record_failed(true);
                self.record_failure(operation, || failure_entry(&err));
                self.finalize_operation(operation);
                Err(err)
            }
            Err(payload) => {
                span.record_failed(true);
                self.record_failure(operation, || panic_entry(&*payload));
                self.finalize_operation(operation);
                panic::resume_unwind(payload)
            }
        }
    }

    fn record_failure<B>(&self, operation: &dyn Operation, build: B)
    where
        B: FnOnce() -> ErrorEntry,
    {
        isolate(FailureCategory::Format, &self.metrics, (), || {
            let entry = build();
            operation.report_slot().update(
                || self.base_report(operation, None),
                |report| report.errors.push(entry),
            );
            Ok(())
        });
    }

    fn record_static_errors(&self, operation: &dyn Operation) {
        let static_errors = operation.static_errors();
        if static_errors.is_empty() {
            return;
        }

        isolate(FailureCategory::Format, &self.metrics, (), || {
            operation.report_slot().update(
                || self.base_report(operation, None),
                |report| {
                    let entries = unrecorded_static_errors(report, static_errors);
                    report.errors.extend(entries);
                },
            );
            Ok(())
        });
    }

    /// Take the operation's report and finalize it, at most once.
    fn finalize_operation(&self, operation: &dyn Operation) {
        let report = isolate(FailureCategory::Format, &self.metrics, None, || {
            Ok(operation
                .report_slot()
                .take(|| self.base_report(operation, None)))
        });

        match report {
            Some(report) => self.finalize_and_send(report, operation),
            None => debug!(
                operation = operation.operation_name().unwrap_or(""),
                "Report already finalized; skipping"
            ),
        }
    }

    /// A report with the fields known before execution.
    fn base_report(&self, operation: &dyn Operation, start: Option<Instant>) -> OperationReport {
        let gzipped_operation_body = isolate(
            FailureCategory::Format,
            &self.metrics,
            String::new(),
            || {
                let signature = match &self.signature {
                    Some(extract) => extract(operation),
                    None => operation.query_string().to_string(),
                };
                Ok(gzip_base64(signature.as_bytes())?)
            },
        );

        OperationReport {
            request_id: self
                .settings
                .request_id_context_key
                .as_deref()
                .and_then(|key| context_string(operation, key)),
            operation_name: operation.operation_name().unwrap_or_default().to_string(),
            gzipped_operation_body,
            schema_hash: self.schema_hash.clone(),
            errors: Vec::new(),
            seeded_errors: 0,
            environment: self.settings.environment.clone(),
            start,
            client_name: context_string(operation, CLIENT_NAME_KEY),
            client_version: context_string(operation, CLIENT_VERSION_KEY),
            meta: Map::new(),
        }
    }
}

/// Static errors not already seeded by validation, as error entries.
///
/// Each seeded entry accounts for one static error with the same message, so
/// repeated messages (the same error at several paths) are all kept.
fn unrecorded_static_errors(
    report: &OperationReport,
    static_errors: &[StaticError],
) -> Vec<ErrorEntry> {
    let seeded = report.seeded_errors.min(report.errors.len());
    let mut pending: HashMap<&str, usize> = HashMap::new();
    for entry in &report.errors[..seeded] {
        *pending.entry(entry.message.as_str()).or_insert(0) += 1;
    }

    static_errors
        .iter()
        .filter(|error| match pending.get_mut(error.message.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .map(|error| ErrorEntry::with_details(error.message.clone(), error.path_display()))
        .collect()
}

/// A context value as text. Null counts as absent.
fn context_string(operation: &dyn Operation, key: &str) -> Option<String> {
    match operation.context_value(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
