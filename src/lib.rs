// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hubburu - per-operation GraphQL usage reporting.
//!
//! The execution engine calls a [`Tracer`] at each lifecycle phase of every
//! operation. The tracer builds one report per operation (timing, errors,
//! enum usage, client metadata), compresses it and hands it to the transport
//! gateway. Instrumentation is strictly observational: failures inside it are
//! logged and counted, never surfaced to the operation.
//!
//! # Architecture
//!
//! - [`tracer`] - Lifecycle hooks, report slots, enum extraction, finalize-and-send
//! - [`transport`] - Collector gateway, schema publishing, dispatch queues
//! - [`operation`] - The operation view the host engine implements
//! - [`schema`] - Minimal schema model, SDL printer and hash
//! - [`codec`] - gzip + base64, SHA-256, report timing
//! - [`config`] - Options, environment variables and precedence
//! - [`telemetry`] - Logging setup, phase spans and pipeline metrics
//! - [`error`] - Error types and failure categories
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hubburu::{Schema, Tracer, TracedOperation};
//!
//! let schema = Arc::new(Schema::builder().enum_type("Status", ["ACTIVE"]).build()?);
//! let tracer = Tracer::builder().api_key("key").build(&schema);
//!
//! let op = TracedOperation::new(Arc::clone(&schema), "query GetUser { user { id } }")
//!     .with_name("GetUser");
//! tracer.on_phase("validate", &op, || validate(&op))?;
//! let response = tracer.on_phase("execute_query_lazy", &op, || execute(&op))?;
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub(crate) mod isolate;
pub mod operation;
pub mod schema;
pub mod telemetry;
pub mod tracer;
pub mod transport;

// Re-export commonly used types at crate root
pub use config::{EnvSettings, ResolvedSettings, TracerOptions};
pub use error::{CodecError, FailureCategory, ReportError, SchemaError, TransportError};
pub use operation::{Operation, ReportableErrors, StaticError, TracedOperation, VariableDefinition};
pub use schema::{Schema, SchemaBuilder, TypeRef};
pub use telemetry::{ReportMetrics, TelemetryConfig};
pub use tracer::{
    EnumUsage, ErrorEntry, OperationReport, Phase, ReportDocument, ReportSlot, Tracer,
    TracerBuilder,
};
pub use transport::{Gateway, OutboundRequest, ReportQueue, SchemaSnapshot, TokioQueue};

/// Hubburu agent version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
