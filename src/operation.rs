// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The view of an in-flight operation the tracer needs from the host engine.
//!
//! The execution engine implements [`Operation`] for its own per-request
//! query object, embedding a [`ReportSlot`] in it. Hosts without such an
//! object can use [`TracedOperation`] directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{Schema, TypeRef};
use crate::tracer::ReportSlot;

/// Context key holding the client name.
pub const CLIENT_NAME_KEY: &str = "client_name";

/// Context key holding the client version.
pub const CLIENT_VERSION_KEY: &str = "client_version";

/// A variable declared by the selected operation, e.g. `$status: Status!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeRef,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An error found before execution (parse or validation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl StaticError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = Some(path.into_iter().map(Into::into).collect());
        self
    }

    /// Dot-joined path, used as the error entry's details.
    pub fn path_display(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.join("."))
    }
}

/// One client operation as seen by the tracer.
pub trait Operation {
    /// Name of the selected operation, if it has one.
    fn operation_name(&self) -> Option<&str>;

    /// Raw query document text.
    fn query_string(&self) -> &str;

    /// Look up a value in the request context.
    fn context_value(&self, key: &str) -> Option<&Value>;

    /// Variables declared by the selected operation.
    fn variable_definitions(&self) -> &[VariableDefinition];

    /// Variable values supplied by the client.
    fn provided_variables(&self) -> &Map<String, Value>;

    /// Parse and validation errors.
    fn static_errors(&self) -> &[StaticError];

    /// The schema the operation runs against.
    fn schema(&self) -> &Schema;

    /// Per-operation report state.
    fn report_slot(&self) -> &ReportSlot;
}

/// Extracts error messages from a phase result.
///
/// The validate phase seeds the report's error list from its result.
pub trait ReportableErrors {
    fn error_messages(&self) -> Vec<String>;
}

impl ReportableErrors for () {
    fn error_messages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A GraphQL response body: messages come from its top-level `errors` array.
impl ReportableErrors for Value {
    fn error_messages(&self) -> Vec<String> {
        self.get("errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ReportableErrors for Vec<StaticError> {
    fn error_messages(&self) -> Vec<String> {
        self.iter().map(|e| e.message.clone()).collect()
    }
}

impl<T: ReportableErrors> ReportableErrors for Option<T> {
    fn error_messages(&self) -> Vec<String> {
        self.as_ref().map(T::error_messages).unwrap_or_default()
    }
}

/// A self-contained [`Operation`] for hosts without their own query object.
#[derive(Debug)]
pub struct TracedOperation {
    schema: Arc<Schema>,
    name: Option<String>,
    query: String,
    context: Map<String, Value>,
    variables: Vec<VariableDefinition>,
    provided: Map<String, Value>,
    static_errors: Vec<StaticError>,
    slot: ReportSlot,
}

impl TracedOperation {
    pub fn new(schema: Arc<Schema>, query: impl Into<String>) -> Self {
        Self {
            schema,
            name: None,
            query: query.into(),
            context: Map::new(),
            variables: Vec::new(),
            provided: Map::new(),
            static_errors: Vec::new(),
            slot: ReportSlot::default(),
        }
    }

    /// Set the selected operation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare a variable.
    pub fn with_variable(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.variables.push(VariableDefinition::new(name, ty));
        self
    }

    /// Set the provided variable values. Non-object values are ignored.
    pub fn with_provided(mut self, values: Value) -> Self {
        if let Value::Object(map) = values {
            self.provided = map;
        }
        self
    }

    /// Add a request context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Add a static error.
    pub fn with_static_error(mut self, error: StaticError) -> Self {
        self.static_errors.push(error);
        self
    }

    /// Record a static error after construction.
    pub fn push_static_error(&mut self, error: StaticError) {
        self.static_errors.push(error);
    }
}

impl Operation for TracedOperation {
    fn operation_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn query_string(&self) -> &str {
        &self.query
    }

    fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    fn variable_definitions(&self) -> &[VariableDefinition] {
        &self.variables
    }

    fn provided_variables(&self) -> &Map<String, Value> {
        &self.provided
    }

    fn static_errors(&self) -> &[StaticError] {
        &self.static_errors
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn report_slot(&self) -> &ReportSlot {
        &self.slot
    }
}
