// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Enum usage extraction from provided variables.
//!
//! Each declared variable's type is walked together with the value the client
//! supplied. Wrappers are unwrapped, lists are walked per item, input objects
//! per declared field, and every enum leaf records its raw value.

use serde_json::Value;
use tracing::debug;

use crate::error::ReportError;
use crate::operation::Operation;
use crate::schema::{Schema, TypeKind, TypeRef};

use super::report::EnumUsage;

/// Maximum number of type levels walked below a variable.
pub const MAX_INPUT_DEPTH: usize = 64;

/// Collect enum usage for every declared variable of `operation` into `usage`.
///
/// Variables whose type does not resolve against the schema are skipped. On
/// error, usages recorded before the failure stay in `usage`.
pub fn collect_enum_usage(
    operation: &dyn Operation,
    usage: &mut EnumUsage,
) -> Result<(), ReportError> {
    let schema = operation.schema();
    let provided = operation.provided_variables();

    for variable in operation.variable_definitions() {
        if schema.resolve(&variable.ty).is_none() {
            debug!(
                variable = %variable.name,
                ty = %variable.ty,
                "Skipping variable with unresolvable type"
            );
            continue;
        }

        walk(schema, &variable.ty, provided.get(&variable.name), usage, 0)?;
    }

    Ok(())
}

fn walk(
    schema: &Schema,
    ty: &TypeRef,
    value: Option<&Value>,
    usage: &mut EnumUsage,
    depth: usize,
) -> Result<(), ReportError> {
    if depth > MAX_INPUT_DEPTH {
        return Err(ReportError::EnumDepthExceeded(MAX_INPUT_DEPTH));
    }

    // Absent and explicit null values carry no enum usage
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(());
    };

    match ty {
        TypeRef::NonNull(inner) => walk(schema, inner, Some(value), usage, depth + 1),
        TypeRef::List(inner) => match value {
            Value::Array(items) => {
                for item in items {
                    walk(schema, inner, Some(item), usage, depth + 1)?;
                }
                Ok(())
            }
            // Input coercion accepts a single item where a list is expected
            single => walk(schema, inner, Some(single), usage, depth + 1),
        },
        TypeRef::Named(name) => match schema.get(name).map(|t| &t.kind) {
            Some(TypeKind::Enum { .. }) => {
                usage.record(name, value);
                Ok(())
            }
            Some(TypeKind::InputObject { fields }) => {
                let Value::Object(object) = value else {
                    return Ok(());
                };
                for field in fields {
                    walk(schema, &field.ty, object.get(&field.name), usage, depth + 1)?;
                }
                Ok(())
            }
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::TracedOperation;
    use crate::schema::InputValue;
    use serde_json::json;
    use std::sync::Arc;

    fn ty(s: &str) -> TypeRef {
        s.parse().unwrap()
    }

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .enum_type("Status", ["ACTIVE", "INACTIVE", "BANNED"])
                .enum_type("Role", ["ADMIN", "MEMBER"])
                .input_object(
                    "UserFilter",
                    vec![
                        InputValue::new("status", ty("Status")),
                        InputValue::new("roles", ty("[Role!]")),
                        InputValue::new("name", ty("String")),
                        InputValue::new("and", ty("[UserFilter!]")),
                    ],
                )
                .build()
                .unwrap(),
        )
    }

    fn usage_for(op: &TracedOperation) -> EnumUsage {
        let mut usage = EnumUsage::default();
        collect_enum_usage(op, &mut usage).unwrap();
        usage
    }

    #[test]
    fn test_top_level_enum() {
        let op = TracedOperation::new(schema(), "query GetUser($status: Status) { x }")
            .with_variable("status", ty("Status"))
            .with_provided(json!({"status": "ACTIVE"}));

        let usage = usage_for(&op);
        assert_eq!(serde_json::to_value(&usage).unwrap(), json!({"Status": ["ACTIVE"]}));
    }

    #[test]
    fn test_non_null_list_of_enums_dedupes() {
        let op = TracedOperation::new(schema(), "q")
            .with_variable("statuses", ty("[Status!]!"))
            .with_provided(json!({"statuses": ["ACTIVE", "BANNED", "ACTIVE"]}));

        let usage = usage_for(&op);
        assert_eq!(usage.get("Status").unwrap(), &[json!("ACTIVE"), json!("BANNED")]);
    }

    #[test]
    fn test_nested_input_objects() {
        let op = TracedOperation::new(schema(), "q")
            .with_variable("filter", ty("UserFilter!"))
            .with_provided(json!({
                "filter": {
                    "status": "INACTIVE",
                    "name": "ada",
                    "and": [
                        {"roles": ["ADMIN"]},
                        {"status": "ACTIVE", "roles": ["MEMBER", "ADMIN"]}
                    ]
                }
            }));

        let usage = usage_for(&op);
        assert_eq!(usage.get("Status").unwrap(), &[json!("INACTIVE"), json!("ACTIVE")]);
        assert_eq!(usage.get("Role").unwrap(), &[json!("ADMIN"), json!("MEMBER")]);
    }

    #[test]
    fn test_absent_and_null_values_skipped() {
        let op = TracedOperation::new(schema(), "q")
            .with_variable("status", ty("Status"))
            .with_variable("filter", ty("UserFilter"))
            .with_variable("roles", ty("[Role]"))
            .with_provided(json!({"filter": {"status": null}, "roles": null}));

        assert!(usage_for(&op).is_empty());
    }

    #[test]
    fn test_single_value_for_list() {
        let op = TracedOperation::new(schema(), "q")
            .with_variable("roles", ty("[Role!]"))
            .with_provided(json!({"roles": "ADMIN"}));

        assert_eq!(usage_for(&op).get("Role").unwrap(), &[json!("ADMIN")]);
    }

    #[test]
    fn test_unresolvable_variable_skipped() {
        let op = TracedOperation::new(schema(), "q")
            .with_variable("ghost", ty("Ghost"))
            .with_variable("status", ty("Status"))
            .with_provided(json!({"ghost": "BOO", "status": "BANNED"}));

        let usage = usage_for(&op);
        assert_eq!(usage.len(), 1);
        assert_eq!(usage.get("Status").unwrap(), &[json!("BANNED")]);
    }

    #[test]
    fn test_depth_limit() {
        let mut filter = json!({"status": "ACTIVE"});
        for _ in 0..40 {
            filter = json!({"and": [filter]});
        }
        let op = TracedOperation::new(schema(), "q")
            .with_variable("status", ty("Status"))
            .with_variable("filter", ty("UserFilter"))
            .with_provided(json!({"status": "BANNED", "filter": filter}));

        let mut usage = EnumUsage::default();
        let result = collect_enum_usage(&op, &mut usage);
        assert!(matches!(result, Err(ReportError::EnumDepthExceeded(MAX_INPUT_DEPTH))));
        // Usage collected before the failure is kept
        assert_eq!(usage.get("Status").unwrap(), &[json!("BANNED")]);
    }
}
