// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end lifecycle tests: phases in, queued report documents out.

use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use hubburu::codec::{gunzip_base64, gzip_base64, sha256_hex};
use hubburu::operation::{CLIENT_NAME_KEY, CLIENT_VERSION_KEY};
use hubburu::schema::InputValue;
use hubburu::{
    EnvSettings, ErrorEntry, FailureCategory, Operation, OutboundRequest, ReportDocument, Schema,
    StaticError, TracedOperation, Tracer, TracerBuilder,
};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct ExecutionError {
    message: String,
}

impl ExecutionError {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ExecutionError {}

type Sent = Arc<Mutex<Vec<OutboundRequest>>>;

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .enum_type("Status", ["ACTIVE", "INACTIVE"])
            .enum_type("Role", ["ADMIN", "MEMBER"])
            .input_object(
                "UserFilter",
                vec![
                    InputValue::new("status", "Status".parse().unwrap()),
                    InputValue::new("roles", "[Role!]".parse().unwrap()),
                ],
            )
            .build()
            .unwrap(),
    )
}

/// Builder with a recording queue and no process environment.
fn builder() -> (TracerBuilder, Sent) {
    let sent: Sent = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&sent);
    let builder = Tracer::builder()
        .env(EnvSettings::default())
        .report_url("https://collector.test")
        .queue(Arc::new(move |req: OutboundRequest| {
            sink.lock().unwrap().push(req)
        }));
    (builder, sent)
}

fn tracer() -> (Tracer, Sent) {
    let (builder, sent) = builder();
    (builder.api_key("test-key").build(&schema()), sent)
}

fn get_user() -> TracedOperation {
    let query = "query GetUser($status: Status) { user(status: $status) { id } }";
    TracedOperation::new(schema(), query)
        .with_name("GetUser")
        .with_variable("status", "Status".parse().unwrap())
        .with_provided(json!({"status": "ACTIVE"}))
}

fn validate_ok(tracer: &Tracer, op: &TracedOperation) {
    tracer
        .on_phase("validate", op, || Ok::<_, ExecutionError>(json!({})))
        .unwrap();
}

fn lazy_ok(tracer: &Tracer, op: &TracedOperation) -> Value {
    tracer
        .on_phase("execute_query_lazy", op, || {
            Ok::<_, ExecutionError>(json!({"data": {"user": {"id": "1"}}}))
        })
        .unwrap()
}

fn documents(sent: &Sent) -> Vec<ReportDocument> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

// ============================================================================
// Report Contents
// ============================================================================

#[test]
fn test_enum_usage_scenario() {
    let (tracer, sent) = tracer();
    let op = get_user();

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    let documents = documents(&sent);
    assert_eq!(documents.len(), 1);
    assert_eq!(
        serde_json::to_value(&documents[0].enums).unwrap(),
        json!({"Status": ["ACTIVE"]})
    );
    assert_eq!(documents[0].operation_name, "GetUser");
}

#[test]
fn test_no_errors_field_when_clean() {
    let (tracer, sent) = tracer();
    let op = get_user();

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    let requests = sent.lock().unwrap();
    let body = requests[0].json().unwrap();
    assert!(body.get("errors").is_none());
    assert!(body["totalMs"].as_f64().unwrap() >= 0.0);
    assert!(body["meta"]["postProcessingTime"].as_f64().is_some());
    assert_eq!(body["environment"], json!("default"));
}

#[test]
fn test_wire_fields() {
    let (builder, sent) = builder();
    let tracer = builder
        .api_key("test-key")
        .environment("staging")
        .request_id_context_key("request_id")
        .build(&schema());
    let op = get_user()
        .with_context("request_id", "req-42")
        .with_context(CLIENT_NAME_KEY, "web")
        .with_context(CLIENT_VERSION_KEY, "1.2.3");

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    let requests = sent.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.url, "https://collector.test/operation");
    assert_eq!(request.header("X-Api-Key"), Some("test-key"));
    assert_eq!(request.header("content-type"), Some("application/json"));

    let body = request.json().unwrap();
    assert_eq!(body["requestId"], json!("req-42"));
    assert_eq!(body["clientName"], json!("web"));
    assert_eq!(body["clientVersion"], json!("1.2.3"));
    assert_eq!(body["environment"], json!("staging"));
    assert_eq!(body["schemaHash"], json!(tracer.schema_hash()));
    assert!(chrono::DateTime::parse_from_rfc3339(body["createdAt"].as_str().unwrap()).is_ok());

    let document: ReportDocument = serde_json::from_value(body).unwrap();
    assert_eq!(document.decode_operation_body().unwrap(), op.query_string());
}

#[test]
fn test_nested_enum_usage() {
    let (tracer, sent) = tracer();
    let op = TracedOperation::new(schema(), "query Users($filter: UserFilter!) { users }")
        .with_name("Users")
        .with_variable("filter", "UserFilter!".parse().unwrap())
        .with_provided(json!({
            "filter": {"status": "INACTIVE", "roles": ["ADMIN", "ADMIN", "MEMBER"]}
        }));

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    assert_eq!(
        serde_json::to_value(&documents(&sent)[0].enums).unwrap(),
        json!({"Role": ["ADMIN", "MEMBER"], "Status": ["INACTIVE"]})
    );
}

#[test]
fn test_validation_errors_seed_report() {
    let (tracer, sent) = tracer();
    let op = get_user().with_static_error(StaticError::new("Cannot query field 'x'"));

    let validation: Result<Vec<StaticError>, ExecutionError> = tracer.on_phase("validate", &op, || {
        Ok(vec![StaticError::new("Cannot query field 'x'")])
    });
    assert_eq!(validation.unwrap().len(), 1);
    lazy_ok(&tracer, &op);

    let errors = documents(&sent)[0].decode_errors().unwrap().unwrap();
    assert_eq!(errors, vec![ErrorEntry::message("Cannot query field 'x'")]);
}

#[test]
fn test_repeated_static_error_messages_keep_every_path() {
    let (tracer, sent) = tracer();
    let op = get_user()
        .with_static_error(StaticError::new("Expected value of type Int").with_path(["a"]))
        .with_static_error(StaticError::new("Expected value of type Int").with_path(["b"]));

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    let errors = documents(&sent)[0].decode_errors().unwrap().unwrap();
    assert_eq!(
        errors,
        vec![
            ErrorEntry::with_details("Expected value of type Int", Some("a".to_string())),
            ErrorEntry::with_details("Expected value of type Int", Some("b".to_string())),
        ]
    );
}

#[test]
fn test_seeded_static_error_not_repeated_for_other_paths() {
    let (tracer, sent) = tracer();
    let at_a = StaticError::new("Expected value of type Int").with_path(["a"]);
    let op = get_user()
        .with_static_error(at_a.clone())
        .with_static_error(StaticError::new("Expected value of type Int").with_path(["b"]));

    let validation: Result<Vec<StaticError>, ExecutionError> =
        tracer.on_phase("validate", &op, || Ok(vec![at_a]));
    assert_eq!(validation.unwrap().len(), 1);
    lazy_ok(&tracer, &op);

    let errors = documents(&sent)[0].decode_errors().unwrap().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[1].details.as_deref(), Some("b"));
}

#[test]
fn test_error_truncation() {
    let (tracer, sent) = tracer();
    let mut op = get_user();
    for i in 0..50 {
        let message = format!("error {} {}", i, sha256_hex(&i.to_string()));
        op.push_static_error(StaticError::new(message));
    }

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    let document = &documents(&sent)[0];
    let errors = document.decode_errors().unwrap().unwrap();
    assert_eq!(errors.len(), 5);
    assert_eq!(errors[0].message, op.static_errors()[0].message);
    assert_eq!(errors[4].message, op.static_errors()[4].message);
    assert_eq!(document.meta["errorsTooLarge"], json!(50));
}

#[test]
fn test_report_without_validate_has_no_total() {
    let (tracer, sent) = tracer();
    let op = get_user();

    lazy_ok(&tracer, &op);

    let body = sent.lock().unwrap()[0].json().unwrap();
    assert!(body.get("totalMs").is_none());
    assert_eq!(body["operationName"], json!("GetUser"));
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn test_execution_error_reraised_and_finalized_once() {
    let (tracer, sent) = tracer();
    let op = get_user();

    validate_ok(&tracer, &op);
    let result: Result<Value, ExecutionError> = tracer.on_phase("execute_query", &op, || {
        Err(ExecutionError::new("resolver failed"))
    });
    assert_eq!(result, Err(ExecutionError::new("resolver failed")));

    // The deferred hook for the same operation must not send again
    lazy_ok(&tracer, &op);

    let documents = documents(&sent);
    assert_eq!(documents.len(), 1);
    let errors = documents[0].decode_errors().unwrap().unwrap();
    assert_eq!(errors, vec![ErrorEntry::message("[ExecutionError] resolver failed")]);
}

#[test]
fn test_lazy_execution_error_reraised_without_static_errors() {
    let (tracer, sent) = tracer();
    let op = get_user().with_static_error(StaticError::new("Unknown argument 'limit'"));

    validate_ok(&tracer, &op);
    let result: Result<Value, ExecutionError> = tracer.on_phase("execute_query_lazy", &op, || {
        Err(ExecutionError::new("loader failed"))
    });
    assert_eq!(result, Err(ExecutionError::new("loader failed")));

    let documents = documents(&sent);
    assert_eq!(documents.len(), 1);
    let errors = documents[0].decode_errors().unwrap().unwrap();
    assert_eq!(errors, vec![ErrorEntry::message("[ExecutionError] loader failed")]);
}

#[test]
fn test_panic_reraised_and_finalized_once() {
    let (tracer, sent) = tracer();
    let op = get_user();

    validate_ok(&tracer, &op);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        tracer.on_phase::<Value, ExecutionError, _>("execute_query_lazy", &op, || {
            panic!("resolver panicked")
        })
    }));
    assert!(outcome.is_err());

    let documents = documents(&sent);
    assert_eq!(documents.len(), 1);
    let errors = documents[0].decode_errors().unwrap().unwrap();
    assert_eq!(errors[0].message, "[panic] resolver panicked");
}

#[test]
fn test_should_send_false_skips_transmission() {
    let (builder, sent) = builder();
    let tracer = builder
        .api_key("test-key")
        .should_send(|report| report.operation_name != "GetUser")
        .build(&schema());
    let op = get_user();

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);

    assert!(sent.lock().unwrap().is_empty());
    let snapshot = tracer.metrics().snapshot();
    assert_eq!(snapshot.skipped, 1);
    assert_eq!(snapshot.finalized, 0);
}

#[test]
fn test_should_send_panic_skips_transmission() {
    let (builder, sent) = builder();
    let tracer = builder
        .api_key("test-key")
        .should_send(|_| -> bool { panic!("predicate bug") })
        .build(&schema());
    let op = get_user();

    validate_ok(&tracer, &op);
    let value = lazy_ok(&tracer, &op);

    assert_eq!(value["data"]["user"]["id"], json!("1"));
    assert!(sent.lock().unwrap().is_empty());
    assert_eq!(tracer.metrics().warnings(FailureCategory::ShouldSend), 1);
}

#[test]
fn test_missing_api_key_warns_once_per_attempt() {
    let (builder, sent) = builder();
    let tracer = builder.build(&schema());
    let op = get_user();

    validate_ok(&tracer, &op);
    lazy_ok(&tracer, &op);
    assert_eq!(tracer.metrics().warnings(FailureCategory::Config), 1);

    tracer.publish_schema(&schema());
    assert_eq!(tracer.metrics().warnings(FailureCategory::Config), 2);

    assert!(sent.lock().unwrap().is_empty());
}

// ============================================================================
// Schema Publishing
// ============================================================================

#[test]
fn test_push_schema_on_startup() {
    let (builder, sent) = builder();
    let schema = schema();
    let _tracer = builder
        .api_key("test-key")
        .environment("production")
        .push_schema_on_startup(true)
        .build(&schema);

    let requests = sent.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://collector.test/schema");

    let body = requests[0].json().unwrap();
    let sdl = gunzip_base64(body["sdl"].as_str().unwrap()).unwrap();
    assert_eq!(String::from_utf8(sdl).unwrap(), schema.print());
    assert_eq!(body["environment"], json!("production"));
}

// ============================================================================
// Codec
// ============================================================================

#[test]
fn test_gzip_base64_round_trip() {
    let payloads = [
        json!([]),
        json!({"errors": [{"message": "boom", "details": null}]}),
        json!({"unicode": "héllo wörld ✓", "nested": {"list": [1, 2.5, true, null]}}),
    ];
    for payload in payloads {
        let text = payload.to_string();
        let encoded = gzip_base64(text.as_bytes()).unwrap();
        assert_eq!(gunzip_base64(&encoded).unwrap(), text.as_bytes());
    }
}
