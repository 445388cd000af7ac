// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Report records: the mutable per-operation report, the finalized wire
//! document, and the slot that holds report state for one operation.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::gunzip_base64;

/// One error recorded against an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEntry {
    /// An entry with a message only.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }
}

/// Enum values observed in provided variables, keyed by type signature.
///
/// Values per type are unique and kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnumUsage(BTreeMap<String, Vec<Value>>);

impl EnumUsage {
    /// Record `value` under `signature`. Returns false if it was already present.
    pub fn record(&mut self, signature: &str, value: &Value) -> bool {
        let values = self.0.entry(signature.to_string()).or_default();
        if values.contains(value) {
            return false;
        }
        values.push(value.clone());
        true
    }

    /// Values recorded for `signature`.
    pub fn get(&self, signature: &str) -> Option<&[Value]> {
        self.0.get(signature).map(Vec::as_slice)
    }

    /// Number of distinct enum types seen.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.0.iter()
    }
}

/// The in-progress report for one operation.
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub request_id: Option<String>,
    /// Empty for anonymous operations.
    pub operation_name: String,
    /// Base64 gzip of the operation signature.
    pub gzipped_operation_body: String,
    pub schema_hash: String,
    pub errors: Vec<ErrorEntry>,
    /// Number of leading `errors` recorded by the validate phase.
    pub seeded_errors: usize,
    pub environment: String,
    /// Set once, when the validate phase seeds the report.
    pub start: Option<Instant>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub meta: Map<String, Value>,
}

/// The finalized report as sent to `/operation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub operation_name: String,
    pub gzipped_operation_body: String,
    pub schema_hash: String,
    /// Base64 gzip of the JSON error list; absent when there were no errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    pub meta: Map<String, Value>,
    pub created_at: String,
    pub enums: EnumUsage,
}

impl ReportDocument {
    /// Decode the compressed error list, if present.
    pub fn decode_errors(&self) -> anyhow::Result<Option<Vec<ErrorEntry>>> {
        match &self.errors {
            Some(encoded) => {
                let json = gunzip_base64(encoded)?;
                Ok(Some(serde_json::from_slice(&json)?))
            }
            None => Ok(None),
        }
    }

    /// Decode the operation signature text.
    pub fn decode_operation_body(&self) -> anyhow::Result<String> {
        let bytes = gunzip_base64(&self.gzipped_operation_body)?;
        Ok(String::from_utf8(bytes)?)
    }
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Empty,
    Active(OperationReport),
    Finalized,
}

/// Report state attached to one operation.
///
/// The host embeds a slot in its per-operation context and hands it out via
/// [`Operation::report_slot`](crate::Operation::report_slot). The slot moves
/// from empty to active at validation and to finalized at the first terminal
/// phase; a finalized slot is never reported again.
#[derive(Debug, Default)]
pub struct ReportSlot {
    state: Mutex<SlotState>,
}

impl ReportSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a freshly seeded report. Returns false if the slot was not empty.
    pub(crate) fn seed(&self, report: OperationReport) -> bool {
        let mut state = self.lock();
        match *state {
            SlotState::Empty => {
                *state = SlotState::Active(report);
                true
            }
            _ => false,
        }
    }

    /// Mutate the report, creating it with `init` if validation never ran.
    /// Does nothing once finalized.
    pub(crate) fn update<I, F>(&self, init: I, f: F) -> bool
    where
        I: FnOnce() -> OperationReport,
        F: FnOnce(&mut OperationReport),
    {
        let mut state = self.lock();
        if matches!(*state, SlotState::Empty) {
            *state = SlotState::Active(init());
        }
        match &mut *state {
            SlotState::Active(report) => {
                f(report);
                true
            }
            _ => false,
        }
    }

    /// Mutate the report only if validation already seeded it.
    pub(crate) fn with_active<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut OperationReport),
    {
        match &mut *self.lock() {
            SlotState::Active(report) => {
                f(report);
                true
            }
            _ => false,
        }
    }

    /// Take the report for finalization and mark the slot finalized.
    ///
    /// Returns `None` if the operation was already finalized.
    pub(crate) fn take<I>(&self, init: I) -> Option<OperationReport>
    where
        I: FnOnce() -> OperationReport,
    {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, SlotState::Finalized) {
            SlotState::Empty => Some(init()),
            SlotState::Active(report) => Some(report),
            SlotState::Finalized => None,
        }
    }

    /// Copy of the active report, if any.
    pub fn snapshot(&self) -> Option<OperationReport> {
        match &*self.lock() {
            SlotState::Active(report) => Some(report.clone()),
            _ => None,
        }
    }

    /// Whether the validate phase seeded this slot and it is not yet finalized.
    pub fn is_active(&self) -> bool {
        matches!(*self.lock(), SlotState::Active(_))
    }

    pub fn is_finalized(&self) -> bool {
        matches!(*self.lock(), SlotState::Finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(name: &str) -> OperationReport {
        OperationReport {
            request_id: None,
            operation_name: name.to_string(),
            gzipped_operation_body: String::new(),
            schema_hash: String::new(),
            errors: Vec::new(),
            seeded_errors: 0,
            environment: "default".to_string(),
            start: None,
            client_name: None,
            client_version: None,
            meta: Map::new(),
        }
    }

    #[test]
    fn test_enum_usage_is_a_set() {
        let mut usage = EnumUsage::default();
        assert!(usage.record("Status", &json!("ACTIVE")));
        assert!(!usage.record("Status", &json!("ACTIVE")));
        assert!(usage.record("Status", &json!("INACTIVE")));

        assert_eq!(usage.len(), 1);
        assert_eq!(
            usage.get("Status").unwrap(),
            &[json!("ACTIVE"), json!("INACTIVE")]
        );
    }

    #[test]
    fn test_enum_usage_serializes_as_map() {
        let mut usage = EnumUsage::default();
        usage.record("Status", &json!("ACTIVE"));
        assert_eq!(
            serde_json::to_value(&usage).unwrap(),
            json!({"Status": ["ACTIVE"]})
        );
    }

    #[test]
    fn test_slot_seed_once() {
        let slot = ReportSlot::default();
        assert!(!slot.is_active());
        assert!(slot.seed(report("First")));
        assert!(!slot.seed(report("Second")));
        assert_eq!(slot.snapshot().unwrap().operation_name, "First");
    }

    #[test]
    fn test_slot_take_once() {
        let slot = ReportSlot::default();
        slot.seed(report("Op"));

        let taken = slot.take(|| report("Fallback")).unwrap();
        assert_eq!(taken.operation_name, "Op");
        assert!(slot.is_finalized());
        assert!(slot.take(|| report("Fallback")).is_none());
        assert!(!slot.update(|| report("Fallback"), |_| {}));
    }

    #[test]
    fn test_slot_take_without_seed_uses_init() {
        let slot = ReportSlot::default();
        let taken = slot.take(|| report("Fallback")).unwrap();
        assert_eq!(taken.operation_name, "Fallback");
        assert!(taken.start.is_none());
    }

    #[test]
    fn test_slot_with_active_requires_seed() {
        let slot = ReportSlot::default();
        assert!(!slot.with_active(|r| r.errors.push(ErrorEntry::message("x"))));
        slot.seed(report("Op"));
        assert!(slot.with_active(|r| r.errors.push(ErrorEntry::message("x"))));
        assert_eq!(slot.snapshot().unwrap().errors.len(), 1);
    }

    #[test]
    fn test_document_omits_absent_fields() {
        let document = ReportDocument {
            request_id: None,
            operation_name: "GetUser".to_string(),
            gzipped_operation_body: String::new(),
            schema_hash: "abc".to_string(),
            errors: None,
            environment: "default".to_string(),
            total_ms: None,
            client_name: None,
            client_version: None,
            meta: Map::new(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            enums: EnumUsage::default(),
        };
        let value = serde_json::to_value(&document).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("errors"));
        assert!(!object.contains_key("totalMs"));
        assert!(!object.contains_key("requestId"));
        assert_eq!(object["operationName"], json!("GetUser"));
        assert_eq!(object["enums"], json!({}));
        assert_eq!(object["createdAt"], json!("2026-01-01T00:00:00Z"));
    }
}
