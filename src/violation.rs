//! Violation entity

use crate::rule::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One of the spans that contributed to a violation, identified well enough
/// for a downstream consumer to locate it in its own trace backend without
/// re-deriving service_name from the span_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRef {
    pub trace_id: String,
    pub span_id: String,
    pub service_name: String,
}

/// A recorded rule violation. Once appended to the [`crate::store::ViolationStore`]
/// a violation is never mutated — correcting a mistaken rule means disabling
/// or deleting the rule, not editing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub tenant_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub trace_ids: BTreeSet<String>,
    pub span_refs: Vec<SpanRef>,
    pub created_at: DateTime<Utc>,
    pub signature: String,
    pub metadata: BTreeMap<String, String>,
}

impl Violation {
    /// The canonical byte sequence signed by [`crate::signing::SigningService`]:
    /// a length-prefixed, ordered concatenation so no field's content can be
    /// reinterpreted as a delimiter.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        push_field(&mut buf, self.tenant_id.as_bytes());
        push_field(&mut buf, self.rule_id.as_bytes());
        push_field(&mut buf, self.severity.to_string().as_bytes());
        push_field(&mut buf, self.message.as_bytes());
        let trace_ids = self
            .trace_ids
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("|");
        push_field(&mut buf, trace_ids.as_bytes());
        push_field(&mut buf, self.created_at.to_rfc3339().as_bytes());
        buf
    }
}

fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u64).to_be_bytes());
    buf.extend_from_slice(field);
}
