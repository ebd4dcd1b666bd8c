//! Span and trace data model

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of attributes a single span may carry.
pub const MAX_ATTRIBUTES: usize = 10_000;
/// Maximum byte length of a single string attribute value.
pub const MAX_STRING_VALUE_LEN: usize = 10_000_000;

/// Span status, mirroring the OpenTelemetry status code set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Ok,
    Error,
    Unset,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SpanStatus::Ok => "OK",
            SpanStatus::Error => "ERROR",
            SpanStatus::Unset => "UNSET",
        };
        write!(f, "{s}")
    }
}

/// Span kind, mirroring the OpenTelemetry span kind set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    Server,
    Client,
    Internal,
    Producer,
    Consumer,
}

/// A scalar attribute value. Rule expressions compare these directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// Byte length used against the string-length resource guard; non-string
    /// scalars are always within bounds.
    pub fn string_len(&self) -> usize {
        match self {
            Scalar::String(s) => s.len(),
            _ => 0,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A single immutable span.
///
/// Invariants enforced by [`Span::validate`]: `span_id` and `trace_id` are
/// non-empty, `end >= start`, attribute count and string-value lengths stay
/// within the resource guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub trace_id: String,
    pub parent_span_id: Option<String>,
    pub operation_name: String,
    pub service_name: String,
    pub status: SpanStatus,
    pub kind: SpanKind,
    /// Nanoseconds since the Unix epoch.
    pub start: u64,
    /// Nanoseconds since the Unix epoch.
    pub end: u64,
    pub duration_ns: u64,
    pub attributes: BTreeMap<String, Scalar>,
    pub tenant_id: String,
}

impl Span {
    pub fn validate(&self) -> Result<()> {
        if self.span_id.is_empty() {
            return Err(EngineError::Validation("span_id must not be empty".into()));
        }
        if self.trace_id.is_empty() {
            return Err(EngineError::Validation(
                "trace_id must not be empty".into(),
            ));
        }
        if self.operation_name.is_empty() {
            return Err(EngineError::Validation(
                "operation_name must not be empty".into(),
            ));
        }
        if self.end < self.start {
            return Err(EngineError::Validation(format!(
                "span {} has end {} before start {}",
                self.span_id, self.end, self.start
            )));
        }
        if self.attributes.len() > MAX_ATTRIBUTES {
            return Err(EngineError::resource_limit(
                crate::error::ResourceLimitKind::AttributeCount,
                format!(
                    "span {} has {} attributes, max is {}",
                    self.span_id,
                    self.attributes.len(),
                    MAX_ATTRIBUTES
                ),
            ));
        }
        for (key, value) in &self.attributes {
            if value.string_len() > MAX_STRING_VALUE_LEN {
                return Err(EngineError::resource_limit(
                    crate::error::ResourceLimitKind::StringLength,
                    format!(
                        "span {} attribute '{}' is {} bytes, max is {}",
                        self.span_id,
                        key,
                        value.string_len(),
                        MAX_STRING_VALUE_LEN
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Resolves a built-in field directly, falling back to `attributes[path]`
    /// for anything else.
    /// Returns `None` ("nil") when the field cannot be resolved.
    pub fn resolve_field(&self, path: &str) -> Option<Scalar> {
        match path {
            "span.status" => Some(Scalar::String(self.status.to_string())),
            "span.name" | "span.operation_name" => {
                Some(Scalar::String(self.operation_name.clone()))
            }
            "span.service_name" => Some(Scalar::String(self.service_name.clone())),
            "span.duration" => Some(Scalar::Int(self.duration_ns as i64)),
            "span.trace_id" => Some(Scalar::String(self.trace_id.clone())),
            "span.span_id" => Some(Scalar::String(self.span_id.clone())),
            _ => {
                let key = path
                    .strip_prefix("span.attributes.")
                    .or_else(|| path.strip_prefix("attributes."))
                    .unwrap_or(path);
                self.attributes.get(key).cloned()
            }
        }
    }
}

/// A derived grouping of spans sharing one `trace_id` under one tenant.
#[derive(Debug, Clone)]
pub struct Trace<'a> {
    pub trace_id: String,
    pub tenant_id: String,
    pub spans: Vec<&'a Span>,
}

impl<'a> Trace<'a> {
    /// Groups a flat slice of same-tenant, same-trace spans into a `Trace`.
    /// Panics (debug-only invariant) are avoided; an empty slice yields a
    /// `Trace` with empty id fields, which the caller should never produce.
    pub fn from_spans(spans: &'a [Span]) -> Option<Self> {
        let first = spans.first()?;
        Some(Self {
            trace_id: first.trace_id.clone(),
            tenant_id: first.tenant_id.clone(),
            spans: spans.iter().collect(),
        })
    }

    /// The unique span with no parent, or the earliest-starting span if none
    /// is marked root.
    pub fn root_span(&self) -> Option<&&'a Span> {
        self.spans
            .iter()
            .find(|s| s.parent_span_id.is_none())
            .or_else(|| self.spans.iter().min_by_key(|s| s.start))
    }

    pub fn duration(&self) -> u64 {
        let min_start = self.spans.iter().map(|s| s.start).min().unwrap_or(0);
        let max_end = self.spans.iter().map(|s| s.end).max().unwrap_or(0);
        max_end.saturating_sub(min_start)
    }
}
