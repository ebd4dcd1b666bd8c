//! Tree-walking interpreter
//!
//! Evaluation never panics and never blocks: missing attributes and
//! cross-type comparisons resolve to `false` rather than raising an error,
//! and the only way this module returns `Err` is a resource guard (AST depth
//! or span count) tripping. There is no reflection, no dynamic dispatch into
//! host code, and no thread-local or process-global mutable state — the
//! explicit `depth` counter and `bindings` map are threaded through the
//! recursion as ordinary arguments.

use crate::dsl::ast::{Ast, CompareOp, LogicalOp, WhereClause};
use crate::error::Result;
use crate::guards::{check_ast_depth, check_span_count, MAX_AST_DEPTH};
use crate::span::{Scalar, Span, Trace};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Lifecycle of a single evaluation call, logged at `debug` level. Exposed
/// mainly so callers can assert on it in tests; the interpreter itself only
/// ever observes forward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Idle,
    Validating,
    Evaluating,
    Done,
    Failed,
}

pub struct Interpreter;

impl Interpreter {
    /// Evaluates a compiled rule against a full trace. This is the entry
    /// point used by `trace.has(...)` / `trace.count(...)` rules and by
    /// rules that mix trace- and span-level predicates.
    #[tracing::instrument(skip(ast, trace), fields(trace_id = %trace.trace_id))]
    pub fn evaluate(ast: &Ast, trace: &Trace<'_>) -> Result<bool> {
        let mut state = EvaluationState::Validating;
        tracing::debug!(?state, "starting evaluation");

        if let Err(e) = check_ast_depth(ast) {
            state = EvaluationState::Failed;
            tracing::debug!(?state, "rejected: ast depth");
            return Err(e);
        }
        if let Err(e) = check_span_count(trace.spans.len()) {
            state = EvaluationState::Failed;
            tracing::debug!(?state, "rejected: span count");
            return Err(e);
        }

        state = EvaluationState::Evaluating;
        tracing::debug!(?state, "walking ast");
        let mut bindings = HashMap::new();
        let result = eval_bool(ast, trace, None, &mut bindings, 0)?;

        tracing::debug!(state = ?EvaluationState::Done, result, "evaluation complete");
        Ok(result)
    }

    /// Evaluates a rule against a single span, for rules that never reference
    /// `trace.has`/`trace.count`. The
    /// span is wrapped in a degenerate one-span trace so the same evaluator
    /// handles both cases.
    pub fn evaluate_span(ast: &Ast, span: &Span) -> Result<bool> {
        let spans = std::slice::from_ref(span);
        let trace = Trace::from_spans(spans).expect("slice has exactly one element");
        Self::evaluate(ast, &trace)
    }
}

fn eval_bool(
    ast: &Ast,
    trace: &Trace<'_>,
    current: Option<&Span>,
    bindings: &mut HashMap<String, Scalar>,
    depth: usize,
) -> Result<bool> {
    if depth > MAX_AST_DEPTH {
        return Err(crate::error::EngineError::resource_limit(
            crate::error::ResourceLimitKind::AstDepth,
            format!("evaluation depth exceeded {MAX_AST_DEPTH}"),
        ));
    }

    match ast {
        Ast::Literal { value, .. } => Ok(matches!(value.as_scalar(), Scalar::Bool(true))),

        Ast::FieldRef { field, .. } => {
            let truthy = |scalar: Option<Scalar>| matches!(scalar, Some(Scalar::Bool(true)));
            if let Some(span) = current {
                Ok(truthy(span.resolve_field(&field.path)))
            } else {
                Ok(trace
                    .spans
                    .iter()
                    .any(|s| truthy(s.resolve_field(&field.path))))
            }
        }

        Ast::Compare {
            op, left, right, ..
        } => {
            if let Some(span) = current {
                Ok(compare_nodes(left, right, *op, span))
            } else {
                Ok(trace
                    .spans
                    .iter()
                    .any(|s| compare_nodes(left, right, *op, s)))
            }
        }

        Ast::Logical { op, operands, .. } => match op {
            LogicalOp::And => {
                for operand in operands {
                    if !eval_bool(operand, trace, current, bindings, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicalOp::Or => {
                for operand in operands {
                    if eval_bool(operand, trace, current, bindings, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        },

        Ast::Not { child, .. } => Ok(!eval_bool(child, trace, current, bindings, depth + 1)?),

        Ast::Has {
            operation_name,
            where_clauses,
            ..
        } => Ok(trace.spans.iter().any(|s| {
            s.operation_name == *operation_name && where_clauses_hold(where_clauses, s)
        })),

        Ast::Count {
            operation_name_pattern,
            op,
            value,
            ..
        } => {
            let count = trace
                .spans
                .iter()
                .filter(|s| s.operation_name == *operation_name_pattern)
                .count() as i64;
            Ok(apply_ord(count.cmp(value), *op))
        }

        Ast::CorrelatedHas {
            operation_name,
            where_clauses,
            binding_var,
            ..
        } => Ok(trace.spans.iter().any(|s| {
            if s.operation_name != *operation_name || !where_clauses_hold(where_clauses, s) {
                return false;
            }
            match s.resolve_field(binding_var) {
                None => false,
                Some(value) => match bindings.get(binding_var) {
                    Some(existing) => *existing == value,
                    None => {
                        bindings.insert(binding_var.clone(), value);
                        true
                    }
                },
            }
        })),
    }
}

fn where_clauses_hold(clauses: &[WhereClause], span: &Span) -> bool {
    clauses.iter().all(|clause| {
        let resolved = span.resolve_field(&clause.field.path);
        compare_scalars(resolved, Some(clause.value.as_scalar()), clause.op)
    })
}

fn compare_nodes(left: &Ast, right: &Ast, op: CompareOp, span: &Span) -> bool {
    compare_scalars(eval_scalar(left, span), eval_scalar(right, span), op)
}

fn eval_scalar(node: &Ast, span: &Span) -> Option<Scalar> {
    match node {
        Ast::Literal { value, .. } => Some(value.as_scalar()),
        Ast::FieldRef { field, .. } => span.resolve_field(&field.path),
        _ => None,
    }
}

/// String comparisons are lexicographic byte-order; there is no numeric
/// coercion between strings and numbers.
fn compare_scalars(left: Option<Scalar>, right: Option<Scalar>, op: CompareOp) -> bool {
    match (left, right) {
        (Some(Scalar::String(a)), Some(Scalar::String(b))) => apply_ord(a.cmp(&b), op),
        (Some(Scalar::Int(a)), Some(Scalar::Int(b))) => apply_ord(a.cmp(&b), op),
        (Some(Scalar::Float(a)), Some(Scalar::Float(b))) => a
            .partial_cmp(&b)
            .map(|ord| apply_ord(ord, op))
            .unwrap_or(false),
        (Some(Scalar::Int(a)), Some(Scalar::Float(b))) => (a as f64)
            .partial_cmp(&b)
            .map(|ord| apply_ord(ord, op))
            .unwrap_or(false),
        (Some(Scalar::Float(a)), Some(Scalar::Int(b))) => a
            .partial_cmp(&(b as f64))
            .map(|ord| apply_ord(ord, op))
            .unwrap_or(false),
        (Some(Scalar::Bool(a)), Some(Scalar::Bool(b))) => match op {
            CompareOp::Eq => a == b,
            CompareOp::NotEq => a != b,
            _ => false,
        },
        _ => false,
    }
}

fn apply_ord(ordering: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::NotEq => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::LtEq => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::GtEq => ordering != Ordering::Less,
    }
}
