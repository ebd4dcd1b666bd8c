//! AST model
//!
//! The AST is a tagged sum carrying only data, no executable closures. Every
//! node records its source offset for error reporting. The tree has no
//! back-references and no cycles, so it is trivially `Clone` and safe to
//! share across concurrent evaluations behind an `Arc`.

use crate::error::SourceSpan;
use crate::span::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A `span.<field>` reference or `span.attributes["key"]` lookup, valid
/// inside `.where(...)` predicates and at the top level for single-span
/// evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub path: String,
}

/// A `.where(field op value)` clause attached to `trace.has(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub field: FieldRef,
    pub op: CompareOp,
    pub value: Literal,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn as_scalar(&self) -> Scalar {
        match self {
            Literal::Bool(b) => Scalar::Bool(*b),
            Literal::Int(i) => Scalar::Int(*i),
            Literal::Float(f) => Scalar::Float(*f),
            Literal::Str(s) => Scalar::String(s.clone()),
        }
    }

    fn to_dsl(&self) -> String {
        match self {
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Str(s) => format!("\"{s}\""),
        }
    }
}

/// Tagged-variant AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Literal {
        value: Literal,
        span: SourceSpan,
    },
    FieldRef {
        field: FieldRef,
        span: SourceSpan,
    },
    Compare {
        op: CompareOp,
        left: Box<Ast>,
        right: Box<Ast>,
        span: SourceSpan,
    },
    Logical {
        op: LogicalOp,
        operands: Vec<Ast>,
        span: SourceSpan,
    },
    Not {
        child: Box<Ast>,
        span: SourceSpan,
    },
    /// `trace.has(op)[.where(...)]*`
    Has {
        operation_name: String,
        where_clauses: Vec<WhereClause>,
        span: SourceSpan,
    },
    /// `trace.count(pattern) op n`
    Count {
        operation_name_pattern: String,
        op: CompareOp,
        value: i64,
        span: SourceSpan,
    },
    /// `Has` whose correlation variable (typically `trace_id`) must match a
    /// value bound by a sibling `Has` in the same rule.
    CorrelatedHas {
        operation_name: String,
        where_clauses: Vec<WhereClause>,
        binding_var: String,
        span: SourceSpan,
    },
}

impl Ast {
    pub fn span(&self) -> SourceSpan {
        match self {
            Ast::Literal { span, .. }
            | Ast::FieldRef { span, .. }
            | Ast::Compare { span, .. }
            | Ast::Logical { span, .. }
            | Ast::Not { span, .. }
            | Ast::Has { span, .. }
            | Ast::Count { span, .. }
            | Ast::CorrelatedHas { span, .. } => *span,
        }
    }

    /// Structural depth of this node, used by the `PRETTY-PRINT -> PARSE`
    /// round-trip test and by callers that want to pre-check depth before
    /// handing the tree to the interpreter's own guard.
    pub fn depth(&self) -> usize {
        match self {
            Ast::Literal { .. } | Ast::FieldRef { .. } | Ast::Has { .. } | Ast::Count { .. } => 1,
            Ast::CorrelatedHas { .. } => 1,
            Ast::Compare { left, right, .. } => 1 + left.depth().max(right.depth()),
            Ast::Logical { operands, .. } => {
                1 + operands.iter().map(Ast::depth).max().unwrap_or(0)
            }
            Ast::Not { child, .. } => 1 + child.depth(),
        }
    }

    /// Renders a canonical, re-parseable form of the AST. Used by the
    /// `parse -> pretty-print -> parse` idempotence property.
    pub fn pretty_print(&self) -> String {
        match self {
            Ast::Literal { value, .. } => match value {
                Literal::Bool(b) => b.to_string(),
                Literal::Int(i) => i.to_string(),
                Literal::Float(f) => f.to_string(),
                Literal::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            },
            Ast::FieldRef { field, .. } => field.path.clone(),
            Ast::Compare {
                op, left, right, ..
            } => format!(
                "{} {} {}",
                left.pretty_print(),
                op_str(*op),
                right.pretty_print()
            ),
            Ast::Logical { op, operands, .. } => {
                let joiner = match op {
                    LogicalOp::And => " and ",
                    LogicalOp::Or => " or ",
                };
                let parts: Vec<String> = operands
                    .iter()
                    .map(|o| format!("({})", o.pretty_print()))
                    .collect();
                parts.join(joiner)
            }
            Ast::Not { child, .. } => format!("not ({})", child.pretty_print()),
            Ast::Has {
                operation_name,
                where_clauses,
                ..
            } => {
                let mut s = format!("trace.has({operation_name})");
                for w in where_clauses {
                    s.push_str(&format!(
                        ".where({} {} {})",
                        w.field.path,
                        op_str(w.op),
                        w.value.to_dsl()
                    ));
                }
                s
            }
            Ast::CorrelatedHas {
                operation_name,
                where_clauses,
                binding_var,
                ..
            } => {
                let mut s = format!("trace.has({operation_name})");
                for w in where_clauses {
                    s.push_str(&format!(
                        ".where({} {} {})",
                        w.field.path,
                        op_str(w.op),
                        w.value.to_dsl()
                    ));
                }
                s.push_str(&format!(".correlate({binding_var})"));
                s
            }
            Ast::Count {
                operation_name_pattern,
                op,
                value,
                ..
            } => format!(
                "trace.count({operation_name_pattern}) {} {value}",
                op_str(*op)
            ),
        }
    }
}

fn op_str(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::NotEq => "!=",
        CompareOp::Lt => "<",
        CompareOp::LtEq => "<=",
        CompareOp::Gt => ">",
        CompareOp::GtEq => ">=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::default()
    }

    #[test]
    fn depth_counts_nesting() {
        let leaf = Ast::Literal {
            value: Literal::Bool(true),
            span: span(),
        };
        let not_node = Ast::Not {
            child: Box::new(leaf.clone()),
            span: span(),
        };
        assert_eq!(leaf.depth(), 1);
        assert_eq!(not_node.depth(), 2);
    }

    #[test]
    fn pretty_print_has_with_where_round_trips_text() {
        let ast = Ast::Has {
            operation_name: "payment.charge_card".to_string(),
            where_clauses: vec![WhereClause {
                field: FieldRef {
                    path: "amount".to_string(),
                },
                op: CompareOp::Gt,
                value: Literal::Int(1000),
                span: span(),
            }],
            span: span(),
        };
        assert_eq!(
            ast.pretty_print(),
            "trace.has(payment.charge_card).where(amount > 1000)"
        );
    }
}
