//! Resource guards enforced across parsing, compilation, and evaluation.
//! Every limit here fails closed: exceeding one always surfaces
//! `EngineError::ResourceLimit`, never a silent truncation.

use crate::dsl::Ast;
use crate::error::{EngineError, Result, ResourceLimitKind};

/// Maximum structural depth of a compiled AST.
pub const MAX_AST_DEPTH: usize = 100;
/// Maximum number of spans considered in a single rule evaluation.
pub const MAX_SPANS_PER_EVALUATION: usize = 100_000;

/// Re-exported for callers that want every limit in one place; the
/// attribute-count and string-length guards live next to the [`crate::span`]
/// types they bound.
pub use crate::span::{MAX_ATTRIBUTES, MAX_STRING_VALUE_LEN};
pub use crate::dsl::lexer::MAX_SOURCE_LEN;

/// Checks a compiled AST against the depth guard. Called once at compile
/// time so the interpreter never needs to re-derive depth on the hot path.
pub fn check_ast_depth(ast: &Ast) -> Result<()> {
    let depth = ast.depth();
    if depth > MAX_AST_DEPTH {
        return Err(EngineError::resource_limit(
            ResourceLimitKind::AstDepth,
            format!("expression depth is {depth}, max is {MAX_AST_DEPTH}"),
        ));
    }
    Ok(())
}

/// Checks a span count against the per-evaluation cap.
pub fn check_span_count(count: usize) -> Result<()> {
    if count > MAX_SPANS_PER_EVALUATION {
        return Err(EngineError::resource_limit(
            ResourceLimitKind::SpanCount,
            format!("evaluation has {count} spans, max is {MAX_SPANS_PER_EVALUATION}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    #[test]
    fn accepts_depth_at_limit() {
        // A chain of MAX_AST_DEPTH nested `not` expressions sits exactly at
        // the boundary and must be accepted.
        let mut src = String::from("true");
        for _ in 0..MAX_AST_DEPTH - 1 {
            src = format!("not ({src})");
        }
        let ast = parse(&src).unwrap();
        assert!(check_ast_depth(&ast).is_ok());
    }

    #[test]
    fn rejects_depth_over_limit() {
        let mut src = String::from("true");
        for _ in 0..MAX_AST_DEPTH {
            src = format!("not ({src})");
        }
        let ast = parse(&src).unwrap();
        let err = check_ast_depth(&ast).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ResourceLimit);
    }

    #[test]
    fn span_count_boundary() {
        assert!(check_span_count(MAX_SPANS_PER_EVALUATION).is_ok());
        assert!(check_span_count(MAX_SPANS_PER_EVALUATION + 1).is_err());
    }
}
