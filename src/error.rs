//! Crate-wide error taxonomy
//!
//! Every public boundary in this crate returns `Result<T, EngineError>`.
//! `EngineError::kind()` exposes the machine-readable error code a caller
//! needs without string-matching the `Display` message; the message itself
//! is meant for humans (logs, CLI output, API error bodies).

use thiserror::Error;

/// Stable machine code for an [`EngineError`], independent of the human
/// message. Downstream HTTP bindings map these 1:1 onto status codes
/// (VALIDATION -> 400, PARSE -> 400, NOT_FOUND -> 404, OVERLOADED -> 429,
/// TIMEOUT -> 504/408, RESOURCE_LIMIT -> 413, INTERNAL -> 500).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Parse,
    ResourceLimit,
    NotFound,
    Overloaded,
    Timeout,
    ShuttingDown,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Parse => "PARSE",
            ErrorKind::ResourceLimit => "RESOURCE_LIMIT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Overloaded => "OVERLOADED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ShuttingDown => "SHUTTING_DOWN",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// A position in DSL source, attached to lex/parse errors for stable,
/// reproducible diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl SourceSpan {
    pub fn new(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, offset }
    }
}

/// Kind of parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken,
    MissingToken,
    InvalidOperator,
    InvalidIdentifier,
    InvalidValue,
    UnexpectedEnd,
}

impl ParseErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedToken => "UNEXPECTED_TOKEN",
            ParseErrorKind::MissingToken => "MISSING_TOKEN",
            ParseErrorKind::InvalidOperator => "INVALID_OPERATOR",
            ParseErrorKind::InvalidIdentifier => "INVALID_IDENTIFIER",
            ParseErrorKind::InvalidValue => "INVALID_VALUE",
            ParseErrorKind::UnexpectedEnd => "UNEXPECTED_END",
        }
    }
}

/// Structured, machine-readable parse error carrying the detail the public
/// `validate` contract promises callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub span: SourceSpan,
    pub kind: ParseErrorKind,
    pub expected: String,
    pub actual: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}, column {}: expected {}, found {}",
            self.kind.as_str(),
            self.span.line,
            self.span.col,
            self.expected,
            self.actual
        )
    }
}

/// Resource guard that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimitKind {
    AstDepth,
    SpanCount,
    AttributeCount,
    StringLength,
    SourceLength,
}

impl ResourceLimitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceLimitKind::AstDepth => "AST_DEPTH",
            ResourceLimitKind::SpanCount => "SPAN_COUNT",
            ResourceLimitKind::AttributeCount => "ATTRIBUTE_COUNT",
            ResourceLimitKind::StringLength => "STRING_LENGTH",
            ResourceLimitKind::SourceLength => "SOURCE_LENGTH",
        }
    }
}

/// The crate's single error type. Every fallible public operation returns
/// `Result<T, EngineError>`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Parse(#[from] ParseErrorBox),

    #[error("resource limit {limit} exceeded: {detail}")]
    ResourceLimit {
        limit: ResourceLimitKind,
        detail: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("overloaded, retry later: {0}")]
    Overloaded(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("shutting down, rejecting new work")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Wraps [`ParseError`] so it composes with `#[from]` while keeping the
/// `Display` impl the caller actually wants (the full structured message).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrorBox(pub ParseError);

impl std::fmt::Display for ParseErrorBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ParseErrorBox {}

impl From<ParseError> for EngineError {
    fn from(e: ParseError) -> Self {
        EngineError::Parse(ParseErrorBox(e))
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Parse(_) => ErrorKind::Parse,
            EngineError::ResourceLimit { .. } => ErrorKind::ResourceLimit,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Overloaded(_) => ErrorKind::Overloaded,
            EngineError::Timeout(_) => ErrorKind::Timeout,
            EngineError::ShuttingDown => ErrorKind::ShuttingDown,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn resource_limit(limit: ResourceLimitKind, detail: impl Into<String>) -> Self {
        EngineError::ResourceLimit {
            limit,
            detail: detail.into(),
        }
    }

    pub fn parse_error(
        span: SourceSpan,
        kind: ParseErrorKind,
        expected: impl Into<String>,
        actual: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        ParseError {
            span,
            kind,
            expected: expected.into(),
            actual: actual.into(),
            suggestion,
        }
        .into()
    }
}

/// Library-internal result alias.
pub type Result<T> = std::result::Result<T, EngineError>;
