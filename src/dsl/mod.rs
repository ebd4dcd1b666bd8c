//! Rule expression DSL: lexer, AST, and parser.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::Ast;
pub use parser::Parser;

use crate::error::Result;

/// Parses a rule expression body into an [`Ast`]. Thin convenience wrapper
/// over [`Parser::parse`] so callers outside this module never need to name
/// the parser type directly.
pub fn parse(source: &str) -> Result<Ast> {
    Parser::parse(source)
}
