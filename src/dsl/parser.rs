//! Recursive-descent parser with operator precedence. Precedence, lowest to
//! highest: `or` < `and` < `not` < comparison < primary.

use super::ast::{Ast, CompareOp, FieldRef, Literal, LogicalOp, WhereClause};
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::error::{EngineError, ParseErrorKind, Result, SourceSpan};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parses a DSL rule body into an AST. Pure: identical input yields an
    /// identical AST and identical error messages.
    pub fn parse(source: &str) -> Result<Ast> {
        let tokens = Lexer::new(source)?.tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        if parser.peek().kind == TokenKind::Eof {
            return Err(EngineError::parse_error(
                parser.peek().span,
                ParseErrorKind::UnexpectedEnd,
                "an expression",
                "end of input",
                Some("rules cannot be empty".to_string()),
            ));
        }
        let ast = parser.parse_or()?;
        parser.expect_eof()?;
        Ok(ast)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&mut self) -> Result<()> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            let tok = self.peek().clone();
            Err(EngineError::parse_error(
                tok.span,
                ParseErrorKind::UnexpectedToken,
                "end of input",
                tok.describe(),
                None,
            ))
        }
    }

    fn parse_or(&mut self) -> Result<Ast> {
        let first = self.parse_and()?;
        let mut operands = vec![first];
        let span = operands[0].span();
        while self.peek().kind == TokenKind::Or {
            self.advance();
            operands.push(self.parse_and()?);
        }
        if operands.len() == 1 {
            Ok(operands.into_iter().next().unwrap())
        } else {
            Ok(Ast::Logical {
                op: LogicalOp::Or,
                operands,
                span,
            })
        }
    }

    fn parse_and(&mut self) -> Result<Ast> {
        let first = self.parse_not()?;
        let mut operands = vec![first];
        let span = operands[0].span();
        while self.peek().kind == TokenKind::And {
            self.advance();
            operands.push(self.parse_not()?);
        }
        if operands.len() == 1 {
            Ok(operands.into_iter().next().unwrap())
        } else {
            Ok(Ast::Logical {
                op: LogicalOp::And,
                operands,
                span,
            })
        }
    }

    fn parse_not(&mut self) -> Result<Ast> {
        if self.peek().kind == TokenKind::Not {
            let span = self.advance().span;
            let child = self.parse_not()?;
            Ok(Ast::Not {
                child: Box::new(child),
                span,
            })
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Ast> {
        let left = self.parse_primary()?;
        if let Some(op) = compare_op(&self.peek().kind) {
            let span = self.advance().span;
            let right = self.parse_primary()?;
            Ok(Ast::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            })
        } else {
            Ok(left)
        }
    }

    fn parse_primary(&mut self) -> Result<Ast> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::True => {
                self.advance();
                Ok(Ast::Literal {
                    value: Literal::Bool(true),
                    span: tok.span,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Ast::Literal {
                    value: Literal::Bool(false),
                    span: tok.span,
                })
            }
            TokenKind::Int(n) => {
                let n = *n;
                self.advance();
                Ok(Ast::Literal {
                    value: Literal::Int(n),
                    span: tok.span,
                })
            }
            TokenKind::Float(n) => {
                let n = *n;
                self.advance();
                Ok(Ast::Literal {
                    value: Literal::Float(n),
                    span: tok.span,
                })
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(Ast::Literal {
                    value: Literal::Str(s),
                    span: tok.span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Trace => self.parse_trace_expr(),
            TokenKind::Ident(_) | TokenKind::DottedIdent(_) => self.parse_field_ref(),
            _ => Err(EngineError::parse_error(
                tok.span,
                ParseErrorKind::UnexpectedToken,
                "a literal, 'trace.has(...)', 'trace.count(...)', a field reference, or '('",
                tok.describe(),
                None,
            )),
        }
    }

    fn parse_field_ref(&mut self) -> Result<Ast> {
        let tok = self.advance();
        let path = match tok.kind {
            TokenKind::Ident(s) | TokenKind::DottedIdent(s) => s,
            _ => unreachable!("caller checked token kind"),
        };
        if path == "span" && self.peek().kind == TokenKind::Dot {
            // shouldn't normally happen since the lexer folds `span.x` into
            // one DottedIdent token, but handle a bare `span` defensively.
        }
        // `span.attributes["key"]` form: the lexer yields `span.attributes`
        // as a DottedIdent followed by `[`, `"key"`, `]`.
        if path == "span.attributes" && self.peek().kind == TokenKind::LBracket {
            self.advance();
            let key_tok = self.peek().clone();
            let key = match &key_tok.kind {
                TokenKind::Str(s) => s.clone(),
                _ => {
                    return Err(EngineError::parse_error(
                        key_tok.span,
                        ParseErrorKind::InvalidValue,
                        "a quoted attribute key",
                        key_tok.describe(),
                        None,
                    ))
                }
            };
            self.advance();
            self.expect(TokenKind::RBracket, "']'")?;
            return Ok(Ast::FieldRef {
                field: FieldRef { path: key },
                span: tok.span,
            });
        }
        Ok(Ast::FieldRef {
            field: FieldRef { path },
            span: tok.span,
        })
    }

    fn parse_trace_expr(&mut self) -> Result<Ast> {
        let start_span = self.advance().span; // consume `trace`
        self.expect_dot()?;
        let ident = self.expect_ident()?;
        match ident.as_str() {
            "has" => self.parse_has(start_span),
            "count" => self.parse_count(start_span),
            _ => Err(EngineError::parse_error(
                start_span,
                ParseErrorKind::InvalidIdentifier,
                "'has' or 'count'",
                format!("'{ident}'"),
                Some("did you mean trace.has(...) or trace.count(...)?".to_string()),
            )),
        }
    }

    /// `trace.has(op)[.where(...)]*[.correlate(binding_var)]`. A trailing
    /// `.correlate(var)` turns the clause into a [`Ast::CorrelatedHas`]: its
    /// match on `var` (typically `trace_id`) must agree with the value a
    /// sibling `Has`/`CorrelatedHas` in the same rule binds for that
    /// variable, instead of each `has(...)` matching independently.
    fn parse_has(&mut self, span: SourceSpan) -> Result<Ast> {
        self.expect(TokenKind::LParen, "'('")?;
        let operation_name = self.expect_ident_or_dotted()?;
        self.expect(TokenKind::RParen, "')'")?;

        let mut where_clauses = Vec::new();
        let mut binding_var: Option<String> = None;
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            let ident = self.expect_ident()?;
            match ident.as_str() {
                "where" => {
                    self.expect(TokenKind::LParen, "'('")?;
                    where_clauses.push(self.parse_where_predicate()?);
                    self.expect(TokenKind::RParen, "')'")?;
                }
                "correlate" => {
                    self.expect(TokenKind::LParen, "'('")?;
                    binding_var = Some(self.expect_field_path()?);
                    self.expect(TokenKind::RParen, "')'")?;
                }
                _ => {
                    return Err(EngineError::parse_error(
                        self.peek().span,
                        ParseErrorKind::InvalidIdentifier,
                        "'where' or 'correlate'",
                        format!("'{ident}'"),
                        None,
                    ));
                }
            }
        }

        Ok(match binding_var {
            Some(binding_var) => Ast::CorrelatedHas {
                operation_name,
                where_clauses,
                binding_var,
                span,
            },
            None => Ast::Has {
                operation_name,
                where_clauses,
                span,
            },
        })
    }

    fn parse_where_predicate(&mut self) -> Result<WhereClause> {
        let field_tok = self.peek().clone();
        let field_path = self.expect_field_path()?;
        let op_tok = self.peek().clone();
        let op = compare_op(&op_tok.kind).ok_or_else(|| {
            EngineError::parse_error(
                op_tok.span,
                ParseErrorKind::InvalidOperator,
                "a comparison operator",
                op_tok.describe(),
                None,
            )
        })?;
        self.advance();
        let value_tok = self.peek().clone();
        let value = self.expect_literal()?;
        let _ = value_tok;
        Ok(WhereClause {
            field: FieldRef { path: field_path },
            op,
            value,
            span: field_tok.span,
        })
    }

    fn parse_count(&mut self, span: SourceSpan) -> Result<Ast> {
        self.expect(TokenKind::LParen, "'('")?;
        let pattern = self.expect_ident_or_dotted()?;
        self.expect(TokenKind::RParen, "')'")?;
        let op_tok = self.peek().clone();
        let op = compare_op(&op_tok.kind).ok_or_else(|| {
            EngineError::parse_error(
                op_tok.span,
                ParseErrorKind::InvalidOperator,
                "a comparison operator",
                op_tok.describe(),
                None,
            )
        })?;
        self.advance();
        let n_tok = self.peek().clone();
        let value = match n_tok.kind {
            TokenKind::Int(n) => {
                self.advance();
                n
            }
            _ => {
                return Err(EngineError::parse_error(
                    n_tok.span,
                    ParseErrorKind::InvalidValue,
                    "an integer",
                    n_tok.describe(),
                    None,
                ))
            }
        };
        Ok(Ast::Count {
            operation_name_pattern: pattern,
            op,
            value,
            span,
        })
    }

    fn expect_dot(&mut self) -> Result<()> {
        self.expect(TokenKind::Dot, "'.'")
    }

    fn expect(&mut self, kind: TokenKind, expected_desc: &str) -> Result<()> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            let tok = self.peek().clone();
            Err(EngineError::parse_error(
                tok.span,
                ParseErrorKind::MissingToken,
                expected_desc,
                tok.describe(),
                None,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(EngineError::parse_error(
                tok.span,
                ParseErrorKind::InvalidIdentifier,
                "an identifier",
                tok.describe(),
                None,
            )),
        }
    }

    fn expect_ident_or_dotted(&mut self) -> Result<String> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Ident(s) | TokenKind::DottedIdent(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(EngineError::parse_error(
                tok.span,
                ParseErrorKind::InvalidIdentifier,
                "an operation name",
                tok.describe(),
                None,
            )),
        }
    }

    fn expect_field_path(&mut self) -> Result<String> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            TokenKind::DottedIdent(s) if s == "span.attributes" => {
                self.advance();
                self.expect(TokenKind::LBracket, "'['")?;
                let key_tok = self.peek().clone();
                let key = match &key_tok.kind {
                    TokenKind::Str(k) => k.clone(),
                    _ => {
                        return Err(EngineError::parse_error(
                            key_tok.span,
                            ParseErrorKind::InvalidValue,
                            "a quoted attribute key",
                            key_tok.describe(),
                            None,
                        ))
                    }
                };
                self.advance();
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(key)
            }
            TokenKind::DottedIdent(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(EngineError::parse_error(
                tok.span,
                ParseErrorKind::InvalidIdentifier,
                "a field reference",
                tok.describe(),
                None,
            )),
        }
    }

    fn expect_literal(&mut self) -> Result<Literal> {
        let tok = self.peek().clone();
        let lit = match tok.kind {
            TokenKind::Int(n) => Literal::Int(n),
            TokenKind::Float(n) => Literal::Float(n),
            TokenKind::Str(s) => Literal::Str(s),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            _ => {
                return Err(EngineError::parse_error(
                    tok.span,
                    ParseErrorKind::InvalidValue,
                    "a literal value",
                    tok.describe(),
                    None,
                ))
            }
        };
        self.advance();
        Ok(lit)
    }
}

fn compare_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Eq => Some(CompareOp::Eq),
        TokenKind::NotEq => Some(CompareOp::NotEq),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::LtEq => Some(CompareOp::LtEq),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}
