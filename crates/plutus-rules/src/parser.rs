//! Recursive-descent parser for compiled lambda expressions.
//!
//! Grammar (loosest binding first):
//!
//! ```text
//! or_expr   := and_expr ( '||' and_expr )*
//! and_expr  := compare ( '&&' compare )*
//! compare   := primary ( ('>'|'>='|'<'|'<='|'=='|'!=') primary )?
//! primary   := '(' or_expr ')'
//!            | number | string | 'true' | 'false'
//!            | 'parseDateTime' '(' string ')'
//!            | 'ctx' '.' ident [ '.' 'Contains' '(' string ')' ]
//! ```

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::token::{tokenize, Token};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    DateTime(DateTime<Utc>),
    /// A `ctx.<field>` reference.
    Field(String),
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `ctx.<field>.Contains("<needle>")`
    Contains { field: String, needle: String },
}

/// Parse an expression string into an [`Expr`] tree.
pub fn parse_expression(input: &str) -> Result<Expr, EngineError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(EngineError::Parse(format!(
            "trailing tokens after expression in '{}'",
            input
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EngineError> {
        match self.next() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(EngineError::Parse(format!(
                "expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EngineError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Logical {
                op: LogicOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EngineError> {
        let mut lhs = self.parse_compare()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            let rhs = self.parse_compare()?;
            lhs = Expr::Logical {
                op: LogicOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Expr, EngineError> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Gte) => CmpOp::Gte,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Lte) => CmpOp::Lte,
            Some(Token::EqEq) => CmpOp::Eq,
            Some(Token::Neq) => CmpOp::Neq,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.parse_primary()?;
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, EngineError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "parseDateTime" => self.parse_date_call(),
                "ctx" => self.parse_field(),
                other => Err(EngineError::Parse(format!(
                    "unexpected identifier '{}'",
                    other
                ))),
            },
            other => Err(EngineError::Parse(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }

    fn parse_date_call(&mut self) -> Result<Expr, EngineError> {
        self.expect(&Token::LParen)?;
        let literal = match self.next() {
            Some(Token::Str(s)) => s,
            other => {
                return Err(EngineError::Parse(format!(
                    "parseDateTime expects a string literal, found {:?}",
                    other
                )))
            }
        };
        self.expect(&Token::RParen)?;
        let parsed = DateTime::parse_from_rfc3339(&literal)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| EngineError::Parse(format!("invalid datetime literal '{}'", literal)))?;
        Ok(Expr::DateTime(parsed))
    }

    fn parse_field(&mut self) -> Result<Expr, EngineError> {
        self.expect(&Token::Dot)?;
        let field = match self.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(EngineError::Parse(format!(
                    "expected field name after 'ctx.', found {:?}",
                    other
                )))
            }
        };

        // Optional `.Contains("...")` method call.
        if self.peek() == Some(&Token::Dot) {
            self.next();
            match self.next() {
                Some(Token::Ident(method)) if method == "Contains" => {
                    self.expect(&Token::LParen)?;
                    let needle = match self.next() {
                        Some(Token::Str(s)) => s,
                        other => {
                            return Err(EngineError::Parse(format!(
                                "Contains expects a string literal, found {:?}",
                                other
                            )))
                        }
                    };
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Contains { field, needle })
                }
                other => Err(EngineError::Parse(format!(
                    "unknown method {:?} on ctx.{}",
                    other, field
                ))),
            }
        } else {
            Ok(Expr::Field(field))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse_expression("ctx.gasto > 50").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                op: CmpOp::Gt,
                lhs: Box::new(Expr::Field("gasto".to_string())),
                rhs: Box::new(Expr::Number(50.0)),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // a || b && c  parses as  a || (b && c)
        let expr = parse_expression("ctx.a == 1 || ctx.b == 2 && ctx.c == 3").unwrap();
        match expr {
            Expr::Logical {
                op: LogicOp::Or,
                rhs,
                ..
            } => match *rhs {
                Expr::Logical {
                    op: LogicOp::And, ..
                } => {}
                other => panic!("expected And on the right, got {:?}", other),
            },
            other => panic!("expected Or at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parens_override_precedence() {
        let expr = parse_expression("(ctx.a == 1 || ctx.b == 2) && ctx.c == 3").unwrap();
        match expr {
            Expr::Logical {
                op: LogicOp::And,
                lhs,
                ..
            } => match *lhs {
                Expr::Logical { op: LogicOp::Or, .. } => {}
                other => panic!("expected Or on the left, got {:?}", other),
            },
            other => panic!("expected And at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_contains() {
        let expr = parse_expression(r#"ctx.club.Contains("gold")"#).unwrap();
        assert_eq!(
            expr,
            Expr::Contains {
                field: "club".to_string(),
                needle: "gold".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_date_literal() {
        let expr = parse_expression(r#"ctx.since >= parseDateTime("2024-01-01T00:00:00Z")"#)
            .unwrap();
        match expr {
            Expr::Compare {
                op: CmpOp::Gte,
                rhs,
                ..
            } => assert!(matches!(*rhs, Expr::DateTime(_))),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_true() {
        // An empty expression group compiles to the literal `true`.
        assert_eq!(parse_expression("true").unwrap(), Expr::Bool(true));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        assert!(parse_expression("ctx.a > 1 ctx.b").is_err());
        assert!(parse_expression("ctx.").is_err());
        assert!(parse_expression("").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        assert!(parse_expression(r#"ctx.d > parseDateTime("not-a-date")"#).is_err());
    }
}
