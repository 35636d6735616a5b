//! Lexer for the compiled lambda-expression grammar.

use crate::error::EngineError;

/// Tokens of the lambda grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    Dot,
    Gt,
    Gte,
    Lt,
    Lte,
    EqEq,
    Neq,
    AndAnd,
    OrOr,
}

/// Tokenize an expression string.
pub fn tokenize(input: &str) -> Result<Vec<Token>, EngineError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Gte);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Lte);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '=' => {
                chars.next();
                if chars.next() == Some('=') {
                    tokens.push(Token::EqEq);
                } else {
                    return Err(EngineError::Parse("expected '==' ".to_string()));
                }
            }
            '!' => {
                chars.next();
                if chars.next() == Some('=') {
                    tokens.push(Token::Neq);
                } else {
                    return Err(EngineError::Parse("expected '!='".to_string()));
                }
            }
            '&' => {
                chars.next();
                if chars.next() == Some('&') {
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(EngineError::Parse("expected '&&'".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.next() == Some('|') {
                    tokens.push(Token::OrOr);
                } else {
                    return Err(EngineError::Parse("expected '||'".to_string()));
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some(other) => {
                                return Err(EngineError::Parse(format!(
                                    "unknown escape '\\{}'",
                                    other
                                )))
                            }
                            None => {
                                return Err(EngineError::Parse(
                                    "unterminated string literal".to_string(),
                                ))
                            }
                        },
                        Some('"') => break,
                        Some(other) => s.push(other),
                        None => {
                            return Err(EngineError::Parse(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '-' | '0'..='9' => {
                let mut raw = String::new();
                if c == '-' {
                    raw.push(c);
                    chars.next();
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        raw.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = raw
                    .parse()
                    .map_err(|_| EngineError::Parse(format!("invalid number '{}'", raw)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(EngineError::Parse(format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_comparison() {
        let tokens = tokenize("ctx.gasto >= 50.5").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("ctx".to_string()),
                Token::Dot,
                Token::Ident("gasto".to_string()),
                Token::Gte,
                Token::Number(50.5),
            ]
        );
    }

    #[test]
    fn test_tokenize_string_with_escapes() {
        let tokens = tokenize(r#"ctx.club == "say \"hi\" \\ bye""#).unwrap();
        assert_eq!(
            tokens.last(),
            Some(&Token::Str("say \"hi\" \\ bye".to_string()))
        );
    }

    #[test]
    fn test_tokenize_logical() {
        let tokens = tokenize("(ctx.a > 1 && ctx.b < 2) || ctx.c == true").unwrap();
        assert!(tokens.contains(&Token::AndAnd));
        assert!(tokens.contains(&Token::OrOr));
        assert!(tokens.contains(&Token::LParen));
    }

    #[test]
    fn test_tokenize_negative_number() {
        let tokens = tokenize("ctx.delta > -3").unwrap();
        assert_eq!(tokens.last(), Some(&Token::Number(-3.0)));
    }

    #[test]
    fn test_tokenize_rejects_lone_ampersand() {
        assert!(tokenize("ctx.a & ctx.b").is_err());
        assert!(tokenize("ctx.a = 1").is_err());
    }
}
