//! Store-side filter expressions
//!
//! Grammar:
//!
//! ```text
//! expr  := conj ("or" conj)*
//! conj  := unary ("and" unary)*
//! unary := "not" unary | "(" expr ")" | field op string
//! field := "key" | "value"
//! op    := "=" | "!=" | "startswith" | "contains"
//! ```
//!
//! Strings are single- or double-quoted; `\` escapes the next character.
//! Keywords are case-insensitive.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cannot parse '{expr}' - {reason}")]
pub struct PredicateError {
    pub expr: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    StartsWith,
    Contains,
}

impl Op {
    fn apply(&self, subject: &[u8], operand: &[u8]) -> bool {
        match self {
            Op::Eq => subject == operand,
            Op::Ne => subject != operand,
            Op::StartsWith => subject.starts_with(operand),
            Op::Contains => {
                operand.is_empty() || subject.windows(operand.len()).any(|w| w == operand)
            }
        }
    }
}

/// Filter evaluated by the store against each entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Compare { field: Field, op: Op, operand: Bytes },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, key: &[u8], value: &[u8]) -> bool {
        match self {
            Predicate::Compare { field, op, operand } => {
                let subject = match field {
                    Field::Key => key,
                    Field::Value => value,
                };
                op.apply(subject, operand)
            }
            Predicate::Not(inner) => !inner.matches(key, value),
            Predicate::And(terms) => terms.iter().all(|t| t.matches(key, value)),
            Predicate::Or(terms) => terms.iter().any(|t| t.matches(key, value)),
        }
    }

    /// Evaluate against an optional predicate, absent meaning match-all
    pub fn accepts(predicate: Option<&Predicate>, key: &[u8], value: &[u8]) -> bool {
        predicate.is_none_or(|p| p.matches(key, value))
    }
}

impl FromStr for Predicate {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| PredicateError {
            expr: s.to_string(),
            reason,
        };
        let tokens = tokenize(s).map_err(fail)?;
        let mut parser = Parser { tokens, pos: 0 };
        let predicate = parser.expr().map_err(fail)?;
        match parser.peek() {
            None => Ok(predicate),
            Some(token) => Err(fail(format!("unexpected {}", token))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
    Eq,
    Ne,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Eq => write!(f, "'='"),
            Token::Ne => write!(f, "'!='"),
            Token::Open => write!(f, "'('"),
            Token::Close => write!(f, "')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err("expected '=' after '!'".to_string());
                }
                tokens.push(Token::Ne);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => text.push(escaped),
                            None => return Err("unterminated string".to_string()),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => text.push(ch),
                        None => return Err("unterminated string".to_string()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word.to_ascii_lowercase()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Predicate, String> {
        let mut terms = vec![self.conj()?];
        while self.eat_word("or") {
            terms.push(self.conj()?);
        }
        Ok(collapse(terms, Predicate::Or))
    }

    fn conj(&mut self) -> Result<Predicate, String> {
        let mut terms = vec![self.unary()?];
        while self.eat_word("and") {
            terms.push(self.unary()?);
        }
        Ok(collapse(terms, Predicate::And))
    }

    fn unary(&mut self) -> Result<Predicate, String> {
        if self.eat_word("not") {
            return Ok(Predicate::Not(Box::new(self.unary()?)));
        }

        match self.bump() {
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    Some(other) => Err(format!("expected ')', found {}", other)),
                    None => Err("expected ')'".to_string()),
                }
            }
            Some(Token::Word(w)) => {
                let field = match w.as_str() {
                    "key" => Field::Key,
                    "value" => Field::Value,
                    _ => return Err(format!("unknown field '{}'", w)),
                };
                let op = match self.bump() {
                    Some(Token::Eq) => Op::Eq,
                    Some(Token::Ne) => Op::Ne,
                    Some(Token::Word(w)) if w == "startswith" => Op::StartsWith,
                    Some(Token::Word(w)) if w == "contains" => Op::Contains,
                    Some(other) => return Err(format!("expected operator, found {}", other)),
                    None => return Err("expected operator".to_string()),
                };
                match self.bump() {
                    Some(Token::Str(text)) => Ok(Predicate::Compare {
                        field,
                        op,
                        operand: Bytes::from(text.into_bytes()),
                    }),
                    Some(other) => Err(format!("expected string, found {}", other)),
                    None => Err("expected string".to_string()),
                }
            }
            Some(other) => Err(format!("unexpected {}", other)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn collapse(mut terms: Vec<Predicate>, join: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Predicate {
        s.parse().unwrap()
    }

    #[test]
    fn test_simple_comparisons() {
        assert!(parse("key = 'k1'").matches(b"k1", b"v"));
        assert!(!parse("key = 'k1'").matches(b"k2", b"v"));
        assert!(parse("key != 'k1'").matches(b"k2", b"v"));
        assert!(parse("key startswith \"user:\"").matches(b"user:7", b""));
        assert!(parse("value contains 'needle'").matches(b"k", b"haystack needle hay"));
        assert!(!parse("value contains 'needle'").matches(b"k", b"haystack"));
    }

    #[test]
    fn test_precedence_and_grouping() {
        // and binds tighter than or
        let p = parse("key = 'a' or key = 'b' and value = 'x'");
        assert!(p.matches(b"a", b"y"));
        assert!(!p.matches(b"b", b"y"));
        assert!(p.matches(b"b", b"x"));

        let p = parse("(key = 'a' or key = 'b') and value = 'x'");
        assert!(!p.matches(b"a", b"y"));
        assert!(p.matches(b"a", b"x"));
    }

    #[test]
    fn test_not_and_keywords_case() {
        let p = parse("NOT key StartsWith 'tmp'");
        assert!(p.matches(b"user", b""));
        assert!(!p.matches(b"tmp1", b""));
    }

    #[test]
    fn test_escapes() {
        let p = parse(r#"value = 'it\'s'"#);
        assert!(p.matches(b"k", b"it's"));
    }

    #[test]
    fn test_absent_predicate_accepts_everything() {
        assert!(Predicate::accepts(None, b"anything", b""));
        let p = parse("key = 'a'");
        assert!(!Predicate::accepts(Some(&p), b"b", b""));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "key",
            "key =",
            "key = v",
            "size = '1'",
            "key = 'a' and",
            "(key = 'a'",
            "key = 'a')",
            "key = 'unterminated",
            "key ! 'a'",
            "key = 'a' # 'b'",
        ] {
            assert!(bad.parse::<Predicate>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_error_message_names_expression() {
        let err = "key ~ 'a'".parse::<Predicate>().unwrap_err();
        assert!(err.to_string().starts_with("Cannot parse 'key ~ 'a'' - "));
    }
}
