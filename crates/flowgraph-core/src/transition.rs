//! Transition evaluation: selecting the next node after one completes, plus the safe
//! boolean expression sub-language conditions are written in.
//!
//! Selection rule, in order:
//! 1. Any outgoing edge whose condition is the literal string `"True"` is always taken
//!    (first declared on a tie).
//! 2. Otherwise, each non-empty, non-`"True"` condition is evaluated in declaration
//!    order against shared state; the first truthy one is taken.
//! 3. Otherwise, the first default edge (empty condition) is taken, if any.
//! 4. Otherwise there is no transition — the workflow is `Completed`.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::shared::SharedState;

/// Selects the next node from `from_id`'s outgoing edges, or `None` if the workflow
/// should terminate.
pub fn evaluate_transition(
    graph: &Graph,
    from_id: &str,
    shared: &SharedState,
) -> Result<Option<String>> {
    let outgoing: Vec<_> = graph.outgoing(from_id).collect();

    if let Some(edge) = outgoing.iter().find(|e| e.is_always()) {
        return Ok(Some(edge.to_id.clone()));
    }

    for edge in outgoing.iter().filter(|e| !e.is_always() && !e.is_default()) {
        let truthy = expr::eval(&edge.condition, shared.as_map()).map_err(|error| {
            GraphError::ConditionError {
                from: edge.from_id.clone(),
                to: edge.to_id.clone(),
                error,
            }
        })?;
        if truthy {
            return Ok(Some(edge.to_id.clone()));
        }
    }

    if let Some(edge) = outgoing.iter().find(|e| e.is_default()) {
        return Ok(Some(edge.to_id.clone()));
    }

    Ok(None)
}

/// A minimal, total boolean expression language over shared state.
///
/// Deliberately not a general-purpose language: no function calls, no host-language
/// `eval`, no loops. Grammar (lowest to highest precedence):
///
/// ```text
/// or_expr    := and_expr ( "||" and_expr )*
/// and_expr   := unary ( "&&" unary )*
/// unary      := "!" unary | comparison
/// comparison := primary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") primary )?
/// primary    := number | string | "true" | "false"
///             | "shared" "[" string "]"
///             | identifier                      -- shorthand for shared[identifier]
///             | "(" or_expr ")"
/// ```
pub mod expr {
    use serde_json::{Map, Value};

    /// Evaluates `source` against `shared`, returning its truthiness.
    ///
    /// An empty `source` is never passed here (callers special-case the default edge);
    /// this function always expects a non-empty expression.
    pub fn eval(source: &str, shared: &Map<String, Value>) -> Result<bool, String> {
        let tokens = lex(source)?;
        let mut parser = Parser { tokens, pos: 0, shared };
        let value = parser.parse_or()?;
        parser.expect_end()?;
        Ok(truthy(&value))
    }

    fn truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Token {
        Number(f64),
        Str(String),
        Ident(String),
        Op(&'static str),
        LParen,
        RParen,
        LBracket,
        RBracket,
    }

    fn lex(source: &str) -> Result<Vec<Token>, String> {
        let chars: Vec<char> = source.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            match c {
                '(' => {
                    tokens.push(Token::LParen);
                    i += 1;
                }
                ')' => {
                    tokens.push(Token::RParen);
                    i += 1;
                }
                '[' => {
                    tokens.push(Token::LBracket);
                    i += 1;
                }
                ']' => {
                    tokens.push(Token::RBracket);
                    i += 1;
                }
                '\'' | '"' => {
                    let quote = c;
                    let mut s = String::new();
                    i += 1;
                    let mut closed = false;
                    while i < chars.len() {
                        if chars[i] == quote {
                            closed = true;
                            i += 1;
                            break;
                        }
                        s.push(chars[i]);
                        i += 1;
                    }
                    if !closed {
                        return Err(format!("unterminated string literal in '{source}'"));
                    }
                    tokens.push(Token::Str(s));
                }
                '=' if chars.get(i + 1) == Some(&'=') => {
                    tokens.push(Token::Op("=="));
                    i += 2;
                }
                '!' if chars.get(i + 1) == Some(&'=') => {
                    tokens.push(Token::Op("!="));
                    i += 2;
                }
                '!' => {
                    tokens.push(Token::Op("!"));
                    i += 1;
                }
                '<' if chars.get(i + 1) == Some(&'=') => {
                    tokens.push(Token::Op("<="));
                    i += 2;
                }
                '<' => {
                    tokens.push(Token::Op("<"));
                    i += 1;
                }
                '>' if chars.get(i + 1) == Some(&'=') => {
                    tokens.push(Token::Op(">="));
                    i += 2;
                }
                '>' => {
                    tokens.push(Token::Op(">"));
                    i += 1;
                }
                '&' if chars.get(i + 1) == Some(&'&') => {
                    tokens.push(Token::Op("&&"));
                    i += 2;
                }
                '|' if chars.get(i + 1) == Some(&'|') => {
                    tokens.push(Token::Op("||"));
                    i += 2;
                }
                c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                    let start = i;
                    i += 1;
                    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                        i += 1;
                    }
                    let text: String = chars[start..i].iter().collect();
                    let n = text
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number '{text}' in '{source}'"))?;
                    tokens.push(Token::Number(n));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = i;
                    i += 1;
                    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                        i += 1;
                    }
                    let text: String = chars[start..i].iter().collect();
                    tokens.push(Token::Ident(text));
                }
                other => {
                    return Err(format!("unexpected character '{other}' in '{source}'"));
                }
            }
        }
        Ok(tokens)
    }

    struct Parser<'a> {
        tokens: Vec<Token>,
        pos: usize,
        shared: &'a Map<String, Value>,
    }

    impl<'a> Parser<'a> {
        fn peek(&self) -> Option<&Token> {
            self.tokens.get(self.pos)
        }

        fn advance(&mut self) -> Option<Token> {
            let t = self.tokens.get(self.pos).cloned();
            self.pos += 1;
            t
        }

        fn expect_end(&self) -> Result<(), String> {
            if self.pos == self.tokens.len() {
                Ok(())
            } else {
                Err(format!("unexpected trailing tokens at position {}", self.pos))
            }
        }

        fn parse_or(&mut self) -> Result<Value, String> {
            let mut left = self.parse_and()?;
            while matches!(self.peek(), Some(Token::Op("||"))) {
                self.advance();
                let right = self.parse_and()?;
                left = Value::Bool(truthy(&left) || truthy(&right));
            }
            Ok(left)
        }

        fn parse_and(&mut self) -> Result<Value, String> {
            let mut left = self.parse_unary()?;
            while matches!(self.peek(), Some(Token::Op("&&"))) {
                self.advance();
                let right = self.parse_unary()?;
                left = Value::Bool(truthy(&left) && truthy(&right));
            }
            Ok(left)
        }

        fn parse_unary(&mut self) -> Result<Value, String> {
            if matches!(self.peek(), Some(Token::Op("!"))) {
                self.advance();
                let value = self.parse_unary()?;
                return Ok(Value::Bool(!truthy(&value)));
            }
            self.parse_comparison()
        }

        fn parse_comparison(&mut self) -> Result<Value, String> {
            let left = self.parse_primary()?;
            let op = match self.peek() {
                Some(Token::Op(op @ ("==" | "!=" | "<" | "<=" | ">" | ">="))) => *op,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_primary()?;
            compare(op, &left, &right)
        }

        fn parse_primary(&mut self) -> Result<Value, String> {
            match self.advance() {
                Some(Token::Number(n)) => Ok(Value::from(n)),
                Some(Token::Str(s)) => Ok(Value::String(s)),
                Some(Token::LParen) => {
                    let value = self.parse_or()?;
                    match self.advance() {
                        Some(Token::RParen) => Ok(value),
                        _ => Err("expected ')'".to_string()),
                    }
                }
                Some(Token::Ident(name)) if name == "true" => Ok(Value::Bool(true)),
                Some(Token::Ident(name)) if name == "false" => Ok(Value::Bool(false)),
                Some(Token::Ident(name)) if name == "shared" => {
                    match self.advance() {
                        Some(Token::LBracket) => {}
                        _ => return Err("expected '[' after 'shared'".to_string()),
                    }
                    let key = match self.advance() {
                        Some(Token::Str(s)) => s,
                        _ => return Err("expected string key inside shared[...]".to_string()),
                    };
                    match self.advance() {
                        Some(Token::RBracket) => {}
                        _ => return Err("expected ']'".to_string()),
                    }
                    Ok(self.shared.get(&key).cloned().unwrap_or(Value::Null))
                }
                Some(Token::Ident(name)) => {
                    Ok(self.shared.get(&name).cloned().unwrap_or(Value::Null))
                }
                Some(other) => Err(format!("unexpected token {other:?}")),
                None => Err("unexpected end of expression".to_string()),
            }
        }
    }

    fn compare(op: &str, left: &Value, right: &Value) -> Result<Value, String> {
        use std::cmp::Ordering;

        let ordering = numeric_ordering(left, right).or_else(|| string_ordering(left, right));

        let result = match op {
            "==" => values_equal(left, right),
            "!=" => !values_equal(left, right),
            _ => {
                let ord = ordering.ok_or_else(|| {
                    format!("cannot compare {left:?} and {right:?} with '{op}'")
                })?;
                match op {
                    "<" => ord == Ordering::Less,
                    "<=" => ord != Ordering::Greater,
                    ">" => ord == Ordering::Greater,
                    ">=" => ord != Ordering::Less,
                    _ => unreachable!("operator already matched in parse_comparison"),
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn values_equal(left: &Value, right: &Value) -> bool {
        left == right
            || numeric_ordering(left, right) == Some(std::cmp::Ordering::Equal)
    }

    fn numeric_ordering(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
        let l = left.as_f64()?;
        let r = right.as_f64()?;
        l.partial_cmp(&r)
    }

    fn string_ordering(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
        let l = left.as_str()?;
        let r = right.as_str()?;
        Some(l.cmp(r))
    }
}
