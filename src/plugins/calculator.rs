//! Free-text arithmetic.
//!
//! Every text message is tried as an expression. Messages that are not
//! expressions, or are a bare number, are ignored without a reply.

use std::f64::consts::{E, PI};
use std::sync::Arc;

use thiserror::Error;

use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, MessageFilter, Route, handler};

/// Longer messages are not worth tokenizing.
const MAX_EXPRESSION_LEN: usize = 256;

const FUNCTIONS: &[(&str, usize)] = &[
    ("acos", 1),
    ("asin", 1),
    ("atan", 1),
    ("atan2", 2),
    ("ceil", 1),
    ("cos", 1),
    ("cosh", 1),
    ("degrees", 1),
    ("exp", 1),
    ("fabs", 1),
    ("floor", 1),
    ("fmod", 2),
    ("hypot", 2),
    ("ldexp", 2),
    ("log", 1),
    ("log10", 1),
    ("pow", 2),
    ("radians", 1),
    ("sin", 1),
    ("sinh", 1),
    ("sqrt", 1),
    ("tan", 1),
    ("tanh", 1),
];

const CONSTANTS: &[(&str, f64)] = &[("pi", PI), ("e", E)];

#[derive(Debug, Error, PartialEq)]
pub enum MathError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected {0}")]
    UnexpectedToken(String),

    #[error("unknown name {0:?}")]
    UnknownName(String),

    #[error("{name} takes {expected} arguments, {given} given")]
    Arity {
        name: String,
        expected: usize,
        given: usize,
    },

    #[error("division by zero")]
    ZeroDivision,

    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, MathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Scientific notation: 1e5, 2.5E-3
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse().map_err(|_| MathError::UnexpectedToken(text))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token::Name(name.to_lowercase()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Power);
                i += 2;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            _ => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Power,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => return Err(MathError::UnexpectedChar(other)),
                });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Binary operations and function calls seen.
    operations: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), MathError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(MathError::UnexpectedToken(format!("{token:?}"))),
            None => Err(MathError::UnexpectedEnd),
        }
    }

    fn expression(&mut self) -> Result<f64, MathError> {
        let mut value = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Token::Plus,
                Some(Token::Minus) => Token::Minus,
                _ => return Ok(value),
            };
            self.pos += 1;
            self.operations += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
    }

    fn term(&mut self) -> Result<f64, MathError> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(op @ (Token::Star | Token::Slash | Token::DoubleSlash | Token::Percent)) => op.clone(),
                _ => return Ok(value),
            };
            self.pos += 1;
            self.operations += 1;
            let rhs = self.unary()?;

            value = match op {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err(MathError::ZeroDivision),
                Token::Slash => value / rhs,
                Token::DoubleSlash => (value / rhs).floor(),
                // Result takes the sign of the divisor.
                _ => value - rhs * (value / rhs).floor(),
            };
        }
    }

    fn unary(&mut self) -> Result<f64, MathError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    /// Binds tighter than unary minus on its left, and is right associative.
    fn power(&mut self) -> Result<f64, MathError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            self.operations += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, MathError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    self.operations += 1;
                    call(&name, &args)
                } else {
                    CONSTANTS
                        .iter()
                        .find(|(constant, _)| *constant == name)
                        .map(|(_, value)| *value)
                        .ok_or(MathError::UnknownName(name))
                }
            }
            Some(token) => Err(MathError::UnexpectedToken(format!("{token:?}"))),
            None => Err(MathError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, MathError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(token) => return Err(MathError::UnexpectedToken(format!("{token:?}"))),
                None => return Err(MathError::UnexpectedEnd),
            }
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, MathError> {
    let Some(&(_, expected)) = FUNCTIONS.iter().find(|(function, _)| *function == name) else {
        return Err(MathError::UnknownName(name.to_string()));
    };
    // log also accepts a base
    let log_with_base = name == "log" && args.len() == 2;
    if args.len() != expected && !log_with_base {
        return Err(MathError::Arity {
            name: name.to_string(),
            expected,
            given: args.len(),
        });
    }

    let x = args[0];
    let value = match name {
        "acos" => x.acos(),
        "asin" => x.asin(),
        "atan" => x.atan(),
        "atan2" => x.atan2(args[1]),
        "ceil" => x.ceil(),
        "cos" => x.cos(),
        "cosh" => x.cosh(),
        "degrees" => x.to_degrees(),
        "exp" => x.exp(),
        "fabs" => x.abs(),
        "floor" => x.floor(),
        "fmod" if args[1] == 0.0 => return Err(MathError::ZeroDivision),
        "fmod" => x % args[1],
        "hypot" => x.hypot(args[1]),
        "ldexp" => x * 2f64.powf(args[1].trunc()),
        "log" if log_with_base => x.ln() / args[1].ln(),
        "log" => x.ln(),
        "log10" => x.log10(),
        "pow" => x.powf(args[1]),
        "radians" => x.to_radians(),
        "sin" => x.sin(),
        "sinh" => x.sinh(),
        "sqrt" => x.sqrt(),
        "tan" => x.tan(),
        "tanh" => x.tanh(),
        _ => return Err(MathError::UnknownName(name.to_string())),
    };
    Ok(value)
}

/// Evaluate an expression. `Ok(None)` for input without any operation.
pub fn evaluate(input: &str) -> Result<Option<f64>, MathError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        operations: 0,
    };
    if parser.tokens.is_empty() {
        return Err(MathError::UnexpectedEnd);
    }

    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(MathError::UnexpectedToken(format!("{token:?}")));
    }
    if parser.operations == 0 {
        return Ok(None);
    }
    if !value.is_finite() {
        return Err(MathError::NotFinite);
    }
    Ok(Some(value))
}

/// Integers without a fraction, everything else as the shortest float.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

pub struct Calculator;

impl Calculator {
    async fn calculate(&self, ctx: Context) -> HandlerResult {
        let Some(text) = ctx.message().and_then(|m| m.text()) else {
            return Ok(());
        };
        if text.len() > MAX_EXPRESSION_LEN {
            return Ok(());
        }

        if let Ok(Some(value)) = evaluate(text) {
            ctx.reply(format_number(value)).await?;
        }
        Ok(())
    }

    async fn maths(&self, ctx: Context) -> HandlerResult {
        let functions = FUNCTIONS
            .iter()
            .map(|(name, _)| format!("<code>{name}</code>"))
            .collect::<Vec<_>>()
            .join(", ");
        let constants = CONSTANTS
            .iter()
            .map(|(name, _)| format!("<code>{name}</code>"))
            .collect::<Vec<_>>()
            .join(", ");

        ctx.reply_html(format!(
            "Send me any arithmetic expression and I will solve it.\n\n\
             <b>Operators</b>\n<code>+ - * / // % **</code>\n\n\
             <b>Functions</b>\n{functions}\n\n\
             <b>Constants</b>\n{constants}"
        ))
        .await?;
        Ok(())
    }
}

impl CommandModule for Calculator {
    fn group(&self) -> &'static str {
        "Misc"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, calculate))
                .title("Calculator")
                .description("Send me any arithmetic expression, like 2 * (3 + 4)")
                .route(Route::message(MessageFilter::Text))
                .group(2),
            CommandDecl::new(handler!(self, maths))
                .description("List the functions and constants the calculator knows"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str) -> f64 {
        evaluate(input).unwrap().unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("(2 + 3) * 4"), 20.0);
        assert_eq!(eval("2 ** 3 ** 2"), 512.0);
        assert_eq!(eval("-2 ** 2"), -4.0);
        assert_eq!(eval("2 ^ 10"), 1024.0);
    }

    #[test]
    fn test_division_operators() {
        assert_eq!(eval("7 / 2"), 3.5);
        assert_eq!(eval("7 // 2"), 3.0);
        assert_eq!(eval("-7 // 2"), -4.0);
        assert_eq!(eval("-7 % 3"), 2.0);
        assert_eq!(evaluate("1 / 0"), Err(MathError::ZeroDivision));
        assert_eq!(evaluate("fmod(1, 0)"), Err(MathError::ZeroDivision));
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(eval("sqrt(16) + fabs(-2)"), 6.0);
        assert_eq!(eval("pow(2, 8)"), 256.0);
        assert_eq!(eval("hypot(3, 4)"), 5.0);
        assert_eq!(eval("ldexp(3, 2)"), 12.0);
        assert_eq!(eval("log(8, 2)").round(), 3.0);
        assert_eq!(eval("degrees(pi)"), 180.0);
        assert!((eval("e * 1") - E).abs() < 1e-12);
        assert!(matches!(evaluate("sqrt(1, 2)"), Err(MathError::Arity { .. })));
        assert_eq!(evaluate("foo(1)"), Err(MathError::UnknownName("foo".to_string())));
    }

    #[test]
    fn test_not_an_expression() {
        assert_eq!(evaluate("42"), Ok(None));
        assert_eq!(evaluate("-42"), Ok(None));
        assert_eq!(evaluate("pi"), Ok(None));
        assert!(evaluate("hello there").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 + 2)").is_err());
        assert_eq!(evaluate("sqrt(-1)"), Err(MathError::NotFinite));
        assert_eq!(evaluate("10 ** 400"), Err(MathError::NotFinite));
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(eval("1e3 + 1"), 1001.0);
        assert_eq!(eval("2.5E-1 * 4"), 1.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(14.0), "14");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }
}
