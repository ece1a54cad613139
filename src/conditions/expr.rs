//! sandboxed boolean expressions for `custom_js` conditions
//!
//! stored scripts are never executed. their source is parsed as a small
//! expression language over named context fields:
//!
//! ```text
//! device == "mobile" && !is_logged_in
//! context.url.startsWith('/blog') || referrer contains "google"
//! return context.language === 'de';
//! ```
//!
//! grammar (lowest precedence first):
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := postfix ( ( "==" | "!=" | "===" | "!==" | contains | starts_with | ends_with ) postfix )?
//! postfix := primary ( "." method "(" expr ")" )*
//! primary := string | true | false | field | "(" expr ")"
//! ```
//!
//! every parenthesis, `!`, chained `||` / `&&` operand and chained method
//! call counts as one nesting level against [`ExprLimits::max_depth`], so
//! the compiled tree is never taller than the budget allows.

use std::fmt;

use thiserror::Error;

use crate::context::Context;

/// default maximum source length in characters
pub const DEFAULT_MAX_LEN: usize = 1024;

/// default maximum nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// hard ceiling on the nesting depth, whatever the configured limit
pub const MAX_DEPTH_LIMIT: usize = 256;

/// resource limits applied when compiling an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprLimits {
    pub max_len: usize,
    pub max_depth: usize,
}

impl Default for ExprLimits {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// error compiling an expression; offsets are character positions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("expression is {len} characters long (limit {limit})")]
    TooLong { len: usize, limit: usize },
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("unexpected character '{ch}' at {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string starting at {offset}")]
    UnterminatedString { offset: usize },
    #[error("unexpected {found} at {offset}")]
    UnexpectedToken { found: String, offset: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown field '{name}' at {offset}")]
    UnknownField { name: String, offset: usize },
    #[error("unknown method '{name}' at {offset}")]
    UnknownMethod { name: String, offset: usize },
}

/// context fields an expression can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Url,
    Device,
    Browser,
    Language,
    Referrer,
    CurrentTime,
    UserAgent,
    IsLoggedIn,
    IsEditorMode,
}

impl Field {
    /// resolve a field name, accepting `context.` prefixes and camelCase spellings
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.strip_prefix("context.").unwrap_or(name);
        match name {
            "url" => Some(Field::Url),
            "device" => Some(Field::Device),
            "browser" => Some(Field::Browser),
            "language" => Some(Field::Language),
            "referrer" => Some(Field::Referrer),
            "current_time" | "currentTime" => Some(Field::CurrentTime),
            "user_agent" | "userAgent" => Some(Field::UserAgent),
            "is_logged_in" | "isLoggedIn" => Some(Field::IsLoggedIn),
            "is_editor_mode" | "isEditorMode" | "isElementorEditMode" => {
                Some(Field::IsEditorMode)
            }
            _ => None,
        }
    }

    fn read(&self, ctx: &Context) -> Value {
        match self {
            Field::Url => Value::Str(ctx.url.clone()),
            Field::Device => Value::Str(ctx.device.as_str().to_string()),
            Field::Browser => Value::Str(ctx.browser.as_str().to_string()),
            Field::Language => Value::Str(ctx.language.clone()),
            Field::Referrer => Value::Str(ctx.referrer.clone()),
            Field::CurrentTime => Value::Str(ctx.current_time.clone()),
            Field::UserAgent => Value::Str(ctx.user_agent.clone()),
            Field::IsLoggedIn => Value::Bool(ctx.is_logged_in),
            Field::IsEditorMode => Value::Bool(ctx.is_editor_mode),
        }
    }
}

/// runtime value of a sub-expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
}

impl Value {
    /// booleans as-is, strings when non-empty
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

/// binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Contains,
    StartsWith,
    EndsWith,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::Ne => write!(f, "!="),
            BinaryOp::Contains => write!(f, "contains"),
            BinaryOp::StartsWith => write!(f, "starts_with"),
            BinaryOp::EndsWith => write!(f, "ends_with"),
        }
    }
}

/// a compiled expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    Field(Field),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// evaluate against a context, coercing the result to a boolean
    pub fn matches(&self, ctx: &Context) -> bool {
        self.eval(ctx).is_truthy()
    }

    fn eval(&self, ctx: &Context) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Field(field) => field.read(ctx),
            Expr::Not(inner) => Value::Bool(!inner.matches(ctx)),
            Expr::And(lhs, rhs) => Value::Bool(lhs.matches(ctx) && rhs.matches(ctx)),
            Expr::Or(lhs, rhs) => Value::Bool(lhs.matches(ctx) || rhs.matches(ctx)),
            Expr::Binary(op, lhs, rhs) => {
                Value::Bool(apply_binary(*op, &lhs.eval(ctx), &rhs.eval(ctx)))
            }
        }
    }
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        BinaryOp::Eq => lhs == rhs,
        BinaryOp::Ne => lhs != rhs,
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => {
            // string predicates on non-strings never match
            let (Value::Str(haystack), Value::Str(needle)) = (lhs, rhs) else {
                return false;
            };
            match op {
                BinaryOp::Contains => haystack.contains(needle.as_str()),
                BinaryOp::StartsWith => haystack.starts_with(needle.as_str()),
                _ => haystack.ends_with(needle.as_str()),
            }
        }
    }
}

/// compile expression source within the given limits
pub fn compile(source: &str, limits: &ExprLimits) -> Result<Expr, ExprError> {
    let len = source.chars().count();
    if len > limits.max_len {
        return Err(ExprError::TooLong {
            len,
            limit: limits.max_len,
        });
    }

    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth: limits.max_depth.min(MAX_DEPTH_LIMIT),
    };
    parser.parse_program()
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Dot,
    LParen,
    RParen,
    Not,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Semi,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Ident(name) => write!(f, "'{}'", name),
            Tok::Str(s) => write!(f, "string \"{}\"", s),
            Tok::Dot => write!(f, "'.'"),
            Tok::LParen => write!(f, "'('"),
            Tok::RParen => write!(f, "')'"),
            Tok::Not => write!(f, "'!'"),
            Tok::AndAnd => write!(f, "'&&'"),
            Tok::OrOr => write!(f, "'||'"),
            Tok::EqEq => write!(f, "'=='"),
            Tok::NotEq => write!(f, "'!='"),
            Tok::Semi => write!(f, "';'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let tok = match c {
            '(' => {
                i += 1;
                Tok::LParen
            }
            ')' => {
                i += 1;
                Tok::RParen
            }
            '.' => {
                i += 1;
                Tok::Dot
            }
            ';' => {
                i += 1;
                Tok::Semi
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                i += 2;
                Tok::AndAnd
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                i += 2;
                Tok::OrOr
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                // "==" or "==="
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                Tok::EqEq
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                // "!=" or "!=="
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                Tok::NotEq
            }
            '!' => {
                i += 1;
                Tok::Not
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ExprError::UnterminatedString { offset: start }),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some(escaped) => value.push(*escaped),
                                None => {
                                    return Err(ExprError::UnterminatedString { offset: start })
                                }
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                Tok::Str(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                Tok::Ident(chars[start..i].iter().collect())
            }
            other => {
                return Err(ExprError::UnexpectedChar {
                    ch: other,
                    offset: start,
                })
            }
        };

        tokens.push(Token { tok, offset: start });
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + ahead).map(|t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.offset).unwrap_or(0)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some(t) => ExprError::UnexpectedToken {
                found: t.tok.to_string(),
                offset: t.offset,
            },
            None => ExprError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Tok) -> Result<(), ExprError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            Err(ExprError::TooDeep {
                limit: self.max_depth,
            })
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// optional `return`, one expression, optional trailing `;`
    fn parse_program(&mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }

        if matches!(self.peek(), Some(Tok::Ident(kw)) if kw == "return") {
            self.pos += 1;
        }

        let expr = self.parse_or()?;

        while self.peek() == Some(&Tok::Semi) {
            self.pos += 1;
        }

        if self.peek().is_some() {
            return Err(self.unexpected());
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Tok::OrOr) {
            self.pos += 1;
            // each operand wraps the chain built so far
            self.enter()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Tok::AndAnd) {
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Tok::Not) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_postfix()?;

        let op = match self.peek() {
            Some(Tok::EqEq) => BinaryOp::Eq,
            Some(Tok::NotEq) => BinaryOp::Ne,
            Some(Tok::Ident(word)) => match word.as_str() {
                "contains" => BinaryOp::Contains,
                "starts_with" => BinaryOp::StartsWith,
                "ends_with" => BinaryOp::EndsWith,
                _ => return Err(self.unexpected()),
            },
            _ => return Ok(lhs),
        };
        self.pos += 1;

        let rhs = self.parse_postfix()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;

        // method calls: .includes(x) / .startsWith(x) / .endsWith(x)
        while self.peek() == Some(&Tok::Dot) {
            let offset = self.tokens[self.pos].offset;
            let Some(Tok::Ident(name)) = self.peek_at(1).cloned() else {
                self.pos += 1;
                return Err(self.unexpected());
            };
            let op = match name.as_str() {
                "includes" => BinaryOp::Contains,
                "startsWith" => BinaryOp::StartsWith,
                "endsWith" => BinaryOp::EndsWith,
                _ => return Err(ExprError::UnknownMethod { name, offset }),
            };
            self.pos += 2;

            self.expect(Tok::LParen)?;
            // the call nests its argument and wraps the receiver
            self.enter()?;
            let arg = self.parse_or()?;
            self.expect(Tok::RParen)?;

            expr = Expr::Binary(op, Box::new(expr), Box::new(arg));
        }

        self.depth = depth;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        let Some(token) = self.next() else {
            return Err(ExprError::UnexpectedEnd);
        };

        match token.tok {
            Tok::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Tok::LParen => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.leave();
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::Ident(word) if word == "true" => Ok(Expr::Literal(Value::Bool(true))),
            Tok::Ident(word) if word == "false" => Ok(Expr::Literal(Value::Bool(false))),
            Tok::Ident(first) => {
                // dotted path: context.device; stop before a method call
                let mut name = first;
                while self.peek() == Some(&Tok::Dot) && self.peek_at(2) != Some(&Tok::LParen) {
                    let Some(Tok::Ident(segment)) = self.peek_at(1).cloned() else {
                        break;
                    };
                    name.push('.');
                    name.push_str(&segment);
                    self.pos += 2;
                }
                Field::parse(&name)
                    .map(Expr::Field)
                    .ok_or(ExprError::UnknownField { name, offset })
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }
}
