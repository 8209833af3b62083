//! Expression parser
//!
//! A hand-written tokenizer feeding a recursive-descent parser for a single
//! Python-style expression. Statements never parse: statement keywords are
//! reserved, `;` is not a token and `=` only appears inside keyword
//! arguments of a call.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use serde::{Deserialize, Serialize};

use crate::ast::{
    BinaryOp, BoolOp, CompareOp, ComprehensionKind, Expression, Generator, Index, Keyword, Literal,
    Target, TemplatePart, UnaryOp,
};
use crate::error::ParseError;

/// Keywords that only make sense in statements
const RESERVED_KEYWORDS: &[&str] = &[
    "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif", "except",
    "finally", "from", "global", "import", "nonlocal", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

/// Token types for the expression parser
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    FString(Vec<FStringChunk>),
    True,
    False,
    None,

    Name(String),

    // Keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    Lambda,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    LeftShift,
    RightShift,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Walrus,
    Assign,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
enum FStringChunk {
    Text(String),
    Field {
        source: String,
        offset: usize,
        conversion: Option<char>,
        format_spec: Option<String>,
    },
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Int(i) => return write!(f, "{i}"),
            Self::Float(v) => return write!(f, "{v}"),
            Self::Str(s) => return write!(f, "{s:?}"),
            Self::FString(_) => "f-string",
            Self::Name(name) => return write!(f, "{name}"),
            Self::True => "True",
            Self::False => "False",
            Self::None => "None",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::In => "in",
            Self::Is => "is",
            Self::If => "if",
            Self::Else => "else",
            Self::For => "for",
            Self::Lambda => "lambda",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::DoubleStar => "**",
            Self::Slash => "/",
            Self::DoubleSlash => "//",
            Self::Percent => "%",
            Self::Ampersand => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Walrus => ":=",
            Self::Assign => "=",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::LeftBrace => "{",
            Self::RightBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Tokenizer for breaking input into tokens
struct Tokenizer<'a> {
    input: &'a str,
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Returns the next token and the byte offset it starts at
    fn next_token(&mut self) -> Result<(Token, usize), ParseError> {
        self.skip_whitespace();
        let start = self.position;

        let Some(&ch) = self.chars.peek() else {
            return Ok((Token::Eof, start));
        };

        let token = match ch {
            '0'..='9' => self.read_number()?,
            '.' if self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) => {
                self.read_number()?
            }
            '\'' | '"' => self.read_string(false, false)?,
            c if c.is_alphabetic() || c == '_' => self.read_word()?,
            _ => self.read_operator()?,
        };
        Ok((token, start))
    }

    fn read_operator(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        let rest = self.rest();
        let (token, width) = if rest.starts_with("**") {
            (Token::DoubleStar, 2)
        } else if rest.starts_with("//") {
            (Token::DoubleSlash, 2)
        } else if rest.starts_with("<<") {
            (Token::LeftShift, 2)
        } else if rest.starts_with(">>") {
            (Token::RightShift, 2)
        } else if rest.starts_with("<=") {
            (Token::LessEqual, 2)
        } else if rest.starts_with(">=") {
            (Token::GreaterEqual, 2)
        } else if rest.starts_with("==") {
            (Token::Equal, 2)
        } else if rest.starts_with("!=") {
            (Token::NotEqual, 2)
        } else if rest.starts_with(":=") {
            (Token::Walrus, 2)
        } else {
            let single = match rest.chars().next() {
                Some('+') => Token::Plus,
                Some('-') => Token::Minus,
                Some('*') => Token::Star,
                Some('/') => Token::Slash,
                Some('%') => Token::Percent,
                Some('&') => Token::Ampersand,
                Some('|') => Token::Pipe,
                Some('^') => Token::Caret,
                Some('~') => Token::Tilde,
                Some('<') => Token::Less,
                Some('>') => Token::Greater,
                Some('(') => Token::LeftParen,
                Some(')') => Token::RightParen,
                Some('[') => Token::LeftBracket,
                Some(']') => Token::RightBracket,
                Some('{') => Token::LeftBrace,
                Some('}') => Token::RightBrace,
                Some(',') => Token::Comma,
                Some(':') => Token::Colon,
                Some('.') => Token::Dot,
                Some('=') => Token::Assign,
                Some(other) => {
                    return Err(ParseError::UnexpectedToken {
                        token: other.to_string(),
                        position: start,
                    });
                }
                None => return Err(ParseError::UnexpectedEof { position: start }),
            };
            (single, 1)
        };
        for _ in 0..width {
            self.advance();
        }
        Ok(token)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some(ch) = self.chars.next() {
            self.position += ch.len_utf8();
            Some(ch)
        } else {
            None
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(&ch) = self.chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) {
        while let Some(&ch) = self.chars.peek() {
            if !keep(ch) {
                break;
            }
            self.advance();
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        let invalid = |tokenizer: &Self| ParseError::InvalidNumber {
            value: tokenizer.input[start..tokenizer.position].to_string(),
            position: start,
        };

        let radix = match self.rest().get(..2).map(str::to_ascii_lowercase).as_deref() {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.advance();
            self.advance();
            let digits_start = self.position;
            self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            let digits = self.input[digits_start..self.position].replace('_', "");
            return i64::from_str_radix(&digits, radix)
                .map(Token::Int)
                .map_err(|_| invalid(self));
        }

        let mut is_float = false;
        self.take_while(|c| c.is_ascii_digit() || c == '_');
        if self.chars.peek() == Some(&'.') {
            is_float = true;
            self.advance();
            self.take_while(|c| c.is_ascii_digit() || c == '_');
        }
        let rest = self.rest();
        if rest.starts_with(['e', 'E']) {
            let exponent = rest[1..].trim_start_matches(['+', '-']);
            let signed = rest.len() - 1 - exponent.len();
            if signed <= 1 && exponent.starts_with(|c: char| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..=signed {
                    self.advance();
                }
                self.take_while(|c| c.is_ascii_digit() || c == '_');
            }
        }
        if self
            .chars
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
        {
            self.take_while(|c| c.is_alphanumeric() || c == '_');
            return Err(invalid(self));
        }

        let text = self.input[start..self.position].replace('_', "");
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| invalid(self))
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| invalid(self))
        }
    }

    fn read_word(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        self.take_while(|c| c.is_alphanumeric() || c == '_');
        let word = &self.input[start..self.position];

        if self.rest().starts_with(['\'', '"']) {
            let prefix = word.to_ascii_lowercase();
            if matches!(prefix.as_str(), "r" | "u" | "f" | "rf" | "fr") {
                return self.read_string(prefix.contains('r'), prefix.contains('f'));
            }
            if matches!(prefix.as_str(), "b" | "br" | "rb") {
                return Err(ParseError::InvalidString {
                    position: start,
                    reason: "bytes literals are not supported".to_string(),
                });
            }
        }

        let token = match word {
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "lambda" => Token::Lambda,
            reserved if RESERVED_KEYWORDS.contains(&reserved) => {
                return Err(ParseError::ReservedKeyword {
                    keyword: reserved.to_string(),
                    position: start,
                });
            }
            name => Token::Name(name.to_string()),
        };
        Ok(token)
    }

    fn read_string(&mut self, raw: bool, formatted: bool) -> Result<Token, ParseError> {
        let start = self.position;
        let quote_char = self.advance().unwrap_or('"');
        let doubled: String = [quote_char, quote_char].iter().collect();
        let triple = self.rest().starts_with(&doubled);
        if triple {
            self.advance();
            self.advance();
        }
        let closing: String = std::iter::repeat_n(quote_char, if triple { 3 } else { 1 }).collect();

        let unterminated = |position| ParseError::InvalidString {
            position,
            reason: "unterminated string literal".to_string(),
        };

        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            if self.rest().starts_with(&closing) {
                for _ in 0..closing.len() {
                    self.advance();
                }
                break;
            }
            let Some(ch) = self.advance() else {
                return Err(unterminated(start));
            };
            match ch {
                '\n' if !triple => return Err(unterminated(start)),
                '\\' if !raw => self.read_escape(&mut text, start)?,
                '\\' => {
                    text.push('\\');
                    if let Some(next) = self.advance() {
                        text.push(next);
                    }
                }
                '{' if formatted => {
                    if self.chars.peek() == Some(&'{') {
                        self.advance();
                        text.push('{');
                    } else {
                        if !text.is_empty() {
                            chunks.push(FStringChunk::Text(std::mem::take(&mut text)));
                        }
                        chunks.push(self.read_fstring_field(start)?);
                    }
                }
                '}' if formatted => {
                    if self.chars.peek() == Some(&'}') {
                        self.advance();
                        text.push('}');
                    } else {
                        return Err(ParseError::InvalidString {
                            position: self.position - 1,
                            reason: "single '}' is not allowed in f-string".to_string(),
                        });
                    }
                }
                other => text.push(other),
            }
        }

        if formatted {
            if !text.is_empty() {
                chunks.push(FStringChunk::Text(text));
            }
            Ok(Token::FString(chunks))
        } else {
            Ok(Token::Str(text))
        }
    }

    /// Scan `expr[!conversion][:format_spec]}` after an opening brace
    fn read_fstring_field(&mut self, string_start: usize) -> Result<FStringChunk, ParseError> {
        let offset = self.position;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut conversion = None;
        let mut format_spec = None;
        let mut source_end = None;

        loop {
            let Some(ch) = self.advance() else {
                return Err(ParseError::MissingDelimiter {
                    delimiter: '}',
                    position: string_start,
                });
            };
            if let Some(open) = quote {
                if ch == open {
                    quote = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' if depth > 0 => depth -= 1,
                '}' if depth > 0 => depth -= 1,
                '}' => {
                    source_end.get_or_insert(self.position - 1);
                    break;
                }
                '!' if depth == 0 && self.chars.peek() != Some(&'=') => {
                    source_end = Some(self.position - 1);
                    match self.advance() {
                        Some(c @ ('r' | 's' | 'a')) => conversion = Some(c),
                        _ => {
                            return Err(ParseError::InvalidString {
                                position: self.position,
                                reason: "f-string conversion must be 'r', 's' or 'a'".to_string(),
                            });
                        }
                    }
                    match self.chars.peek() {
                        Some(':') => {
                            self.advance();
                            format_spec = Some(self.read_format_spec(string_start)?);
                            break;
                        }
                        Some('}') => {
                            self.advance();
                            break;
                        }
                        _ => {
                            return Err(ParseError::MissingDelimiter {
                                delimiter: '}',
                                position: self.position,
                            });
                        }
                    }
                }
                ':' if depth == 0 && self.chars.peek() != Some(&'=') => {
                    source_end = Some(self.position - 1);
                    format_spec = Some(self.read_format_spec(string_start)?);
                    break;
                }
                _ => {}
            }
        }

        let end = source_end.unwrap_or(self.position);
        let source = self.input[offset..end].to_string();
        if source.trim().is_empty() {
            return Err(ParseError::InvalidString {
                position: offset,
                reason: "empty expression in f-string".to_string(),
            });
        }
        Ok(FStringChunk::Field {
            source,
            offset,
            conversion,
            format_spec,
        })
    }

    fn read_format_spec(&mut self, string_start: usize) -> Result<String, ParseError> {
        let spec_start = self.position;
        loop {
            match self.advance() {
                Some('}') => return Ok(self.input[spec_start..self.position - 1].to_string()),
                Some('{') => {
                    return Err(ParseError::InvalidString {
                        position: self.position - 1,
                        reason: "nested format specifications are not supported".to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    return Err(ParseError::MissingDelimiter {
                        delimiter: '}',
                        position: string_start,
                    });
                }
            }
        }
    }

    fn read_escape(&mut self, out: &mut String, string_start: usize) -> Result<(), ParseError> {
        let escape_start = self.position - 1;
        let Some(ch) = self.advance() else {
            return Err(ParseError::InvalidString {
                position: string_start,
                reason: "unterminated string literal".to_string(),
            });
        };
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\\' | '\'' | '"' => out.push(ch),
            '\n' => {}
            'x' | 'u' | 'U' => {
                let width = match ch {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| self.advance()).collect();
                let decoded = u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == width)
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        return Err(ParseError::InvalidString {
                            position: escape_start,
                            reason: format!("invalid \\{ch} escape"),
                        });
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }
}

/// Parser limits, configurable through [`crate::EngineConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserLimits {
    /// Maximum nesting depth of sub-expressions
    pub max_depth: usize,
    /// Maximum source length in bytes
    pub max_length: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_length: 10_000,
        }
    }
}

/// Expression parser
#[derive(Debug, Clone)]
pub struct Parser {
    max_depth: usize,
    max_length: usize,
}

impl Parser {
    /// Create a new parser with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::from_limits(ParserLimits::default())
    }

    /// Create a parser with custom limits
    #[must_use]
    pub fn with_limits(max_depth: usize, max_length: usize) -> Self {
        Self {
            max_depth,
            max_length,
        }
    }

    /// Create a parser from configured limits
    #[must_use]
    pub fn from_limits(limits: ParserLimits) -> Self {
        Self::with_limits(limits.max_depth, limits.max_length)
    }

    /// Parse an expression string
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] carrying the byte offset of the failure when
    /// the input is empty, too long, too deeply nested, not a single
    /// expression, or contains statement syntax.
    pub fn parse(&self, input: &str) -> Result<Expression, ParseError> {
        if input.len() > self.max_length {
            return Err(ParseError::TooLong {
                length: input.len(),
                max: self.max_length,
            });
        }
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut parser = ParserState::new(input, 0, self.max_depth)?;
        let expr = parser.parse_expression_list()?;
        parser.finish(expr)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal parser state
struct ParserState<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> ParserState<'a> {
    fn new(input: &'a str, depth: usize, max_depth: usize) -> Result<Self, ParseError> {
        let mut state = Self {
            tokenizer: Tokenizer::new(input),
            current: Token::Eof,
            position: 0,
            depth,
            max_depth,
        };
        state.advance()?;
        Ok(state)
    }

    fn finish(&self, expr: Expression) -> Result<Expression, ParseError> {
        if self.current == Token::Eof {
            Ok(expr)
        } else {
            Err(ParseError::TrailingInput {
                input: self.tokenizer.input[self.position..].to_string(),
                position: self.position,
            })
        }
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let (token, position) = self.tokenizer.next_token()?;
        self.current = token;
        self.position = position;
        Ok(())
    }

    /// Take the current token and move to the next one
    fn bump(&mut self) -> Result<Token, ParseError> {
        let token = std::mem::replace(&mut self.current, Token::Eof);
        self.advance()?;
        Ok(token)
    }

    fn unexpected(&self) -> ParseError {
        match self.current {
            Token::Eof => ParseError::UnexpectedEof {
                position: self.position,
            },
            ref token => ParseError::UnexpectedToken {
                token: token.to_string(),
                position: self.position,
            },
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if &self.current == expected {
            return self.advance();
        }
        Err(self.unexpected())
    }

    fn expect_closing(&mut self, expected: &Token, delimiter: char) -> Result<(), ParseError> {
        if &self.current == expected {
            return self.advance();
        }
        if self.current == Token::Eof {
            return Err(ParseError::MissingDelimiter {
                delimiter,
                position: self.position,
            });
        }
        Err(self.unexpected())
    }

    fn check_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::TooDeep {
                depth: self.depth,
                max: self.max_depth,
                position: self.position,
            });
        }
        Ok(())
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.check_depth()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Whether the current token can only close or separate an expression
    fn at_expression_end(&self) -> bool {
        matches!(
            self.current,
            Token::Eof
                | Token::RightParen
                | Token::RightBracket
                | Token::RightBrace
                | Token::Colon
                | Token::In
        )
    }

    /// `a, b, c` becomes a tuple; a single expression is returned as is
    fn parse_expression_list(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_expression()?;
        if self.current != Token::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.current == Token::Comma {
            self.advance()?;
            if self.at_expression_end() {
                break;
            }
            items.push(self.parse_expression()?);
        }
        Ok(Expression::Tuple(items))
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.nested(|parser| {
            if parser.current == Token::Lambda {
                parser.parse_lambda()
            } else {
                parser.parse_named()
            }
        })
    }

    fn parse_lambda(&mut self) -> Result<Expression, ParseError> {
        self.advance()?;
        let mut params = Vec::new();
        while let Token::Name(name) = &self.current {
            params.push(name.clone());
            self.advance()?;
            if self.current != Token::Comma {
                break;
            }
            self.advance()?;
        }
        self.expect(&Token::Colon)?;
        let body = self.parse_expression()?;
        Ok(Expression::Lambda {
            params,
            body: Box::new(body),
        })
    }

    fn parse_named(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_conditional()?;
        if self.current != Token::Walrus {
            return Ok(expr);
        }
        let Expression::Name(target) = expr else {
            return Err(self.unexpected());
        };
        self.advance()?;
        let value = self.parse_expression()?;
        Ok(Expression::Assign {
            target,
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expression, ParseError> {
        let then_branch = self.parse_or()?;
        if self.current != Token::If {
            return Ok(then_branch);
        }
        self.advance()?;
        let condition = self.parse_or()?;
        self.expect(&Token::Else)?;
        let else_branch = self.parse_expression()?;
        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_bool(
        &mut self,
        keyword: &Token,
        op: BoolOp,
        operand: fn(&mut Self) -> Result<Expression, ParseError>,
    ) -> Result<Expression, ParseError> {
        let first = operand(self)?;
        if &self.current != keyword {
            return Ok(first);
        }
        let mut values = vec![first];
        while &self.current == keyword {
            self.advance()?;
            values.push(operand(self)?);
        }
        Ok(Expression::Bool { op, values })
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        self.parse_bool(&Token::Or, BoolOp::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        self.parse_bool(&Token::And, BoolOp::And, Self::parse_not)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.current != Token::Not {
            return self.parse_comparison();
        }
        self.advance()?;
        let operand = self.nested(Self::parse_not)?;
        Ok(Expression::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    fn comparison_operator(&mut self) -> Result<Option<CompareOp>, ParseError> {
        let op = match self.current {
            Token::Equal => CompareOp::Equal,
            Token::NotEqual => CompareOp::NotEqual,
            Token::Less => CompareOp::Less,
            Token::LessEqual => CompareOp::LessOrEqual,
            Token::Greater => CompareOp::Greater,
            Token::GreaterEqual => CompareOp::GreaterOrEqual,
            Token::In => CompareOp::In,
            Token::Not => {
                self.advance()?;
                if self.current != Token::In {
                    return Err(self.unexpected());
                }
                CompareOp::NotIn
            }
            Token::Is => {
                self.advance()?;
                if self.current == Token::Not {
                    CompareOp::IsNot
                } else {
                    return Ok(Some(CompareOp::Is));
                }
            }
            _ => return Ok(None),
        };
        self.advance()?;
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_bit_or()?;
        let mut comparisons = Vec::new();
        while let Some(op) = self.comparison_operator()? {
            comparisons.push((op, self.parse_bit_or()?));
        }
        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expression::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn parse_left_assoc(
        &mut self,
        operand: fn(&mut Self) -> Result<Expression, ParseError>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expression, ParseError> {
        let base = self.depth;
        let mut left = operand(self)?;
        while let Some(op) = operator(&self.current) {
            // each link nests the tree built so far one level deeper
            self.check_depth()?;
            self.advance()?;
            let right = operand(self)?;
            left = Expression::binary(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expression, ParseError> {
        self.parse_left_assoc(Self::parse_bit_xor, |token| {
            (*token == Token::Pipe).then_some(BinaryOp::BitOr)
        })
    }

    fn parse_bit_xor(&mut self) -> Result<Expression, ParseError> {
        self.parse_left_assoc(Self::parse_bit_and, |token| {
            (*token == Token::Caret).then_some(BinaryOp::BitXor)
        })
    }

    fn parse_bit_and(&mut self) -> Result<Expression, ParseError> {
        self.parse_left_assoc(Self::parse_shift, |token| {
            (*token == Token::Ampersand).then_some(BinaryOp::BitAnd)
        })
    }

    fn parse_shift(&mut self) -> Result<Expression, ParseError> {
        self.parse_left_assoc(Self::parse_arith, |token| match token {
            Token::LeftShift => Some(BinaryOp::LeftShift),
            Token::RightShift => Some(BinaryOp::RightShift),
            _ => None,
        })
    }

    fn parse_arith(&mut self) -> Result<Expression, ParseError> {
        self.parse_left_assoc(Self::parse_term, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        self.parse_left_assoc(Self::parse_factor, |token| match token {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            Token::DoubleSlash => Some(BinaryOp::FloorDivide),
            Token::Percent => Some(BinaryOp::Modulo),
            _ => None,
        })
    }

    fn parse_factor(&mut self) -> Result<Expression, ParseError> {
        let op = match self.current {
            Token::Minus => UnaryOp::Negate,
            Token::Plus => UnaryOp::Plus,
            Token::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance()?;
        let operand = self.nested(Self::parse_factor)?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expression, ParseError> {
        let base = self.parse_postfix()?;
        if self.current != Token::DoubleStar {
            return Ok(base);
        }
        self.advance()?;
        let exponent = self.nested(Self::parse_factor)?;
        Ok(Expression::binary(BinaryOp::Power, base, exponent))
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let base = self.depth;
        let mut expr = self.parse_atom()?;
        loop {
            if matches!(self.current, Token::LeftParen | Token::LeftBracket | Token::Dot) {
                self.check_depth()?;
            }
            match self.current {
                Token::LeftParen => {
                    self.advance()?;
                    let (args, keywords) = self.parse_call_args()?;
                    expr = Expression::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    };
                }
                Token::LeftBracket => {
                    self.advance()?;
                    let index = self.parse_subscript()?;
                    expr = Expression::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::Dot => {
                    self.advance()?;
                    let Token::Name(attr) = self.bump()? else {
                        return Err(ParseError::UnexpectedToken {
                            token: "attribute name".to_string(),
                            position: self.position,
                        });
                    };
                    expr = Expression::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    /// Positional arguments, then `name=value` keyword arguments
    fn parse_call_args(&mut self) -> Result<(Vec<Expression>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while self.current != Token::RightParen {
            let start = self.position;
            let arg = self.parse_expression()?;
            if self.current == Token::Assign {
                let Expression::Name(name) = arg else {
                    return Err(self.unexpected());
                };
                if keywords.iter().any(|keyword| keyword.name == name) {
                    return Err(ParseError::InvalidArguments {
                        position: start,
                        reason: format!("keyword argument '{name}' repeated"),
                    });
                }
                self.advance()?;
                let value = self.parse_expression()?;
                keywords.push(Keyword { name, value });
            } else if !keywords.is_empty() {
                return Err(ParseError::InvalidArguments {
                    position: start,
                    reason: "positional argument follows keyword argument".to_string(),
                });
            } else if self.current == Token::For && args.is_empty() {
                let generators = self.parse_generators()?;
                args.push(Expression::Comprehension {
                    kind: ComprehensionKind::Generator,
                    element: Box::new(arg),
                    generators,
                });
                break;
            } else {
                args.push(arg);
            }
            if self.current != Token::Comma {
                break;
            }
            self.advance()?;
        }
        self.expect_closing(&Token::RightParen, ')')?;
        Ok((args, keywords))
    }

    fn parse_subscript(&mut self) -> Result<Index, ParseError> {
        let lower = if self.current == Token::Colon {
            None
        } else {
            let first = self.parse_expression_list()?;
            if self.current != Token::Colon {
                self.expect_closing(&Token::RightBracket, ']')?;
                return Ok(Index::Single(first));
            }
            Some(first)
        };
        self.advance()?;
        let upper = if matches!(self.current, Token::Colon | Token::RightBracket) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let step = if self.current == Token::Colon {
            self.advance()?;
            if self.current == Token::RightBracket {
                None
            } else {
                Some(self.parse_expression()?)
            }
        } else {
            None
        };
        self.expect_closing(&Token::RightBracket, ']')?;
        Ok(Index::Slice { lower, upper, step })
    }

    fn parse_generators(&mut self) -> Result<Vec<Generator>, ParseError> {
        let mut generators = Vec::new();
        while self.current == Token::For {
            self.advance()?;
            let target = self.parse_target_list()?;
            self.expect(&Token::In)?;
            let iter = self.nested(Self::parse_or)?;
            let mut conditions = Vec::new();
            while self.current == Token::If {
                self.advance()?;
                conditions.push(self.nested(Self::parse_or)?);
            }
            generators.push(Generator {
                target,
                iter,
                conditions,
            });
        }
        Ok(generators)
    }

    fn parse_target_list(&mut self) -> Result<Target, ParseError> {
        let first = self.parse_target()?;
        if self.current != Token::Comma {
            return Ok(first);
        }
        let mut targets = vec![first];
        while self.current == Token::Comma {
            self.advance()?;
            if self.at_expression_end() {
                break;
            }
            targets.push(self.parse_target()?);
        }
        Ok(Target::Tuple(targets))
    }

    fn parse_target(&mut self) -> Result<Target, ParseError> {
        match self.current {
            Token::Name(_) => {
                let Token::Name(name) = self.bump()? else {
                    return Err(self.unexpected());
                };
                Ok(Target::Name(name))
            }
            Token::LeftParen => {
                self.advance()?;
                let target = self.nested(Self::parse_target_list)?;
                self.expect_closing(&Token::RightParen, ')')?;
                Ok(target)
            }
            Token::LeftBracket => {
                self.advance()?;
                let target = match self.nested(Self::parse_target_list)? {
                    tuple @ Target::Tuple(_) => tuple,
                    single => Target::Tuple(vec![single]),
                };
                self.expect_closing(&Token::RightBracket, ']')?;
                Ok(target)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_atom(&mut self) -> Result<Expression, ParseError> {
        match self.current {
            Token::Int(_) | Token::Float(_) | Token::True | Token::False | Token::None => {
                let literal = match self.bump()? {
                    Token::Int(i) => Literal::Int(i),
                    Token::Float(f) => Literal::Float(f),
                    Token::True => Literal::Bool(true),
                    Token::False => Literal::Bool(false),
                    _ => Literal::None,
                };
                Ok(Expression::Literal(literal))
            }
            Token::Str(_) | Token::FString(_) => self.parse_strings(),
            Token::Name(_) => match self.bump()? {
                Token::Name(name) => Ok(Expression::Name(name)),
                _ => Err(self.unexpected()),
            },
            Token::LeftParen => {
                self.advance()?;
                self.parse_parenthesized()
            }
            Token::LeftBracket => {
                self.advance()?;
                self.parse_list()
            }
            Token::LeftBrace => {
                self.advance()?;
                self.parse_braced()
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Adjacent string literals concatenate; any f-string makes the result a template
    fn parse_strings(&mut self) -> Result<Expression, ParseError> {
        let mut parts: Vec<TemplatePart> = Vec::new();
        let mut formatted = false;

        loop {
            let chunks = match self.current {
                Token::Str(_) => match self.bump()? {
                    Token::Str(text) => vec![FStringChunk::Text(text)],
                    _ => Vec::new(),
                },
                Token::FString(_) => {
                    formatted = true;
                    match self.bump()? {
                        Token::FString(chunks) => chunks,
                        _ => Vec::new(),
                    }
                }
                _ => break,
            };
            for chunk in chunks {
                match chunk {
                    FStringChunk::Text(text) => match parts.last_mut() {
                        Some(TemplatePart::Literal(previous)) => previous.push_str(&text),
                        _ => parts.push(TemplatePart::Literal(text)),
                    },
                    FStringChunk::Field {
                        source,
                        offset,
                        conversion,
                        format_spec,
                    } => parts.push(TemplatePart::Field {
                        expr: self.parse_fragment(&source, offset)?,
                        conversion,
                        format_spec,
                    }),
                }
            }
        }

        if formatted {
            return Ok(Expression::Template(parts));
        }
        let text = match parts.pop() {
            Some(TemplatePart::Literal(text)) => text,
            _ => String::new(),
        };
        Ok(Expression::string(text))
    }

    /// Parse an f-string field on its own, reporting positions in the enclosing input
    fn parse_fragment(&self, source: &str, offset: usize) -> Result<Expression, ParseError> {
        let parse = || {
            let mut state = ParserState::new(source, self.depth, self.max_depth)?;
            let expr = state.parse_expression_list()?;
            state.finish(expr)
        };
        parse().map_err(|err| err.shifted(offset))
    }

    fn parse_parenthesized(&mut self) -> Result<Expression, ParseError> {
        if self.current == Token::RightParen {
            self.advance()?;
            return Ok(Expression::Tuple(Vec::new()));
        }
        let first = self.parse_expression()?;
        let expr = match self.current {
            Token::For => Expression::Comprehension {
                kind: ComprehensionKind::Generator,
                element: Box::new(first),
                generators: self.parse_generators()?,
            },
            Token::Comma => Expression::Tuple(self.parse_sequence_tail(first, &Token::RightParen)?),
            _ => first,
        };
        self.expect_closing(&Token::RightParen, ')')?;
        Ok(expr)
    }

    fn parse_list(&mut self) -> Result<Expression, ParseError> {
        if self.current == Token::RightBracket {
            self.advance()?;
            return Ok(Expression::List(Vec::new()));
        }
        let first = self.parse_expression()?;
        let expr = if self.current == Token::For {
            Expression::Comprehension {
                kind: ComprehensionKind::List,
                element: Box::new(first),
                generators: self.parse_generators()?,
            }
        } else {
            Expression::List(self.parse_sequence_tail(first, &Token::RightBracket)?)
        };
        self.expect_closing(&Token::RightBracket, ']')?;
        Ok(expr)
    }

    fn parse_braced(&mut self) -> Result<Expression, ParseError> {
        if self.current == Token::RightBrace {
            self.advance()?;
            return Ok(Expression::Dict(Vec::new()));
        }
        let first = self.parse_expression()?;
        let expr = if self.current == Token::Colon {
            self.advance()?;
            let value = self.parse_expression()?;
            if self.current == Token::For {
                Expression::DictComprehension {
                    key: Box::new(first),
                    value: Box::new(value),
                    generators: self.parse_generators()?,
                }
            } else {
                let mut entries = vec![(first, value)];
                while self.current == Token::Comma {
                    self.advance()?;
                    if self.current == Token::RightBrace {
                        break;
                    }
                    let key = self.parse_expression()?;
                    self.expect(&Token::Colon)?;
                    entries.push((key, self.parse_expression()?));
                }
                Expression::Dict(entries)
            }
        } else if self.current == Token::For {
            Expression::Comprehension {
                kind: ComprehensionKind::Set,
                element: Box::new(first),
                generators: self.parse_generators()?,
            }
        } else {
            Expression::Set(self.parse_sequence_tail(first, &Token::RightBrace)?)
        };
        self.expect_closing(&Token::RightBrace, '}')?;
        Ok(expr)
    }

    /// Remaining comma-separated items after `first`, trailing comma allowed
    fn parse_sequence_tail(
        &mut self,
        first: Expression,
        closing: &Token,
    ) -> Result<Vec<Expression>, ParseError> {
        let mut items = vec![first];
        while self.current == Token::Comma {
            self.advance()?;
            if &self.current == closing {
                break;
            }
            items.push(self.parse_expression()?);
        }
        Ok(items)
    }
}
