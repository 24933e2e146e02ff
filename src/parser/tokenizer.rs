// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizer for FHIRPath expressions
//!
//! A single forward pass over the input bytes producing zero-copy tokens.
//! Literal text is kept as slices; the parser validates and converts it.

use super::error::{ParseError, ParseResult};
use super::span::Spanned;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// A lexical token borrowing from the expression text
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    // Literals
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal as written (e.g., 3.14)
    Decimal(&'input str),
    /// String literal content between the quotes, escapes unresolved
    String(&'input str),
    /// Date literal without the leading `@` (e.g., 2023-01-01)
    Date(&'input str),
    /// DateTime literal without the leading `@` (e.g., 2023-01-01T12:00:00Z)
    DateTime(&'input str),
    /// Time literal without the leading `@T` (e.g., 12:00:00)
    Time(&'input str),

    // Names
    /// Plain identifier
    Identifier(&'input str),
    /// Backtick-delimited identifier content, escapes unresolved
    DelimitedIdentifier(&'input str),

    // Operators
    /// Addition operator (+)
    Plus,
    /// Subtraction operator (-)
    Minus,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/)
    Divide,
    /// Equality operator (=)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// Equivalence operator (~)
    Equivalent,
    /// Non-equivalence operator (!~)
    NotEquivalent,
    /// Union operator (|)
    Union,
    /// String concatenation operator (&)
    Ampersand,

    // Keywords
    /// Logical AND operator (and keyword)
    And,
    /// Logical OR operator (or keyword)
    Or,
    /// Logical XOR operator (xor keyword)
    Xor,
    /// Logical implication operator (implies keyword)
    Implies,
    /// Type test operator (is keyword)
    Is,
    /// Type filter operator (as keyword)
    As,
    /// Membership operator (in keyword)
    In,
    /// Containment operator (contains keyword)
    Contains,
    /// Integer division operator (div keyword)
    Div,
    /// Modulo operator (mod keyword)
    Mod,
    /// Boolean literal `true`
    True,
    /// Boolean literal `false`
    False,

    // Punctuation
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Left curly brace {
    LeftBrace,
    /// Right curly brace }
    RightBrace,
    /// Dot operator (.) for navigation and invocation
    Dot,
    /// Comma separator (,)
    Comma,
    /// External constant prefix (%)
    Percent,

    // Special variables
    /// The current item ($this)
    DollarThis,
    /// The current iteration index ($index)
    DollarIndex,
    /// The aggregate accumulator ($total)
    DollarTotal,
}

/// Keyword lookup table shared by the tokenizer and the AST printer
static KEYWORD_TABLE: Lazy<FxHashMap<&'static str, Token<'static>>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("and", Token::And);
    map.insert("or", Token::Or);
    map.insert("xor", Token::Xor);
    map.insert("implies", Token::Implies);
    map.insert("is", Token::Is);
    map.insert("as", Token::As);
    map.insert("in", Token::In);
    map.insert("contains", Token::Contains);
    map.insert("div", Token::Div);
    map.insert("mod", Token::Mod);
    map.insert("true", Token::True);
    map.insert("false", Token::False);
    map
});

/// True when `name` tokenizes as a keyword rather than an identifier
pub fn is_keyword(name: &str) -> bool {
    KEYWORD_TABLE.contains_key(name)
}

impl<'input> Token<'input> {
    /// The keyword text of a keyword token
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::And => "and",
            Token::Or => "or",
            Token::Xor => "xor",
            Token::Implies => "implies",
            Token::Is => "is",
            Token::As => "as",
            Token::In => "in",
            Token::Contains => "contains",
            Token::Div => "div",
            Token::Mod => "mod",
            Token::True => "true",
            Token::False => "false",
            _ => return None,
        };
        Some(text)
    }
}

/// Byte-oriented tokenizer over an expression
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
    end: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer over `input`
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            end: input.len(),
        }
    }

    #[inline(always)]
    fn slice(&self, start: usize, end: usize) -> &'input str {
        &self.input[start..end]
    }

    #[inline(always)]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline(always)]
    fn is_id_start(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'_')
    }

    #[inline(always)]
    fn is_id_continue(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')
    }

    fn skip_trivia(&mut self) -> ParseResult<()> {
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek_byte(1) == Some(b'/') => {
                    while self.pos < self.end && !matches!(self.bytes[self.pos], b'\n' | b'\r') {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_byte(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.pos + 1 >= self.end {
                            return Err(ParseError::UnclosedComment { position: start });
                        }
                        if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_digits(&mut self) {
        while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn parse_number(&mut self) -> ParseResult<Token<'input>> {
        let start = self.pos;
        self.scan_digits();

        // `1.5` is a decimal; in `1.toString()` the dot is navigation.
        let is_decimal = self.peek_byte(0) == Some(b'.')
            && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit());
        if is_decimal {
            self.pos += 1;
            self.scan_digits();
            return Ok(Token::Decimal(self.slice(start, self.pos)));
        }

        let text = self.slice(start, self.pos);
        text.parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| ParseError::InvalidLiteral {
                kind: "integer",
                literal: text.to_string(),
                position: start,
            })
    }

    /// Scan a quoted run, returning the raw content between the delimiters
    fn parse_delimited(&mut self, delimiter: u8) -> ParseResult<&'input str> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;

        while self.pos < self.end {
            match self.bytes[self.pos] {
                b if b == delimiter => {
                    let content = self.slice(start, self.pos);
                    self.pos += 1;
                    return Ok(content);
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }

        Err(ParseError::UnclosedString {
            delimiter: delimiter as char,
            position: open,
        })
    }

    fn scan_time_part(&mut self) {
        loop {
            match self.peek_byte(0) {
                Some(b'0'..=b'9' | b':') => self.pos += 1,
                Some(b'.') if self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) => {
                    self.pos += 1
                }
                _ => break,
            }
        }
    }

    fn scan_timezone(&mut self) {
        match self.peek_byte(0) {
            Some(b'Z') => self.pos += 1,
            Some(b'+' | b'-') if self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) => {
                self.pos += 1;
                self.scan_time_part();
            }
            _ => {}
        }
    }

    /// Scan `@date`, `@dateTtime` or `@Ttime`
    fn parse_temporal(&mut self) -> ParseResult<Token<'input>> {
        let start = self.pos;
        self.pos += 1;

        if self.peek_byte(0) == Some(b'T') {
            self.pos += 1;
            let time_start = self.pos;
            self.scan_time_part();
            return Ok(Token::Time(self.slice(time_start, self.pos)));
        }

        let date_start = self.pos;
        loop {
            match self.peek_byte(0) {
                Some(b'0'..=b'9') => self.pos += 1,
                Some(b'-') if self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) => {
                    self.pos += 1
                }
                _ => break,
            }
        }
        if self.pos == date_start {
            return Err(ParseError::InvalidLiteral {
                kind: "date",
                literal: self.slice(start, self.pos).to_string(),
                position: start,
            });
        }

        if self.peek_byte(0) == Some(b'T') {
            self.pos += 1;
            self.scan_time_part();
            self.scan_timezone();
            Ok(Token::DateTime(self.slice(date_start, self.pos)))
        } else {
            Ok(Token::Date(self.slice(date_start, self.pos)))
        }
    }

    fn parse_dollar(&mut self) -> ParseResult<Token<'input>> {
        let start = self.pos;
        self.pos += 1;
        let name_start = self.pos;
        while self.pos < self.end && Self::is_id_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        match self.slice(name_start, self.pos) {
            "this" => Ok(Token::DollarThis),
            "index" => Ok(Token::DollarIndex),
            "total" => Ok(Token::DollarTotal),
            _ => Err(ParseError::UnexpectedToken {
                token: self.slice(start, self.pos).to_string(),
                expected: "$this, $index or $total",
                position: start,
            }),
        }
    }

    fn single(&mut self, token: Token<'input>) -> Token<'input> {
        self.pos += 1;
        token
    }

    fn double(&mut self, token: Token<'input>) -> Token<'input> {
        self.pos += 2;
        token
    }

    /// Produce the next token with its span, or `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Spanned<Token<'input>>>> {
        self.skip_trivia()?;

        if self.pos >= self.end {
            return Ok(None);
        }

        let start = self.pos;
        let token = match self.bytes[self.pos] {
            b'.' => self.single(Token::Dot),
            b'(' => self.single(Token::LeftParen),
            b')' => self.single(Token::RightParen),
            b'[' => self.single(Token::LeftBracket),
            b']' => self.single(Token::RightBracket),
            b'{' => self.single(Token::LeftBrace),
            b'}' => self.single(Token::RightBrace),
            b',' => self.single(Token::Comma),
            b'%' => self.single(Token::Percent),
            b'|' => self.single(Token::Union),
            b'&' => self.single(Token::Ampersand),
            b'+' => self.single(Token::Plus),
            b'-' => self.single(Token::Minus),
            b'*' => self.single(Token::Multiply),
            b'/' => self.single(Token::Divide),
            b'=' => self.single(Token::Equal),
            b'~' => self.single(Token::Equivalent),
            b'<' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::LessThanOrEqual),
                _ => self.single(Token::LessThan),
            },
            b'>' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::GreaterThanOrEqual),
                _ => self.single(Token::GreaterThan),
            },
            b'!' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::NotEqual),
                Some(b'~') => self.double(Token::NotEquivalent),
                _ => {
                    return Err(ParseError::InvalidCharacter {
                        character: '!',
                        position: start,
                    });
                }
            },
            b'$' => self.parse_dollar()?,
            b'@' => self.parse_temporal()?,
            b'\'' => Token::String(self.parse_delimited(b'\'')?),
            b'`' => Token::DelimitedIdentifier(self.parse_delimited(b'`')?),
            b'0'..=b'9' => self.parse_number()?,
            ch if Self::is_id_start(ch) => {
                while self.pos < self.end && Self::is_id_continue(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                let word = self.slice(start, self.pos);
                match KEYWORD_TABLE.get(word) {
                    Some(keyword) => keyword.clone(),
                    None => Token::Identifier(word),
                }
            }
            _ => {
                let character = self.input[start..].chars().next().unwrap_or('\u{fffd}');
                return Err(ParseError::InvalidCharacter {
                    character,
                    position: start,
                });
            }
        };

        Ok(Some(Spanned::new(token, start, self.pos)))
    }

    /// Tokenize the whole input
    pub fn tokenize_all(&mut self) -> ParseResult<Vec<Spanned<Token<'input>>>> {
        let mut tokens = Vec::with_capacity(32);
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}
