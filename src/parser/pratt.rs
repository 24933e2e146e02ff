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

//! Pratt parser for FHIRPath expressions
//!
//! Operands are parsed as a primary term followed by any number of postfix
//! invocations (`.name`, `.fn(..)`, `[index]`); infix operators are then
//! folded by precedence climbing. All infix operators are left-associative.

use rust_decimal::Decimal;

use super::error::{ParseError, ParseResult};
use super::span::Spanned;
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{
    Arguments, BinaryOperator, ExpressionNode, LiteralValue, TypeName, TypeOperator,
    UnaryOperator, Variable,
};
use crate::model::{CalendarUnit, PrecisionDate, PrecisionDateTime, PrecisionTime, Quantity};

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Start of a full expression
    Lowest = 0,
    /// Logical implication
    Implies = crate::ast::IMPLIES_PRECEDENCE,
    /// Logical OR and XOR
    Or = crate::ast::OR_PRECEDENCE,
    /// Logical AND
    And = crate::ast::AND_PRECEDENCE,
    /// Membership operators (in, contains)
    Membership = crate::ast::MEMBERSHIP_PRECEDENCE,
    /// Equality operators (=, !=, ~, !~)
    Equality = crate::ast::EQUALITY_PRECEDENCE,
    /// Inequality operators (<, >, <=, >=)
    Inequality = crate::ast::COMPARISON_PRECEDENCE,
    /// Union operator (|)
    Union = crate::ast::UNION_PRECEDENCE,
    /// Type operators (is, as)
    Type = crate::ast::TYPE_PRECEDENCE,
    /// Additive operators (+, -, &)
    Additive = crate::ast::ADDITIVE_PRECEDENCE,
    /// Multiplicative operators (*, /, div, mod)
    Multiplicative = crate::ast::MULTIPLICATIVE_PRECEDENCE,
    /// Prefix operators (+, -, not)
    Unary = crate::ast::UNARY_PRECEDENCE,
}

impl Precedence {
    /// The level just above this one, used for left operands' right siblings
    const fn next_level(self) -> Self {
        match self {
            Precedence::Lowest => Precedence::Implies,
            Precedence::Implies => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Membership,
            Precedence::Membership => Precedence::Equality,
            Precedence::Equality => Precedence::Inequality,
            Precedence::Inequality => Precedence::Union,
            Precedence::Union => Precedence::Type,
            Precedence::Type => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Unary,
        }
    }
}

/// Infix role of a token
enum Infix {
    Binary(BinaryOperator, Precedence),
    Union,
    Type(TypeOperator),
}

fn infix_operator(token: &Token<'_>) -> Option<Infix> {
    let binary = |op, precedence| Some(Infix::Binary(op, precedence));
    match token {
        Token::Equal => binary(BinaryOperator::Equal, Precedence::Equality),
        Token::NotEqual => binary(BinaryOperator::NotEqual, Precedence::Equality),
        Token::Equivalent => binary(BinaryOperator::Equivalent, Precedence::Equality),
        Token::NotEquivalent => binary(BinaryOperator::NotEquivalent, Precedence::Equality),
        Token::Plus => binary(BinaryOperator::Add, Precedence::Additive),
        Token::Minus => binary(BinaryOperator::Subtract, Precedence::Additive),
        Token::Ampersand => binary(BinaryOperator::Concatenate, Precedence::Additive),
        Token::And => binary(BinaryOperator::And, Precedence::And),
        Token::Or => binary(BinaryOperator::Or, Precedence::Or),
        Token::Xor => binary(BinaryOperator::Xor, Precedence::Or),
        Token::Implies => binary(BinaryOperator::Implies, Precedence::Implies),
        Token::Multiply => binary(BinaryOperator::Multiply, Precedence::Multiplicative),
        Token::Divide => binary(BinaryOperator::Divide, Precedence::Multiplicative),
        Token::Div => binary(BinaryOperator::IntegerDivide, Precedence::Multiplicative),
        Token::Mod => binary(BinaryOperator::Modulo, Precedence::Multiplicative),
        Token::LessThan => binary(BinaryOperator::LessThan, Precedence::Inequality),
        Token::LessThanOrEqual => binary(BinaryOperator::LessThanOrEqual, Precedence::Inequality),
        Token::GreaterThan => binary(BinaryOperator::GreaterThan, Precedence::Inequality),
        Token::GreaterThanOrEqual => {
            binary(BinaryOperator::GreaterThanOrEqual, Precedence::Inequality)
        }
        Token::In => binary(BinaryOperator::In, Precedence::Membership),
        Token::Contains => binary(BinaryOperator::Contains, Precedence::Membership),
        Token::Union => Some(Infix::Union),
        Token::Is => Some(Infix::Type(TypeOperator::Is)),
        Token::As => Some(Infix::Type(TypeOperator::As)),
        _ => None,
    }
}

impl Infix {
    fn precedence(&self) -> Precedence {
        match self {
            Infix::Binary(_, precedence) => *precedence,
            Infix::Union => Precedence::Union,
            Infix::Type(_) => Precedence::Type,
        }
    }
}

/// Tokens that can begin an operand, used to tell prefix `not` from a
/// property named `not`
fn starts_operand(token: &Token<'_>) -> bool {
    matches!(
        token,
        Token::Integer(_)
            | Token::Decimal(_)
            | Token::String(_)
            | Token::Date(_)
            | Token::DateTime(_)
            | Token::Time(_)
            | Token::Identifier(_)
            | Token::DelimitedIdentifier(_)
            | Token::True
            | Token::False
            | Token::LeftParen
            | Token::LeftBrace
            | Token::Plus
            | Token::Minus
            | Token::Percent
            | Token::DollarThis
            | Token::DollarIndex
            | Token::DollarTotal
    )
}

/// Resolve escape sequences in string literals and delimited identifiers
pub fn process_string_escapes(raw: &str, position: usize) -> ParseResult<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        let invalid = |sequence: String| ParseError::InvalidEscape { sequence, position };
        match chars.next() {
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('`') => result.push('`'),
            Some('\\') => result.push('\\'),
            Some('/') => result.push('/'),
            Some('f') => result.push('\u{0c}'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => result.push(c),
                    None => return Err(invalid(format!("\\u{hex}"))),
                }
            }
            Some(other) => return Err(invalid(format!("\\{other}"))),
            None => return Err(invalid("\\".to_string())),
        }
    }
    Ok(result)
}

/// Deepest node nesting accepted by the parser
///
/// Bounds both parser recursion and the height of the produced tree.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

/// A parsed subtree and its height in nodes
struct Subtree {
    node: ExpressionNode,
    height: usize,
}

impl Subtree {
    fn leaf(node: ExpressionNode) -> Self {
        Self { node, height: 1 }
    }
}

/// Pratt parser over a pre-tokenized expression
pub struct PrattParser<'input> {
    input: &'input str,
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'input> PrattParser<'input> {
    /// Tokenize `input` and prepare to parse it
    pub fn new(input: &'input str) -> ParseResult<Self> {
        let tokens = Tokenizer::new(input).tokenize_all()?;
        Ok(Self {
            input,
            tokens,
            pos: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        })
    }

    /// Override the nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse the whole input as one expression
    pub fn parse(mut self) -> ParseResult<ExpressionNode> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        match self.tokens.get(self.pos) {
            None => Ok(expression.node),
            Some(_) => Err(self.unexpected("end of expression")),
        }
    }

    #[inline(always)]
    fn current(&self) -> Option<&Token<'input>> {
        self.tokens.get(self.pos).map(|t| &t.value)
    }

    #[inline(always)]
    fn peek(&self, offset: usize) -> Option<&Token<'input>> {
        self.tokens.get(self.pos + offset).map(|t| &t.value)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.input.len(), |t| t.start)
    }

    #[inline(always)]
    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Error for the current token, or end of input
    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(token) => ParseError::UnexpectedToken {
                token: self.input[token.start..token.end].to_string(),
                expected,
                position: token.start,
            },
            None => ParseError::UnexpectedEof {
                expected,
                position: self.input.len(),
            },
        }
    }

    fn too_deep(&self, position: usize) -> ParseError {
        ParseError::NestingTooDeep {
            limit: self.max_depth,
            position,
        }
    }

    /// Wrap `node` one level above children of height `child_height`
    fn nest(
        &self,
        node: ExpressionNode,
        child_height: usize,
        position: usize,
    ) -> ParseResult<Subtree> {
        let height = child_height + 1;
        if height > self.max_depth {
            return Err(self.too_deep(position));
        }
        Ok(Subtree { node, height })
    }

    fn expect(&mut self, expected: Token<'static>, description: &'static str) -> ParseResult<()> {
        if self.current() == Some(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(description))
        }
    }

    /// Every nested operand goes through here: groups, prefix operators,
    /// arguments and indexers
    fn parse_expression(&mut self, min_precedence: Precedence) -> ParseResult<Subtree> {
        if self.depth >= self.max_depth {
            return Err(self.too_deep(self.position()));
        }
        self.depth += 1;
        let result = self.parse_infix(min_precedence);
        self.depth -= 1;
        result
    }

    /// Core Pratt loop: a prefix operand, then infix operators binding at
    /// least as tightly as `min_precedence`
    fn parse_infix(&mut self, min_precedence: Precedence) -> ParseResult<Subtree> {
        let mut left = self.parse_prefix()?;

        while let Some(infix) = self.current().and_then(infix_operator) {
            let precedence = infix.precedence();
            if precedence < min_precedence || precedence == Precedence::Lowest {
                break;
            }
            let position = self.position();
            self.advance();

            left = match infix {
                Infix::Binary(op, _) => {
                    let right = self.parse_expression(precedence.next_level())?;
                    let height = left.height.max(right.height);
                    let node = ExpressionNode::binary_op(op, left.node, right.node);
                    self.nest(node, height, position)?
                }
                Infix::Union => {
                    let right = self.parse_expression(precedence.next_level())?;
                    let height = left.height.max(right.height);
                    let node = ExpressionNode::union(left.node, right.node);
                    self.nest(node, height, position)?
                }
                Infix::Type(op) => {
                    let type_name = self.parse_type_name()?;
                    let height = left.height;
                    self.nest(
                        ExpressionNode::type_operation(op, left.node, type_name),
                        height,
                        position,
                    )?
                }
            };
        }

        Ok(left)
    }

    /// Prefix operators, or a primary term with its postfix invocations
    fn parse_prefix(&mut self) -> ParseResult<Subtree> {
        let op = match self.current() {
            Some(Token::Minus) => Some(UnaryOperator::Negate),
            Some(Token::Plus) => Some(UnaryOperator::Positive),
            // `not()` stays a function call; `not x` negates.
            Some(Token::Identifier("not")) if self.peek(1).is_some_and(starts_operand) => {
                let is_empty_call = self.peek(1) == Some(&Token::LeftParen)
                    && self.peek(2) == Some(&Token::RightParen);
                (!is_empty_call).then_some(UnaryOperator::Not)
            }
            _ => None,
        };

        if let Some(op) = op {
            let position = self.position();
            self.advance();
            let operand = self.parse_expression(Precedence::Unary)?;
            return self.nest(ExpressionNode::unary_op(op, operand.node), operand.height, position);
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> ParseResult<Subtree> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Err(self.unexpected("expression"));
        };
        let start = spanned.start;
        let token = spanned.value.clone();

        let literal = |value: LiteralValue| -> ParseResult<Subtree> {
            Ok(Subtree::leaf(ExpressionNode::literal(value)))
        };
        match token {
            Token::Identifier(name) => {
                self.advance();
                self.parse_identifier_or_call(name.to_string(), start)
            }
            Token::DelimitedIdentifier(raw) => {
                self.advance();
                let name = process_string_escapes(raw, start)?;
                self.parse_identifier_or_call(name, start)
            }
            Token::Integer(value) => {
                self.advance();
                match self.parse_unit()? {
                    Some(unit) => Ok(Self::quantity(Decimal::from(value), unit)),
                    None => literal(LiteralValue::Integer(value)),
                }
            }
            Token::Decimal(text) => {
                self.advance();
                let value = text
                    .parse::<Decimal>()
                    .map_err(|_| ParseError::InvalidLiteral {
                        kind: "decimal",
                        literal: text.to_string(),
                        position: start,
                    })?;
                match self.parse_unit()? {
                    Some(unit) => Ok(Self::quantity(value, unit)),
                    None => literal(LiteralValue::Decimal(value)),
                }
            }
            Token::String(raw) => {
                self.advance();
                let value = process_string_escapes(raw, start)?;
                literal(LiteralValue::String(value))
            }
            // A keyword directly followed by `(` names a function, as in `is(T)`.
            ref keyword @ (Token::True | Token::False)
                if self.peek(1) != Some(&Token::LeftParen) =>
            {
                self.advance();
                literal(LiteralValue::Boolean(*keyword == Token::True))
            }
            ref keyword if keyword.keyword_text().is_some() => {
                if self.peek(1) != Some(&Token::LeftParen) {
                    return Err(self.unexpected("expression"));
                }
                self.advance();
                let name = keyword.keyword_text().unwrap_or_default();
                let (args, height) = self.parse_arguments()?;
                self.nest(ExpressionNode::function_call(name, args), height, start)
            }
            Token::Date(text) => {
                self.advance();
                let date = PrecisionDate::parse(text)
                    .ok_or_else(|| Self::invalid_literal("date", text, start))?;
                literal(LiteralValue::Date(date))
            }
            Token::DateTime(text) => {
                self.advance();
                let datetime = PrecisionDateTime::parse(text)
                    .ok_or_else(|| Self::invalid_literal("datetime", text, start))?;
                literal(LiteralValue::DateTime(datetime))
            }
            Token::Time(text) => {
                self.advance();
                let time = PrecisionTime::parse(text)
                    .ok_or_else(|| Self::invalid_literal("time", text, start))?;
                literal(LiteralValue::Time(time))
            }
            Token::LeftParen => {
                self.advance();
                let expression = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RightParen, "')'")?;
                Ok(expression)
            }
            Token::LeftBrace => {
                self.advance();
                self.expect(Token::RightBrace, "'}'")?;
                literal(LiteralValue::Empty)
            }
            Token::Percent => {
                self.advance();
                let name = self.parse_constant_name()?;
                Ok(Subtree::leaf(ExpressionNode::variable(Variable::External(name))))
            }
            Token::DollarThis => {
                self.advance();
                Ok(Subtree::leaf(ExpressionNode::variable(Variable::This)))
            }
            Token::DollarIndex => {
                self.advance();
                Ok(Subtree::leaf(ExpressionNode::variable(Variable::Index)))
            }
            Token::DollarTotal => {
                self.advance();
                Ok(Subtree::leaf(ExpressionNode::variable(Variable::Total)))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn invalid_literal(kind: &'static str, text: &str, position: usize) -> ParseError {
        ParseError::InvalidLiteral {
            kind,
            literal: text.to_string(),
            position,
        }
    }

    fn quantity(value: Decimal, unit: String) -> Subtree {
        Subtree::leaf(ExpressionNode::literal(LiteralValue::Quantity(
            Quantity::with_unit(value, unit),
        )))
    }

    /// Unit suffix of a quantity literal: a quoted UCUM code or a calendar keyword
    fn parse_unit(&mut self) -> ParseResult<Option<String>> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Ok(None);
        };
        match spanned.value {
            Token::String(raw) => {
                let unit = process_string_escapes(raw, spanned.start)?;
                self.advance();
                Ok(Some(unit))
            }
            Token::Identifier(word) if CalendarUnit::from_keyword(word).is_some() => {
                self.advance();
                Ok(Some(word.to_string()))
            }
            _ => Ok(None),
        }
    }

    fn parse_identifier_or_call(&mut self, name: String, start: usize) -> ParseResult<Subtree> {
        if self.current() == Some(&Token::LeftParen) {
            let (args, height) = self.parse_arguments()?;
            self.nest(ExpressionNode::function_call(name, args), height, start)
        } else {
            Ok(Subtree::leaf(ExpressionNode::identifier(name)))
        }
    }

    /// Name after `%`: identifier, delimited identifier or string
    fn parse_constant_name(&mut self) -> ParseResult<String> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Err(self.unexpected("constant name"));
        };
        let name = match &spanned.value {
            Token::Identifier(name) => name.to_string(),
            Token::DelimitedIdentifier(raw) | Token::String(raw) => {
                process_string_escapes(raw, spanned.start)?
            }
            other => match other.keyword_text() {
                Some(keyword) => keyword.to_string(),
                None => return Err(self.unexpected("constant name")),
            },
        };
        self.advance();
        Ok(name)
    }

    /// A member name after `.`; keywords are valid names here
    fn parse_member_name(&mut self) -> ParseResult<String> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Err(self.unexpected("identifier"));
        };
        let name = match &spanned.value {
            Token::Identifier(name) => name.to_string(),
            Token::DelimitedIdentifier(raw) => process_string_escapes(raw, spanned.start)?,
            other => match other.keyword_text() {
                Some(keyword) => keyword.to_string(),
                None => return Err(self.unexpected("identifier")),
            },
        };
        self.advance();
        Ok(name)
    }

    /// Type name after `is`/`as`: `Name` or `Namespace.Name`
    fn parse_type_name(&mut self) -> ParseResult<TypeName> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Err(self.unexpected("type name"));
        };
        let first = match &spanned.value {
            Token::Identifier(name) => name.to_string(),
            Token::DelimitedIdentifier(raw) => process_string_escapes(raw, spanned.start)?,
            _ => return Err(self.unexpected("type name")),
        };
        self.advance();

        let qualified = self.current() == Some(&Token::Dot)
            && self.peek(1).is_some_and(|t| {
                matches!(t, Token::Identifier(_) | Token::DelimitedIdentifier(_))
                    || t.keyword_text().is_some()
            });
        if qualified {
            self.advance();
            let name = self.parse_member_name()?;
            Ok(TypeName::qualified(first, name))
        } else {
            Ok(TypeName::new(first))
        }
    }

    /// Parenthesized, comma-separated arguments and the tallest argument's height
    fn parse_arguments(&mut self) -> ParseResult<(Arguments, usize)> {
        self.expect(Token::LeftParen, "'('")?;
        let mut args = Arguments::new();
        let mut height = 0;

        if self.current() == Some(&Token::RightParen) {
            self.advance();
            return Ok((args, height));
        }

        loop {
            let argument = self.parse_expression(Precedence::Lowest)?;
            height = height.max(argument.height);
            args.push(argument.node);
            match self.current() {
                Some(Token::Comma) => self.advance(),
                Some(Token::RightParen) => {
                    self.advance();
                    return Ok((args, height));
                }
                _ => return Err(self.unexpected("',' or ')' in function arguments")),
            }
        }
    }

    /// Postfix invocations: `.name`, `.fn(args)` and `[index]`
    fn parse_postfix(&mut self, mut left: Subtree) -> ParseResult<Subtree> {
        loop {
            let position = self.position();
            match self.current() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.parse_member_name()?;
                    left = if self.current() == Some(&Token::LeftParen) {
                        let (args, height) = self.parse_arguments()?;
                        let height = left.height.max(height);
                        let node = ExpressionNode::method_call(left.node, name, args);
                        self.nest(node, height, position)?
                    } else {
                        let height = left.height;
                        self.nest(ExpressionNode::path(left.node, name), height, position)?
                    };
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_expression(Precedence::Lowest)?;
                    self.expect(Token::RightBracket, "']'")?;
                    let height = left.height.max(index.height);
                    let node = ExpressionNode::index(left.node, index.node);
                    left = self.nest(node, height, position)?;
                }
                _ => return Ok(left),
            }
        }
    }
}

/// Parse an expression with the Pratt parser
pub fn parse_expression_pratt(input: &str) -> ParseResult<ExpressionNode> {
    PrattParser::new(input)?.parse()
}
