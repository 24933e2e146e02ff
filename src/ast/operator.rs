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

//! Operator definitions for FHIRPath expressions
//!
//! Binary and unary operators with their binding strength. Precedence
//! values grow with binding strength: `implies` binds loosest, postfix
//! navigation tightest.

use std::fmt;

/// Binding strength of `implies`
pub const IMPLIES_PRECEDENCE: u8 = 1;
/// Binding strength of `or` and `xor`
pub const OR_PRECEDENCE: u8 = 2;
/// Binding strength of `and`
pub const AND_PRECEDENCE: u8 = 3;
/// Binding strength of `in` and `contains`
pub const MEMBERSHIP_PRECEDENCE: u8 = 4;
/// Binding strength of `=`, `!=`, `~` and `!~`
pub const EQUALITY_PRECEDENCE: u8 = 5;
/// Binding strength of `<`, `<=`, `>` and `>=`
pub const COMPARISON_PRECEDENCE: u8 = 6;
/// Binding strength of `|`
pub const UNION_PRECEDENCE: u8 = 7;
/// Binding strength of `is` and `as`
pub const TYPE_PRECEDENCE: u8 = 8;
/// Binding strength of `+`, `-` and `&`
pub const ADDITIVE_PRECEDENCE: u8 = 9;
/// Binding strength of `*`, `/`, `div` and `mod`
pub const MULTIPLICATIVE_PRECEDENCE: u8 = 10;
/// Binding strength of prefix `-`, `+` and `not`
pub const UNARY_PRECEDENCE: u8 = 11;
/// Binding strength of `.name`, `.fn()` and `[index]`
pub const POSTFIX_PRECEDENCE: u8 = 12;
/// Binding strength of literals, identifiers and parenthesized terms
pub const PRIMARY_PRECEDENCE: u8 = 13;

/// Binary operators in FHIRPath expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic operators
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Subtract,
    /// Multiplication (*)
    Multiply,
    /// Division (/)
    Divide,
    /// Modulo (mod)
    Modulo,
    /// Integer division (div)
    IntegerDivide,

    // Comparison operators
    /// Equality (=)
    Equal,
    /// Inequality (!=)
    NotEqual,
    /// Equivalence (~)
    Equivalent,
    /// Non-equivalence (!~)
    NotEquivalent,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,

    // Logical operators
    /// Logical AND (and)
    And,
    /// Logical OR (or)
    Or,
    /// Logical XOR (xor)
    Xor,
    /// Implication (implies)
    Implies,

    // String operators
    /// String concatenation (&)
    Concatenate,

    // Collection operators
    /// Collection membership (in)
    In,
    /// Collection containment (contains)
    Contains,
}

/// Unary operators in FHIRPath expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Arithmetic negation (-)
    Negate,
    /// Positive sign (+)
    Positive,
    /// Logical negation (not)
    Not,
}

/// Type operators taking a type name on their right-hand side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeOperator {
    /// Type test (is)
    Is,
    /// Type filter (as)
    As,
}

impl BinaryOperator {
    /// Get the precedence level of this operator (higher = binds tighter)
    pub fn precedence(self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::IntegerDivide | Self::Modulo => {
                MULTIPLICATIVE_PRECEDENCE
            }
            Self::Add | Self::Subtract | Self::Concatenate => ADDITIVE_PRECEDENCE,
            Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual => COMPARISON_PRECEDENCE,
            Self::Equal | Self::NotEqual | Self::Equivalent | Self::NotEquivalent => {
                EQUALITY_PRECEDENCE
            }
            Self::In | Self::Contains => MEMBERSHIP_PRECEDENCE,
            Self::And => AND_PRECEDENCE,
            Self::Xor | Self::Or => OR_PRECEDENCE,
            Self::Implies => IMPLIES_PRECEDENCE,
        }
    }

    /// Get the symbol representation of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "mod",
            Self::IntegerDivide => "div",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::NotEquivalent => "!~",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Implies => "implies",
            Self::Concatenate => "&",
            Self::In => "in",
            Self::Contains => "contains",
        }
    }
}

impl UnaryOperator {
    /// Get the symbol representation of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Positive => "+",
            Self::Not => "not",
        }
    }
}

impl TypeOperator {
    /// Get the keyword of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::As => "as",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for TypeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOperator::Multiply.precedence() > BinaryOperator::Add.precedence());
        assert!(BinaryOperator::Add.precedence() > TYPE_PRECEDENCE);
        assert!(TYPE_PRECEDENCE > UNION_PRECEDENCE);
        assert!(UNION_PRECEDENCE > BinaryOperator::LessThan.precedence());
        assert!(BinaryOperator::LessThan.precedence() > BinaryOperator::Equal.precedence());
        assert!(BinaryOperator::Equal.precedence() > BinaryOperator::In.precedence());
        assert!(BinaryOperator::In.precedence() > BinaryOperator::And.precedence());
        assert!(BinaryOperator::And.precedence() > BinaryOperator::Or.precedence());
        assert_eq!(BinaryOperator::Or.precedence(), BinaryOperator::Xor.precedence());
        assert!(BinaryOperator::Or.precedence() > BinaryOperator::Implies.precedence());
    }

    #[test]
    fn test_display() {
        assert_eq!(BinaryOperator::Add.to_string(), "+");
        assert_eq!(BinaryOperator::IntegerDivide.to_string(), "div");
        assert_eq!(UnaryOperator::Not.to_string(), "not");
        assert_eq!(TypeOperator::As.to_string(), "as");
    }
}
