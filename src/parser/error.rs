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

//! Parser error types

use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error with the byte offset where it was detected
///
/// Parsing never partially succeeds: the first error aborts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token that cannot appear here
    #[error("Unexpected token '{token}' at position {position}, expected {expected}")]
    UnexpectedToken {
        /// Text of the offending token
        token: String,
        /// What the parser was looking for
        expected: &'static str,
        /// Byte offset of the token
        position: usize,
    },

    /// Input ended while more was required
    #[error("Unexpected end of input at position {position}, expected {expected}")]
    UnexpectedEof {
        /// What the parser was looking for
        expected: &'static str,
        /// Length of the input
        position: usize,
    },

    /// A literal whose text does not denote a valid value
    #[error("Invalid {kind} literal '{literal}' at position {position}")]
    InvalidLiteral {
        /// Literal kind, e.g. `date`
        kind: &'static str,
        /// Literal text
        literal: String,
        /// Byte offset of the literal
        position: usize,
    },

    /// Unknown or malformed escape sequence
    #[error("Invalid escape sequence '{sequence}' at position {position}")]
    InvalidEscape {
        /// The escape sequence as written
        sequence: String,
        /// Byte offset of the enclosing literal
        position: usize,
    },

    /// String or delimited identifier without its closing delimiter
    #[error("Unclosed {delimiter} at position {position}")]
    UnclosedString {
        /// The missing delimiter character
        delimiter: char,
        /// Byte offset of the opening delimiter
        position: usize,
    },

    /// Block comment without `*/`
    #[error("Unclosed comment at position {position}")]
    UnclosedComment {
        /// Byte offset of the opening `/*`
        position: usize,
    },

    /// A character that starts no token
    #[error("Invalid character '{character}' at position {position}")]
    InvalidCharacter {
        /// The character
        character: char,
        /// Byte offset of the character
        position: usize,
    },

    /// Expression nested deeper than the parser accepts
    #[error("Expression nesting exceeds {limit} levels at position {position}")]
    NestingTooDeep {
        /// Maximum accepted nesting depth
        limit: usize,
        /// Byte offset where the limit was crossed
        position: usize,
    },
}

impl ParseError {
    /// Byte offset in the expression text where the error was detected
    pub fn position(&self) -> usize {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::UnexpectedEof { position, .. }
            | Self::InvalidLiteral { position, .. }
            | Self::InvalidEscape { position, .. }
            | Self::UnclosedString { position, .. }
            | Self::UnclosedComment { position }
            | Self::InvalidCharacter { position, .. }
            | Self::NestingTooDeep { position, .. } => *position,
        }
    }

    /// Description of the error without its position
    pub fn message(&self) -> String {
        match self {
            Self::UnexpectedToken {
                token, expected, ..
            } => format!("unexpected token '{token}', expected {expected}"),
            Self::UnexpectedEof { expected, .. } => {
                format!("unexpected end of input, expected {expected}")
            }
            Self::InvalidLiteral { kind, literal, .. } => {
                format!("invalid {kind} literal '{literal}'")
            }
            Self::InvalidEscape { sequence, .. } => format!("invalid escape sequence '{sequence}'"),
            Self::UnclosedString { delimiter, .. } => format!("missing closing {delimiter}"),
            Self::UnclosedComment { .. } => "unclosed comment".to_string(),
            Self::InvalidCharacter { character, .. } => format!("invalid character '{character}'"),
            Self::NestingTooDeep { limit, .. } => {
                format!("expression nesting exceeds {limit} levels")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_and_message() {
        let error = ParseError::UnexpectedToken {
            token: ")".to_string(),
            expected: "expression",
            position: 4,
        };
        assert_eq!(error.position(), 4);
        assert_eq!(error.message(), "unexpected token ')', expected expression");
        assert_eq!(
            error.to_string(),
            "Unexpected token ')' at position 4, expected expression"
        );
    }
}
