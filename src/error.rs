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

//! Error types for FHIRPath operations
//!
//! Each layer reports its own error type; [`FhirPathError`] unifies them for
//! callers that go through [`FhirPathEngine`](crate::FhirPathEngine) or the
//! top-level [`parse`](crate::parse)/[`evaluate`](crate::evaluate) helpers.

use crate::evaluator::EvaluationError;
use crate::model::RegistryError;
use crate::parser::ParseError;
use std::fmt;
use thiserror::Error;

/// Result type for FHIRPath operations
pub type Result<T> = std::result::Result<T, FhirPathError>;

/// Error categories, by code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Parser errors (FP0001-FP0050)
    Parser,
    /// Evaluation errors (FP0051-FP0100)
    Evaluation,
    /// Type registry errors (FP0101-FP0150)
    Registry,
}

/// Stable numeric error code, displayed as `FPnnnn`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Numeric code
    pub code: u16,
}

impl ErrorCode {
    pub const UNEXPECTED_TOKEN: Self = Self::new(1);
    pub const UNEXPECTED_EOF: Self = Self::new(2);
    pub const INVALID_LITERAL: Self = Self::new(3);
    pub const INVALID_ESCAPE: Self = Self::new(4);
    pub const UNCLOSED_STRING: Self = Self::new(5);
    pub const UNCLOSED_COMMENT: Self = Self::new(6);
    pub const INVALID_CHARACTER: Self = Self::new(7);
    pub const NESTING_TOO_DEEP: Self = Self::new(8);

    pub const TYPE_RESOLUTION: Self = Self::new(51);
    pub const UNKNOWN_FUNCTION: Self = Self::new(52);
    pub const INVALID_ARITY: Self = Self::new(53);
    pub const SINGLETON_EXPECTED: Self = Self::new(54);
    pub const TYPE_MISMATCH: Self = Self::new(55);
    pub const INVALID_ARGUMENT: Self = Self::new(56);
    pub const VARIABLE_NOT_FOUND: Self = Self::new(57);
    pub const CONFIGURATION: Self = Self::new(58);
    pub const RECURSION_LIMIT: Self = Self::new(59);
    pub const CANCELLED: Self = Self::new(60);
    pub const FUNCTION_FAILED: Self = Self::new(61);

    pub const DUPLICATE_TYPE: Self = Self::new(101);
    pub const CYCLIC_BASE_CHAIN: Self = Self::new(102);
    pub const INVALID_MODEL: Self = Self::new(103);

    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self { code }
    }

    /// Get error category for this error code
    pub fn category(&self) -> ErrorCategory {
        match self.code {
            51..=100 => ErrorCategory::Evaluation,
            101..=150 => ErrorCategory::Registry,
            _ => ErrorCategory::Parser,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FP{:04}", self.code)
    }
}

/// Any failure of parsing, registry construction or evaluation
#[derive(Error, Debug)]
pub enum FhirPathError {
    /// Expression text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Evaluation failed
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// The type registry could not be built
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl FhirPathError {
    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(error) => match error {
                ParseError::UnexpectedToken { .. } => ErrorCode::UNEXPECTED_TOKEN,
                ParseError::UnexpectedEof { .. } => ErrorCode::UNEXPECTED_EOF,
                ParseError::InvalidLiteral { .. } => ErrorCode::INVALID_LITERAL,
                ParseError::InvalidEscape { .. } => ErrorCode::INVALID_ESCAPE,
                ParseError::UnclosedString { .. } => ErrorCode::UNCLOSED_STRING,
                ParseError::UnclosedComment { .. } => ErrorCode::UNCLOSED_COMMENT,
                ParseError::InvalidCharacter { .. } => ErrorCode::INVALID_CHARACTER,
                ParseError::NestingTooDeep { .. } => ErrorCode::NESTING_TOO_DEEP,
            },
            Self::Evaluation(error) => match error {
                EvaluationError::TypeResolution(_) => ErrorCode::TYPE_RESOLUTION,
                EvaluationError::UnknownFunction { .. } => ErrorCode::UNKNOWN_FUNCTION,
                EvaluationError::InvalidArity { .. } => ErrorCode::INVALID_ARITY,
                EvaluationError::SingletonExpected { .. } => ErrorCode::SINGLETON_EXPECTED,
                EvaluationError::TypeMismatch { .. } => ErrorCode::TYPE_MISMATCH,
                EvaluationError::InvalidArgument { .. } => ErrorCode::INVALID_ARGUMENT,
                EvaluationError::VariableNotFound { .. } => ErrorCode::VARIABLE_NOT_FOUND,
                EvaluationError::Configuration { .. } => ErrorCode::CONFIGURATION,
                EvaluationError::RecursionLimit { .. } => ErrorCode::RECURSION_LIMIT,
                EvaluationError::Cancelled => ErrorCode::CANCELLED,
                EvaluationError::Function { .. } => ErrorCode::FUNCTION_FAILED,
            },
            Self::Registry(error) => match error {
                RegistryError::DuplicateType(_) => ErrorCode::DUPLICATE_TYPE,
                RegistryError::CyclicBaseChain(_) => ErrorCode::CYCLIC_BASE_CHAIN,
                RegistryError::InvalidModel(_) => ErrorCode::INVALID_MODEL,
            },
        }
    }

    /// Byte offset in the expression, for parse errors
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Parse(error) => Some(error.position()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeSpecifier;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::UNEXPECTED_TOKEN.to_string(), "FP0001");
        assert_eq!(ErrorCode::CANCELLED.to_string(), "FP0060");
        assert_eq!(ErrorCode::INVALID_MODEL.to_string(), "FP0103");
    }

    #[test]
    fn test_codes_follow_the_wrapped_error() {
        let parse: FhirPathError = crate::parse("1 +").unwrap_err();
        assert_eq!(parse.code().category(), ErrorCategory::Parser);
        assert!(parse.position().is_some());

        let evaluation = FhirPathError::from(EvaluationError::Cancelled);
        assert_eq!(evaluation.code(), ErrorCode::CANCELLED);
        assert_eq!(evaluation.code().category(), ErrorCategory::Evaluation);
        assert_eq!(evaluation.position(), None);

        let registry = FhirPathError::from(RegistryError::DuplicateType(TypeSpecifier::system(
            "String",
        )));
        assert_eq!(registry.code(), ErrorCode::DUPLICATE_TYPE);
        assert_eq!(registry.code().category(), ErrorCategory::Registry);
    }

    #[test]
    fn test_nesting_limit_has_parser_code() {
        let nested = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let error = crate::parse(&nested).unwrap_err();
        assert_eq!(error.code(), ErrorCode::NESTING_TOO_DEEP);
        assert_eq!(error.code().to_string(), "FP0008");
        assert_eq!(error.code().category(), ErrorCategory::Parser);
    }
}
