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

//! Error types for FHIRPath evaluation

use crate::model::TypeResolutionError;
use thiserror::Error;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that abort an evaluation.
///
/// Missing data is never reported here; it evaluates to an empty collection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// An expression referenced a type the registry cannot resolve
    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),

    /// No function of this name exists in the context namespace or `System`
    #[error("Unknown function '{name}'")]
    UnknownFunction {
        /// Function name as written
        name: String,
    },

    /// The function exists but not with this number of arguments
    #[error("Function '{name}' takes {expected} argument(s), got {actual}")]
    InvalidArity {
        /// Function name
        name: String,
        /// Accepted argument counts, e.g. `0 or 1`
        expected: String,
        /// Argument count at the call site
        actual: usize,
    },

    /// An operand that must be empty or a singleton held several values
    #[error("{operation} expects a single value, got {count}")]
    SingletonExpected {
        /// Operator or function that required the singleton
        operation: String,
        /// Number of values found
        count: usize,
    },

    /// Operand types are not supported by an operator or function
    #[error("Cannot apply '{operation}' to {found}")]
    TypeMismatch {
        /// Operator or function name
        operation: String,
        /// Description of the operand types
        found: String,
    },

    /// A function argument has the right type but an unusable value
    #[error("Invalid argument to '{function}': {message}")]
    InvalidArgument {
        /// Function name
        function: String,
        /// What was wrong
        message: String,
    },

    /// `%name` has no binding
    #[error("Variable '%{name}' is not defined")]
    VariableNotFound {
        /// Variable name without the `%`
        name: String,
    },

    /// The context is missing a registry or function library
    #[error("Context is not configured: {message}")]
    Configuration {
        /// What is missing
        message: String,
    },

    /// Expression nesting exceeded the configured depth
    #[error("Evaluation exceeded the maximum depth of {limit}")]
    RecursionLimit {
        /// Configured limit
        limit: usize,
    },

    /// The cancellation token was triggered
    #[error("Evaluation was cancelled")]
    Cancelled,

    /// Documented failure of a built-in function
    #[error("{function}: {message}")]
    Function {
        /// Function name
        function: String,
        /// Failure description
        message: String,
    },
}

impl EvaluationError {
    /// Operand type mismatch
    pub fn type_mismatch(operation: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            operation: operation.into(),
            found: found.into(),
        }
    }

    /// Multi-valued operand where a singleton was required
    pub fn singleton_expected(operation: impl Into<String>, count: usize) -> Self {
        Self::SingletonExpected {
            operation: operation.into(),
            count,
        }
    }

    /// Missing context component
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            EvaluationError::singleton_expected("'+'", 3).to_string(),
            "'+' expects a single value, got 3"
        );
        assert_eq!(
            EvaluationError::InvalidArity {
                name: "substring".into(),
                expected: "1 or 2".into(),
                actual: 0,
            }
            .to_string(),
            "Function 'substring' takes 1 or 2 argument(s), got 0"
        );
        assert_eq!(
            EvaluationError::from(TypeResolutionError::unknown("FHIR.Nope")).to_string(),
            "Unknown type 'FHIR.Nope'"
        );
    }
}
