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

//! FHIRPath expression evaluator
//!
//! Evaluation is a pure function of the parsed expression, the root value and
//! an [`EvaluationContext`]. Nothing is cached between calls, so one context
//! and one AST can serve any number of concurrent evaluations.

pub mod config;
pub mod context;
pub mod error;
pub(crate) mod interpreter;
pub(crate) mod operators;

pub use config::{CancellationToken, EvaluationConfig};
pub use context::EvaluationContext;
pub use error::{EvaluationError, EvaluationResult};

use crate::ast::ExpressionNode;
use crate::model::Collection;
use interpreter::Interpreter;

/// Evaluate a parsed expression against `root`
pub fn evaluate(
    expression: &ExpressionNode,
    root: impl Into<Collection>,
    context: &EvaluationContext,
) -> EvaluationResult<Collection> {
    let interpreter = Interpreter::new(context, root.into())?;
    interpreter.run(expression)
}
