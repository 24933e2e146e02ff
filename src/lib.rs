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

//! FHIRPath implementation in Rust
//!
//! A FHIRPath engine driven by a data-defined type model: callers register
//! the model's [`TypeInfo`] descriptions, parse expressions once and evaluate
//! them against any number of records implementing [`FhirObject`].
//!
//! ```
//! use octofhir_fhirpath_engine::{build_context, evaluate, parse};
//! use octofhir_fhirpath_engine::model::{Collection, FhirPathValue};
//! use octofhir_fhirpath_engine::registry::FunctionLibrary;
//!
//! let context = build_context("FHIR", [], FunctionLibrary::standard()).unwrap();
//! let ast = parse("(1 | 2 | 3).count()").unwrap();
//! let result = evaluate(&ast, Collection::empty(), &context).unwrap();
//! assert_eq!(result, Collection::single(FhirPathValue::Integer(3)));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod registry;

// Re-export main types
pub use ast::ExpressionNode;
pub use engine::{EngineConfig, FhirPathEngine};
pub use error::{ErrorCode, FhirPathError, Result};
pub use evaluator::{
    CancellationToken, EvaluationConfig, EvaluationContext, EvaluationError, EvaluationResult,
};
pub use model::{Collection, FhirObject, FhirPathValue, TypeInfo, TypeRegistry, TypeSpecifier};
pub use parser::ParseError;
pub use registry::{FunctionBuilder, FunctionLibrary};

use std::sync::Arc;

/// Build a ready-to-use context from a default namespace, the model's type
/// descriptions and a function library
pub fn build_context(
    namespace: impl Into<Arc<str>>,
    type_infos: impl IntoIterator<Item = TypeInfo>,
    functions: impl Into<Arc<FunctionLibrary>>,
) -> Result<EvaluationContext> {
    let types = TypeRegistry::register(type_infos)?;
    Ok(EvaluationContext::root()
        .with_types(types)
        .with_functions(functions)
        .with_namespace(namespace))
}

/// Parse FHIRPath expression text
pub fn parse(expression: &str) -> Result<ExpressionNode> {
    Ok(parser::parse(expression)?)
}

/// Evaluate a parsed expression against `root`
pub fn evaluate(
    expression: &ExpressionNode,
    root: impl Into<Collection>,
    context: &EvaluationContext,
) -> Result<Collection> {
    Ok(evaluator::evaluate(expression, root, context)?)
}
