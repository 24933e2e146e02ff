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

//! The invocation surface handed to function implementations

use crate::ast::ExpressionNode;
use crate::evaluator::config::EvaluationConfig;
use crate::evaluator::interpreter::{Interpreter, Scope};
use crate::evaluator::operators;
use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::{Collection, FhirPathValue, TypeRegistry, TypeSpecifier};
use chrono::{DateTime, FixedOffset};

/// One function invocation.
///
/// Arguments are kept as expressions. An implementation evaluates an
/// ordinary argument with [`argument`](Self::argument), against the
/// caller's `$this`, or evaluates it once per input item with
/// [`evaluate_for`](Self::evaluate_for), which rebinds `$this` and `$index`.
pub struct FunctionCall<'a> {
    name: &'a str,
    input: Collection,
    args: &'a [ExpressionNode],
    interpreter: &'a Interpreter<'a>,
    scope: &'a Scope,
}

impl<'a> FunctionCall<'a> {
    pub(crate) fn new(
        name: &'a str,
        input: Collection,
        args: &'a [ExpressionNode],
        interpreter: &'a Interpreter<'a>,
        scope: &'a Scope,
    ) -> Self {
        Self {
            name,
            input,
            args,
            interpreter,
            scope,
        }
    }

    /// Function name as written at the call site
    pub fn name(&self) -> &str {
        self.name
    }

    /// The collection the function was invoked on
    pub fn input(&self) -> &Collection {
        &self.input
    }

    /// Move the input out, leaving an empty collection
    pub fn take_input(&mut self) -> Collection {
        std::mem::take(&mut self.input)
    }

    /// The input as an optional single value; several values are an error
    pub fn singleton_input(&self) -> EvaluationResult<Option<&FhirPathValue>> {
        operators::singleton(&self.input, &self.operation())
    }

    /// Number of arguments at the call site
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Unevaluated argument expression
    pub fn argument_node(&self, index: usize) -> Option<&'a ExpressionNode> {
        self.args.get(index)
    }

    /// Evaluate argument `index` against the caller's `$this`; absent arguments are empty
    pub fn argument(&self, index: usize) -> EvaluationResult<Collection> {
        match self.argument_node(index) {
            Some(node) => self.interpreter.evaluate(node, &self.scope.this, self.scope),
            None => Ok(Collection::empty()),
        }
    }

    /// Evaluate argument `index` and require an optional single value
    pub fn singleton_argument(&self, index: usize) -> EvaluationResult<Option<FhirPathValue>> {
        let value = self.argument(index)?;
        Ok(operators::singleton(&value, &self.operation())?.cloned())
    }

    /// Evaluate argument `index` as an optional string
    pub fn string_argument(&self, index: usize) -> EvaluationResult<Option<String>> {
        match self.singleton_argument(index)? {
            None => Ok(None),
            Some(value) => match value.as_str() {
                Some(text) => Ok(Some(text.to_string())),
                None => Err(self.type_mismatch(&value)),
            },
        }
    }

    /// Evaluate argument `index` as an optional integer
    pub fn integer_argument(&self, index: usize) -> EvaluationResult<Option<i64>> {
        match self.singleton_argument(index)? {
            None => Ok(None),
            Some(value) => match value.as_integer() {
                Some(number) => Ok(Some(number)),
                None => Err(self.type_mismatch(&value)),
            },
        }
    }

    /// Evaluate argument `index` with `$this` bound to `item` and `$index` to `position`
    pub fn evaluate_for(
        &self,
        index: usize,
        item: &FhirPathValue,
        position: usize,
    ) -> EvaluationResult<Collection> {
        let scope = self.scope.item(item.clone(), position);
        self.evaluate_in(index, &scope)
    }

    /// Like [`evaluate_for`](Self::evaluate_for), also binding `$total`
    pub fn evaluate_with_total(
        &self,
        index: usize,
        item: &FhirPathValue,
        position: usize,
        total: Collection,
    ) -> EvaluationResult<Collection> {
        let scope = self.scope.item(item.clone(), position).with_total(total);
        self.evaluate_in(index, &scope)
    }

    fn evaluate_in(&self, index: usize, scope: &Scope) -> EvaluationResult<Collection> {
        match self.argument_node(index) {
            Some(node) => self.interpreter.evaluate(node, &scope.this, scope),
            None => Ok(Collection::empty()),
        }
    }

    /// Per-item criterion result as three-valued boolean
    pub fn criterion_for(
        &self,
        index: usize,
        item: &FhirPathValue,
        position: usize,
    ) -> EvaluationResult<Option<bool>> {
        let result = self.evaluate_for(index, item, position)?;
        operators::to_boolean(&result, &self.operation())
    }

    /// Resolve argument `index`, written as a type name, against the registry
    pub fn type_argument(&self, index: usize) -> EvaluationResult<TypeSpecifier> {
        let type_name = self
            .argument_node(index)
            .and_then(ExpressionNode::as_type_name)
            .ok_or_else(|| self.invalid_argument("expected a type name"))?;
        self.interpreter.resolve_type(&type_name)
    }

    /// Whether `value` is an instance of `target` or one of its subtypes
    pub fn is_of_type(&self, value: &FhirPathValue, target: &TypeSpecifier) -> EvaluationResult<bool> {
        self.interpreter.is_of_type(value, target)
    }

    /// The type registry
    pub fn types(&self) -> &TypeRegistry {
        self.interpreter.types()
    }

    /// Default namespace of the context
    pub fn namespace(&self) -> &str {
        self.interpreter.namespace()
    }

    /// Instant captured when the evaluation started
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.interpreter.now()
    }

    /// Evaluation limits
    pub fn config(&self) -> &EvaluationConfig {
        self.interpreter.config()
    }

    /// Fail if the evaluation was cancelled
    pub fn check_cancelled(&self) -> EvaluationResult<()> {
        if self.config().is_cancelled() {
            Err(EvaluationError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Documented failure of this function
    pub fn error(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::Function {
            function: self.name.to_string(),
            message: message.into(),
        }
    }

    /// Unusable argument value
    pub fn invalid_argument(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::InvalidArgument {
            function: self.name.to_string(),
            message: message.into(),
        }
    }

    /// Unsupported operand type
    pub fn type_mismatch(&self, value: &FhirPathValue) -> EvaluationError {
        EvaluationError::type_mismatch(self.operation(), value.type_name())
    }

    fn operation(&self) -> String {
        format!("{}()", self.name)
    }
}
