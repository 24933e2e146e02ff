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

//! Type functions (`is`, `as`, `type`) and boolean `not`

use super::{FunctionCategory, FunctionLibrary};
use crate::evaluator::EvaluationError;
use crate::evaluator::operators;
use crate::model::{Collection, FhirPathValue};
use crate::register_function;

impl FunctionLibrary {
    pub(crate) fn register_type_functions(&mut self) {
        self.register_is_as_functions();
        self.register_type_function();
        self.register_not_function();
    }

    fn register_is_as_functions(&mut self) {
        register_function!(
            self,
            "is",
            category: FunctionCategory::Type,
            description: "Returns true if the single input item is an instance of the type or a subtype",
            parameters: ["type": "type" => "Type name, optionally qualified"],
            return_type: "Boolean",
            examples: ["Observation.value.is(Quantity)"],
            implementation: |call| {
                let target = call.type_argument(0)?;
                let input = call.input();
                if input.len() > 1 {
                    return Err(EvaluationError::singleton_expected("is()", input.len()));
                }
                match input.first() {
                    Some(item) => Ok(Collection::single(FhirPathValue::Boolean(
                        call.is_of_type(item, &target)?,
                    ))),
                    None => Ok(Collection::empty()),
                }
            }
        );
        register_function!(
            self,
            "as",
            category: FunctionCategory::Type,
            description: "Returns the input items that are instances of the type; others are dropped",
            parameters: ["type": "type" => "Type name, optionally qualified"],
            return_type: "collection",
            examples: ["Observation.value.as(Quantity).unit"],
            implementation: |call| {
                let target = call.type_argument(0)?;
                let mut result = Collection::new();
                for item in call.input() {
                    if call.is_of_type(item, &target)? {
                        result.push(item.clone());
                    }
                }
                Ok(result)
            }
        );
    }

    fn register_type_function(&mut self) {
        register_function!(
            self,
            "type",
            category: FunctionCategory::Type,
            description: "Returns the type of every input item as a TypeInfo with namespace and name",
            parameters: [],
            return_type: "collection",
            examples: ["Patient.active.type().name"],
            implementation: |call| {
                Ok(call
                    .input()
                    .iter()
                    .map(|item| FhirPathValue::TypeInfo(item.type_specifier().element_type()))
                    .collect())
            }
        );
    }

    fn register_not_function(&mut self) {
        register_function!(
            self,
            "not",
            category: FunctionCategory::Logic,
            description: "Returns the boolean negation of the input; empty stays empty",
            parameters: [],
            return_type: "Boolean",
            examples: ["Patient.active.not()"],
            implementation: |call| {
                let value = operators::to_boolean(call.input(), "not()")?;
                Ok(operators::boolean_result(value.map(|b| !b)))
            }
        );
    }
}
