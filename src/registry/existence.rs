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

//! Existence functions: empty, exists, all, count, distinct and friends

use super::{FunctionCall, FunctionCategory, FunctionLibrary};
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, FhirPathValue};
use crate::register_function;

fn boolean(value: bool) -> EvaluationResult<Collection> {
    Ok(Collection::single(FhirPathValue::Boolean(value)))
}

/// Input items as booleans; anything else is a type mismatch
fn boolean_items(call: &FunctionCall<'_>) -> EvaluationResult<Vec<bool>> {
    call.input()
        .iter()
        .map(|item| item.as_boolean().ok_or_else(|| call.type_mismatch(item)))
        .collect()
}

impl FunctionLibrary {
    pub(crate) fn register_existence_functions(&mut self) {
        self.register_empty_function();
        self.register_exists_function();
        self.register_all_function();
        self.register_boolean_aggregates();
        self.register_subset_functions();
        self.register_count_function();
        self.register_distinct_functions();
    }

    fn register_empty_function(&mut self) {
        register_function!(
            self,
            "empty",
            category: FunctionCategory::Existence,
            description: "Returns true if the input collection is empty",
            parameters: [],
            return_type: "Boolean",
            examples: ["Patient.name.empty()"],
            implementation: |call| boolean(call.input().is_empty())
        );
    }

    fn register_exists_function(&mut self) {
        register_function!(
            self,
            "exists",
            category: FunctionCategory::Existence,
            description: "Returns true if the input has any item, or any item satisfying the criteria",
            parameters: [],
            optional: ["criteria": "expression" => "Condition evaluated per item"],
            return_type: "Boolean",
            examples: ["Patient.name.exists()", "Patient.name.exists(use = 'official')"],
            implementation: |call| {
                if call.arg_count() == 0 {
                    return boolean(!call.input().is_empty());
                }
                for (index, item) in call.input().iter().enumerate() {
                    if call.criterion_for(0, item, index)? == Some(true) {
                        return boolean(true);
                    }
                }
                boolean(false)
            }
        );
    }

    fn register_all_function(&mut self) {
        register_function!(
            self,
            "all",
            category: FunctionCategory::Existence,
            description: "Returns true if the criteria holds for every item; true for an empty input",
            parameters: ["criteria": "expression" => "Condition evaluated per item"],
            return_type: "Boolean",
            examples: ["Patient.telecom.all(system.exists())"],
            implementation: |call| {
                for (index, item) in call.input().iter().enumerate() {
                    if call.criterion_for(0, item, index)? != Some(true) {
                        return boolean(false);
                    }
                }
                boolean(true)
            }
        );
    }

    fn register_boolean_aggregates(&mut self) {
        register_function!(
            self,
            "allTrue",
            category: FunctionCategory::Existence,
            description: "Returns true if every item is true; true for an empty input",
            parameters: [],
            return_type: "Boolean",
            examples: ["(true | true).allTrue()"],
            implementation: |call| boolean(boolean_items(call)?.iter().all(|b| *b))
        );
        register_function!(
            self,
            "anyTrue",
            category: FunctionCategory::Existence,
            description: "Returns true if any item is true",
            parameters: [],
            return_type: "Boolean",
            examples: ["(false | true).anyTrue()"],
            implementation: |call| boolean(boolean_items(call)?.iter().any(|b| *b))
        );
        register_function!(
            self,
            "allFalse",
            category: FunctionCategory::Existence,
            description: "Returns true if every item is false; true for an empty input",
            parameters: [],
            return_type: "Boolean",
            examples: ["(false | false).allFalse()"],
            implementation: |call| boolean(boolean_items(call)?.iter().all(|b| !*b))
        );
        register_function!(
            self,
            "anyFalse",
            category: FunctionCategory::Existence,
            description: "Returns true if any item is false",
            parameters: [],
            return_type: "Boolean",
            examples: ["(true | false).anyFalse()"],
            implementation: |call| boolean(boolean_items(call)?.iter().any(|b| !*b))
        );
    }

    fn register_subset_functions(&mut self) {
        register_function!(
            self,
            "subsetOf",
            category: FunctionCategory::Existence,
            description: "Returns true if every input item is in the other collection",
            parameters: ["other": "collection" => "Candidate superset"],
            return_type: "Boolean",
            examples: ["(1 | 2).subsetOf(1 | 2 | 3)"],
            implementation: |call| {
                let other = call.argument(0)?;
                boolean(call.input().iter().all(|item| other.contains_value(item)))
            }
        );
        register_function!(
            self,
            "supersetOf",
            category: FunctionCategory::Existence,
            description: "Returns true if every item of the other collection is in the input",
            parameters: ["other": "collection" => "Candidate subset"],
            return_type: "Boolean",
            examples: ["(1 | 2 | 3).supersetOf(1 | 2)"],
            implementation: |call| {
                let other = call.argument(0)?;
                boolean(other.iter().all(|item| call.input().contains_value(item)))
            }
        );
    }

    fn register_count_function(&mut self) {
        register_function!(
            self,
            "count",
            category: FunctionCategory::Existence,
            description: "Returns the number of items in the input; 0 for an empty input",
            parameters: [],
            return_type: "Integer",
            examples: ["Patient.name.count()"],
            implementation: |call| {
                let count = i64::try_from(call.input().len())
                    .map_err(|_| call.error("collection too large to count"))?;
                Ok(Collection::single(FhirPathValue::Integer(count)))
            }
        );
    }

    fn register_distinct_functions(&mut self) {
        register_function!(
            self,
            "distinct",
            category: FunctionCategory::Existence,
            description: "Returns the input with duplicate items removed, keeping first occurrences",
            parameters: [],
            return_type: "collection",
            examples: ["(1 | 1 | 2).distinct()"],
            implementation: |call| Ok(call.take_input().distinct())
        );
        register_function!(
            self,
            "isDistinct",
            category: FunctionCategory::Existence,
            description: "Returns true if the input has no duplicate items",
            parameters: [],
            return_type: "Boolean",
            examples: ["Patient.identifier.isDistinct()"],
            implementation: |call| {
                let total = call.input().len();
                boolean(call.take_input().distinct().len() == total)
            }
        );
    }
}
