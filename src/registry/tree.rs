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

//! Tree navigation functions: children, descendants

use super::{FunctionCall, FunctionCategory, FunctionLibrary};
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, FhirPathValue};
use crate::register_function;
use std::collections::VecDeque;

/// All property values of `item`, in declaration order; only records have children
fn children_of(call: &FunctionCall<'_>, item: &FhirPathValue) -> EvaluationResult<Collection> {
    let FhirPathValue::Object(object) = item else {
        return Ok(Collection::empty());
    };
    let types = call.types();
    let mut result = Collection::new();
    for (name, declared) in types.properties(object.type_specifier())? {
        result.extend(object.property(name, declared, types));
    }
    Ok(result)
}

impl FunctionLibrary {
    pub(crate) fn register_tree_functions(&mut self) {
        register_function!(
            self,
            "children",
            category: FunctionCategory::Tree,
            description: "Returns the direct child values of every input item",
            parameters: [],
            return_type: "collection",
            examples: ["Patient.children()"],
            implementation: |call| {
                let mut result = Collection::new();
                for item in call.input() {
                    result.extend(children_of(call, item)?);
                }
                Ok(result)
            }
        );
        register_function!(
            self,
            "descendants",
            category: FunctionCategory::Tree,
            description: "Returns every value reachable through children(), breadth first",
            parameters: [],
            return_type: "collection",
            examples: ["Patient.descendants()"],
            implementation: |call| {
                let mut result = Collection::new();
                let mut queue: VecDeque<FhirPathValue> = call.input().iter().cloned().collect();
                while let Some(item) = queue.pop_front() {
                    call.check_cancelled()?;
                    for child in children_of(call, &item)? {
                        queue.push_back(child.clone());
                        result.push(child);
                    }
                }
                Ok(result)
            }
        );
    }
}
