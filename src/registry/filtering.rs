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

//! Filtering and projection: where, select, repeat, ofType

use super::{FunctionCategory, FunctionLibrary};
use crate::model::Collection;
use crate::register_function;

impl FunctionLibrary {
    pub(crate) fn register_filtering_functions(&mut self) {
        self.register_where_function();
        self.register_select_function();
        self.register_repeat_function();
        self.register_of_type_function();
    }

    fn register_where_function(&mut self) {
        register_function!(
            self,
            "where",
            category: FunctionCategory::Filtering,
            description: "Returns the items for which the criteria evaluates to true",
            parameters: ["criteria": "expression" => "Condition evaluated per item"],
            return_type: "collection",
            examples: ["Patient.name.where(use = 'official')"],
            implementation: |call| {
                let mut result = Collection::new();
                for (index, item) in call.input().iter().enumerate() {
                    if call.criterion_for(0, item, index)? == Some(true) {
                        result.push(item.clone());
                    }
                }
                Ok(result)
            }
        );
    }

    fn register_select_function(&mut self) {
        register_function!(
            self,
            "select",
            category: FunctionCategory::Filtering,
            description: "Evaluates the projection per item and concatenates the results",
            parameters: ["projection": "expression" => "Expression evaluated per item"],
            return_type: "collection",
            examples: ["Patient.name.select(given.first())"],
            implementation: |call| {
                let mut result = Collection::new();
                for (index, item) in call.input().iter().enumerate() {
                    result.extend(call.evaluate_for(0, item, index)?);
                }
                Ok(result)
            }
        );
    }

    fn register_repeat_function(&mut self) {
        register_function!(
            self,
            "repeat",
            category: FunctionCategory::Filtering,
            description: "Applies the projection to the input, then to its results, until no new items appear",
            parameters: ["projection": "expression" => "Expression evaluated per item"],
            return_type: "collection",
            examples: ["Questionnaire.repeat(item)"],
            implementation: |call| {
                let limit = call.config().max_repeat_iterations;
                let mut result = Collection::new();
                let mut frontier = call.input().clone();
                let mut rounds = 0;

                while !frontier.is_empty() {
                    rounds += 1;
                    if rounds > limit {
                        return Err(call.error(format!("exceeded {limit} iterations")));
                    }
                    call.check_cancelled()?;

                    let mut next = Collection::new();
                    for (index, item) in frontier.iter().enumerate() {
                        for value in call.evaluate_for(0, item, index)? {
                            if !result.contains_value(&value) {
                                result.push(value.clone());
                                next.push(value);
                            }
                        }
                    }
                    frontier = next;
                }
                Ok(result)
            }
        );
    }

    fn register_of_type_function(&mut self) {
        register_function!(
            self,
            "ofType",
            category: FunctionCategory::Filtering,
            description: "Returns the items that are instances of the type or one of its subtypes",
            parameters: ["type": "type" => "Type name, optionally qualified"],
            return_type: "collection",
            examples: ["Bundle.entry.resource.ofType(Patient)"],
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
}
