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

//! Subsetting functions: single, first, last, tail, skip, take, intersect, exclude

use super::{FunctionCategory, FunctionLibrary};
use crate::evaluator::EvaluationError;
use crate::model::Collection;
use crate::register_function;

impl FunctionLibrary {
    pub(crate) fn register_subsetting_functions(&mut self) {
        self.register_position_functions();
        self.register_skip_take_functions();
        self.register_set_functions();
    }

    fn register_position_functions(&mut self) {
        register_function!(
            self,
            "single",
            category: FunctionCategory::Subsetting,
            description: "Returns the only item of the input; an error if there are several",
            parameters: [],
            return_type: "any",
            examples: ["Patient.name.single()"],
            implementation: |call| {
                let input = call.take_input();
                if input.len() > 1 {
                    return Err(EvaluationError::singleton_expected("single()", input.len()));
                }
                Ok(input)
            }
        );
        register_function!(
            self,
            "first",
            category: FunctionCategory::Subsetting,
            description: "Returns the first item of the input",
            parameters: [],
            return_type: "any",
            examples: ["Patient.name.first()"],
            implementation: |call| Ok(call.input().first().cloned().into_iter().collect())
        );
        register_function!(
            self,
            "last",
            category: FunctionCategory::Subsetting,
            description: "Returns the last item of the input",
            parameters: [],
            return_type: "any",
            examples: ["Patient.name.last()"],
            implementation: |call| Ok(call.input().last().cloned().into_iter().collect())
        );
        register_function!(
            self,
            "tail",
            category: FunctionCategory::Subsetting,
            description: "Returns all but the first item of the input",
            parameters: [],
            return_type: "collection",
            examples: ["Patient.name.tail()"],
            implementation: |call| Ok(call.take_input().into_iter().skip(1).collect())
        );
    }

    fn register_skip_take_functions(&mut self) {
        register_function!(
            self,
            "skip",
            category: FunctionCategory::Subsetting,
            description: "Returns the input without its first num items",
            parameters: ["num": "Integer" => "Number of items to drop"],
            return_type: "collection",
            examples: ["Patient.name.skip(1)"],
            implementation: |call| {
                let Some(num) = call.integer_argument(0)? else {
                    return Ok(Collection::empty());
                };
                let num = usize::try_from(num).unwrap_or(0);
                Ok(call.take_input().into_iter().skip(num).collect())
            }
        );
        register_function!(
            self,
            "take",
            category: FunctionCategory::Subsetting,
            description: "Returns the first num items of the input",
            parameters: ["num": "Integer" => "Number of items to keep"],
            return_type: "collection",
            examples: ["Patient.name.take(2)"],
            implementation: |call| {
                let Some(num) = call.integer_argument(0)? else {
                    return Ok(Collection::empty());
                };
                let num = usize::try_from(num).unwrap_or(0);
                Ok(call.take_input().into_iter().take(num).collect())
            }
        );
    }

    fn register_set_functions(&mut self) {
        register_function!(
            self,
            "intersect",
            category: FunctionCategory::Subsetting,
            description: "Returns the distinct items present in both the input and the other collection",
            parameters: ["other": "collection" => "Collection to intersect with"],
            return_type: "collection",
            examples: ["(1 | 2 | 3).intersect(2 | 4)"],
            implementation: |call| {
                let other = call.argument(0)?;
                Ok(call
                    .take_input()
                    .into_iter()
                    .filter(|item| other.contains_value(item))
                    .collect::<Collection>()
                    .distinct())
            }
        );
        register_function!(
            self,
            "exclude",
            category: FunctionCategory::Subsetting,
            description: "Returns the input items not present in the other collection, keeping duplicates and order",
            parameters: ["other": "collection" => "Items to remove"],
            return_type: "collection",
            examples: ["(1 | 2 | 3).exclude(2)"],
            implementation: |call| {
                let other = call.argument(0)?;
                Ok(call
                    .take_input()
                    .into_iter()
                    .filter(|item| !other.contains_value(item))
                    .collect())
            }
        );
    }
}
