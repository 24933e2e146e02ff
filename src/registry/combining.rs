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

//! Combining functions: union, combine

use super::{FunctionCategory, FunctionLibrary};
use crate::evaluator::operators;
use crate::register_function;

impl FunctionLibrary {
    pub(crate) fn register_combining_functions(&mut self) {
        register_function!(
            self,
            "union",
            category: FunctionCategory::Combining,
            description: "Merges the input and the other collection, removing duplicates",
            parameters: ["other": "collection" => "Collection to merge"],
            return_type: "collection",
            examples: ["Patient.name.given.union(Patient.name.family)"],
            implementation: |call| {
                let other = call.argument(0)?;
                Ok(operators::union(call.input(), &other))
            }
        );
        register_function!(
            self,
            "combine",
            category: FunctionCategory::Combining,
            description: "Appends the other collection to the input, keeping duplicates",
            parameters: ["other": "collection" => "Collection to append"],
            return_type: "collection",
            examples: ["Patient.name.given.combine(Patient.name.family)"],
            implementation: |call| {
                let other = call.argument(0)?;
                let mut result = call.take_input();
                result.extend(other);
                Ok(result)
            }
        );
    }
}
