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

//! Function builder pattern for easy registration

use super::{
    FunctionCall, FunctionCategory, FunctionLibrary, FunctionMetadata, ParameterMetadata,
};
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, SYSTEM_NAMESPACE};
use std::sync::Arc;

/// Collects a function's metadata and registers it with its implementation
pub struct FunctionBuilder {
    name: String,
    namespace: String,
    category: FunctionCategory,
    description: String,
    parameters: Vec<ParameterMetadata>,
    return_type: Option<String>,
    examples: Vec<String>,
}

impl FunctionBuilder {
    /// Start a function in the `System` namespace
    pub fn new(name: impl Into<String>, category: FunctionCategory) -> Self {
        Self {
            name: name.into(),
            namespace: SYSTEM_NAMESPACE.to_string(),
            category,
            description: String::new(),
            parameters: Vec::new(),
            return_type: None,
            examples: Vec::new(),
        }
    }

    /// Register in another namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a parameter; optional parameters must follow required ones
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        type_constraint: impl Into<String>,
        is_optional: bool,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParameterMetadata {
            name: name.into(),
            type_constraint: type_constraint.into(),
            is_optional,
            description: description.into(),
        });
        self
    }

    pub fn return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Finish the metadata without registering
    pub fn build(self) -> FunctionMetadata {
        FunctionMetadata {
            name: self.name,
            namespace: self.namespace,
            category: self.category,
            description: self.description,
            parameters: self.parameters,
            return_type: self.return_type,
            examples: self.examples,
        }
    }

    /// Register the function in `library`
    pub fn register<F>(self, library: &mut FunctionLibrary, function: F)
    where
        F: Fn(&mut FunctionCall<'_>) -> EvaluationResult<Collection> + Send + Sync + 'static,
    {
        library.register(self.build(), Arc::new(function));
    }
}

/// Convenience macro for function registration
#[macro_export]
macro_rules! register_function {
    (
        $library:expr,
        $name:literal,
        category: $category:expr,
        description: $desc:literal,
        parameters: [$($param_name:literal : $param_type:literal => $param_desc:literal),*],
        $(optional: [$($opt_name:literal : $opt_type:literal => $opt_desc:literal),*],)?
        return_type: $return_type:literal,
        examples: [$($example:literal),*],
        implementation: $impl:expr
    ) => {
        {
            let mut builder = $crate::registry::FunctionBuilder::new($name, $category)
                .description($desc)
                .return_type($return_type);

            $(
                builder = builder.parameter($param_name, $param_type, false, $param_desc);
            )*

            $($(
                builder = builder.parameter($opt_name, $opt_type, true, $opt_desc);
            )*)?

            $(
                builder = builder.example($example);
            )*

            builder.register($library, $impl)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_arity_from_parameters() {
        let metadata = FunctionBuilder::new("substring", FunctionCategory::String)
            .parameter("start", "Integer", false, "Start index")
            .parameter("length", "Integer", true, "Length")
            .build();

        assert_eq!(metadata.namespace, SYSTEM_NAMESPACE);
        assert_eq!(metadata.min_arity(), 1);
        assert_eq!(metadata.max_arity(), 2);
        assert!(metadata.accepts(1) && metadata.accepts(2));
        assert!(!metadata.accepts(0) && !metadata.accepts(3));
    }
}
