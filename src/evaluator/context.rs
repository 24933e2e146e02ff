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

//! Immutable evaluation context
//!
//! A context bundles the default namespace, the type registry, the function
//! library and external variable bindings. Every `with_*` call returns a new
//! context; the input is never touched. Registry and library are shared
//! through `Arc`, and bindings form a parent chain, so deriving a context is
//! cheap and contexts can be handed to any number of threads.

use super::config::EvaluationConfig;
use super::error::{EvaluationError, EvaluationResult};
use crate::model::{Collection, TypeRegistry};
use crate::registry::FunctionLibrary;
use std::fmt;
use std::sync::Arc;

/// One `%name` binding plus the bindings it shadows
#[derive(Debug)]
struct Binding {
    name: String,
    value: Collection,
    parent: Option<Arc<Binding>>,
}

/// Evaluation context
#[derive(Clone)]
pub struct EvaluationContext {
    namespace: Arc<str>,
    types: Option<Arc<TypeRegistry>>,
    functions: Option<Arc<FunctionLibrary>>,
    bindings: Option<Arc<Binding>>,
    config: EvaluationConfig,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self {
            namespace: Arc::from(""),
            types: None,
            functions: None,
            bindings: None,
            config: EvaluationConfig::default(),
        }
    }
}

impl EvaluationContext {
    /// An empty context; namespace, types and functions must be set before use
    pub fn root() -> Self {
        Self::default()
    }

    /// Context with the default namespace replaced
    pub fn with_namespace(&self, namespace: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self.clone()
        }
    }

    /// Context with the type registry replaced
    pub fn with_types(&self, types: impl Into<Arc<TypeRegistry>>) -> Self {
        Self {
            types: Some(types.into()),
            ..self.clone()
        }
    }

    /// Context with the function library replaced
    pub fn with_functions(&self, functions: impl Into<Arc<FunctionLibrary>>) -> Self {
        Self {
            functions: Some(functions.into()),
            ..self.clone()
        }
    }

    /// Context with one more `%name` binding, shadowing any earlier one
    pub fn with_variable(&self, name: impl Into<String>, value: impl Into<Collection>) -> Self {
        Self {
            bindings: Some(Arc::new(Binding {
                name: name.into(),
                value: value.into(),
                parent: self.bindings.clone(),
            })),
            ..self.clone()
        }
    }

    /// Context with the evaluation limits replaced
    pub fn with_config(&self, config: EvaluationConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    /// Default namespace for unqualified type names and function lookup
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The type registry, or a configuration error when unset
    pub fn types(&self) -> EvaluationResult<&TypeRegistry> {
        self.types
            .as_deref()
            .ok_or_else(|| EvaluationError::configuration("no type registry"))
    }

    /// The function library, or a configuration error when unset
    pub fn functions(&self) -> EvaluationResult<&FunctionLibrary> {
        self.functions
            .as_deref()
            .ok_or_else(|| EvaluationError::configuration("no function library"))
    }

    /// Value bound to `%name`, nearest binding first
    pub fn variable(&self, name: &str) -> Option<&Collection> {
        let mut current = self.bindings.as_deref();
        while let Some(binding) = current {
            if binding.name == name {
                return Some(&binding.value);
            }
            current = binding.parent.as_deref();
        }
        None
    }

    /// Evaluation limits
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Fail fast when a required component is missing
    pub fn check_configured(&self) -> EvaluationResult<()> {
        if self.namespace.is_empty() {
            return Err(EvaluationError::configuration("no default namespace"));
        }
        self.types()?;
        self.functions()?;
        Ok(())
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("namespace", &self.namespace)
            .field("types", &self.types.as_ref().map(|types| types.len()))
            .field("functions", &self.functions.as_ref().map(|lib| lib.len()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirPathValue;

    #[test]
    fn test_root_context_is_unconfigured() {
        let context = EvaluationContext::root();
        assert!(matches!(
            context.check_configured(),
            Err(EvaluationError::Configuration { .. })
        ));
        assert!(context.types().is_err());
        assert!(context.functions().is_err());
    }

    #[test]
    fn test_with_calls_do_not_mutate_their_input() {
        let base = EvaluationContext::root().with_namespace("FHIR");
        let derived = base
            .with_types(TypeRegistry::system())
            .with_functions(FunctionLibrary::standard());

        assert!(base.types().is_err());
        assert!(derived.check_configured().is_ok());
        assert_eq!(derived.namespace(), "FHIR");
    }

    #[test]
    fn test_variables_shadow_without_leaking() {
        let outer = EvaluationContext::root().with_variable("x", FhirPathValue::Integer(1));
        let inner = outer.with_variable("x", FhirPathValue::Integer(2));

        assert_eq!(
            inner.variable("x").and_then(|c| c.as_single()),
            Some(&FhirPathValue::Integer(2))
        );
        assert_eq!(
            outer.variable("x").and_then(|c| c.as_single()),
            Some(&FhirPathValue::Integer(1))
        );
        assert!(outer.variable("y").is_none());
    }
}
