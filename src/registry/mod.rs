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

//! Function library for FHIRPath evaluation
//!
//! Functions are keyed by namespace, name and argument count. A call is
//! resolved in the context's default namespace first, then in `System`, where
//! the standard library lives. Implementations are plain closures receiving a
//! [`FunctionCall`], which exposes the input collection and evaluates
//! arguments on demand, so lambda parameters (`where`, `select`, ...) and
//! ordinary parameters go through the same surface.

pub mod builder;
mod call;

mod combining;
mod conversion;
mod existence;
mod filtering;
mod math;
mod string;
mod subsetting;
mod tree;
mod types;
mod utility;

pub use builder::FunctionBuilder;
pub use call::FunctionCall;

use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::{Collection, SYSTEM_NAMESPACE};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Function implementation
pub type FunctionImpl =
    Arc<dyn Fn(&mut FunctionCall<'_>) -> EvaluationResult<Collection> + Send + Sync>;

/// Function categories for organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    /// empty, exists, all, count, ...
    Existence,
    /// where, select, repeat, ofType
    Filtering,
    /// first, last, skip, take, ...
    Subsetting,
    /// union, combine
    Combining,
    /// iif and the to*/convertsTo* family
    Conversion,
    /// String manipulation
    String,
    /// Arithmetic functions
    Math,
    /// children, descendants
    Tree,
    /// trace, now, aggregate, ...
    Utility,
    /// is, as, type
    Type,
    /// not
    Logic,
}

/// Metadata for one function parameter
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    /// Parameter name
    pub name: String,
    /// Expected type, `expression` for parameters evaluated per item
    pub type_constraint: String,
    /// Whether the argument may be left out
    pub is_optional: bool,
    /// Parameter description
    pub description: String,
}

/// Metadata for a registered function
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    /// Function name
    pub name: String,
    /// Namespace the function is registered in
    pub namespace: String,
    /// Category
    pub category: FunctionCategory,
    /// Human-readable description
    pub description: String,
    /// Parameters, required ones first
    pub parameters: Vec<ParameterMetadata>,
    /// Result type
    pub return_type: Option<String>,
    /// Example expressions
    pub examples: Vec<String>,
}

impl FunctionMetadata {
    /// Smallest accepted argument count
    pub fn min_arity(&self) -> usize {
        self.parameters.iter().filter(|p| !p.is_optional).count()
    }

    /// Largest accepted argument count
    pub fn max_arity(&self) -> usize {
        self.parameters.len()
    }

    /// Whether a call with `arity` arguments matches
    pub fn accepts(&self, arity: usize) -> bool {
        (self.min_arity()..=self.max_arity()).contains(&arity)
    }

    fn arity_text(&self) -> String {
        match (self.min_arity(), self.max_arity()) {
            (min, max) if min == max => min.to_string(),
            (min, max) if max == min + 1 => format!("{min} or {max}"),
            (min, max) => format!("{min} to {max}"),
        }
    }
}

/// A registered function
#[derive(Clone)]
pub struct FunctionEntry {
    /// Function metadata
    pub metadata: Arc<FunctionMetadata>,
    /// The implementation
    pub implementation: FunctionImpl,
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Overloads of one name, most recently registered first
type Overloads = SmallVec<[FunctionEntry; 2]>;

/// Immutable-after-construction table of functions
#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    namespaces: FxHashMap<String, FxHashMap<String, Overloads>>,
}

impl FunctionLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard FHIRPath function set, registered in `System`
    pub fn standard() -> Self {
        let mut library = Self::new();
        library.register_existence_functions();
        library.register_filtering_functions();
        library.register_subsetting_functions();
        library.register_combining_functions();
        library.register_conversion_functions();
        library.register_string_functions();
        library.register_math_functions();
        library.register_tree_functions();
        library.register_utility_functions();
        library.register_type_functions();
        log::debug!("Built standard function library with {} entries", library.len());
        library
    }

    /// Add a function.
    ///
    /// An entry registered later takes precedence over an earlier one with
    /// overlapping arity, which is how callers override standard functions.
    pub fn register(&mut self, metadata: FunctionMetadata, implementation: FunctionImpl) {
        let overloads = self
            .namespaces
            .entry(metadata.namespace.clone())
            .or_default()
            .entry(metadata.name.clone())
            .or_default();
        overloads.insert(
            0,
            FunctionEntry {
                metadata: Arc::new(metadata),
                implementation,
            },
        );
    }

    /// Resolve a call of `name` with `arity` arguments.
    ///
    /// `namespace` is searched first, then `System`. A name that exists only
    /// with other argument counts is an arity error rather than an unknown
    /// function.
    pub fn lookup(
        &self,
        namespace: &str,
        name: &str,
        arity: usize,
    ) -> EvaluationResult<&FunctionEntry> {
        let mut arities: SmallVec<[String; 2]> = SmallVec::new();

        let search = if namespace == SYSTEM_NAMESPACE {
            [Some(namespace), None]
        } else {
            [Some(namespace), Some(SYSTEM_NAMESPACE)]
        };
        for ns in search.into_iter().flatten() {
            let Some(overloads) = self.namespaces.get(ns).and_then(|names| names.get(name)) else {
                continue;
            };
            if let Some(entry) = overloads.iter().find(|e| e.metadata.accepts(arity)) {
                return Ok(entry);
            }
            arities.extend(overloads.iter().map(|e| e.metadata.arity_text()));
        }

        if arities.is_empty() {
            Err(EvaluationError::UnknownFunction {
                name: name.to_string(),
            })
        } else {
            Err(EvaluationError::InvalidArity {
                name: name.to_string(),
                expected: arities.join(" or "),
                actual: arity,
            })
        }
    }

    /// Whether any overload of `name` exists in `namespace`
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.namespaces
            .get(namespace)
            .is_some_and(|names| names.contains_key(name))
    }

    /// Metadata of every registered function
    pub fn functions(&self) -> impl Iterator<Item = &FunctionMetadata> {
        self.namespaces
            .values()
            .flat_map(|names| names.values())
            .flat_map(|overloads| overloads.iter().map(|entry| entry.metadata.as_ref()))
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.functions().count()
    }

    /// True when no function is registered
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirPathValue;

    fn custom_library() -> FunctionLibrary {
        let mut library = FunctionLibrary::standard();
        FunctionBuilder::new("answer", FunctionCategory::Utility)
            .namespace("FHIR")
            .description("Always 42")
            .return_type("Integer")
            .register(&mut library, |_call| {
                Ok(Collection::single(FhirPathValue::Integer(42)))
            });
        library
    }

    #[test]
    fn test_standard_library_covers_system_functions() {
        let library = FunctionLibrary::standard();
        for name in [
            "empty", "exists", "where", "select", "repeat", "ofType", "first", "union", "iif",
            "toInteger", "substring", "matches", "abs", "children", "trace", "aggregate", "is",
            "as", "type", "not",
        ] {
            assert!(library.contains(SYSTEM_NAMESPACE, name), "missing {name}");
        }
    }

    #[test]
    fn test_lookup_falls_back_to_system() {
        let library = custom_library();
        assert!(library.lookup("FHIR", "answer", 0).is_ok());
        assert!(library.lookup("FHIR", "count", 0).is_ok());
        assert!(matches!(
            library.lookup("System", "answer", 0),
            Err(EvaluationError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_lookup_distinguishes_arity_from_unknown() {
        let library = FunctionLibrary::standard();
        assert!(library.lookup("FHIR", "exists", 0).is_ok());
        assert!(library.lookup("FHIR", "exists", 1).is_ok());

        match library.lookup("FHIR", "substring", 3) {
            Err(EvaluationError::InvalidArity {
                expected, actual, ..
            }) => {
                assert_eq!(expected, "1 or 2");
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            library.lookup("FHIR", "frobnicate", 0),
            Err(EvaluationError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_later_registration_overrides() {
        let mut library = FunctionLibrary::standard();
        FunctionBuilder::new("count", FunctionCategory::Existence)
            .register(&mut library, |_call| Ok(Collection::empty()));
        let entry = library.lookup("System", "count", 0).unwrap();
        assert!(entry.metadata.description.is_empty());
    }
}
