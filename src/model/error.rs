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

//! Error types for the type model

use super::types::TypeSpecifier;
use thiserror::Error;

/// A type referenced by an expression or a registry entry could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown type '{type_name}'{}", referrer_suffix(.referenced_by))]
pub struct TypeResolutionError {
    /// The unresolved type name
    pub type_name: String,
    /// The type whose base reference failed, if the failure came from a base chain
    pub referenced_by: Option<String>,
}

impl TypeResolutionError {
    /// A type that is not registered
    pub fn unknown(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            referenced_by: None,
        }
    }

    /// A base type reference that is not registered
    pub fn unresolved_base(base: &TypeSpecifier, referenced_by: &TypeSpecifier) -> Self {
        Self {
            type_name: base.qualified_name(),
            referenced_by: Some(referenced_by.qualified_name()),
        }
    }
}

fn referrer_suffix(referenced_by: &Option<String>) -> String {
    referenced_by
        .as_ref()
        .map(|referrer| format!(" (base type of '{referrer}')"))
        .unwrap_or_default()
}

/// Failure while building a [`TypeRegistry`](super::TypeRegistry)
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Two entries share a namespace and name
    #[error("Type '{0}' is registered more than once")]
    DuplicateType(TypeSpecifier),

    /// Following base types from this type leads back to it
    #[error("Base type chain of '{0}' is cyclic")]
    CyclicBaseChain(TypeSpecifier),

    /// A model description could not be decoded
    #[error("Invalid model description: {0}")]
    InvalidModel(#[from] serde_json::Error),
}
