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

//! Type identities and type descriptions of a data model
//!
//! A data model is described as plain data: a flat list of [`TypeInfo`]
//! entries, each naming its base type and its declared properties. The
//! [`TypeRegistry`](super::TypeRegistry) indexes such a list.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace of the built-in FHIRPath types
pub const SYSTEM_NAMESPACE: &str = "System";

/// Identity of a type: namespace, name and whether a property holds a list
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpecifier {
    /// Namespace the type belongs to, e.g. `FHIR` or `System`
    pub namespace: String,
    /// Type name, empty for the anonymous "any resource" marker
    pub name: String,
    /// Marks a property declaration as multi-valued
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_list: bool,
}

impl TypeSpecifier {
    /// Create a single-valued type specifier
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            is_list: false,
        }
    }

    /// Create a list-valued type specifier
    pub fn list(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name).into_list()
    }

    /// Create a specifier in the `System` namespace
    pub fn system(name: impl Into<String>) -> Self {
        Self::new(SYSTEM_NAMESPACE, name)
    }

    /// Same type, marked as a list
    pub fn into_list(mut self) -> Self {
        self.is_list = true;
        self
    }

    /// Same type without the list marker
    pub fn element_type(&self) -> TypeSpecifier {
        Self::new(self.namespace.clone(), self.name.clone())
    }

    /// True for the anonymous type used by polymorphic resource containers
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// True when both specifiers name the same type, ignoring `is_list`
    pub fn same_type(&self, other: &TypeSpecifier) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// True for types in the `System` namespace
    pub fn is_system(&self) -> bool {
        self.namespace == SYSTEM_NAMESPACE
    }

    /// `Namespace.Name` without the list marker
    pub fn qualified_name(&self) -> String {
        if self.is_anonymous() {
            format!("{}.*", self.namespace)
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_list {
            write!(f, "List<{}>", self.qualified_name())
        } else {
            f.write_str(&self.qualified_name())
        }
    }
}

/// Registry entry describing one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TypeInfo {
    /// A structured type with declared properties
    #[serde(rename = "ClassInfo")]
    Class(ClassInfo),
    /// A primitive type without properties, used as an inheritance leaf
    #[serde(rename = "SimpleTypeInfo")]
    Simple(SimpleTypeInfo),
}

impl TypeInfo {
    /// The identity of the described type
    pub fn type_specifier(&self) -> &TypeSpecifier {
        match self {
            TypeInfo::Class(info) => &info.type_specifier,
            TypeInfo::Simple(info) => &info.type_specifier,
        }
    }

    /// The declared base type, if any
    pub fn base_type(&self) -> Option<&TypeSpecifier> {
        match self {
            TypeInfo::Class(info) => info.base_type.as_ref(),
            TypeInfo::Simple(info) => info.base_type.as_ref(),
        }
    }

    /// A property declared directly on this type (ancestors are not searched)
    pub fn element(&self, name: &str) -> Option<&TypeSpecifier> {
        match self {
            TypeInfo::Class(info) => info.elements.get(name),
            TypeInfo::Simple(_) => None,
        }
    }

    /// Properties declared directly on this type, in declaration order
    pub fn elements(&self) -> impl Iterator<Item = (&str, &TypeSpecifier)> {
        let elements = match self {
            TypeInfo::Class(info) => Some(info.elements.iter()),
            TypeInfo::Simple(_) => None,
        };
        elements
            .into_iter()
            .flatten()
            .map(|(name, ts)| (name.as_str(), ts))
    }
}

impl From<ClassInfo> for TypeInfo {
    fn from(info: ClassInfo) -> Self {
        TypeInfo::Class(info)
    }
}

impl From<SimpleTypeInfo> for TypeInfo {
    fn from(info: SimpleTypeInfo) -> Self {
        TypeInfo::Simple(info)
    }
}

/// A structured type: its base type and its own declared properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    /// Identity of this type
    #[serde(rename = "type")]
    pub type_specifier: TypeSpecifier,
    /// Base type, `None` for a root
    #[serde(default)]
    pub base_type: Option<TypeSpecifier>,
    /// Property name to property type, in declaration order
    #[serde(default)]
    pub elements: IndexMap<String, TypeSpecifier>,
}

impl ClassInfo {
    /// Create a class without base type or properties
    pub fn new(type_specifier: TypeSpecifier) -> Self {
        Self {
            type_specifier,
            base_type: None,
            elements: IndexMap::new(),
        }
    }

    /// Set the base type
    pub fn with_base(mut self, base_type: TypeSpecifier) -> Self {
        self.base_type = Some(base_type);
        self
    }

    /// Declare a property; a later declaration of the same name replaces the earlier one
    pub fn with_element(mut self, name: impl Into<String>, type_specifier: TypeSpecifier) -> Self {
        self.elements.insert(name.into(), type_specifier);
        self
    }
}

/// A primitive type without properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleTypeInfo {
    /// Identity of this type
    #[serde(rename = "type")]
    pub type_specifier: TypeSpecifier,
    /// Base type, `None` for a root
    #[serde(default)]
    pub base_type: Option<TypeSpecifier>,
}

impl SimpleTypeInfo {
    /// Create a simple type deriving from `base_type`
    pub fn new(type_specifier: TypeSpecifier, base_type: Option<TypeSpecifier>) -> Self {
        Self {
            type_specifier,
            base_type,
        }
    }
}
