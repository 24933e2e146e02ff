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

//! Data-driven type registry
//!
//! The registry indexes a flat list of [`TypeInfo`] entries by namespace and
//! name. Inheritance is a plain back-reference to the base type; the
//! [`BaseChain`] iterator walks it root-ward. The registry is immutable once
//! built and is shared by reference across evaluations.

use super::error::{RegistryError, TypeResolutionError};
use super::types::{SYSTEM_NAMESPACE, SimpleTypeInfo, TypeInfo, TypeSpecifier};
use rustc_hash::{FxHashMap, FxHashSet};

/// Name of the root of the `System` namespace
pub const SYSTEM_ANY: &str = "Any";

/// System types present in every registry
const SYSTEM_PRIMITIVES: &[&str] = &[
    "Boolean", "Integer", "Decimal", "String", "Date", "DateTime", "Time", "Quantity", "TypeInfo",
];

/// Index of known types, keyed by namespace then name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    namespaces: FxHashMap<String, FxHashMap<String, TypeInfo>>,
    len: usize,
}

impl TypeRegistry {
    /// Build a registry from a model description.
    ///
    /// The `System` types are added unless the description already declares
    /// them. Fails on duplicate entries and on cyclic base chains; a base type
    /// that is simply missing is tolerated until a lookup needs it.
    pub fn register(types: impl IntoIterator<Item = TypeInfo>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for info in types {
            registry.insert(info)?;
        }
        registry.add_system_types();
        registry.check_acyclic()?;

        log::debug!(
            "Type registry built with {} types in {} namespaces",
            registry.len,
            registry.namespaces.len()
        );
        Ok(registry)
    }

    /// Build a registry from a JSON array of [`TypeInfo`] descriptions
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let types: Vec<TypeInfo> = serde_json::from_str(json)?;
        Self::register(types)
    }

    /// A registry holding only the `System` types
    pub fn system() -> Self {
        let mut registry = Self::default();
        registry.add_system_types();
        registry
    }

    fn insert(&mut self, info: TypeInfo) -> Result<(), RegistryError> {
        let ts = info.type_specifier();
        let types = self.namespaces.entry(ts.namespace.clone()).or_default();
        if types.contains_key(&ts.name) {
            return Err(RegistryError::DuplicateType(ts.element_type()));
        }
        types.insert(ts.name.clone(), info);
        self.len += 1;
        Ok(())
    }

    fn add_system_types(&mut self) {
        let any = TypeSpecifier::system(SYSTEM_ANY);
        let system = self
            .namespaces
            .entry(SYSTEM_NAMESPACE.to_string())
            .or_default();

        let mut added = 0;
        if !system.contains_key(SYSTEM_ANY) {
            system.insert(
                SYSTEM_ANY.to_string(),
                SimpleTypeInfo::new(any.clone(), None).into(),
            );
            added += 1;
        }
        for name in SYSTEM_PRIMITIVES {
            if !system.contains_key(*name) {
                let info = SimpleTypeInfo::new(TypeSpecifier::system(*name), Some(any.clone()));
                system.insert((*name).to_string(), info.into());
                added += 1;
            }
        }
        self.len += added;
    }

    fn check_acyclic(&self) -> Result<(), RegistryError> {
        let mut acyclic: FxHashSet<(&str, &str)> = FxHashSet::default();

        for info in self.types() {
            let mut seen: FxHashSet<(&str, &str)> = FxHashSet::default();
            let mut current = Some(info);

            while let Some(entry) = current {
                let ts = entry.type_specifier();
                let key = (ts.namespace.as_str(), ts.name.as_str());
                if acyclic.contains(&key) {
                    break;
                }
                if !seen.insert(key) {
                    return Err(RegistryError::CyclicBaseChain(
                        info.type_specifier().element_type(),
                    ));
                }
                current = entry.base_type().and_then(|base| self.resolve(base));
            }
            acyclic.extend(seen);
        }
        Ok(())
    }

    /// Number of registered types, including the `System` types
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no types are registered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All registered entries, in no particular order
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.namespaces.values().flat_map(|types| types.values())
    }

    /// True if at least one type is registered in `namespace`
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces
            .get(namespace)
            .is_some_and(|types| !types.is_empty())
    }

    /// Exact lookup; the list marker of `ts` is ignored
    pub fn resolve(&self, ts: &TypeSpecifier) -> Option<&TypeInfo> {
        self.lookup(&ts.namespace, &ts.name)
    }

    fn lookup(&self, namespace: &str, name: &str) -> Option<&TypeInfo> {
        self.namespaces.get(namespace)?.get(name)
    }

    /// Resolve a type name as written in an expression.
    ///
    /// A qualified name is looked up exactly. An unqualified name is tried in
    /// `default_namespace` first, then in `System`.
    pub fn resolve_name(
        &self,
        namespace: Option<&str>,
        name: &str,
        default_namespace: &str,
    ) -> Result<&TypeSpecifier, TypeResolutionError> {
        let info = match namespace {
            Some(ns) => self.lookup(ns, name),
            None => self
                .lookup(default_namespace, name)
                .or_else(|| self.lookup(SYSTEM_NAMESPACE, name)),
        };

        info.map(TypeInfo::type_specifier).ok_or_else(|| {
            TypeResolutionError::unknown(match namespace {
                Some(ns) => format!("{ns}.{name}"),
                None => name.to_string(),
            })
        })
    }

    /// Ancestors of `ts`, nearest first
    pub fn base_chain<'a>(&'a self, ts: &'a TypeSpecifier) -> BaseChain<'a> {
        BaseChain {
            registry: self,
            current: Some(ts),
            remaining: self.len + 1,
        }
    }

    /// True iff `a` is `b` or `b` appears in the base chain of `a`.
    ///
    /// The anonymous type matches any type rooted at `Resource` in its
    /// namespace. Fails if `a` or one of its ancestors is not registered.
    pub fn is_subtype(
        &self,
        a: &TypeSpecifier,
        b: &TypeSpecifier,
    ) -> Result<bool, TypeResolutionError> {
        if a.same_type(b) {
            return Ok(true);
        }
        if b.is_anonymous() {
            let resource = TypeSpecifier::new(b.namespace.clone(), "Resource");
            return self.is_subtype(a, &resource);
        }
        if a.is_anonymous() {
            return Ok(false);
        }

        for ancestor in self.base_chain(a) {
            if ancestor?.same_type(b) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Type of property `name` on `ts`: own declarations first, then ancestors
    pub fn property_type<'a>(
        &'a self,
        ts: &'a TypeSpecifier,
        name: &str,
    ) -> Result<Option<&'a TypeSpecifier>, TypeResolutionError> {
        let info = self
            .resolve(ts)
            .ok_or_else(|| TypeResolutionError::unknown(ts.qualified_name()))?;
        if let Some(declared) = info.element(name) {
            return Ok(Some(declared));
        }

        for ancestor in self.base_chain(ts) {
            let ancestor = ancestor?;
            if let Some(declared) = self.resolve(ancestor).and_then(|info| info.element(name)) {
                return Ok(Some(declared));
            }
        }
        Ok(None)
    }

    /// Every property visible on `ts`, own declarations first.
    ///
    /// A name narrowed by a subtype is reported once, with the narrowed type.
    pub fn properties<'a>(
        &'a self,
        ts: &'a TypeSpecifier,
    ) -> Result<Vec<(&'a str, &'a TypeSpecifier)>, TypeResolutionError> {
        let info = self
            .resolve(ts)
            .ok_or_else(|| TypeResolutionError::unknown(ts.qualified_name()))?;

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut properties = Vec::new();
        let mut collect = |info: &'a TypeInfo| {
            for (name, declared) in info.elements() {
                if seen.insert(name) {
                    properties.push((name, declared));
                }
            }
        };

        collect(info);
        for ancestor in self.base_chain(ts) {
            if let Some(info) = self.resolve(ancestor?) {
                collect(info);
            }
        }
        Ok(properties)
    }
}

/// Lazy walk over the ancestors of a type.
///
/// Yields an error, then stops, when a type on the chain is not registered.
#[derive(Debug, Clone)]
pub struct BaseChain<'a> {
    registry: &'a TypeRegistry,
    current: Option<&'a TypeSpecifier>,
    remaining: usize,
}

impl<'a> Iterator for BaseChain<'a> {
    type Item = Result<&'a TypeSpecifier, TypeResolutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let Some(info) = self.registry.resolve(current) else {
            return Some(Err(TypeResolutionError::unknown(current.qualified_name())));
        };
        let base = info.base_type()?;
        if self.registry.resolve(base).is_none() {
            return Some(Err(TypeResolutionError::unresolved_base(base, current)));
        }
        self.current = Some(base);
        Some(Ok(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ClassInfo;
    use pretty_assertions::assert_eq;

    fn fhir(name: &str) -> TypeSpecifier {
        TypeSpecifier::new("FHIR", name)
    }

    fn class(name: &str, base: Option<&str>) -> ClassInfo {
        let info = ClassInfo::new(fhir(name));
        match base {
            Some(base) => info.with_base(fhir(base)),
            None => info,
        }
    }

    fn sample_registry() -> TypeRegistry {
        TypeRegistry::register(vec![
            class("Base", None).into(),
            class("Element", Some("Base"))
                .with_element("id", TypeSpecifier::system("String"))
                .into(),
            class("HumanName", Some("Element"))
                .with_element("family", fhir("string"))
                .into(),
            class("string", Some("Element")).into(),
            class("Resource", Some("Base"))
                .with_element("id", TypeSpecifier::system("String"))
                .into(),
            class("DomainResource", Some("Resource"))
                .with_element("contained", TypeSpecifier::list("FHIR", ""))
                .into(),
            class("Patient", Some("DomainResource"))
                .with_element("name", TypeSpecifier::list("FHIR", "HumanName"))
                .with_element("id", fhir("string"))
                .into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_system_types_are_seeded() {
        let registry = sample_registry();
        let integer = TypeSpecifier::system("Integer");
        assert!(registry.resolve(&integer).is_some());
        assert!(registry.is_subtype(&integer, &TypeSpecifier::system("Any")).unwrap());
        assert_eq!(registry.len(), 7 + 1 + SYSTEM_PRIMITIVES.len());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let result = TypeRegistry::register(vec![
            class("Base", None).into(),
            class("Base", None).into(),
        ]);
        assert!(matches!(result, Err(RegistryError::DuplicateType(ts)) if ts == fhir("Base")));
    }

    #[test]
    fn test_cycle_is_rejected_at_registration() {
        let result = TypeRegistry::register(vec![
            class("A", Some("B")).into(),
            class("B", Some("C")).into(),
            class("C", Some("A")).into(),
        ]);
        assert!(matches!(result, Err(RegistryError::CyclicBaseChain(_))));
    }

    #[test]
    fn test_base_chain_is_root_ward() {
        let registry = sample_registry();
        let patient = fhir("Patient");
        let chain: Vec<String> = registry
            .base_chain(&patient)
            .map(|ts| ts.unwrap().name.clone())
            .collect();
        assert_eq!(chain, vec!["DomainResource", "Resource", "Base"]);
    }

    #[test]
    fn test_unresolved_base_reported_on_traversal() {
        let registry =
            TypeRegistry::register(vec![class("Orphan", Some("Missing")).into()]).unwrap();
        let orphan = fhir("Orphan");
        let mut chain = registry.base_chain(&orphan);
        let err = chain.next().unwrap().unwrap_err();
        assert_eq!(err.type_name, "FHIR.Missing");
        assert_eq!(err.referenced_by.as_deref(), Some("FHIR.Orphan"));
        assert!(chain.next().is_none());
        assert!(registry.is_subtype(&orphan, &fhir("Base")).is_err());
    }

    #[test]
    fn test_subtype_is_reflexive_and_transitive() {
        let registry = sample_registry();
        let patient = fhir("Patient");
        assert!(registry.is_subtype(&patient, &patient).unwrap());
        assert!(registry.is_subtype(&patient, &fhir("DomainResource")).unwrap());
        assert!(registry.is_subtype(&patient, &fhir("Base")).unwrap());
        assert!(!registry.is_subtype(&fhir("Resource"), &patient).unwrap());
        assert!(!registry.is_subtype(&fhir("HumanName"), &fhir("Resource")).unwrap());
    }

    #[test]
    fn test_anonymous_type_matches_resources() {
        let registry = sample_registry();
        let any_resource = TypeSpecifier::new("FHIR", "");
        assert!(registry.is_subtype(&fhir("Patient"), &any_resource).unwrap());
        assert!(!registry.is_subtype(&fhir("HumanName"), &any_resource).unwrap());
    }

    #[test]
    fn test_property_type_prefers_narrowed_declaration() {
        let registry = sample_registry();
        let patient = fhir("Patient");
        assert_eq!(
            registry.property_type(&patient, "id").unwrap(),
            Some(&fhir("string"))
        );
        assert_eq!(
            registry.property_type(&fhir("DomainResource"), "id").unwrap(),
            Some(&TypeSpecifier::system("String"))
        );
        assert_eq!(
            registry.property_type(&patient, "contained").unwrap(),
            Some(&TypeSpecifier::list("FHIR", ""))
        );
        assert_eq!(registry.property_type(&patient, "birthDate").unwrap(), None);
        assert!(registry.property_type(&fhir("Unknown"), "id").is_err());
    }

    #[test]
    fn test_properties_lists_inherited_once() {
        let registry = sample_registry();
        let patient = fhir("Patient");
        let names: Vec<&str> = registry
            .properties(&patient)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["name", "id", "contained"]);
    }

    #[test]
    fn test_resolve_name_falls_back_to_system() {
        let registry = sample_registry();
        assert_eq!(
            registry.resolve_name(None, "Patient", "FHIR").unwrap(),
            &fhir("Patient")
        );
        assert_eq!(
            registry.resolve_name(None, "Integer", "FHIR").unwrap(),
            &TypeSpecifier::system("Integer")
        );
        assert_eq!(
            registry.resolve_name(Some("System"), "String", "FHIR").unwrap(),
            &TypeSpecifier::system("String")
        );
        assert!(registry.resolve_name(Some("FHIR"), "Integer", "FHIR").is_err());
    }

    #[test]
    fn test_from_json_model() {
        let registry = TypeRegistry::from_json(
            r#"[
                {"kind": "ClassInfo", "type": {"namespace": "FHIR", "name": "Base"}},
                {"kind": "ClassInfo", "type": {"namespace": "FHIR", "name": "Resource"},
                 "baseType": {"namespace": "FHIR", "name": "Base"},
                 "elements": {"id": {"namespace": "System", "name": "String"}}}
            ]"#,
        )
        .unwrap();
        assert!(registry.has_namespace("FHIR"));
        assert!(registry.is_subtype(&fhir("Resource"), &fhir("Base")).unwrap());
        assert!(matches!(
            TypeRegistry::from_json("{not json"),
            Err(RegistryError::InvalidModel(_))
        ));
    }
}
