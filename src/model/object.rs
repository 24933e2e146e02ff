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

//! Reflective access to records
//!
//! The evaluator never inspects a record's concrete representation. It asks
//! the record for its [`TypeSpecifier`] and, once the registry confirms a
//! property is declared, for that property's values. Two implementations
//! ship with the crate: [`DynamicObject`], an in-memory record, and
//! [`JsonObject`], a view over FHIR JSON.

use super::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use super::type_registry::TypeRegistry;
use super::types::TypeSpecifier;
use super::value::{Collection, FhirPathValue};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Read contract a record type offers the evaluator
pub trait FhirObject: fmt::Debug + Send + Sync {
    /// The type this record is an instance of
    fn type_specifier(&self) -> &TypeSpecifier;

    /// Names of the properties that currently hold values
    fn property_names(&self) -> Vec<String>;

    /// Values of property `name`.
    ///
    /// `declared` is the property type found in the registry; records that do
    /// not carry typed values use it to type what they return.
    fn property(
        &self,
        name: &str,
        declared: &TypeSpecifier,
        registry: &TypeRegistry,
    ) -> Collection;

    /// Deep equality with another record
    fn structural_eq(&self, other: &dyn FhirObject) -> bool {
        let _ = other;
        false
    }

    /// Downcasting support for [`structural_eq`](Self::structural_eq)
    fn as_any(&self) -> &dyn Any;
}

/// An in-memory record with ordered, already-typed properties
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicObject {
    type_specifier: TypeSpecifier,
    properties: IndexMap<String, Collection>,
}

impl DynamicObject {
    /// Create a record of the given type with no properties
    pub fn new(type_specifier: TypeSpecifier) -> Self {
        Self {
            type_specifier,
            properties: IndexMap::new(),
        }
    }

    /// Set a property, builder style
    pub fn with_property(mut self, name: impl Into<String>, values: impl Into<Collection>) -> Self {
        self.set_property(name, values);
        self
    }

    /// Set a property, replacing any previous values
    pub fn set_property(&mut self, name: impl Into<String>, values: impl Into<Collection>) {
        self.properties.insert(name.into(), values.into());
    }

    /// Wrap into a value
    pub fn into_value(self) -> FhirPathValue {
        FhirPathValue::Object(Arc::new(self))
    }
}

impl FhirObject for DynamicObject {
    fn type_specifier(&self) -> &TypeSpecifier {
        &self.type_specifier
    }

    fn property_names(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn property(&self, name: &str, _declared: &TypeSpecifier, _registry: &TypeRegistry) -> Collection {
        self.properties.get(name).cloned().unwrap_or_default()
    }

    fn structural_eq(&self, other: &dyn FhirObject) -> bool {
        other
            .as_any()
            .downcast_ref::<DynamicObject>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A record backed by FHIR JSON.
///
/// Primitive values are converted according to the declared property type,
/// nested objects with a `resourceType` take it as their type, and choice
/// properties (`value[x]`) are found under their suffixed keys.
#[derive(Debug, Clone)]
pub struct JsonObject {
    type_specifier: TypeSpecifier,
    node: Arc<JsonValue>,
}

impl JsonObject {
    /// Wrap a JSON object as a record of the given type
    pub fn new(type_specifier: TypeSpecifier, node: JsonValue) -> Self {
        Self {
            type_specifier: type_specifier.element_type(),
            node: Arc::new(node),
        }
    }

    /// Wrap a resource, typed by its `resourceType` in `namespace`
    pub fn resource(namespace: &str, node: JsonValue) -> Option<Self> {
        let resource_type = node.get("resourceType")?.as_str()?.to_string();
        Some(Self::new(TypeSpecifier::new(namespace, resource_type), node))
    }

    /// The underlying JSON
    pub fn node(&self) -> &JsonValue {
        &self.node
    }

    /// Wrap into a value
    pub fn into_value(self) -> FhirPathValue {
        FhirPathValue::Object(Arc::new(self))
    }

    fn choice_value<'a>(
        &'a self,
        name: &str,
        namespace: &str,
        registry: &TypeRegistry,
    ) -> Option<(&'a JsonValue, TypeSpecifier)> {
        let object = self.node.as_object()?;
        object.iter().find_map(|(key, value)| {
            let suffix = key.strip_prefix(name)?;
            if !suffix.starts_with(|c: char| c.is_ascii_uppercase()) {
                return None;
            }
            let choice = choice_type(namespace, suffix, registry)?;
            Some((value, choice))
        })
    }
}

/// Registered type named by a choice suffix: `Quantity` as-is, `String` as `string`
///
/// Keys such as `valueSet` carry no type suffix and stay unmatched.
fn choice_type(namespace: &str, suffix: &str, registry: &TypeRegistry) -> Option<TypeSpecifier> {
    let exact = TypeSpecifier::new(namespace, suffix);
    if registry.resolve(&exact).is_some() {
        return Some(exact);
    }
    let mut chars = suffix.chars();
    let first = chars.next()?;
    let lowered = TypeSpecifier::new(namespace, first.to_lowercase().chain(chars).collect::<String>());
    registry.resolve(&lowered).is_some().then_some(lowered)
}

fn convert_items(node: &JsonValue, declared: &TypeSpecifier) -> Collection {
    match node {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|item| convert_item(item, declared))
            .collect(),
        item => convert_item(item, declared).into_iter().collect(),
    }
}

fn convert_item(node: &JsonValue, declared: &TypeSpecifier) -> Option<FhirPathValue> {
    match node {
        JsonValue::Null => None,
        JsonValue::Object(object) => {
            let type_specifier = match object.get("resourceType").and_then(JsonValue::as_str) {
                Some(resource_type) => TypeSpecifier::new(declared.namespace.clone(), resource_type),
                None => declared.element_type(),
            };
            Some(JsonObject::new(type_specifier, node.clone()).into_value())
        }
        JsonValue::Array(_) => None,
        primitive => {
            let value = convert_primitive(primitive, &declared.name)?;
            Some(FhirPathValue::typed(value, declared.element_type()))
        }
    }
}

fn convert_primitive(node: &JsonValue, type_name: &str) -> Option<FhirPathValue> {
    let value = match node {
        JsonValue::Bool(b) => FhirPathValue::Boolean(*b),
        JsonValue::Number(number) => {
            let is_decimal = matches!(type_name, "decimal" | "Decimal");
            match number.as_i64() {
                Some(integer) if !is_decimal => FhirPathValue::Integer(integer),
                _ => FhirPathValue::Decimal(Decimal::from_str(&number.to_string()).ok()?),
            }
        }
        JsonValue::String(text) => convert_string(text, type_name),
        _ => return None,
    };
    Some(value)
}

fn convert_string(text: &str, type_name: &str) -> FhirPathValue {
    let converted = match type_name {
        "date" | "Date" => PrecisionDate::parse(text).map(FhirPathValue::Date),
        "dateTime" | "instant" | "DateTime" => PrecisionDateTime::parse(text).map(FhirPathValue::DateTime),
        "time" | "Time" => PrecisionTime::parse(text).map(FhirPathValue::Time),
        _ => None,
    };
    converted.unwrap_or_else(|| FhirPathValue::String(text.to_string()))
}

impl FhirObject for JsonObject {
    fn type_specifier(&self) -> &TypeSpecifier {
        &self.type_specifier
    }

    fn property_names(&self) -> Vec<String> {
        self.node
            .as_object()
            .map(|object| {
                object
                    .keys()
                    .filter(|key| *key != "resourceType" && !key.starts_with('_'))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn property(&self, name: &str, declared: &TypeSpecifier, registry: &TypeRegistry) -> Collection {
        if let Some(node) = self.node.get(name) {
            return convert_items(node, declared);
        }
        match self.choice_value(name, &declared.namespace, registry) {
            Some((node, choice)) => convert_items(node, &choice),
            None => Collection::empty(),
        }
    }

    fn structural_eq(&self, other: &dyn FhirObject) -> bool {
        other
            .as_any()
            .downcast_ref::<JsonObject>()
            .is_some_and(|other| {
                self.type_specifier.same_type(&other.type_specifier) && self.node == other.node
            })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ClassInfo;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::register(vec![
            ClassInfo::new(TypeSpecifier::new("FHIR", "Quantity")).into(),
            ClassInfo::new(TypeSpecifier::new("FHIR", "string")).into(),
            ClassInfo::new(TypeSpecifier::new("FHIR", "integer")).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_dynamic_object_properties() {
        let record = DynamicObject::new(TypeSpecifier::new("FHIR", "HumanName"))
            .with_property("family", FhirPathValue::string("Smith"))
            .with_property("given", Collection::empty());
        assert_eq!(record.property_names(), vec!["family".to_string()]);

        let family = record.property(
            "family",
            &TypeSpecifier::new("FHIR", "string"),
            &TypeRegistry::system(),
        );
        assert_eq!(family, Collection::single(FhirPathValue::string("Smith")));
    }

    #[test]
    fn test_json_primitive_conversion_follows_declared_type() {
        let patient = JsonObject::resource(
            "FHIR",
            json!({"resourceType": "Patient", "birthDate": "1974-12-25", "multipleBirthInteger": 2}),
        )
        .unwrap();
        let registry = registry();

        let birth_date = patient.property("birthDate", &TypeSpecifier::new("FHIR", "date"), &registry);
        let value = birth_date.as_single().unwrap();
        assert_eq!(value.type_specifier(), &TypeSpecifier::new("FHIR", "date"));
        assert!(matches!(value.primitive(), FhirPathValue::Date(_)));

        let twins = patient.property("multipleBirth", &TypeSpecifier::new("FHIR", "DataType"), &registry);
        assert_eq!(twins.as_single().and_then(FhirPathValue::as_integer), Some(2));
    }

    #[test]
    fn test_json_choice_and_nested_resources() {
        let registry = registry();
        let observation = JsonObject::resource(
            "FHIR",
            json!({
                "resourceType": "Observation",
                "valueQuantity": {"value": 185, "unit": "lbs"},
                "contained": [{"resourceType": "Patient", "id": "p1"}]
            }),
        )
        .unwrap();

        let value = observation.property("value", &TypeSpecifier::new("FHIR", "DataType"), &registry);
        assert_eq!(
            value.as_single().map(|v| v.type_specifier().clone()),
            Some(TypeSpecifier::new("FHIR", "Quantity"))
        );

        let contained = observation.property("contained", &TypeSpecifier::list("FHIR", ""), &registry);
        assert_eq!(
            contained.as_single().map(|v| v.type_specifier().clone()),
            Some(TypeSpecifier::new("FHIR", "Patient"))
        );
        let mut names = observation.property_names();
        names.sort();
        assert_eq!(names, vec!["contained", "valueQuantity"]);
    }

    #[test]
    fn test_choice_suffix_must_name_a_type() {
        let registry = registry();
        let declared = TypeSpecifier::new("FHIR", "DataType");
        let binding = JsonObject::new(
            TypeSpecifier::new("FHIR", "ElementDefinitionBinding"),
            json!({"valueSet": "http://hl7.org/fhir/ValueSet/gender"}),
        );
        assert!(binding.property("value", &declared, &registry).is_empty());

        let extension = JsonObject::new(
            TypeSpecifier::new("FHIR", "Extension"),
            json!({"valueSet": "http://hl7.org/fhir/ValueSet/gender", "valueString": "female"}),
        );
        let value = extension.property("value", &declared, &registry);
        assert_eq!(
            value.as_single().map(|v| v.type_specifier().clone()),
            Some(TypeSpecifier::new("FHIR", "string"))
        );
    }

    #[test]
    fn test_json_structural_equality() {
        let left = JsonObject::new(TypeSpecifier::new("FHIR", "Coding"), json!({"code": "a"}));
        let right = JsonObject::new(TypeSpecifier::new("FHIR", "Coding"), json!({"code": "a"}));
        let other = JsonObject::new(TypeSpecifier::new("FHIR", "Coding"), json!({"code": "b"}));
        assert!(left.structural_eq(&right));
        assert!(!left.structural_eq(&other));
    }
}
