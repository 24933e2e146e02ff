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

//! Shared fixtures: a small FHIR-shaped type model and sample records

#![allow(dead_code)]

use octofhir_fhirpath_engine::model::{
    ClassInfo, Collection, DynamicObject, FhirPathValue, JsonObject, SimpleTypeInfo, TypeInfo,
    TypeSpecifier,
};
use octofhir_fhirpath_engine::{
    EvaluationContext, FunctionLibrary, Result, build_context, evaluate, parse,
};
use serde_json::{Value, json};

pub const FHIR: &str = "FHIR";

pub fn fhir(name: &str) -> TypeSpecifier {
    TypeSpecifier::new(FHIR, name)
}

pub fn fhir_list(name: &str) -> TypeSpecifier {
    TypeSpecifier::list(FHIR, name)
}

fn class(name: &str, base: Option<&str>) -> ClassInfo {
    let info = ClassInfo::new(fhir(name));
    match base {
        Some(base) => info.with_base(fhir(base)),
        None => info,
    }
}

fn primitive(name: &str, base: &str) -> TypeInfo {
    SimpleTypeInfo::new(fhir(name), Some(fhir(base))).into()
}

/// `Base <- Element <- DataType <- PrimitiveType <- string` and
/// `Patient <- DomainResource <- Resource <- Base`, plus the handful of
/// types the sample records use
pub fn type_infos() -> Vec<TypeInfo> {
    vec![
        class("Base", None).into(),
        class("Element", Some("Base"))
            .with_element("id", TypeSpecifier::system("String"))
            .into(),
        class("DataType", Some("Element")).into(),
        class("PrimitiveType", Some("DataType")).into(),
        primitive("string", "PrimitiveType"),
        primitive("code", "string"),
        primitive("boolean", "PrimitiveType"),
        primitive("integer", "PrimitiveType"),
        primitive("decimal", "PrimitiveType"),
        primitive("date", "PrimitiveType"),
        primitive("dateTime", "PrimitiveType"),
        class("HumanName", Some("DataType"))
            .with_element("use", fhir("code"))
            .with_element("family", fhir("string"))
            .with_element("given", fhir_list("string"))
            .into(),
        class("ContactPoint", Some("DataType"))
            .with_element("system", fhir("code"))
            .with_element("value", fhir("string"))
            .into(),
        class("Quantity", Some("DataType"))
            .with_element("value", fhir("decimal"))
            .with_element("unit", fhir("string"))
            .into(),
        class("Resource", Some("Base"))
            .with_element("id", fhir("string"))
            .into(),
        class("DomainResource", Some("Resource"))
            .with_element("contained", fhir_list(""))
            .into(),
        class("Patient", Some("DomainResource"))
            .with_element("active", fhir("boolean"))
            .with_element("gender", fhir("code"))
            .with_element("birthDate", fhir("date"))
            .with_element("name", fhir_list("HumanName"))
            .with_element("telecom", fhir_list("ContactPoint"))
            .into(),
        class("Observation", Some("DomainResource"))
            .with_element("status", fhir("code"))
            .with_element("value", fhir("DataType"))
            .with_element("effectiveDateTime", fhir("dateTime"))
            .into(),
        class("BundleEntry", Some("Element"))
            .with_element("fullUrl", fhir("string"))
            .with_element("resource", fhir(""))
            .into(),
        class("Bundle", Some("Resource"))
            .with_element("entry", fhir_list("BundleEntry"))
            .into(),
    ]
}

pub fn context() -> EvaluationContext {
    build_context(FHIR, type_infos(), FunctionLibrary::standard()).unwrap()
}

/// Build a `HumanName` record
pub fn human_name(family: &str, given: &[&str]) -> FhirPathValue {
    DynamicObject::new(fhir("HumanName"))
        .with_property(
            "family",
            FhirPathValue::typed(FhirPathValue::string(family), fhir("string")),
        )
        .with_property(
            "given",
            given
                .iter()
                .map(|g| FhirPathValue::typed(FhirPathValue::string(*g), fhir("string")))
                .collect::<Collection>(),
        )
        .into_value()
}

/// A patient record holding `count` names
pub fn patient_with_names(count: usize) -> FhirPathValue {
    let names: Collection = (0..count)
        .map(|i| {
            let given = format!("Given{i}");
            human_name(&format!("Family{i}"), &[given.as_str()])
        })
        .collect();
    DynamicObject::new(fhir("Patient"))
        .with_property("name", names)
        .into_value()
}

pub fn patient_json() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "example",
        "active": true,
        "gender": "female",
        "birthDate": "1974-12-25",
        "name": [
            {"use": "official", "family": "Chalmers", "given": ["Peter", "James"]},
            {"use": "usual", "given": ["Jim"]},
            {"use": "maiden", "family": "Windsor", "given": ["Peter", "James"]}
        ],
        "telecom": [
            {"system": "phone", "value": "(03) 5555 6473"},
            {"system": "email", "value": "p.chalmers@example.org"}
        ],
        "contained": [
            {"resourceType": "Observation", "id": "obs1", "status": "final"}
        ]
    })
}

pub fn patient() -> FhirPathValue {
    JsonObject::resource(FHIR, patient_json()).unwrap().into_value()
}

pub fn observation() -> FhirPathValue {
    let node = json!({
        "resourceType": "Observation",
        "id": "bp",
        "status": "final",
        "effectiveDateTime": "2024-03-01T10:30:00Z",
        "valueQuantity": {"value": 120.5, "unit": "mm[Hg]"}
    });
    JsonObject::resource(FHIR, node).unwrap().into_value()
}

pub fn bundle() -> FhirPathValue {
    let node = json!({
        "resourceType": "Bundle",
        "id": "b1",
        "entry": [
            {"fullUrl": "urn:1", "resource": patient_json()},
            {"fullUrl": "urn:2", "resource": {"resourceType": "Observation", "id": "o1", "status": "final"}},
            {"fullUrl": "urn:3", "resource": {"resourceType": "Observation", "id": "o2", "status": "amended"}}
        ]
    });
    JsonObject::resource(FHIR, node).unwrap().into_value()
}

/// Parse and evaluate in the fixture context
pub fn eval(expression: &str, root: impl Into<Collection>) -> Result<Collection> {
    let ast = parse(expression)?;
    evaluate(&ast, root, &context())
}

/// Result values rendered as text
pub fn texts(collection: &Collection) -> Vec<String> {
    collection.iter().map(ToString::to_string).collect()
}

pub fn boolean(value: bool) -> Collection {
    Collection::single(FhirPathValue::Boolean(value))
}

pub fn integer(value: i64) -> Collection {
    Collection::single(FhirPathValue::Integer(value))
}

pub fn string(value: &str) -> Collection {
    Collection::single(FhirPathValue::string(value))
}
