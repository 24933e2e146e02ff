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

//! Model descriptions loaded from JSON and records read from FHIR JSON

mod common;

use common::*;
use octofhir_fhirpath_engine::model::{
    Collection, JsonObject, RegistryError, TypeRegistry, TypeSpecifier,
};
use octofhir_fhirpath_engine::{
    ErrorCode, EvaluationContext, EvaluationError, FhirPathError, FunctionLibrary, evaluate, parse,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const MODEL: &str = r#"[
    {"kind": "ClassInfo", "type": {"namespace": "R4", "name": "Base"}},
    {"kind": "ClassInfo", "type": {"namespace": "R4", "name": "Resource"},
     "baseType": {"namespace": "R4", "name": "Base"},
     "elements": {"id": {"namespace": "System", "name": "String"}}},
    {"kind": "ClassInfo", "type": {"namespace": "R4", "name": "Device"},
     "baseType": {"namespace": "R4", "name": "Resource"},
     "elements": {
        "serialNumber": {"namespace": "System", "name": "String"},
        "lotNumbers": {"namespace": "System", "name": "String", "isList": true},
        "owner": {"namespace": "R4", "name": "Organization"}
     }},
    {"kind": "SimpleTypeInfo", "type": {"namespace": "R4", "name": "markdown"},
     "baseType": {"namespace": "System", "name": "String"}}
]"#;

fn json_context() -> EvaluationContext {
    let registry = TypeRegistry::from_json(MODEL).unwrap();
    EvaluationContext::root()
        .with_types(registry)
        .with_functions(FunctionLibrary::standard())
        .with_namespace("R4")
}

fn device() -> Collection {
    let node = json!({
        "resourceType": "Device",
        "id": "d1",
        "serialNumber": "SN-42",
        "lotNumbers": ["L1", "L2"],
        "owner": {"reference": "Organization/1"}
    });
    Collection::single(JsonObject::resource("R4", node).unwrap().into_value())
}

fn run(expression: &str) -> Result<Collection, FhirPathError> {
    let ast = parse(expression)?;
    Ok(evaluate(&ast, device(), &json_context())?)
}

#[test]
fn test_json_model_navigation() {
    assert_eq!(texts(&run("Device.serialNumber").unwrap()), vec!["SN-42"]);
    assert_eq!(texts(&run("Device.lotNumbers").unwrap()), vec!["L1", "L2"]);
    assert_eq!(run("Device.id = 'd1'").unwrap(), boolean(true));
    assert_eq!(run("Device.is(Resource)").unwrap(), boolean(true));
    assert_eq!(run("Device.is(R4.Base)").unwrap(), boolean(true));
}

#[test]
fn test_unregistered_property_type_is_a_resolution_error() {
    let error = run("Device.owner").unwrap_err();
    assert!(matches!(
        error,
        FhirPathError::Evaluation(EvaluationError::TypeResolution(_))
    ));
    assert_eq!(error.code(), ErrorCode::TYPE_RESOLUTION);
}

#[test]
fn test_invalid_model_description() {
    let error = TypeRegistry::from_json(r#"[{"kind": "Unknown"}]"#).unwrap_err();
    assert!(matches!(error, RegistryError::InvalidModel(_)));
}

#[test]
fn test_duplicate_model_entries_fail_at_construction() {
    let mut infos = type_infos();
    infos.push(infos[0].clone());
    let error = octofhir_fhirpath_engine::build_context(FHIR, infos, FunctionLibrary::standard())
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::DUPLICATE_TYPE);
}

#[test]
fn test_simple_type_derives_from_system_type() {
    let registry = TypeRegistry::from_json(MODEL).unwrap();
    let markdown = TypeSpecifier::new("R4", "markdown");
    assert!(registry.is_subtype(&markdown, &TypeSpecifier::system("String")).unwrap());
    assert!(registry.is_subtype(&markdown, &TypeSpecifier::system("Any")).unwrap());
}

#[test]
fn test_primitives_follow_declared_types() {
    let patient = patient();
    let birth = eval("Patient.birthDate.type().name", patient.clone()).unwrap();
    assert_eq!(texts(&birth), vec!["date"]);

    let older = eval("Patient.birthDate + 1 year", patient.clone()).unwrap();
    assert_eq!(texts(&older), vec!["1975-12-25"]);

    let effective = eval("Observation.effectiveDateTime > @2024-01-01", observation()).unwrap();
    assert_eq!(effective, boolean(true));

    let active = eval("Patient.active and true", patient).unwrap();
    assert_eq!(active, boolean(true));
}

#[test]
fn test_environment_variables() {
    let patient = patient();
    let context = eval("%context.id", patient.clone()).unwrap();
    assert_eq!(texts(&context), vec!["example"]);

    let resource = eval("%resource.name.count()", patient.clone()).unwrap();
    assert_eq!(resource, integer(3));

    let ucum = eval("%ucum", patient.clone()).unwrap();
    assert_eq!(texts(&ucum), vec!["http://unitsofmeasure.org"]);

    let missing = eval("%unknown", patient).unwrap_err();
    assert!(matches!(
        missing,
        FhirPathError::Evaluation(EvaluationError::VariableNotFound { .. })
    ));
}

#[test]
fn test_user_variables() -> anyhow::Result<()> {
    let context = context().with_variable("limit", Collection::single(2i64.into()));
    let ast = parse("Patient.name.take(%limit).family")?;
    let result = evaluate(&ast, patient(), &context)?;
    assert_eq!(texts(&result), vec!["Chalmers"]);
    Ok(())
}
