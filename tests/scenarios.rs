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

//! End-to-end scenarios over the reference type model

mod common;

use common::*;
use octofhir_fhirpath_engine::model::Collection;
use octofhir_fhirpath_engine::{
    EvaluationConfig, EvaluationError, FhirPathError, ParseError, evaluate, parse,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_count_of_three_names() {
    let result = eval("Patient.name.count()", patient_with_names(3)).unwrap();
    assert_eq!(result, integer(3));
}

#[test]
fn test_missing_names_navigate_to_empty() {
    let result = eval("Patient.name.family", patient_with_names(0)).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_of_type_uses_the_base_chain() {
    let patient = patient_with_names(1);
    let result = eval("Patient.ofType(Resource)", patient.clone()).unwrap();
    assert_eq!(result, Collection::single(patient));
}

#[test]
fn test_arithmetic_with_empty_is_empty() {
    let result = eval("1 + {}", Collection::empty()).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_boolean_and() {
    let result = eval("true and false", Collection::empty()).unwrap();
    assert_eq!(result, boolean(false));
}

#[test]
fn test_out_of_range_indexer_is_empty() {
    let result = eval("Patient.name[5]", patient_with_names(3)).unwrap();
    assert!(result.is_empty());
}

#[rstest]
#[case("Patient.name.family", &["Chalmers", "Windsor"])]
#[case("Patient.name.given", &["Peter", "James", "Jim", "Peter", "James"])]
#[case("Patient.name.where(use = 'usual').given", &["Jim"])]
#[case("Patient.name.given.distinct()", &["Peter", "James", "Jim"])]
#[case("Patient.name[1].given", &["Jim"])]
#[case("Patient.telecom.where(system = 'email').value", &["p.chalmers@example.org"])]
#[case("Patient.name.select(family + ', ' + given.first())", &["Chalmers, Peter", "Windsor, Peter"])]
#[case("Patient.name.family.union(Patient.name.family)", &["Chalmers", "Windsor"])]
#[case("Patient.gender", &["female"])]
#[case("Patient.contained.ofType(Observation).status", &["final"])]
#[case("name.first().family", &["Chalmers"])]
fn test_patient_paths(#[case] expression: &str, #[case] expected: &[&str]) {
    let result = eval(expression, patient()).unwrap();
    assert_eq!(texts(&result), expected);
}

#[rstest]
#[case("Patient.active", true)]
#[case("Patient.birthDate < @2000-01-01", true)]
#[case("Patient.name.exists(family = 'Windsor')", true)]
#[case("Patient.name.all(given.exists())", true)]
#[case("Patient.name.family.count() = 2", true)]
#[case("Patient.is(Resource)", true)]
#[case("Patient.is(FHIR.Patient)", true)]
#[case("Patient.gender is code", true)]
#[case("Patient.gender is string", true)]
#[case("Patient.gender is boolean", false)]
#[case("Patient.name.family.first() ~ 'chalmers'", true)]
#[case("'Jim' in Patient.name.given", true)]
#[case("Patient.telecom.system contains 'fax'", false)]
fn test_patient_predicates(#[case] expression: &str, #[case] expected: bool) {
    let result = eval(expression, patient()).unwrap();
    assert_eq!(result, boolean(expected));
}

#[test]
fn test_choice_property_reads_suffixed_key() {
    let observation = observation();
    let unit = eval("Observation.value.unit", observation.clone()).unwrap();
    assert_eq!(texts(&unit), vec!["mm[Hg]"]);

    let is_quantity = eval("Observation.value.is(Quantity)", observation.clone()).unwrap();
    assert_eq!(is_quantity, boolean(true));

    let value = eval("Observation.value.value > 100", observation).unwrap();
    assert_eq!(value, boolean(true));
}

#[test]
fn test_bundle_entries_filter_by_runtime_type() {
    let bundle = bundle();
    let patients = eval("Bundle.entry.resource.ofType(Patient).id", bundle.clone()).unwrap();
    assert_eq!(texts(&patients), vec!["example"]);

    let observations = eval(
        "Bundle.entry.resource.ofType(Observation).where(status = 'amended').id",
        bundle.clone(),
    )
    .unwrap();
    assert_eq!(texts(&observations), vec!["o2"]);

    let resources = eval("Bundle.entry.resource.ofType(Resource).count()", bundle).unwrap();
    assert_eq!(resources, integer(3));
}

#[test]
fn test_multi_valued_operand_is_an_error() {
    let error = eval("Patient.name.given + 'x'", patient()).unwrap_err();
    assert!(matches!(
        error,
        FhirPathError::Evaluation(EvaluationError::SingletonExpected { .. })
    ));
}

#[test]
fn test_unknown_function_is_an_error() {
    let error = eval("Patient.name.frobnicate()", patient()).unwrap_err();
    assert!(matches!(
        error,
        FhirPathError::Evaluation(EvaluationError::UnknownFunction { .. })
    ));
}

#[test]
fn test_wrong_arity_is_an_error() {
    let error = eval("Patient.name.where()", patient()).unwrap_err();
    assert!(matches!(
        error,
        FhirPathError::Evaluation(EvaluationError::InvalidArity { .. })
    ));
}

#[test]
fn test_records_are_isolated() {
    let failing = eval("Patient.name.given.single()", patient());
    assert!(failing.is_err());

    let next = eval("Patient.name.given.single()", patient_with_names(1)).unwrap();
    assert_eq!(texts(&next), vec!["Given0"]);
}

#[rstest]
#[case(format!("{}1{}", "(".repeat(200), ")".repeat(200)))]
#[case(format!("{}1", "-".repeat(100_000)))]
#[case(format!("1{}", " + 1".repeat(450)))]
#[case(format!("Patient{}", ".where(true)".repeat(150)))]
#[case(format!("{}1{}", "iif(true, ".repeat(150), ")".repeat(150)))]
fn test_overly_nested_expressions_are_rejected(#[case] expression: String) {
    let error = parse(&expression).unwrap_err();
    assert!(
        matches!(error, FhirPathError::Parse(ParseError::NestingTooDeep { limit: 100, .. })),
        "{error:?}"
    );
}

#[test]
fn test_deepest_accepted_sum_evaluates_on_a_small_stack() {
    let outcome = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let sum = format!("1{}", " + 1".repeat(99));
            eval(&sum, Collection::empty())
                .map(|result| texts(&result))
                .map_err(|error| error.to_string())
        })
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(outcome, Ok(vec!["100".to_string()]));
}

#[test]
fn test_configured_recursion_limit_stops_evaluation() {
    let shallow = context().with_config(EvaluationConfig::default().with_max_recursion_depth(8));
    let ast = parse(&format!("1{}", " + 1".repeat(20))).unwrap();
    let error = evaluate(&ast, Collection::empty(), &shallow).unwrap_err();
    assert!(matches!(
        error,
        FhirPathError::Evaluation(EvaluationError::RecursionLimit { limit: 8 })
    ));

    let ast = parse("1 + 1 + 1").unwrap();
    assert_eq!(evaluate(&ast, Collection::empty(), &shallow).unwrap(), integer(3));
}
