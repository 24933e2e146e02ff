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

//! Sharing contexts, ASTs and engines across threads

mod common;

use common::*;
use octofhir_fhirpath_engine::model::Collection;
use octofhir_fhirpath_engine::{
    CancellationToken, EvaluationConfig, EvaluationError, FhirPathEngine, FhirPathError, evaluate,
    parse,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;

#[test]
fn test_shared_context_and_ast() {
    let context = Arc::new(context());
    let ast = Arc::new(parse("Patient.name.where(family.exists()).count()").unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let context = Arc::clone(&context);
            let ast = Arc::clone(&ast);
            thread::spawn(move || {
                let patient = patient_with_names(i);
                evaluate(&ast, patient, &context).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        assert_eq!(result, integer(i64::try_from(i).unwrap()));
    }
}

#[test]
fn test_shared_engine() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = Arc::new(FhirPathEngine::new(context()));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let patient = patient();
                for _ in 0..50 {
                    let given = engine.evaluate("Patient.name.given.distinct()", patient.clone()).unwrap();
                    assert_eq!(texts(&given), vec!["Peter", "James", "Jim"]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(engine.cache_len(), 1);
}

#[test]
fn test_child_bindings_do_not_leak() {
    let base = context();
    let with_limit = base.with_variable("limit", integer(1));
    let ast = parse("%limit").unwrap();

    assert_eq!(evaluate(&ast, Collection::empty(), &with_limit).unwrap(), integer(1));
    assert!(matches!(
        evaluate(&ast, Collection::empty(), &base),
        Err(FhirPathError::Evaluation(EvaluationError::VariableNotFound { .. }))
    ));
}

#[test]
fn test_cancellation_stops_evaluation() {
    let token = CancellationToken::new();
    let context = context().with_config(EvaluationConfig::default().with_cancellation(token.clone()));
    let ast = parse("Patient.name.given").unwrap();

    assert!(evaluate(&ast, patient(), &context).is_ok());

    token.cancel();
    assert!(matches!(
        evaluate(&ast, patient(), &context),
        Err(FhirPathError::Evaluation(EvaluationError::Cancelled))
    ));
}
