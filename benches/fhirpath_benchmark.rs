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

//! Tokenizer, parser and evaluator benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use octofhir_fhirpath_engine::model::{
    ClassInfo, Collection, JsonObject, SimpleTypeInfo, TypeInfo, TypeSpecifier,
};
use octofhir_fhirpath_engine::parser::Tokenizer;
use octofhir_fhirpath_engine::{
    EvaluationContext, FhirPathEngine, FunctionLibrary, build_context, evaluate, parse,
};
use serde_json::json;
use std::hint::black_box;

const TEST_EXPRESSIONS: &[&str] = &[
    "Patient.active",
    "Patient.name.given",
    "Patient.name.where(use = 'official').family",
    "Patient.telecom.where(system = 'phone').value.first()",
    "Patient.name.select(family & ', ' & given.first()).join('; ')",
    "Patient.birthDate < @2000-01-01 and Patient.gender = 'female'",
    "Patient.descendants().ofType(HumanName).count()",
    "(1 | 2 | 3 | 4 | 5).aggregate($this + $total, 0)",
];

fn fhir(name: &str) -> TypeSpecifier {
    TypeSpecifier::new("FHIR", name)
}

fn type_infos() -> Vec<TypeInfo> {
    let primitive = |name: &str| -> TypeInfo { SimpleTypeInfo::new(fhir(name), Some(fhir("Base"))).into() };
    vec![
        ClassInfo::new(fhir("Base")).into(),
        primitive("string"),
        primitive("code"),
        primitive("boolean"),
        primitive("date"),
        ClassInfo::new(fhir("HumanName"))
            .with_base(fhir("Base"))
            .with_element("use", fhir("code"))
            .with_element("family", fhir("string"))
            .with_element("given", TypeSpecifier::list("FHIR", "string"))
            .into(),
        ClassInfo::new(fhir("ContactPoint"))
            .with_base(fhir("Base"))
            .with_element("system", fhir("code"))
            .with_element("value", fhir("string"))
            .into(),
        ClassInfo::new(fhir("Patient"))
            .with_base(fhir("Base"))
            .with_element("id", fhir("string"))
            .with_element("active", fhir("boolean"))
            .with_element("gender", fhir("code"))
            .with_element("birthDate", fhir("date"))
            .with_element("name", TypeSpecifier::list("FHIR", "HumanName"))
            .with_element("telecom", TypeSpecifier::list("FHIR", "ContactPoint"))
            .into(),
    ]
}

fn context() -> EvaluationContext {
    build_context("FHIR", type_infos(), FunctionLibrary::standard()).expect("benchmark model is valid")
}

fn patient() -> Collection {
    let node = json!({
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
        ]
    });
    Collection::single(JsonObject::resource("FHIR", node).expect("patient is a resource").into_value())
}

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");
    for expression in TEST_EXPRESSIONS {
        group.throughput(Throughput::Bytes(expression.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(expression), expression, |b, expr| {
            b.iter(|| {
                let mut tokenizer = Tokenizer::new(black_box(expr));
                black_box(tokenizer.tokenize_all().expect("tokenizes"))
            })
        });
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    for expression in TEST_EXPRESSIONS {
        group.throughput(Throughput::Bytes(expression.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(expression), expression, |b, expr| {
            b.iter(|| black_box(parse(black_box(expr)).expect("parses")))
        });
    }
    group.finish();
}

fn bench_evaluator(c: &mut Criterion) {
    let context = context();
    let root = patient();
    let mut group = c.benchmark_group("evaluator");
    for expression in TEST_EXPRESSIONS {
        let ast = parse(expression).expect("parses");
        group.bench_with_input(BenchmarkId::from_parameter(expression), &ast, |b, ast| {
            b.iter(|| black_box(evaluate(ast, root.clone(), &context).expect("evaluates")))
        });
    }
    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let engine = FhirPathEngine::new(context());
    let root = patient();
    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(TEST_EXPRESSIONS.len() as u64));
    group.bench_function("cached_engine", |b| {
        b.iter(|| {
            for expression in TEST_EXPRESSIONS {
                black_box(engine.evaluate(expression, root.clone()).expect("evaluates"));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_parser, bench_evaluator, bench_throughput);
criterion_main!(benches);
