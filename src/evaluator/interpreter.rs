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

//! Recursive AST interpreter
//!
//! An [`Interpreter`] lives for one `evaluate` call. It holds the root value,
//! the instant used by `now()`, and a depth counter; everything else comes
//! from the immutable [`EvaluationContext`]. Iteration variables travel in a
//! [`Scope`] value that lambda-style functions derive per item.

use super::context::EvaluationContext;
use super::config::EvaluationConfig;
use super::error::{EvaluationError, EvaluationResult};
use super::operators;
use crate::ast::{
    BinaryOpData, BinaryOperator, ExpressionNode, TypeName, TypeOperator, UnaryOperator, Variable,
};
use crate::model::{Collection, FhirPathValue, TypeRegistry, TypeResolutionError, TypeSpecifier};
use crate::registry::{FunctionCall, FunctionLibrary};
use chrono::{DateTime, FixedOffset, Local};
use std::cell::Cell;

const UCUM_URL: &str = "http://unitsofmeasure.org";
const SNOMED_URL: &str = "http://snomed.info/sct";
const LOINC_URL: &str = "http://loinc.org";

/// Iteration bindings: `$this`, `$index` and `$total`
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    pub(crate) this: Collection,
    pub(crate) index: Option<usize>,
    pub(crate) total: Option<Collection>,
}

impl Scope {
    fn root(root: &Collection) -> Self {
        Self {
            this: root.clone(),
            index: None,
            total: None,
        }
    }

    /// Child scope for one item of an iteration; `$total` carries over
    pub(crate) fn item(&self, item: FhirPathValue, index: usize) -> Self {
        Self {
            this: Collection::single(item),
            index: Some(index),
            total: self.total.clone(),
        }
    }

    pub(crate) fn with_total(mut self, total: Collection) -> Self {
        self.total = Some(total);
        self
    }
}

pub(crate) struct Interpreter<'e> {
    context: &'e EvaluationContext,
    types: &'e TypeRegistry,
    functions: &'e FunctionLibrary,
    root: Collection,
    now: DateTime<FixedOffset>,
    depth: Cell<usize>,
}

impl<'e> Interpreter<'e> {
    pub(crate) fn new(context: &'e EvaluationContext, root: Collection) -> EvaluationResult<Self> {
        context.check_configured()?;
        Ok(Self {
            context,
            types: context.types()?,
            functions: context.functions()?,
            root,
            now: Local::now().fixed_offset(),
            depth: Cell::new(0),
        })
    }

    /// Evaluate `node` with the root as focus and `$this`
    pub(crate) fn run(&self, node: &ExpressionNode) -> EvaluationResult<Collection> {
        let scope = Scope::root(&self.root);
        self.evaluate(node, &self.root, &scope)
    }

    pub(crate) fn types(&self) -> &TypeRegistry {
        self.types
    }

    pub(crate) fn namespace(&self) -> &str {
        self.context.namespace()
    }

    pub(crate) fn config(&self) -> &EvaluationConfig {
        self.context.config()
    }

    pub(crate) fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    /// Evaluate `node` against `focus`, checking depth and cancellation first
    pub(crate) fn evaluate(
        &self,
        node: &ExpressionNode,
        focus: &Collection,
        scope: &Scope,
    ) -> EvaluationResult<Collection> {
        let config = self.context.config();
        if config.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }
        let depth = self.depth.get() + 1;
        if depth > config.max_recursion_depth {
            return Err(EvaluationError::RecursionLimit {
                limit: config.max_recursion_depth,
            });
        }

        self.depth.set(depth);
        let result = self.evaluate_node(node, focus, scope);
        self.depth.set(depth - 1);
        result
    }

    fn evaluate_node(
        &self,
        node: &ExpressionNode,
        focus: &Collection,
        scope: &Scope,
    ) -> EvaluationResult<Collection> {
        match node {
            ExpressionNode::Literal(literal) => Ok(literal.to_collection()),
            ExpressionNode::Identifier(name) => self.identifier(name, focus),
            ExpressionNode::Path { base, name } => {
                if let Some(target) = self.qualified_type(base, name, focus)? {
                    return self.filter_by_type(focus, &target);
                }
                let base = self.evaluate(base, focus, scope)?;
                self.navigate(&base, name)
            }
            ExpressionNode::Index { base, index } => {
                let base = self.evaluate(base, focus, scope)?;
                let index = self.evaluate(index, focus, scope)?;
                self.index(base, &index)
            }
            ExpressionNode::FunctionCall(call) => {
                self.invoke(&call.name, &call.args, focus.clone(), scope)
            }
            ExpressionNode::MethodCall(call) => {
                let input = self.evaluate(&call.base, focus, scope)?;
                self.invoke(&call.name, &call.args, input, scope)
            }
            ExpressionNode::BinaryOp(data) => self.binary(data, focus, scope),
            ExpressionNode::UnaryOp { op, operand } => {
                let operand = self.evaluate(operand, focus, scope)?;
                operators::unary(*op, &operand)
            }
            ExpressionNode::Union { left, right } => {
                let left = self.evaluate(left, focus, scope)?;
                let right = self.evaluate(right, focus, scope)?;
                Ok(operators::union(&left, &right))
            }
            ExpressionNode::TypeOperation {
                op,
                expression,
                type_name,
            } => {
                let value = self.evaluate(expression, focus, scope)?;
                let target = self.resolve_type(type_name)?;
                match op {
                    TypeOperator::Is => match operators::singleton(&value, "is")? {
                        Some(item) => Ok(Collection::single(FhirPathValue::Boolean(
                            self.is_of_type(item, &target)?,
                        ))),
                        None => Ok(Collection::empty()),
                    },
                    TypeOperator::As => self.filter_by_type(&value, &target),
                }
            }
            ExpressionNode::Variable(variable) => self.variable(variable, scope),
        }
    }

    /// Leading identifier: a declared property wins, then a type-name filter
    fn identifier(&self, name: &str, focus: &Collection) -> EvaluationResult<Collection> {
        if self.declares_property(focus, name)? {
            return self.navigate(focus, name);
        }
        match self.types.resolve_name(None, name, self.namespace()) {
            Ok(target) => {
                let target = target.clone();
                self.filter_by_type(focus, &target)
            }
            Err(_) => Ok(Collection::empty()),
        }
    }

    /// `Namespace.Type` at the start of a path, when `Namespace` is not a property
    fn qualified_type(
        &self,
        base: &ExpressionNode,
        name: &str,
        focus: &Collection,
    ) -> EvaluationResult<Option<TypeSpecifier>> {
        let ExpressionNode::Identifier(namespace) = base else {
            return Ok(None);
        };
        if !self.types.has_namespace(namespace) || self.declares_property(focus, namespace)? {
            return Ok(None);
        }
        let target = self.types.resolve_name(Some(namespace), name, self.namespace())?;
        Ok(Some(target.clone()))
    }

    fn declares_property(&self, focus: &Collection, name: &str) -> EvaluationResult<bool> {
        for item in focus {
            let declared = match item {
                FhirPathValue::Object(object) => self
                    .types
                    .property_type(object.type_specifier(), name)?
                    .is_some(),
                FhirPathValue::Quantity(_) => matches!(name, "value" | "unit"),
                FhirPathValue::TypeInfo(_) => matches!(name, "namespace" | "name"),
                _ => false,
            };
            if declared {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Path step: concatenate the property values of every input item
    fn navigate(&self, input: &Collection, name: &str) -> EvaluationResult<Collection> {
        let mut result = Collection::new();
        for item in input {
            match item {
                FhirPathValue::Object(object) => {
                    let Some(declared) = self.types.property_type(object.type_specifier(), name)?
                    else {
                        continue;
                    };
                    let element = declared.element_type();
                    if !element.is_anonymous() && self.types.resolve(&element).is_none() {
                        return Err(TypeResolutionError::unknown(element.qualified_name()).into());
                    }
                    result.extend(object.property(name, declared, self.types));
                }
                FhirPathValue::Quantity(quantity) => match name {
                    "value" => result.push(FhirPathValue::Decimal(quantity.value)),
                    "unit" => result.push(FhirPathValue::string(quantity.unit())),
                    _ => {}
                },
                FhirPathValue::TypeInfo(ts) => match name {
                    "namespace" => result.push(FhirPathValue::string(ts.namespace.clone())),
                    "name" => result.push(FhirPathValue::string(ts.name.clone())),
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(result)
    }

    fn index(&self, base: Collection, index: &Collection) -> EvaluationResult<Collection> {
        let Some(value) = operators::singleton(index, "[]")? else {
            return Ok(Collection::empty());
        };
        let position = value
            .as_integer()
            .ok_or_else(|| EvaluationError::type_mismatch("[]", value.type_name()))?;

        Ok(usize::try_from(position)
            .ok()
            .and_then(|i| base.into_vec().into_iter().nth(i))
            .map(Collection::single)
            .unwrap_or_default())
    }

    fn invoke(
        &self,
        name: &str,
        args: &[ExpressionNode],
        input: Collection,
        scope: &Scope,
    ) -> EvaluationResult<Collection> {
        let entry = self.functions.lookup(self.namespace(), name, args.len())?;
        log::trace!(
            "Dispatching {}.{}/{} on {} value(s)",
            entry.metadata.namespace,
            name,
            args.len(),
            input.len()
        );
        let mut call = FunctionCall::new(name, input, args, self, scope);
        (entry.implementation)(&mut call)
    }

    fn binary(
        &self,
        data: &BinaryOpData,
        focus: &Collection,
        scope: &Scope,
    ) -> EvaluationResult<Collection> {
        let op = data.op;
        if !matches!(
            op,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Implies
        ) {
            let left = self.evaluate(&data.left, focus, scope)?;
            let right = self.evaluate(&data.right, focus, scope)?;
            return operators::binary(op, &left, &right);
        }

        let left = self.evaluate(&data.left, focus, scope)?;
        let left = operators::to_boolean(&left, op.symbol())?;
        let decided = match (op, left) {
            (BinaryOperator::And, Some(false)) => Some(false),
            (BinaryOperator::Or, Some(true)) | (BinaryOperator::Implies, Some(false)) => Some(true),
            _ => None,
        };
        if decided.is_some() {
            return Ok(operators::boolean_result(decided));
        }

        let right = self.evaluate(&data.right, focus, scope)?;
        let right = operators::to_boolean(&right, op.symbol())?;
        Ok(operators::boolean_result(operators::logical(op, left, right)))
    }

    fn variable(&self, variable: &Variable, scope: &Scope) -> EvaluationResult<Collection> {
        match variable {
            Variable::This => Ok(scope.this.clone()),
            Variable::Index => Ok(scope
                .index
                .and_then(|i| i64::try_from(i).ok())
                .map(|i| Collection::single(FhirPathValue::Integer(i)))
                .unwrap_or_default()),
            Variable::Total => Ok(scope.total.clone().unwrap_or_default()),
            Variable::External(name) => {
                if let Some(value) = self.context.variable(name) {
                    return Ok(value.clone());
                }
                match name.as_str() {
                    "context" | "resource" | "rootResource" => Ok(self.root.clone()),
                    "ucum" => Ok(Collection::single(FhirPathValue::string(UCUM_URL))),
                    "sct" => Ok(Collection::single(FhirPathValue::string(SNOMED_URL))),
                    "loinc" => Ok(Collection::single(FhirPathValue::string(LOINC_URL))),
                    _ => Err(EvaluationError::VariableNotFound { name: name.clone() }),
                }
            }
        }
    }

    /// Resolve a written type name with the context's default namespace
    pub(crate) fn resolve_type(&self, type_name: &TypeName) -> EvaluationResult<TypeSpecifier> {
        let resolved = self.types.resolve_name(
            type_name.namespace.as_deref(),
            &type_name.name,
            self.namespace(),
        )?;
        Ok(resolved.clone())
    }

    pub(crate) fn is_of_type(
        &self,
        value: &FhirPathValue,
        target: &TypeSpecifier,
    ) -> EvaluationResult<bool> {
        Ok(self.types.is_subtype(value.type_specifier(), target)?)
    }

    /// Keep the values that are instances of `target`, unchanged
    pub(crate) fn filter_by_type(
        &self,
        input: &Collection,
        target: &TypeSpecifier,
    ) -> EvaluationResult<Collection> {
        let mut result = Collection::new();
        for item in input {
            if self.is_of_type(item, target)? {
                result.push(item.clone());
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::model::{ClassInfo, DynamicObject, TypeInfo};
    use crate::parser::parse;
    use crate::registry::FunctionLibrary;
    use pretty_assertions::assert_eq;

    fn fhir(name: &str) -> TypeSpecifier {
        TypeSpecifier::new("FHIR", name)
    }

    fn context() -> EvaluationContext {
        let types = TypeRegistry::register([
            TypeInfo::from(ClassInfo::new(fhir("Base"))),
            ClassInfo::new(fhir("Resource")).with_base(fhir("Base")).into(),
            ClassInfo::new(fhir("Patient"))
                .with_base(fhir("Resource"))
                .with_element("active", TypeSpecifier::system("Boolean"))
                .with_element("alias", TypeSpecifier::list("System", "String"))
                .into(),
        ])
        .unwrap();
        EvaluationContext::root()
            .with_namespace("FHIR")
            .with_types(types)
            .with_functions(FunctionLibrary::standard())
    }

    fn patient() -> FhirPathValue {
        DynamicObject::new(fhir("Patient"))
            .with_property("active", FhirPathValue::Boolean(true))
            .with_property(
                "alias",
                vec![FhirPathValue::string("a"), FhirPathValue::string("b")],
            )
            .into_value()
    }

    fn run(expression: &str) -> EvaluationResult<Collection> {
        evaluate(&parse(expression).unwrap(), patient(), &context())
    }

    #[test]
    fn test_type_name_filters_the_focus() {
        assert_eq!(run("Patient.alias").unwrap().len(), 2);
        assert_eq!(run("FHIR.Patient.alias").unwrap().len(), 2);
        assert_eq!(run("Resource.active").unwrap().len(), 1);
        assert!(run("Observation.active").unwrap().is_empty());
    }

    #[test]
    fn test_undeclared_property_is_empty() {
        assert!(run("Patient.telecom").unwrap().is_empty());
        assert!(run("alias.length").unwrap().is_empty());
    }

    #[test]
    fn test_short_circuit_skips_the_right_operand() {
        assert_eq!(
            run("false and alias.single()").unwrap(),
            Collection::single(FhirPathValue::Boolean(false))
        );
        assert!(matches!(
            run("true and alias.single()"),
            Err(EvaluationError::SingletonExpected { .. })
        ));
    }

    #[test]
    fn test_unknown_qualified_type_is_an_error() {
        assert!(matches!(
            run("active is FHIR.Nope"),
            Err(EvaluationError::TypeResolution(_))
        ));
    }

    #[test]
    fn test_builtin_variables() {
        assert_eq!(run("%resource.active").unwrap().len(), 1);
        assert_eq!(
            run("%ucum").unwrap(),
            Collection::single(FhirPathValue::string(UCUM_URL))
        );
        assert!(matches!(
            run("%missing"),
            Err(EvaluationError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn test_recursion_limit() {
        let context = context().with_config(EvaluationConfig::new().with_max_recursion_depth(4));
        let ast = parse("1 + (2 + (3 + (4 + 5)))").unwrap();
        assert!(matches!(
            evaluate(&ast, patient(), &context),
            Err(EvaluationError::RecursionLimit { limit: 4 })
        ));
    }

    #[test]
    fn test_default_depth_limit_holds_on_a_small_stack() {
        // Trees built directly skip the parser's nesting limit.
        let outcome = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let one = || ExpressionNode::literal(crate::ast::LiteralValue::Integer(1));
                let mut ast = one();
                for _ in 0..300 {
                    ast = ExpressionNode::binary_op(crate::ast::BinaryOperator::Add, ast, one());
                }
                match evaluate(&ast, patient(), &context()) {
                    Err(EvaluationError::RecursionLimit { limit }) => Some(limit),
                    _ => None,
                }
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(outcome, Some(crate::evaluator::config::DEFAULT_MAX_RECURSION_DEPTH));
    }

    #[test]
    fn test_unconfigured_context_fails_fast() {
        let ast = parse("1").unwrap();
        assert!(matches!(
            evaluate(&ast, patient(), &EvaluationContext::root()),
            Err(EvaluationError::Configuration { .. })
        ));
    }
}
