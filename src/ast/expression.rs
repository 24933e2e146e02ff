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

//! FHIRPath expression AST
//!
//! Nodes are immutable once built by the parser and may be evaluated any
//! number of times. `Display` prints text that parses back to an equal tree.

use std::fmt;

use smallvec::SmallVec;

use super::literal::{LiteralValue, write_quoted};
use super::operator::{
    BinaryOperator, POSTFIX_PRECEDENCE, PRIMARY_PRECEDENCE, TYPE_PRECEDENCE, TypeOperator,
    UNARY_PRECEDENCE, UNION_PRECEDENCE, UnaryOperator,
};
use crate::parser::tokenizer::is_keyword;

/// Call arguments; most invocations take at most a few
pub type Arguments = SmallVec<[ExpressionNode; 4]>;

/// The main expression node representing any FHIRPath expression
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Literal value (string, number, boolean, temporal, quantity or `{}`)
    Literal(LiteralValue),

    /// Leading identifier (e.g. `Patient`, `name`)
    Identifier(String),

    /// Property navigation (e.g. `Patient.name`)
    Path {
        /// Navigated expression
        base: Box<ExpressionNode>,
        /// Property name
        name: String,
    },

    /// Index access (e.g. `name[0]`)
    Index {
        /// Indexed expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },

    /// Function call without an explicit focus (e.g. `today()`)
    FunctionCall(Box<FunctionCallData>),

    /// Function call on an expression (e.g. `name.where(use = 'official')`)
    MethodCall(Box<MethodCallData>),

    /// Binary operation (e.g. `age > 18`)
    BinaryOp(Box<BinaryOpData>),

    /// Unary operation (e.g. `-5`, `not active`)
    UnaryOp {
        /// Unary operator
        op: UnaryOperator,
        /// Operand expression
        operand: Box<ExpressionNode>,
    },

    /// Collection union (`a | b`)
    Union {
        /// Left operand
        left: Box<ExpressionNode>,
        /// Right operand
        right: Box<ExpressionNode>,
    },

    /// Type test or filter (`value is Quantity`, `value as string`)
    TypeOperation {
        /// `is` or `as`
        op: TypeOperator,
        /// Tested expression
        expression: Box<ExpressionNode>,
        /// Target type
        type_name: TypeName,
    },

    /// Variable reference (`$this`, `%resource`)
    Variable(Variable),
}

/// Function call data
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallData {
    /// Function name
    pub name: String,
    /// Argument expressions
    pub args: Arguments,
}

/// Method call data
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallData {
    /// Focus expression
    pub base: ExpressionNode,
    /// Function name
    pub name: String,
    /// Argument expressions
    pub args: Arguments,
}

/// Binary operation data
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOpData {
    /// Operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Variables that can be referenced in an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    /// `$this`, the current focus item
    This,
    /// `$index`, position of the current item in an iteration
    Index,
    /// `$total`, the accumulator in `aggregate()`
    Total,
    /// `%name`, an externally bound constant
    External(String),
}

/// A possibly qualified type name (`Patient`, `FHIR.Patient`, `System.String`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    /// Explicit namespace, if given
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
}

impl TypeName {
    /// An unqualified type name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// A namespace-qualified type name
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write_identifier(f, namespace, false)?;
            f.write_str(".")?;
            write_identifier(f, &self.name, true)
        } else {
            write_identifier(f, &self.name, false)
        }
    }
}

impl ExpressionNode {
    /// Create a literal node
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create an identifier node
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a property navigation node
    pub fn path(base: ExpressionNode, name: impl Into<String>) -> Self {
        Self::Path {
            base: Box::new(base),
            name: name.into(),
        }
    }

    /// Create an index access node
    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Create a function call node
    pub fn function_call(name: impl Into<String>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::FunctionCall(Box::new(FunctionCallData {
            name: name.into(),
            args: args.into_iter().collect(),
        }))
    }

    /// Create a method call node
    pub fn method_call(
        base: ExpressionNode,
        name: impl Into<String>,
        args: impl IntoIterator<Item = Self>,
    ) -> Self {
        Self::MethodCall(Box::new(MethodCallData {
            base,
            name: name.into(),
            args: args.into_iter().collect(),
        }))
    }

    /// Create a binary operation node
    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    /// Create a unary operation node
    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a union node
    pub fn union(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a type operation node
    pub fn type_operation(op: TypeOperator, expression: ExpressionNode, type_name: TypeName) -> Self {
        Self::TypeOperation {
            op,
            expression: Box::new(expression),
            type_name,
        }
    }

    /// Create a variable reference node
    pub fn variable(variable: Variable) -> Self {
        Self::Variable(variable)
    }

    /// Interpret this node as a type name, as in `ofType(FHIR.Patient)`
    pub fn as_type_name(&self) -> Option<TypeName> {
        match self {
            Self::Identifier(name) => Some(TypeName::new(name.clone())),
            Self::Path { base, name } => match base.as_ref() {
                Self::Identifier(namespace) => {
                    Some(TypeName::qualified(namespace.clone(), name.clone()))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Get a human-readable description of the node type
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::Path { .. } => "path",
            Self::Index { .. } => "index access",
            Self::FunctionCall(_) => "function call",
            Self::MethodCall(_) => "method call",
            Self::BinaryOp(_) => "binary operation",
            Self::UnaryOp { .. } => "unary operation",
            Self::Union { .. } => "union",
            Self::TypeOperation { .. } => "type operation",
            Self::Variable(_) => "variable",
        }
    }

    /// Count the total number of nodes in this AST subtree
    pub fn node_count(&self) -> usize {
        1 + match self {
            Self::Literal(_) | Self::Identifier(_) | Self::Variable(_) => 0,
            Self::Path { base, .. } => base.node_count(),
            Self::Index { base, index } => base.node_count() + index.node_count(),
            Self::FunctionCall(call) => call.args.iter().map(Self::node_count).sum(),
            Self::MethodCall(call) => {
                call.base.node_count() + call.args.iter().map(Self::node_count).sum::<usize>()
            }
            Self::BinaryOp(data) => data.left.node_count() + data.right.node_count(),
            Self::UnaryOp { operand, .. } => operand.node_count(),
            Self::Union { left, right } => left.node_count() + right.node_count(),
            Self::TypeOperation { expression, .. } => expression.node_count(),
        }
    }

    /// Binding strength of this node when printed
    pub fn precedence(&self) -> u8 {
        match self {
            Self::BinaryOp(data) => data.op.precedence(),
            Self::Union { .. } => UNION_PRECEDENCE,
            Self::TypeOperation { .. } => TYPE_PRECEDENCE,
            Self::UnaryOp { .. } => UNARY_PRECEDENCE,
            Self::Path { .. } | Self::Index { .. } | Self::MethodCall(_) => POSTFIX_PRECEDENCE,
            // Negative numbers print with a sign and need grouping.
            Self::Literal(LiteralValue::Integer(i)) if *i < 0 => UNARY_PRECEDENCE,
            Self::Literal(LiteralValue::Decimal(d)) if d.is_sign_negative() => UNARY_PRECEDENCE,
            _ => PRIMARY_PRECEDENCE,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Write an identifier, delimiting it with backticks when it would not
/// tokenize back as the same name
fn write_identifier(f: &mut fmt::Formatter<'_>, name: &str, after_dot: bool) -> fmt::Result {
    let reserved = !after_dot && (is_keyword(name) || name == "not");
    if is_plain_identifier(name) && !reserved {
        f.write_str(name)
    } else {
        write_quoted(f, name, '`')
    }
}

fn write_arguments(f: &mut fmt::Formatter<'_>, args: &[ExpressionNode]) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::This => f.write_str("$this"),
            Self::Index => f.write_str("$index"),
            Self::Total => f.write_str("$total"),
            Self::External(name) => {
                f.write_str("%")?;
                if is_plain_identifier(name) {
                    f.write_str(name)
                } else {
                    write_quoted(f, name, '`')
                }
            }
        }
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Identifier(name) => write_identifier(f, name, false),
            Self::Path { base, name } => {
                base.fmt_operand(f, POSTFIX_PRECEDENCE)?;
                f.write_str(".")?;
                write_identifier(f, name, true)
            }
            Self::Index { base, index } => {
                base.fmt_operand(f, POSTFIX_PRECEDENCE)?;
                write!(f, "[{index}]")
            }
            Self::FunctionCall(call) => {
                // `not(x)` would read back as prefix negation.
                if call.name == "not" && !call.args.is_empty() {
                    write_quoted(f, &call.name, '`')?;
                } else {
                    write_identifier(f, &call.name, true)?;
                }
                write_arguments(f, &call.args)
            }
            Self::MethodCall(call) => {
                call.base.fmt_operand(f, POSTFIX_PRECEDENCE)?;
                f.write_str(".")?;
                write_identifier(f, &call.name, true)?;
                write_arguments(f, &call.args)
            }
            Self::BinaryOp(data) => {
                let precedence = data.op.precedence();
                data.left.fmt_operand(f, precedence)?;
                write!(f, " {} ", data.op)?;
                data.right.fmt_operand(f, precedence + 1)
            }
            Self::UnaryOp { op, operand } => {
                match op {
                    UnaryOperator::Not => f.write_str("not ")?,
                    _ => write!(f, "{op}")?,
                }
                // Keep `- -x` from printing as `--x`.
                if matches!(operand.as_ref(), Self::UnaryOp { .. }) && *op != UnaryOperator::Not {
                    f.write_str(" ")?;
                }
                operand.fmt_operand(f, UNARY_PRECEDENCE)
            }
            Self::Union { left, right } => {
                left.fmt_operand(f, UNION_PRECEDENCE)?;
                f.write_str(" | ")?;
                right.fmt_operand(f, UNION_PRECEDENCE + 1)
            }
            Self::TypeOperation {
                op,
                expression,
                type_name,
            } => {
                expression.fmt_operand(f, TYPE_PRECEDENCE)?;
                write!(f, " {op} {type_name}")
            }
            Self::Variable(variable) => write!(f, "{variable}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_construction() {
        let expr = ExpressionNode::identifier("Patient");
        assert_eq!(expr.node_type(), "identifier");
        assert_eq!(expr.to_string(), "Patient");
    }

    #[test]
    fn test_path_and_method_call() {
        let expr = ExpressionNode::method_call(
            ExpressionNode::path(ExpressionNode::identifier("Patient"), "name"),
            "count",
            [],
        );
        assert_eq!(expr.to_string(), "Patient.name.count()");
        assert_eq!(expr.node_count(), 3);
    }

    #[test]
    fn test_binary_operands_are_grouped_by_precedence() {
        let sum = ExpressionNode::binary_op(
            BinaryOperator::Add,
            ExpressionNode::literal(LiteralValue::Integer(1)),
            ExpressionNode::literal(LiteralValue::Integer(2)),
        );
        let product = ExpressionNode::binary_op(
            BinaryOperator::Multiply,
            sum.clone(),
            ExpressionNode::literal(LiteralValue::Integer(3)),
        );
        assert_eq!(product.to_string(), "(1 + 2) * 3");

        let nested = ExpressionNode::binary_op(
            BinaryOperator::Subtract,
            ExpressionNode::literal(LiteralValue::Integer(5)),
            sum,
        );
        assert_eq!(nested.to_string(), "5 - (1 + 2)");
    }

    #[test]
    fn test_keyword_identifiers_are_delimited() {
        assert_eq!(ExpressionNode::identifier("div").to_string(), "`div`");
        assert_eq!(ExpressionNode::identifier("not").to_string(), "`not`");
        assert_eq!(
            ExpressionNode::path(ExpressionNode::identifier("x"), "contains").to_string(),
            "x.contains"
        );
        assert_eq!(ExpressionNode::identifier("given name").to_string(), "`given name`");
    }

    #[test]
    fn test_type_operation_display() {
        let expr = ExpressionNode::type_operation(
            TypeOperator::Is,
            ExpressionNode::identifier("value"),
            TypeName::qualified("FHIR", "Quantity"),
        );
        assert_eq!(expr.to_string(), "value is FHIR.Quantity");
    }

    #[test]
    fn test_variables() {
        assert_eq!(ExpressionNode::variable(Variable::This).to_string(), "$this");
        assert_eq!(
            ExpressionNode::variable(Variable::External("resource".into())).to_string(),
            "%resource"
        );
        assert_eq!(
            ExpressionNode::variable(Variable::External("us-zip".into())).to_string(),
            "%`us-zip`"
        );
    }

    #[test]
    fn test_as_type_name() {
        assert_eq!(
            ExpressionNode::identifier("Resource").as_type_name(),
            Some(TypeName::new("Resource"))
        );
        assert_eq!(
            ExpressionNode::path(ExpressionNode::identifier("System"), "String").as_type_name(),
            Some(TypeName::qualified("System", "String"))
        );
        assert_eq!(ExpressionNode::literal(LiteralValue::Integer(1)).as_type_name(), None);
    }
}
