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

//! Operator semantics over collections
//!
//! Every operator here sees fully evaluated operands. The short-circuiting
//! boolean operators live in the interpreter because they decide whether the
//! right operand is evaluated at all.

use super::error::{EvaluationError, EvaluationResult};
use crate::ast::{BinaryOperator, UnaryOperator};
use crate::model::{CalendarUnit, Collection, FhirPathValue, Quantity};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;

/// The optional single value of `collection`; several values are an error
pub(crate) fn singleton<'c>(
    collection: &'c Collection,
    operation: &str,
) -> EvaluationResult<Option<&'c FhirPathValue>> {
    match collection.len() {
        0 => Ok(None),
        1 => Ok(collection.first()),
        count => Err(EvaluationError::singleton_expected(operation, count)),
    }
}

/// Singleton evaluation of a collection as a boolean.
///
/// Empty is unknown, a boolean is itself, any other single value is true.
pub(crate) fn to_boolean(collection: &Collection, operation: &str) -> EvaluationResult<Option<bool>> {
    Ok(singleton(collection, operation)?.map(|value| value.as_boolean().unwrap_or(true)))
}

pub(crate) fn boolean_result(value: Option<bool>) -> Collection {
    value
        .map(|b| Collection::single(FhirPathValue::Boolean(b)))
        .unwrap_or_default()
}

/// Collection equality: unknown if either side is empty or a pair is indeterminate
pub(crate) fn equals(left: &Collection, right: &Collection) -> Option<bool> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    if left.len() != right.len() {
        return Some(false);
    }

    let mut indeterminate = false;
    for (l, r) in left.iter().zip(right) {
        match l.equals(r) {
            Some(false) => return Some(false),
            None => indeterminate = true,
            Some(true) => {}
        }
    }
    (!indeterminate).then_some(true)
}

/// Collection equivalence: order-independent and never unknown
pub(crate) fn equivalent(left: &Collection, right: &Collection) -> bool {
    if left.len() != right.len() {
        return false;
    }

    let mut used = vec![false; right.len()];
    left.iter().all(|l| {
        let found = right
            .iter()
            .enumerate()
            .position(|(i, r)| !used[i] && l.equivalent(r));
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Union with duplicates removed, left values first
pub(crate) fn union(left: &Collection, right: &Collection) -> Collection {
    left.iter()
        .chain(right)
        .cloned()
        .collect::<Collection>()
        .distinct()
}

/// Evaluate a non-short-circuiting binary operator
pub(crate) fn binary(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    use BinaryOperator::*;

    match op {
        Equal => Ok(boolean_result(equals(left, right))),
        NotEqual => Ok(boolean_result(equals(left, right).map(|b| !b))),
        Equivalent => Ok(boolean_result(Some(equivalent(left, right)))),
        NotEquivalent => Ok(boolean_result(Some(!equivalent(left, right)))),
        LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            compare(op, left, right)
        }
        Add | Subtract | Multiply | Divide | IntegerDivide | Modulo => {
            let (Some(l), Some(r)) = (
                singleton(left, op.symbol())?,
                singleton(right, op.symbol())?,
            ) else {
                return Ok(Collection::empty());
            };
            Ok(arithmetic(op, l, r)?.map(Collection::single).unwrap_or_default())
        }
        Concatenate => concatenate(left, right),
        In => membership(left, right, op),
        Contains => membership(right, left, op),
        And | Or | Xor | Implies => {
            let l = to_boolean(left, op.symbol())?;
            let r = to_boolean(right, op.symbol())?;
            Ok(boolean_result(logical(op, l, r)))
        }
    }
}

/// Three-valued boolean logic; `None` is the empty collection
pub(crate) fn logical(op: BinaryOperator, left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match op {
        BinaryOperator::And => match (left, right) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOperator::Or => match (left, right) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        BinaryOperator::Xor => left.zip(right).map(|(l, r)| l != r),
        BinaryOperator::Implies => match (left, right) {
            (Some(false), _) | (_, Some(true)) => Some(true),
            (Some(true), right) => right,
            (None, _) => None,
        },
        _ => None,
    }
}

fn mismatch(op: &str, left: &FhirPathValue, right: &FhirPathValue) -> EvaluationError {
    EvaluationError::type_mismatch(op, format!("{} and {}", left.type_name(), right.type_name()))
}

fn compare(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    let (Some(l), Some(r)) = (
        singleton(left, op.symbol())?,
        singleton(right, op.symbol())?,
    ) else {
        return Ok(Collection::empty());
    };

    let Some(ordering) = ordering(op.symbol(), l, r)? else {
        return Ok(Collection::empty());
    };
    let result = match op {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Collection::single(FhirPathValue::Boolean(result)))
}

/// Ordering of two single values; `None` when precision leaves it open
pub(crate) fn ordering(
    op: &str,
    left: &FhirPathValue,
    right: &FhirPathValue,
) -> EvaluationResult<Option<Ordering>> {
    use crate::model::PrecisionDateTime;
    use FhirPathValue::*;

    let ordering = match (left.primitive(), right.primitive()) {
        (Integer(l), Integer(r)) => Some(l.cmp(r)),
        (Integer(_) | Decimal(_), Integer(_) | Decimal(_)) => {
            left.as_decimal().zip(right.as_decimal()).map(|(l, r)| l.cmp(&r))
        }
        (String(l), String(r)) => Some(l.cmp(r)),
        (Date(l), Date(r)) => l.partial_compare(r),
        (DateTime(l), DateTime(r)) => l.partial_compare(r),
        (Date(l), DateTime(r)) => PrecisionDateTime::from_date(l).partial_compare(r),
        (DateTime(l), Date(r)) => l.partial_compare(&PrecisionDateTime::from_date(r)),
        (Time(l), Time(r)) => l.partial_compare(r),
        (Quantity(l), Quantity(r)) => l.partial_compare(r),
        _ => return Err(mismatch(op, left, right)),
    };
    Ok(ordering)
}

/// Arithmetic on two single values; `None` on overflow, division by zero or
/// incompatible quantity units
pub(crate) fn arithmetic(
    op: BinaryOperator,
    left: &FhirPathValue,
    right: &FhirPathValue,
) -> EvaluationResult<Option<FhirPathValue>> {
    use FhirPathValue as V;

    let symbol = op.symbol();
    let result = match (op, left.primitive(), right.primitive()) {
        (BinaryOperator::Add, V::String(l), V::String(r)) => Some(V::String(format!("{l}{r}"))),

        (_, V::Integer(l), V::Integer(r)) => integer_arithmetic(op, *l, *r),
        (_, V::Integer(_) | V::Decimal(_), V::Integer(_) | V::Decimal(_)) => {
            match left.as_decimal().zip(right.as_decimal()) {
                Some((l, r)) => decimal_arithmetic(op, l, r),
                None => None,
            }
        }

        (BinaryOperator::Add, V::Quantity(l), V::Quantity(r)) => l.add(r).map(V::Quantity),
        (BinaryOperator::Subtract, V::Quantity(l), V::Quantity(r)) => {
            l.subtract(r).map(V::Quantity)
        }
        (BinaryOperator::Multiply, V::Quantity(q), V::Integer(_) | V::Decimal(_)) => {
            right.as_decimal().and_then(|n| q.scale(n)).map(V::Quantity)
        }
        (BinaryOperator::Multiply, V::Integer(_) | V::Decimal(_), V::Quantity(q)) => {
            left.as_decimal().and_then(|n| q.scale(n)).map(V::Quantity)
        }
        (BinaryOperator::Divide, V::Quantity(q), V::Integer(_) | V::Decimal(_)) => right
            .as_decimal()
            .filter(|n| !n.is_zero())
            .and_then(|n| q.value.checked_div(n))
            .map(|value| V::Quantity(Quantity::new(value, q.unit.clone()))),
        (BinaryOperator::Divide, V::Quantity(l), V::Quantity(r)) => {
            if l.partial_compare(r).is_none() || r.value.is_zero() {
                None
            } else {
                l.value
                    .checked_div(r.value)
                    .map(|value| V::Quantity(Quantity::unitless(value)))
            }
        }

        (BinaryOperator::Add | BinaryOperator::Subtract, temporal, V::Quantity(q))
            if matches!(temporal, V::Date(_) | V::DateTime(_) | V::Time(_)) =>
        {
            let unit = q
                .calendar_unit()
                .ok_or_else(|| mismatch(symbol, left, right))?;
            let Some(mut amount) = q.value.trunc().to_i64() else {
                return Ok(None);
            };
            if op == BinaryOperator::Subtract {
                amount = match amount.checked_neg() {
                    Some(negated) => negated,
                    None => return Ok(None),
                };
            }
            shift_temporal(temporal, amount, unit)
        }

        _ => return Err(mismatch(symbol, left, right)),
    };
    Ok(result)
}

fn integer_arithmetic(op: BinaryOperator, l: i64, r: i64) -> Option<FhirPathValue> {
    use BinaryOperator::*;

    match op {
        Add => l.checked_add(r).map(FhirPathValue::Integer),
        Subtract => l.checked_sub(r).map(FhirPathValue::Integer),
        Multiply => l.checked_mul(r).map(FhirPathValue::Integer),
        IntegerDivide => l.checked_div(r).map(FhirPathValue::Integer),
        Modulo => l.checked_rem(r).map(FhirPathValue::Integer),
        // Integer division through `/` always yields a decimal.
        _ => decimal_arithmetic(op, Decimal::from(l), Decimal::from(r)),
    }
}

fn decimal_arithmetic(op: BinaryOperator, l: Decimal, r: Decimal) -> Option<FhirPathValue> {
    use BinaryOperator::*;

    match op {
        Add => l.checked_add(r).map(FhirPathValue::Decimal),
        Subtract => l.checked_sub(r).map(FhirPathValue::Decimal),
        Multiply => l.checked_mul(r).map(FhirPathValue::Decimal),
        Divide => l
            .checked_div(r)
            .map(|d| FhirPathValue::Decimal(d.normalize())),
        IntegerDivide => l
            .checked_div(r)
            .and_then(|d| d.trunc().to_i64())
            .map(FhirPathValue::Integer),
        Modulo => l.checked_rem(r).map(FhirPathValue::Decimal),
        _ => None,
    }
}

fn shift_temporal(value: &FhirPathValue, amount: i64, unit: CalendarUnit) -> Option<FhirPathValue> {
    match value {
        FhirPathValue::Date(date) => date.add(amount, unit).map(FhirPathValue::Date),
        FhirPathValue::DateTime(datetime) => datetime.add(amount, unit).map(FhirPathValue::DateTime),
        FhirPathValue::Time(time) => time.add(amount, unit).map(FhirPathValue::Time),
        _ => None,
    }
}

/// String concatenation treating empty as `''`
fn concatenate(left: &Collection, right: &Collection) -> EvaluationResult<Collection> {
    let mut text = String::new();
    for operand in [left, right] {
        if let Some(value) = singleton(operand, "&")? {
            match value.as_str() {
                Some(s) => text.push_str(s),
                None => {
                    return Err(EvaluationError::type_mismatch("&", value.type_name()));
                }
            }
        }
    }
    Ok(Collection::single(FhirPathValue::String(text)))
}

/// `item in collection`; also `collection contains item` with operands swapped
fn membership(
    item: &Collection,
    collection: &Collection,
    op: BinaryOperator,
) -> EvaluationResult<Collection> {
    let Some(value) = singleton(item, op.symbol())? else {
        return Ok(Collection::empty());
    };
    Ok(boolean_result(Some(collection.contains_value(value))))
}

/// Evaluate `-`, `+` or prefix `not`
pub(crate) fn unary(op: UnaryOperator, operand: &Collection) -> EvaluationResult<Collection> {
    if op == UnaryOperator::Not {
        return Ok(boolean_result(to_boolean(operand, "not")?.map(|b| !b)));
    }

    let Some(value) = singleton(operand, op.symbol())? else {
        return Ok(Collection::empty());
    };
    let result = match (op, value.primitive()) {
        (UnaryOperator::Positive, FhirPathValue::Integer(_) | FhirPathValue::Decimal(_)) => {
            Some(value.primitive().clone())
        }
        (UnaryOperator::Positive, FhirPathValue::Quantity(_)) => Some(value.primitive().clone()),
        (UnaryOperator::Negate, FhirPathValue::Integer(i)) => {
            i.checked_neg().map(FhirPathValue::Integer)
        }
        (UnaryOperator::Negate, FhirPathValue::Decimal(d)) => Some(FhirPathValue::Decimal(-*d)),
        (UnaryOperator::Negate, FhirPathValue::Quantity(q)) => {
            Some(FhirPathValue::Quantity(q.negate()))
        }
        _ => {
            return Err(EvaluationError::type_mismatch(
                op.symbol(),
                value.type_name(),
            ));
        }
    };
    Ok(result.map(Collection::single).unwrap_or_default())
}
