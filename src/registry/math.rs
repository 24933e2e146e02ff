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

//! Math functions implementation for FHIRPath
//!
//! Results that are not representable (overflow, logarithm of a non-positive
//! number, square root of a negative number) are empty.

use super::{FunctionCall, FunctionCategory, FunctionLibrary};
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, FhirPathValue, Quantity};
use crate::register_function;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

/// The single numeric input as a decimal, `None` when the input is empty
fn decimal_input(call: &FunctionCall<'_>) -> EvaluationResult<Option<Decimal>> {
    match call.singleton_input()? {
        None => Ok(None),
        Some(value) => numeric(value).map(Some).ok_or_else(|| call.type_mismatch(value)),
    }
}

fn numeric(value: &FhirPathValue) -> Option<Decimal> {
    match value.primitive() {
        FhirPathValue::Integer(i) => Some(Decimal::from(*i)),
        FhirPathValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn decimal(value: Option<Decimal>) -> Collection {
    value
        .map(|d| Collection::single(FhirPathValue::Decimal(d.normalize())))
        .unwrap_or_default()
}

/// Decimal to integer, empty when out of range
fn integer(value: Decimal) -> Collection {
    value
        .to_i64()
        .map(|i| Collection::single(FhirPathValue::Integer(i)))
        .unwrap_or_default()
}

/// Apply an integral rounding `f` to the input; integers pass through unchanged
fn rounding(
    call: &FunctionCall<'_>,
    f: impl FnOnce(Decimal) -> Decimal,
) -> EvaluationResult<Collection> {
    match call.singleton_input()? {
        None => Ok(Collection::empty()),
        Some(value) => match value.primitive() {
            FhirPathValue::Integer(i) => Ok(Collection::single(FhirPathValue::Integer(*i))),
            FhirPathValue::Decimal(d) => Ok(integer(f(*d))),
            _ => Err(call.type_mismatch(value)),
        },
    }
}

fn ln(value: Decimal) -> Option<Decimal> {
    if value <= Decimal::ZERO {
        return None;
    }
    value.checked_ln()
}

fn power(base: &FhirPathValue, exponent: &FhirPathValue) -> Option<FhirPathValue> {
    match (base.primitive(), exponent.primitive()) {
        (FhirPathValue::Integer(b), FhirPathValue::Integer(e)) if *e >= 0 => {
            let e = u32::try_from(*e).ok()?;
            b.checked_pow(e).map(FhirPathValue::Integer)
        }
        (b, e) => {
            let base = numeric(b)?;
            let exponent = numeric(e)?;
            if base < Decimal::ZERO && !exponent.fract().is_zero() {
                return None;
            }
            base.checked_powd(exponent)
                .map(|d| FhirPathValue::Decimal(d.normalize()))
        }
    }
}

impl FunctionLibrary {
    pub(crate) fn register_math_functions(&mut self) {
        self.register_abs_function();
        self.register_rounding_functions();
        self.register_exponential_functions();
        self.register_power_functions();
    }

    fn register_abs_function(&mut self) {
        register_function!(
            self,
            "abs",
            category: FunctionCategory::Math,
            description: "Returns the absolute value of the input number or quantity",
            parameters: [],
            return_type: "Integer | Decimal | Quantity",
            examples: ["(-5).abs()", "(-5.5 'mg').abs()"],
            implementation: |call| {
                let Some(value) = call.singleton_input()? else {
                    return Ok(Collection::empty());
                };
                let result = match value.primitive() {
                    FhirPathValue::Integer(i) => {
                        i.checked_abs().map(FhirPathValue::Integer)
                    }
                    FhirPathValue::Decimal(d) => Some(FhirPathValue::Decimal(d.abs())),
                    FhirPathValue::Quantity(q) => Some(FhirPathValue::Quantity(Quantity::new(
                        q.value.abs(),
                        q.unit.clone(),
                    ))),
                    _ => return Err(call.type_mismatch(value)),
                };
                Ok(result.into_iter().collect())
            }
        );
    }

    fn register_rounding_functions(&mut self) {
        register_function!(
            self,
            "ceiling",
            category: FunctionCategory::Math,
            description: "Returns the smallest integer greater than or equal to the input",
            parameters: [],
            return_type: "Integer",
            examples: ["1.1.ceiling()"],
            implementation: |call| rounding(call, |d| d.ceil())
        );
        register_function!(
            self,
            "floor",
            category: FunctionCategory::Math,
            description: "Returns the largest integer less than or equal to the input",
            parameters: [],
            return_type: "Integer",
            examples: ["1.9.floor()"],
            implementation: |call| rounding(call, |d| d.floor())
        );
        register_function!(
            self,
            "truncate",
            category: FunctionCategory::Math,
            description: "Returns the integer part of the input",
            parameters: [],
            return_type: "Integer",
            examples: ["(-1.9).truncate()"],
            implementation: |call| rounding(call, |d| d.trunc())
        );
        register_function!(
            self,
            "round",
            category: FunctionCategory::Math,
            description: "Rounds the input half away from zero to the given number of decimal places",
            parameters: [],
            optional: ["precision": "Integer" => "Number of decimal places, default 0"],
            return_type: "Decimal",
            examples: ["3.14159.round(3)", "2.5.round()"],
            implementation: |call| {
                let Some(value) = decimal_input(call)? else {
                    return Ok(Collection::empty());
                };
                let precision = call.integer_argument(0)?.unwrap_or(0);
                let places = u32::try_from(precision)
                    .map_err(|_| call.invalid_argument("precision must not be negative"))?;
                let rounded =
                    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
                Ok(Collection::single(FhirPathValue::Decimal(rounded)))
            }
        );
    }

    fn register_exponential_functions(&mut self) {
        register_function!(
            self,
            "exp",
            category: FunctionCategory::Math,
            description: "Returns e raised to the power of the input",
            parameters: [],
            return_type: "Decimal",
            examples: ["0.exp()"],
            implementation: |call| Ok(decimal(decimal_input(call)?.and_then(|d| d.checked_exp())))
        );
        register_function!(
            self,
            "ln",
            category: FunctionCategory::Math,
            description: "Returns the natural logarithm of the input",
            parameters: [],
            return_type: "Decimal",
            examples: ["1.0.ln()"],
            implementation: |call| Ok(decimal(decimal_input(call)?.and_then(ln)))
        );
        register_function!(
            self,
            "log",
            category: FunctionCategory::Math,
            description: "Returns the logarithm of the input in the given base",
            parameters: ["base": "Decimal" => "Logarithm base"],
            return_type: "Decimal",
            examples: ["16.log(2)"],
            implementation: |call| {
                let Some(value) = decimal_input(call)? else {
                    return Ok(Collection::empty());
                };
                let Some(base) = call.singleton_argument(0)? else {
                    return Ok(Collection::empty());
                };
                let base = numeric(&base).ok_or_else(|| call.type_mismatch(&base))?;
                let result = ln(value)
                    .zip(ln(base))
                    .and_then(|(value, base)| value.checked_div(base));
                Ok(decimal(result))
            }
        );
        register_function!(
            self,
            "sqrt",
            category: FunctionCategory::Math,
            description: "Returns the square root of the input; empty for negative numbers",
            parameters: [],
            return_type: "Decimal",
            examples: ["81.sqrt()"],
            implementation: |call| Ok(decimal(decimal_input(call)?.and_then(|d| d.sqrt())))
        );
    }

    fn register_power_functions(&mut self) {
        register_function!(
            self,
            "power",
            category: FunctionCategory::Math,
            description: "Raises the input to the exponent; Integer when both are integers",
            parameters: ["exponent": "Integer | Decimal" => "Exponent"],
            return_type: "Integer | Decimal",
            examples: ["2.power(3)", "2.5.power(2)"],
            implementation: |call| {
                let Some(base) = call.singleton_input()?.cloned() else {
                    return Ok(Collection::empty());
                };
                let Some(exponent) = call.singleton_argument(0)? else {
                    return Ok(Collection::empty());
                };
                if numeric(&base).is_none() {
                    return Err(call.type_mismatch(&base));
                }
                if numeric(&exponent).is_none() {
                    return Err(call.type_mismatch(&exponent));
                }
                Ok(power(&base, &exponent).into_iter().collect())
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn test_integer_power_stays_integer() {
        let result = power(&FhirPathValue::Integer(2), &FhirPathValue::Integer(10));
        assert!(matches!(result, Some(FhirPathValue::Integer(1024))));
    }

    #[test]
    fn test_integer_power_overflow_is_empty() {
        assert!(power(&FhirPathValue::Integer(i64::MAX), &FhirPathValue::Integer(2)).is_none());
    }

    #[test]
    fn test_negative_base_with_fraction_is_empty() {
        let base = FhirPathValue::Integer(-8);
        let exponent = FhirPathValue::Decimal(dec("0.5"));
        assert!(power(&base, &exponent).is_none());
    }

    #[test]
    fn test_ln_of_non_positive_is_empty() {
        assert!(ln(Decimal::ZERO).is_none());
        assert!(ln(Decimal::from(-1)).is_none());
        assert!(ln(dec("2.5")).is_some());
    }
}
