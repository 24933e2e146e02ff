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

//! Conversion functions: iif, the to* family and their convertsTo* checks
//!
//! A conversion that does not apply yields empty; `convertsTo*` reports
//! whether the matching `to*` would produce a value.

use super::{FunctionBuilder, FunctionCategory, FunctionLibrary};
use crate::evaluator::{EvaluationError, operators};
use crate::model::{
    CalendarUnit, Collection, FhirPathValue, PrecisionDate, PrecisionDateTime, PrecisionTime,
    Quantity,
};
use crate::register_function;
use rust_decimal::Decimal;
use std::str::FromStr;

type Converter = fn(&FhirPathValue) -> Option<FhirPathValue>;

const TRUE_STRINGS: [&str; 6] = ["true", "t", "yes", "y", "1", "1.0"];
const FALSE_STRINGS: [&str; 6] = ["false", "f", "no", "n", "0", "0.0"];

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal_text(text: &str) -> bool {
    match text.split_once('.') {
        Some((whole, fraction)) => {
            is_integer_text(whole)
                && !fraction.is_empty()
                && fraction.bytes().all(|b| b.is_ascii_digit())
        }
        None => is_integer_text(text),
    }
}

fn to_boolean(value: &FhirPathValue) -> Option<FhirPathValue> {
    let result = match value.primitive() {
        FhirPathValue::Boolean(b) => *b,
        FhirPathValue::Integer(1) => true,
        FhirPathValue::Integer(0) => false,
        FhirPathValue::Decimal(d) if *d == Decimal::ONE => true,
        FhirPathValue::Decimal(d) if d.is_zero() => false,
        FhirPathValue::String(s) => {
            let lower = s.to_lowercase();
            if TRUE_STRINGS.contains(&lower.as_str()) {
                true
            } else if FALSE_STRINGS.contains(&lower.as_str()) {
                false
            } else {
                return None;
            }
        }
        _ => return None,
    };
    Some(FhirPathValue::Boolean(result))
}

fn to_integer(value: &FhirPathValue) -> Option<FhirPathValue> {
    match value.primitive() {
        FhirPathValue::Integer(i) => Some(FhirPathValue::Integer(*i)),
        FhirPathValue::Boolean(b) => Some(FhirPathValue::Integer(i64::from(*b))),
        FhirPathValue::String(s) if is_integer_text(s) => {
            s.parse().ok().map(FhirPathValue::Integer)
        }
        _ => None,
    }
}

fn to_decimal(value: &FhirPathValue) -> Option<FhirPathValue> {
    match value.primitive() {
        FhirPathValue::Integer(i) => Some(FhirPathValue::Decimal(Decimal::from(*i))),
        FhirPathValue::Decimal(d) => Some(FhirPathValue::Decimal(*d)),
        FhirPathValue::Boolean(b) => Some(FhirPathValue::Decimal(if *b {
            Decimal::ONE
        } else {
            Decimal::ZERO
        })),
        FhirPathValue::String(s) if is_decimal_text(s) => {
            Decimal::from_str(s).ok().map(FhirPathValue::Decimal)
        }
        _ => None,
    }
}

fn to_string(value: &FhirPathValue) -> Option<FhirPathValue> {
    let text = match value.primitive() {
        FhirPathValue::Boolean(b) => b.to_string(),
        FhirPathValue::Integer(i) => i.to_string(),
        FhirPathValue::Decimal(d) => d.to_string(),
        FhirPathValue::String(s) => s.clone(),
        FhirPathValue::Date(d) => d.to_string(),
        FhirPathValue::DateTime(dt) => dt.to_string(),
        FhirPathValue::Time(t) => t.to_string(),
        FhirPathValue::Quantity(q) => q.to_string(),
        _ => return None,
    };
    Some(FhirPathValue::String(text))
}

fn to_date(value: &FhirPathValue) -> Option<FhirPathValue> {
    match value.primitive() {
        FhirPathValue::Date(d) => Some(FhirPathValue::Date(d.clone())),
        FhirPathValue::DateTime(dt) => Some(FhirPathValue::Date(dt.date())),
        FhirPathValue::String(s) => PrecisionDate::parse(s)
            .or_else(|| PrecisionDateTime::parse(s).map(|dt| dt.date()))
            .map(FhirPathValue::Date),
        _ => None,
    }
}

fn to_datetime(value: &FhirPathValue) -> Option<FhirPathValue> {
    match value.primitive() {
        FhirPathValue::DateTime(dt) => Some(FhirPathValue::DateTime(dt.clone())),
        FhirPathValue::Date(d) => Some(FhirPathValue::DateTime(PrecisionDateTime::from_date(d))),
        FhirPathValue::String(s) => PrecisionDateTime::parse(s).map(FhirPathValue::DateTime),
        _ => None,
    }
}

fn to_time(value: &FhirPathValue) -> Option<FhirPathValue> {
    match value.primitive() {
        FhirPathValue::Time(t) => Some(FhirPathValue::Time(t.clone())),
        FhirPathValue::String(s) => {
            PrecisionTime::parse(s.strip_prefix('T').unwrap_or(s)).map(FhirPathValue::Time)
        }
        _ => None,
    }
}

/// Parse `number`, `number 'unit'` or `number calendar-keyword`
fn parse_quantity(text: &str) -> Option<Quantity> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.')))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    if !is_decimal_text(number) {
        return None;
    }
    let value = Decimal::from_str(number).ok()?;

    let unit = unit.trim();
    if unit.is_empty() {
        return Some(Quantity::unitless(value));
    }
    if let Some(quoted) = unit.strip_prefix('\'').and_then(|u| u.strip_suffix('\'')) {
        return (!quoted.contains('\'')).then(|| Quantity::with_unit(value, quoted));
    }
    CalendarUnit::from_keyword(unit).map(|_| Quantity::with_unit(value, unit))
}

fn to_quantity(value: &FhirPathValue) -> Option<Quantity> {
    match value.primitive() {
        FhirPathValue::Quantity(q) => Some(q.clone()),
        FhirPathValue::Integer(_) | FhirPathValue::Decimal(_) => {
            value.as_decimal().map(Quantity::unitless)
        }
        FhirPathValue::Boolean(b) => Some(Quantity::unitless(if *b {
            Decimal::ONE
        } else {
            Decimal::ZERO
        })),
        FhirPathValue::String(s) => parse_quantity(s),
        _ => None,
    }
}

/// The quantity expressed in `unit`; only identical or calendar-equivalent units apply
fn in_unit(quantity: Quantity, unit: Option<&str>) -> Option<Quantity> {
    let Some(unit) = unit else {
        return Some(quantity);
    };
    let target = Quantity::with_unit(quantity.value, unit);
    quantity.fhir_eq(&target).map(|_| target)
}

impl FunctionLibrary {
    pub(crate) fn register_conversion_functions(&mut self) {
        self.register_iif_function();
        self.register_conversion_pair("Boolean", to_boolean);
        self.register_conversion_pair("Integer", to_integer);
        self.register_conversion_pair("Decimal", to_decimal);
        self.register_conversion_pair("String", to_string);
        self.register_conversion_pair("Date", to_date);
        self.register_conversion_pair("DateTime", to_datetime);
        self.register_conversion_pair("Time", to_time);
        self.register_quantity_functions();
    }

    fn register_iif_function(&mut self) {
        register_function!(
            self,
            "iif",
            category: FunctionCategory::Conversion,
            description: "Evaluates true-result if the criterion is true, otherwise otherwise-result; only the chosen branch is evaluated",
            parameters: [
                "criterion": "expression" => "Condition",
                "true-result": "expression" => "Result when the criterion is true"
            ],
            optional: ["otherwise-result": "expression" => "Result otherwise"],
            return_type: "collection",
            examples: ["iif(Patient.active, 'active', 'inactive')"],
            implementation: |call| {
                let input = call.input();
                if input.len() > 1 {
                    return Err(EvaluationError::singleton_expected("iif()", input.len()));
                }

                // A single input item becomes $this for the criterion and branches.
                let criterion = match input.first() {
                    Some(item) => call.criterion_for(0, item, 0)?,
                    None => operators::to_boolean(&call.argument(0)?, "iif()")?,
                };
                let branch = if criterion == Some(true) { 1 } else { 2 };
                match input.first() {
                    Some(item) => call.evaluate_for(branch, item, 0),
                    None => call.argument(branch),
                }
            }
        );
    }

    fn register_conversion_pair(&mut self, type_name: &str, convert: Converter) {
        FunctionBuilder::new(format!("to{type_name}"), FunctionCategory::Conversion)
            .description(format!(
                "Converts a single value to {type_name}; empty when it is not convertible"
            ))
            .return_type(type_name)
            .example(format!("'1'.to{type_name}()"))
            .register(self, move |call| {
                Ok(match call.singleton_input()? {
                    Some(value) => convert(value).into_iter().collect(),
                    None => Collection::empty(),
                })
            });

        FunctionBuilder::new(format!("convertsTo{type_name}"), FunctionCategory::Conversion)
            .description(format!(
                "Returns true if the single input value can be converted to {type_name}"
            ))
            .return_type("Boolean")
            .example(format!("'1'.convertsTo{type_name}()"))
            .register(self, move |call| {
                Ok(match call.singleton_input()? {
                    Some(value) => {
                        Collection::single(FhirPathValue::Boolean(convert(value).is_some()))
                    }
                    None => Collection::empty(),
                })
            });
    }

    fn register_quantity_functions(&mut self) {
        register_function!(
            self,
            "toQuantity",
            category: FunctionCategory::Conversion,
            description: "Converts a single value to a Quantity, optionally in the given unit",
            parameters: [],
            optional: ["unit": "String" => "Unit the result must be expressed in"],
            return_type: "Quantity",
            examples: ["'5.5 \\'mg\\''.toQuantity()", "'4 days'.toQuantity('d')"],
            implementation: |call| {
                let unit = call.string_argument(0)?;
                let Some(value) = call.singleton_input()? else {
                    return Ok(Collection::empty());
                };
                Ok(to_quantity(value)
                    .and_then(|q| in_unit(q, unit.as_deref()))
                    .map(|q| Collection::single(FhirPathValue::Quantity(q)))
                    .unwrap_or_default())
            }
        );
        register_function!(
            self,
            "convertsToQuantity",
            category: FunctionCategory::Conversion,
            description: "Returns true if the single input value can be converted to a Quantity",
            parameters: [],
            optional: ["unit": "String" => "Unit the result must be expressed in"],
            return_type: "Boolean",
            examples: ["'5 \\'mg\\''.convertsToQuantity()"],
            implementation: |call| {
                let unit = call.string_argument(0)?;
                let Some(value) = call.singleton_input()? else {
                    return Ok(Collection::empty());
                };
                let converts = to_quantity(value)
                    .and_then(|q| in_unit(q, unit.as_deref()))
                    .is_some();
                Ok(Collection::single(FhirPathValue::Boolean(converts)))
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12", true)]
    #[case("-3", true)]
    #[case("+0", true)]
    #[case("1.5", false)]
    #[case("", false)]
    #[case("abc", false)]
    fn test_integer_text(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_integer_text(text), expected);
    }

    #[test]
    fn test_parse_quantity() {
        let dec = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(parse_quantity("5.5 'mg'"), Some(Quantity::with_unit(dec("5.5"), "mg")));
        assert_eq!(parse_quantity("4 days"), Some(Quantity::with_unit(dec("4"), "days")));
        assert_eq!(parse_quantity(" 3 "), Some(Quantity::unitless(dec("3"))));
        assert_eq!(parse_quantity("4 parsecs"), None);
        assert_eq!(parse_quantity("mg"), None);
    }

    #[test]
    fn test_unit_conversion_only_between_equivalent_units() {
        let days = Quantity::with_unit(Decimal::from(4), "days");
        assert_eq!(
            in_unit(days.clone(), Some("d")),
            Some(Quantity::with_unit(Decimal::from(4), "d"))
        );
        assert_eq!(in_unit(days, Some("mg")), None);
    }

    #[test]
    fn test_boolean_strings() {
        assert_eq!(
            to_boolean(&FhirPathValue::string("Yes")),
            Some(FhirPathValue::Boolean(true))
        );
        assert_eq!(to_boolean(&FhirPathValue::string("maybe")), None);
        assert_eq!(to_boolean(&FhirPathValue::Integer(2)), None);
    }
}
