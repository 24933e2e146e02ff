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

//! Quantity values

use super::temporal::CalendarUnit;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;

/// Quantity value with optional unit
///
/// Units are compared literally; calendar keywords and their UCUM
/// counterparts (`day` and `'d'`) are interchangeable. No other unit
/// conversion is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantity {
    /// Numeric value
    pub value: Decimal,
    /// Unit string (UCUM code or calendar keyword)
    pub unit: Option<String>,
}

impl Quantity {
    /// Create a new quantity
    pub fn new(value: Decimal, unit: Option<String>) -> Self {
        Self { value, unit }
    }

    /// Create a quantity with a unit
    pub fn with_unit(value: Decimal, unit: impl Into<String>) -> Self {
        Self::new(value, Some(unit.into()))
    }

    /// Create a unitless quantity
    pub fn unitless(value: Decimal) -> Self {
        Self::new(value, None)
    }

    /// The unit, with the UCUM unity `1` standing for "no unit"
    pub fn unit(&self) -> &str {
        self.unit.as_deref().unwrap_or("1")
    }

    /// Calendar duration unit, if the unit is one
    pub fn calendar_unit(&self) -> Option<CalendarUnit> {
        self.unit.as_deref().and_then(CalendarUnit::parse)
    }

    /// True when the unit is written as a calendar keyword rather than a UCUM code
    pub fn has_calendar_keyword(&self) -> bool {
        self.unit
            .as_deref()
            .is_some_and(|unit| CalendarUnit::from_keyword(unit).is_some())
    }

    fn same_unit(&self, other: &Quantity) -> bool {
        if self.unit() == other.unit() {
            return true;
        }
        matches!(
            (self.calendar_unit(), other.calendar_unit()),
            (Some(left), Some(right)) if left == right
        )
    }

    /// Ordering of two quantities; `None` when units differ
    pub fn partial_compare(&self, other: &Quantity) -> Option<Ordering> {
        self.same_unit(other).then(|| self.value.cmp(&other.value))
    }

    /// FHIRPath equality; `None` when units are not comparable
    pub fn fhir_eq(&self, other: &Quantity) -> Option<bool> {
        self.partial_compare(other).map(|o| o == Ordering::Equal)
    }

    /// FHIRPath equivalence, comparing values at the smaller scale
    pub fn equivalent(&self, other: &Quantity) -> bool {
        self.same_unit(other) && decimal_equivalent(self.value, other.value)
    }

    /// Sum of two quantities with the same unit
    pub fn add(&self, other: &Quantity) -> Option<Quantity> {
        if !self.same_unit(other) {
            return None;
        }
        let value = self.value.checked_add(other.value)?;
        Some(Self::new(value, self.unit.clone()))
    }

    /// Difference of two quantities with the same unit
    pub fn subtract(&self, other: &Quantity) -> Option<Quantity> {
        self.add(&other.negate())
    }

    /// Multiply by a plain number
    pub fn scale(&self, factor: Decimal) -> Option<Quantity> {
        let value = self.value.checked_mul(factor)?;
        Some(Self::new(value, self.unit.clone()))
    }

    /// Negated quantity
    pub fn negate(&self) -> Quantity {
        Self::new(-self.value, self.unit.clone())
    }
}

/// Decimal equivalence: equal after rounding both to the smaller scale
pub fn decimal_equivalent(left: Decimal, right: Decimal) -> bool {
    let scale = left.scale().min(right.scale());
    left.round_dp(scale) == right.round_dp(scale)
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            None => write!(f, "{}", self.value),
            Some(unit) if self.has_calendar_keyword() => write!(f, "{} {unit}", self.value),
            Some(unit) => write!(f, "{} '{}'", self.value, unit.replace('\'', "\\'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn test_calendar_units_are_interchangeable() {
        let days = Quantity::with_unit(dec("7"), "days");
        let ucum = Quantity::with_unit(dec("7"), "d");
        let weeks = Quantity::with_unit(dec("1"), "week");
        assert_eq!(days.fhir_eq(&ucum), Some(true));
        assert_eq!(days.fhir_eq(&weeks), None);
        assert!(days.equivalent(&ucum));
    }

    #[test]
    fn test_mismatched_units_are_incomparable() {
        let mg = Quantity::with_unit(dec("5"), "mg");
        let g = Quantity::with_unit(dec("5"), "g");
        assert_eq!(mg.partial_compare(&g), None);
        assert!(mg.add(&g).is_none());
        assert_eq!(
            mg.add(&Quantity::with_unit(dec("2.5"), "mg")),
            Some(Quantity::with_unit(dec("7.5"), "mg"))
        );
    }

    #[test]
    fn test_unitless_matches_unity() {
        let plain = Quantity::unitless(dec("3"));
        let unity = Quantity::with_unit(dec("3"), "1");
        assert_eq!(plain.fhir_eq(&unity), Some(true));
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::with_unit(dec("4"), "days").to_string(), "4 days");
        assert_eq!(Quantity::with_unit(dec("5.5"), "mg").to_string(), "5.5 'mg'");
        assert_eq!(Quantity::unitless(dec("2")).to_string(), "2");
    }

    #[test]
    fn test_decimal_equivalence_uses_smaller_scale() {
        assert!(decimal_equivalent(dec("1.2"), dec("1.24")));
        assert!(!decimal_equivalent(dec("1.2"), dec("1.26")));
        assert!(decimal_equivalent(dec("3"), dec("3.0")));
    }
}
