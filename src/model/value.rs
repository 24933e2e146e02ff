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

//! Runtime values and value sequences
//!
//! Evaluation always produces a [`Collection`]. Each [`FhirPathValue`] can
//! report its [`TypeSpecifier`]: System values report their System type,
//! records report the type they describe, and model primitives (such as
//! `FHIR.string`) are System values wrapped in [`TypedValue`].

use super::object::FhirObject;
use super::quantity::{Quantity, decimal_equivalent};
use super::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use super::types::TypeSpecifier;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

static BOOLEAN_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("Boolean"));
static INTEGER_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("Integer"));
static DECIMAL_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("Decimal"));
static STRING_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("String"));
static DATE_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("Date"));
static DATETIME_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("DateTime"));
static TIME_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("Time"));
static QUANTITY_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("Quantity"));
static TYPE_INFO_TYPE: Lazy<TypeSpecifier> = Lazy::new(|| TypeSpecifier::system("TypeInfo"));

/// A single FHIRPath value
#[derive(Debug, Clone)]
pub enum FhirPathValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Decimal value
    Decimal(Decimal),
    /// String value
    String(String),
    /// Date value
    Date(PrecisionDate),
    /// DateTime value
    DateTime(PrecisionDateTime),
    /// Time value
    Time(PrecisionTime),
    /// Quantity value
    Quantity(Quantity),
    /// A record read through the reflective [`FhirObject`] contract
    Object(Arc<dyn FhirObject>),
    /// Type description returned by `type()`
    TypeInfo(TypeSpecifier),
    /// A System value carrying a model primitive type
    Typed(Arc<TypedValue>),
}

/// A System value annotated with the model type it was declared with
#[derive(Debug, Clone)]
pub struct TypedValue {
    /// The underlying System value
    pub value: FhirPathValue,
    /// Declared model type, e.g. `FHIR.string`
    pub type_specifier: TypeSpecifier,
}

impl FhirPathValue {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Wrap a record
    pub fn object(object: impl FhirObject + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Annotate a System value with a model type; other values pass through
    pub fn typed(value: FhirPathValue, type_specifier: TypeSpecifier) -> Self {
        match value {
            Self::Object(_) | Self::TypeInfo(_) | Self::Typed(_) => value,
            value if type_specifier.is_system() => value,
            value => Self::Typed(Arc::new(TypedValue {
                value,
                type_specifier,
            })),
        }
    }

    /// The value with any model type annotation removed
    pub fn primitive(&self) -> &FhirPathValue {
        match self {
            Self::Typed(typed) => &typed.value,
            other => other,
        }
    }

    /// Runtime type of this value
    pub fn type_specifier(&self) -> &TypeSpecifier {
        match self {
            Self::Boolean(_) => &*BOOLEAN_TYPE,
            Self::Integer(_) => &*INTEGER_TYPE,
            Self::Decimal(_) => &*DECIMAL_TYPE,
            Self::String(_) => &*STRING_TYPE,
            Self::Date(_) => &*DATE_TYPE,
            Self::DateTime(_) => &*DATETIME_TYPE,
            Self::Time(_) => &*TIME_TYPE,
            Self::Quantity(_) => &*QUANTITY_TYPE,
            Self::TypeInfo(_) => &*TYPE_INFO_TYPE,
            Self::Object(object) => object.type_specifier(),
            Self::Typed(typed) => &typed.type_specifier,
        }
    }

    /// Short name of the runtime type, for error messages
    pub fn type_name(&self) -> String {
        self.type_specifier().qualified_name()
    }

    /// Boolean content, if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self.primitive() {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content, if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self.primitive() {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric content as a decimal, promoting integers
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.primitive() {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// String content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self.primitive() {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Record content, if this is a record
    pub fn as_object(&self) -> Option<&Arc<dyn FhirObject>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// FHIRPath equality (`=`) of two single values.
    ///
    /// `None` means the comparison is indeterminate, as for temporal values
    /// of different precision.
    pub fn equals(&self, other: &FhirPathValue) -> Option<bool> {
        use FhirPathValue::*;

        match (self.primitive(), other.primitive()) {
            (Boolean(l), Boolean(r)) => Some(l == r),
            (Integer(l), Integer(r)) => Some(l == r),
            (Integer(l), Decimal(r)) => Some(rust_decimal::Decimal::from(*l) == *r),
            (Decimal(l), Integer(r)) => Some(*l == rust_decimal::Decimal::from(*r)),
            (Decimal(l), Decimal(r)) => Some(l == r),
            (String(l), String(r)) => Some(l == r),
            (Date(l), Date(r)) => l.fhir_eq(r),
            (DateTime(l), DateTime(r)) => l.fhir_eq(r),
            (Date(l), DateTime(r)) => PrecisionDateTime::from_date(l).fhir_eq(r),
            (DateTime(l), Date(r)) => l.fhir_eq(&PrecisionDateTime::from_date(r)),
            (Time(l), Time(r)) => l.fhir_eq(r),
            (Quantity(l), Quantity(r)) => l.fhir_eq(r),
            (Object(l), Object(r)) => Some(Arc::ptr_eq(l, r) || l.structural_eq(r.as_ref())),
            (TypeInfo(l), TypeInfo(r)) => Some(l.same_type(r)),
            _ => Some(false),
        }
    }

    /// FHIRPath equivalence (`~`) of two single values
    pub fn equivalent(&self, other: &FhirPathValue) -> bool {
        use FhirPathValue::*;

        match (self.primitive(), other.primitive()) {
            (String(l), String(r)) => normalize_whitespace(l) == normalize_whitespace(r),
            (Decimal(l), Decimal(r)) => decimal_equivalent(*l, *r),
            (Integer(l), Decimal(r)) | (Decimal(r), Integer(l)) => {
                decimal_equivalent(rust_decimal::Decimal::from(*l), *r)
            }
            (Date(l), Date(r)) => l.equivalent(r),
            (DateTime(l), DateTime(r)) => l.equivalent(r),
            (Time(l), Time(r)) => l.equivalent(r),
            (Quantity(l), Quantity(r)) => l.equivalent(r),
            (l, r) => l.equals(r) == Some(true),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Value equality as used for de-duplication: indeterminate counts as unequal
impl PartialEq for FhirPathValue {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other) == Some(true)
    }
}

impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Object(object) => write!(f, "{}", object.type_specifier()),
            Self::TypeInfo(ts) => write!(f, "{ts}"),
            Self::Typed(typed) => write!(f, "{}", typed.value),
        }
    }
}

impl From<bool> for FhirPathValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FhirPathValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for FhirPathValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for FhirPathValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FhirPathValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Quantity> for FhirPathValue {
    fn from(value: Quantity) -> Self {
        Self::Quantity(value)
    }
}

/// An ordered sequence of values; the result of every evaluation step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection(Vec<FhirPathValue>);

impl Collection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty collection
    pub fn empty() -> Self {
        Self::new()
    }

    /// Create a collection holding one value
    pub fn single(value: FhirPathValue) -> Self {
        Self(vec![value])
    }

    /// Create a collection with a capacity hint
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the collection holds no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The only value, if there is exactly one
    pub fn as_single(&self) -> Option<&FhirPathValue> {
        match self.0.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    /// First value
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.0.first()
    }

    /// Last value
    pub fn last(&self) -> Option<&FhirPathValue> {
        self.0.last()
    }

    /// Value at `index`
    pub fn get(&self, index: usize) -> Option<&FhirPathValue> {
        self.0.get(index)
    }

    /// Iterate over the values
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    /// Values as a slice
    pub fn as_slice(&self) -> &[FhirPathValue] {
        &self.0
    }

    /// Append a value
    pub fn push(&mut self, value: FhirPathValue) {
        self.0.push(value);
    }

    /// Append all values of another collection
    pub fn extend(&mut self, other: impl IntoIterator<Item = FhirPathValue>) {
        self.0.extend(other);
    }

    /// Consume into the underlying vector
    pub fn into_vec(self) -> Vec<FhirPathValue> {
        self.0
    }

    /// True if some value equals `value`
    pub fn contains_value(&self, value: &FhirPathValue) -> bool {
        self.0.iter().any(|item| item == value)
    }

    /// Values in order with later duplicates removed
    pub fn distinct(self) -> Self {
        let mut unique = Collection::with_capacity(self.len());
        for value in self.0 {
            if !unique.contains_value(&value) {
                unique.push(value);
            }
        }
        unique
    }
}

impl From<Vec<FhirPathValue>> for Collection {
    fn from(values: Vec<FhirPathValue>) -> Self {
        Self(values)
    }
}

impl From<FhirPathValue> for Collection {
    fn from(value: FhirPathValue) -> Self {
        Self::single(value)
    }
}

impl FromIterator<FhirPathValue> for Collection {
    fn from_iter<I: IntoIterator<Item = FhirPathValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathValue;
    type IntoIter = std::vec::IntoIter<FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a FhirPathValue;
    type IntoIter = std::slice::Iter<'a, FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_equality_promotes_integers() {
        let one = FhirPathValue::Integer(1);
        let one_decimal = FhirPathValue::Decimal("1.0".parse().unwrap());
        assert_eq!(one.equals(&one_decimal), Some(true));
        assert_eq!(one.equals(&FhirPathValue::string("1")), Some(false));
    }

    #[test]
    fn test_typed_values_compare_by_content() {
        let plain = FhirPathValue::string("Smith");
        let typed =
            FhirPathValue::typed(FhirPathValue::string("Smith"), TypeSpecifier::new("FHIR", "string"));
        assert_eq!(typed.type_specifier(), &TypeSpecifier::new("FHIR", "string"));
        assert_eq!(plain.type_specifier(), &TypeSpecifier::system("String"));
        assert_eq!(typed, plain);
        assert_eq!(typed.as_str(), Some("Smith"));
    }

    #[test]
    fn test_system_annotation_is_dropped() {
        let value = FhirPathValue::typed(FhirPathValue::Integer(3), TypeSpecifier::system("Integer"));
        assert!(matches!(value, FhirPathValue::Integer(3)));
    }

    #[test]
    fn test_string_equivalence() {
        let left = FhirPathValue::string("Hello   World");
        let right = FhirPathValue::string("hello world");
        assert!(left.equivalent(&right));
        assert_eq!(left.equals(&right), Some(false));
    }

    #[test]
    fn test_temporal_equality_can_be_indeterminate() {
        let year = FhirPathValue::Date(PrecisionDate::parse("2012").unwrap());
        let day = FhirPathValue::Date(PrecisionDate::parse("2012-01-01").unwrap());
        assert_eq!(year.equals(&day), None);
        assert_ne!(year, day);
        assert!(!year.equivalent(&day));
    }

    #[test]
    fn test_collection_distinct_keeps_first_occurrence() {
        let collection: Collection = vec![
            FhirPathValue::Integer(2),
            FhirPathValue::Integer(1),
            FhirPathValue::Decimal("2.0".parse().unwrap()),
            FhirPathValue::Integer(1),
        ]
        .into();
        let distinct = collection.distinct();
        assert_eq!(distinct.len(), 2);
        assert!(matches!(distinct.first(), Some(FhirPathValue::Integer(2))));
        assert_eq!(distinct.to_string(), "[2, 1]");
    }
}
