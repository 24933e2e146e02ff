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

//! Literal value types for FHIRPath expressions

use std::fmt;

use rust_decimal::Decimal;

use crate::model::{
    Collection, FhirPathValue, PrecisionDate, PrecisionDateTime, PrecisionTime, Quantity,
};

/// Literal values that can appear directly in FHIRPath expressions
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// The empty collection (`{}`)
    Empty,
    /// Boolean literal (true, false)
    Boolean(bool),
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal (e.g., 3.14)
    Decimal(Decimal),
    /// String literal with escapes already resolved
    String(String),
    /// Date literal (e.g., @2023-12-25)
    Date(PrecisionDate),
    /// DateTime literal (e.g., @2023-12-25T10:30:00Z)
    DateTime(PrecisionDateTime),
    /// Time literal (e.g., @T10:30:00)
    Time(PrecisionTime),
    /// Quantity literal (e.g., 5 'mg', 3 days)
    Quantity(Quantity),
}

impl LiteralValue {
    /// The collection this literal evaluates to
    pub fn to_collection(&self) -> Collection {
        let value = match self {
            Self::Empty => return Collection::empty(),
            Self::Boolean(b) => FhirPathValue::Boolean(*b),
            Self::Integer(i) => FhirPathValue::Integer(*i),
            Self::Decimal(d) => FhirPathValue::Decimal(*d),
            Self::String(s) => FhirPathValue::String(s.clone()),
            Self::Date(d) => FhirPathValue::Date(d.clone()),
            Self::DateTime(dt) => FhirPathValue::DateTime(dt.clone()),
            Self::Time(t) => FhirPathValue::Time(t.clone()),
            Self::Quantity(q) => FhirPathValue::Quantity(q.clone()),
        };
        Collection::single(value)
    }
}

/// Write `text` between `quote` characters, escaping as the tokenizer expects
pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    use fmt::Write;

    f.write_char(quote)?;
    for ch in text.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{0c}' => f.write_str("\\f")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("{}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write_quoted(f, s, '\''),
            Self::Date(d) => write!(f, "@{d}"),
            Self::DateTime(dt) => {
                // A bare `T` keeps date-only values typed as DateTime on re-parse.
                if dt.time().is_some() {
                    write!(f, "@{dt}")
                } else {
                    write!(f, "@{dt}T")
                }
            }
            Self::Time(t) => write!(f, "@T{t}"),
            Self::Quantity(q) => {
                write!(f, "{}", q.value)?;
                match &q.unit {
                    None => Ok(()),
                    Some(unit) if q.has_calendar_keyword() => write!(f, " {unit}"),
                    Some(unit) => {
                        f.write_str(" ")?;
                        write_quoted(f, unit, '\'')
                    }
                }
            }
        }
    }
}
