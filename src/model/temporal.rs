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

//! Precision-aware temporal types for FHIRPath
//!
//! Dates, date-times and times remember how much of the value was written.
//! Comparison walks the components both sides have; when those agree but
//! the precisions differ the result is indeterminate (`None`). The derived
//! `PartialEq` is structural and is what the AST uses.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeDelta,
    TimeZone, Timelike, Utc,
};
use std::cmp::Ordering;
use std::fmt;

/// Precision levels for temporal values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemporalPrecision {
    /// Year precision (YYYY)
    Year,
    /// Month precision (YYYY-MM)
    Month,
    /// Day precision (YYYY-MM-DD)
    Day,
    /// Hour precision (THH)
    Hour,
    /// Minute precision (THH:MM)
    Minute,
    /// Second precision (THH:MM:SS)
    Second,
    /// Millisecond precision (THH:MM:SS.sss)
    Millisecond,
}

impl TemporalPrecision {
    /// Number of comparable components; seconds and milliseconds count as one
    fn components(self) -> usize {
        match self {
            Self::Year => 1,
            Self::Month => 2,
            Self::Day => 3,
            Self::Hour => 4,
            Self::Minute => 5,
            Self::Second | Self::Millisecond => 6,
        }
    }

    fn has_time(self) -> bool {
        self >= Self::Hour
    }
}

impl fmt::Display for TemporalPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        };
        f.write_str(name)
    }
}

/// Calendar duration units usable in temporal arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarUnit {
    /// year / years
    Year,
    /// month / months
    Month,
    /// week / weeks, UCUM `wk`
    Week,
    /// day / days, UCUM `d`
    Day,
    /// hour / hours, UCUM `h`
    Hour,
    /// minute / minutes, UCUM `min`
    Minute,
    /// second / seconds, UCUM `s`
    Second,
    /// millisecond / milliseconds, UCUM `ms`
    Millisecond,
}

impl CalendarUnit {
    /// Unit for a calendar keyword, singular or plural
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let unit = match keyword {
            "year" | "years" => Self::Year,
            "month" | "months" => Self::Month,
            "week" | "weeks" => Self::Week,
            "day" | "days" => Self::Day,
            "hour" | "hours" => Self::Hour,
            "minute" | "minutes" => Self::Minute,
            "second" | "seconds" => Self::Second,
            "millisecond" | "milliseconds" => Self::Millisecond,
            _ => return None,
        };
        Some(unit)
    }

    /// Unit for a UCUM code that is interchangeable with a calendar keyword.
    ///
    /// `a` and `mo` are absent: UCUM years and months are not
    /// calendar years and months.
    pub fn from_ucum(code: &str) -> Option<Self> {
        let unit = match code {
            "wk" => Self::Week,
            "d" => Self::Day,
            "h" => Self::Hour,
            "min" => Self::Minute,
            "s" => Self::Second,
            "ms" => Self::Millisecond,
            _ => return None,
        };
        Some(unit)
    }

    /// Keyword or UCUM code
    pub fn parse(unit: &str) -> Option<Self> {
        Self::from_keyword(unit).or_else(|| Self::from_ucum(unit))
    }

    /// Singular keyword
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        }
    }

    fn months(self) -> Option<i64> {
        match self {
            Self::Year => Some(12),
            Self::Month => Some(1),
            _ => None,
        }
    }

    fn milliseconds(self) -> Option<i64> {
        match self {
            Self::Week => Some(7 * 86_400_000),
            Self::Day => Some(86_400_000),
            Self::Hour => Some(3_600_000),
            Self::Minute => Some(60_000),
            Self::Second => Some(1_000),
            Self::Millisecond => Some(1),
            Self::Year | Self::Month => None,
        }
    }
}

fn compare_components(left: &[i64], right: &[i64]) -> Option<Ordering> {
    for (l, r) in left.iter().zip(right) {
        match l.cmp(r) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    (left.len() == right.len()).then_some(Ordering::Equal)
}

fn digits(text: &str, width: usize) -> Option<u32> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// A date with precision tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecisionDate {
    /// The date value, unused components set to their minimum
    pub date: NaiveDate,
    /// The precision of this date
    pub precision: TemporalPrecision,
}

impl PrecisionDate {
    /// Create a new precision date
    pub fn new(date: NaiveDate, precision: TemporalPrecision) -> Self {
        Self { date, precision }
    }

    /// Create a date with day precision
    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date, TemporalPrecision::Day)
    }

    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('-');
        let year = i32::try_from(digits(parts.next()?, 4)?).ok()?;

        let (month, day, precision) = match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => (1, 1, TemporalPrecision::Year),
            (Some(month), None, _) => (digits(month, 2)?, 1, TemporalPrecision::Month),
            (Some(month), Some(day), None) => {
                (digits(month, 2)?, digits(day, 2)?, TemporalPrecision::Day)
            }
            _ => return None,
        };
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Self::new(date, precision))
    }

    fn components(&self) -> Vec<i64> {
        let all = [
            i64::from(self.date.year()),
            i64::from(self.date.month()),
            i64::from(self.date.day()),
        ];
        all[..self.precision.components().min(3)].to_vec()
    }

    /// FHIRPath ordering; `None` when precision makes the result indeterminate
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }

    /// FHIRPath equality; `None` when indeterminate
    pub fn fhir_eq(&self, other: &Self) -> Option<bool> {
        self.partial_compare(other).map(|o| o == Ordering::Equal)
    }

    /// FHIRPath equivalence: same precision and same value
    pub fn equivalent(&self, other: &Self) -> bool {
        self.precision == other.precision && self.fhir_eq(other) == Some(true)
    }

    /// Add a calendar duration; time-of-day units do not apply to dates
    pub fn add(&self, amount: i64, unit: CalendarUnit) -> Option<Self> {
        let date = match unit {
            CalendarUnit::Year | CalendarUnit::Month => {
                shift_months(self.date, amount.checked_mul(unit.months()?)?)?
            }
            CalendarUnit::Week => shift_days(self.date, amount.checked_mul(7)?)?,
            CalendarUnit::Day => shift_days(self.date, amount)?,
            _ => return None,
        };
        Some(Self::new(date, self.precision))
    }
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.date.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            _ => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// A datetime with precision tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecisionDateTime {
    /// The datetime value, in the offset it was written with (UTC when none)
    pub datetime: DateTime<FixedOffset>,
    /// The precision of this datetime
    pub precision: TemporalPrecision,
    /// Whether the value carried an explicit offset
    pub tz_specified: bool,
}

impl PrecisionDateTime {
    /// Create a new precision datetime with an explicit offset
    pub fn new(datetime: DateTime<FixedOffset>, precision: TemporalPrecision) -> Self {
        Self {
            datetime,
            precision,
            tz_specified: true,
        }
    }

    /// Create a datetime with full precision
    pub fn from_datetime(datetime: DateTime<FixedOffset>) -> Self {
        Self::new(datetime, TemporalPrecision::Millisecond)
    }

    /// A date promoted to a datetime of the same precision
    pub fn from_date(date: &PrecisionDate) -> Self {
        let datetime = DateTime::from_naive_utc_and_offset(date.date.and_time(NaiveTime::MIN), utc());
        Self {
            datetime,
            precision: date.precision,
            tz_specified: false,
        }
    }

    /// Date component at no more than day precision
    pub fn date(&self) -> PrecisionDate {
        PrecisionDate::new(
            self.datetime.date_naive(),
            self.precision.min(TemporalPrecision::Day),
        )
    }

    /// Time component, if the value has one
    pub fn time(&self) -> Option<PrecisionTime> {
        self.precision
            .has_time()
            .then(|| PrecisionTime::new(self.datetime.time(), self.precision))
    }

    /// Parse `YYYY[-MM[-DD]]` optionally followed by `T`, a time and an offset
    pub fn parse(text: &str) -> Option<Self> {
        let (date_part, time_part) = match text.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (text, None),
        };
        let date = PrecisionDate::parse(date_part)?;

        let Some(rest) = time_part.filter(|t| !t.is_empty()) else {
            return Some(Self::from_date(&date));
        };
        if date.precision != TemporalPrecision::Day {
            return None;
        }

        let (time_text, offset) = split_offset(rest)?;
        let time = PrecisionTime::parse(time_text)?;
        let datetime = offset
            .unwrap_or_else(utc)
            .from_local_datetime(&date.date.and_time(time.time))
            .single()?;

        Some(Self {
            datetime,
            precision: time.precision,
            tz_specified: offset.is_some(),
        })
    }

    fn components(&self) -> Vec<i64> {
        // Offsets only matter once a time of day is present.
        let value = if self.precision.has_time() && self.tz_specified {
            self.datetime.naive_utc()
        } else {
            self.datetime.naive_local()
        };
        let all = [
            i64::from(value.year()),
            i64::from(value.month()),
            i64::from(value.day()),
            i64::from(value.hour()),
            i64::from(value.minute()),
            i64::from(value.second()) * 1000 + i64::from(value.nanosecond() / 1_000_000),
        ];
        all[..self.precision.components()].to_vec()
    }

    /// FHIRPath ordering; `None` when precision or offsets make it indeterminate
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        let with_time = self.precision.has_time() && other.precision.has_time();
        if with_time && self.tz_specified != other.tz_specified {
            return None;
        }
        compare_components(&self.components(), &other.components())
    }

    /// FHIRPath equality; `None` when indeterminate
    pub fn fhir_eq(&self, other: &Self) -> Option<bool> {
        self.partial_compare(other).map(|o| o == Ordering::Equal)
    }

    /// FHIRPath equivalence: same precision and same value
    pub fn equivalent(&self, other: &Self) -> bool {
        self.precision == other.precision && self.fhir_eq(other) == Some(true)
    }

    /// Add a calendar duration
    pub fn add(&self, amount: i64, unit: CalendarUnit) -> Option<Self> {
        let datetime = match unit.months() {
            Some(months) => {
                let local = self.datetime.naive_local();
                let date = shift_months(local.date(), amount.checked_mul(months)?)?;
                self.datetime
                    .offset()
                    .from_local_datetime(&date.and_time(local.time()))
                    .single()?
            }
            None => {
                let millis = amount.checked_mul(unit.milliseconds()?)?;
                self.datetime
                    .checked_add_signed(TimeDelta::try_milliseconds(millis)?)?
            }
        };
        Some(Self { datetime, ..*self })
    }
}

fn split_offset(text: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(time) = text.strip_suffix('Z') {
        return Some((time, Some(utc())));
    }
    let Some(position) = text.rfind(['+', '-']) else {
        return Some((text, None));
    };

    let (time, offset) = text.split_at(position);
    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = offset[1..].split_once(':')?;
    let seconds = digits(hours, 2)? * 3600 + digits(minutes, 2)? * 60;
    let offset = FixedOffset::east_opt(sign * i32::try_from(seconds).ok()?)?;
    Some((time, Some(offset)))
}

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = match self.precision {
            TemporalPrecision::Year => "%Y",
            TemporalPrecision::Month => "%Y-%m",
            TemporalPrecision::Day => "%Y-%m-%d",
            TemporalPrecision::Hour => "%Y-%m-%dT%H",
            TemporalPrecision::Minute => "%Y-%m-%dT%H:%M",
            TemporalPrecision::Second => "%Y-%m-%dT%H:%M:%S",
            TemporalPrecision::Millisecond => "%Y-%m-%dT%H:%M:%S%.3f",
        };
        write!(f, "{}", self.datetime.format(pattern))?;
        if self.tz_specified && self.precision.has_time() {
            write!(f, "{}", self.datetime.format("%:z"))?;
        }
        Ok(())
    }
}

/// A time of day with precision tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecisionTime {
    /// The time value
    pub time: NaiveTime,
    /// The precision of this time, `Hour` or finer
    pub precision: TemporalPrecision,
}

impl PrecisionTime {
    /// Create a new precision time
    pub fn new(time: NaiveTime, precision: TemporalPrecision) -> Self {
        Self { time, precision }
    }

    /// Parse `HH`, `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`
    pub fn parse(text: &str) -> Option<Self> {
        let (main, fraction) = match text.split_once('.') {
            Some((main, fraction)) => (main, Some(fraction)),
            None => (text, None),
        };
        let fields: Vec<&str> = main.split(':').collect();
        if fields.len() > 3 || (fraction.is_some() && fields.len() != 3) {
            return None;
        }

        let hour = digits(fields[0], 2)?;
        let minute = match fields.get(1) {
            Some(field) => digits(field, 2)?,
            None => 0,
        };
        let second = match fields.get(2) {
            Some(field) => digits(field, 2)?,
            None => 0,
        };
        let millis = match fraction {
            Some(fraction) => {
                if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let leading = &fraction[..fraction.len().min(3)];
                format!("{leading:0<3}").parse().ok()?
            }
            None => 0,
        };

        let precision = match (fields.len(), fraction.is_some()) {
            (1, _) => TemporalPrecision::Hour,
            (2, _) => TemporalPrecision::Minute,
            (_, false) => TemporalPrecision::Second,
            (_, true) => TemporalPrecision::Millisecond,
        };
        NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
            .map(|time| Self::new(time, precision))
    }

    fn components(&self) -> Vec<i64> {
        let all = [
            i64::from(self.time.hour()),
            i64::from(self.time.minute()),
            i64::from(self.time.second()) * 1000 + i64::from(self.time.nanosecond() / 1_000_000),
        ];
        all[..self.precision.components().saturating_sub(3).max(1)].to_vec()
    }

    /// FHIRPath ordering; `None` when precision makes the result indeterminate
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }

    /// FHIRPath equality; `None` when indeterminate
    pub fn fhir_eq(&self, other: &Self) -> Option<bool> {
        self.partial_compare(other).map(|o| o == Ordering::Equal)
    }

    /// FHIRPath equivalence: same precision and same value
    pub fn equivalent(&self, other: &Self) -> bool {
        self.precision == other.precision && self.fhir_eq(other) == Some(true)
    }

    /// Add a duration, wrapping around midnight; date units do not apply
    pub fn add(&self, amount: i64, unit: CalendarUnit) -> Option<Self> {
        if matches!(unit, CalendarUnit::Week | CalendarUnit::Day) {
            return None;
        }
        let millis = amount.checked_mul(unit.milliseconds()?)?;
        let (time, _) = self
            .time
            .overflowing_add_signed(TimeDelta::try_milliseconds(millis)?);
        Some(Self::new(time, self.precision))
    }
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = match self.precision {
            TemporalPrecision::Hour => "%H",
            TemporalPrecision::Minute => "%H:%M",
            TemporalPrecision::Millisecond => "%H:%M:%S%.3f",
            _ => "%H:%M:%S",
        };
        write!(f, "{}", self.time.format(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2015", TemporalPrecision::Year)]
    #[case("2015-02", TemporalPrecision::Month)]
    #[case("2015-02-04", TemporalPrecision::Day)]
    fn test_date_parse_precision(#[case] text: &str, #[case] precision: TemporalPrecision) {
        let date = PrecisionDate::parse(text).unwrap();
        assert_eq!(date.precision, precision);
        assert_eq!(date.to_string(), text);
    }

    #[rstest]
    #[case("15-02-04")]
    #[case("2015-2-04")]
    #[case("2015-02-30")]
    #[case("2015-02-04-01")]
    fn test_date_parse_rejects(#[case] text: &str) {
        assert!(PrecisionDate::parse(text).is_none());
    }

    #[test]
    fn test_date_comparison_with_mixed_precision() {
        let year = PrecisionDate::parse("2012").unwrap();
        let day = PrecisionDate::parse("2012-04-15").unwrap();
        let later = PrecisionDate::parse("2013-01-01").unwrap();
        assert_eq!(year.partial_compare(&day), None);
        assert_eq!(year.partial_compare(&later), Some(Ordering::Less));
        assert_eq!(day.fhir_eq(&day.clone()), Some(true));
        assert!(!year.equivalent(&day));
    }

    #[test]
    fn test_datetime_parse_with_offset() {
        let dt = PrecisionDateTime::parse("2015-02-04T14:34:28.123+09:00").unwrap();
        assert_eq!(dt.precision, TemporalPrecision::Millisecond);
        assert!(dt.tz_specified);
        assert_eq!(dt.to_string(), "2015-02-04T14:34:28.123+09:00");

        let utc = PrecisionDateTime::parse("2015-02-04T05:34:28.123Z").unwrap();
        assert_eq!(dt.fhir_eq(&utc), Some(true));
    }

    #[test]
    fn test_datetime_date_only() {
        let dt = PrecisionDateTime::parse("2015T").unwrap();
        assert_eq!(dt.precision, TemporalPrecision::Year);
        assert!(!dt.tz_specified);
        assert_eq!(dt.date(), PrecisionDate::parse("2015").unwrap());
        assert!(dt.time().is_none());
    }

    #[test]
    fn test_seconds_and_milliseconds_compare() {
        let seconds = PrecisionDateTime::parse("2015-02-04T14:34:28Z").unwrap();
        let millis = PrecisionDateTime::parse("2015-02-04T14:34:28.000Z").unwrap();
        assert_eq!(seconds.fhir_eq(&millis), Some(true));
        assert!(!seconds.equivalent(&millis));
    }

    #[test]
    fn test_time_parse_and_compare() {
        let hour = PrecisionTime::parse("14").unwrap();
        let minute = PrecisionTime::parse("14:30").unwrap();
        let later = PrecisionTime::parse("15:00").unwrap();
        assert_eq!(hour.precision, TemporalPrecision::Hour);
        assert_eq!(hour.partial_compare(&minute), None);
        assert_eq!(minute.partial_compare(&later), Some(Ordering::Less));
        assert_eq!(PrecisionTime::parse("14:30:15.5").unwrap().to_string(), "14:30:15.500");
        assert!(PrecisionTime::parse("25:00").is_none());
    }

    #[test]
    fn test_calendar_arithmetic() {
        let date = PrecisionDate::parse("2020-01-31").unwrap();
        assert_eq!(
            date.add(1, CalendarUnit::Month).unwrap().to_string(),
            "2020-02-29"
        );
        assert_eq!(date.add(-1, CalendarUnit::Week).unwrap().to_string(), "2020-01-24");
        assert!(date.add(1, CalendarUnit::Hour).is_none());

        let dt = PrecisionDateTime::parse("2020-01-01T23:30:00Z").unwrap();
        assert_eq!(
            dt.add(45, CalendarUnit::Minute).unwrap().to_string(),
            "2020-01-02T00:15:00+00:00"
        );

        let time = PrecisionTime::parse("23:00").unwrap();
        assert_eq!(time.add(2, CalendarUnit::Hour).unwrap().to_string(), "01:00");
    }

    #[test]
    fn test_calendar_unit_lookup() {
        assert_eq!(CalendarUnit::parse("days"), Some(CalendarUnit::Day));
        assert_eq!(CalendarUnit::parse("d"), Some(CalendarUnit::Day));
        assert_eq!(CalendarUnit::parse("a"), None);
        assert_eq!(CalendarUnit::parse("mg"), None);
    }
}
