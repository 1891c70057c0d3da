// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter model.
//!
//! A validated filter is one of three variants:
//!
//! ```text
//! filter_format=guide&filter_format=answer   → Text  { values: [guide, answer] }
//! reject_organisations=_MISSING              → Text  { include_missing, negated }
//! filter_public_timestamp=from:2014-04-01    → DateRange { from: 2014-04-01T00:00:00Z }
//! filter_is_withdrawn=true                   → Boolean { value: true }
//! ```
//!
//! Multiple values of one field always live inside one filter; a field never
//! appears twice for the same operation.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use super::error::Problems;
use crate::schema::MISSING_FIELD_VALUE;

/// How multiple values of a text filter combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultivalueMode {
    /// Document matches any value (union)
    Any,
    /// Document matches every value (intersection)
    All,
}

/// Equality / inclusion test on a keyword field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub field: String,
    /// Values in request order, without the `_MISSING` sentinel
    pub values: Vec<String>,
    /// `_MISSING` was among the values
    pub include_missing: bool,
    pub negated: bool,
    pub mode: MultivalueMode,
}

/// Date range test; each bound is optional and already normalised to UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRangeFilter {
    pub field: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub negated: bool,
}

/// Strict true/false test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanFilter {
    pub field: String,
    pub value: bool,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Text(TextFilter),
    DateRange(DateRangeFilter),
    Boolean(BooleanFilter),
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Self::Text(f) => &f.field,
            Self::DateRange(f) => &f.field,
            Self::Boolean(f) => &f.field,
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Self::Text(f) => f.negated,
            Self::DateRange(f) => f.negated,
            Self::Boolean(f) => f.negated,
        }
    }
}

impl TextFilter {
    pub fn new(field: impl Into<String>, raw_values: &[String], negated: bool, mode: MultivalueMode) -> Self {
        let include_missing = raw_values.iter().any(|v| v == MISSING_FIELD_VALUE);
        Self {
            field: field.into(),
            values: raw_values
                .iter()
                .filter(|v| *v != MISSING_FIELD_VALUE)
                .cloned()
                .collect(),
            include_missing,
            negated,
            mode,
        }
    }
}

fn too_many(problems: &mut Problems, count: usize, param: &str) {
    problems.push(format!(
        "Too many values ({count}) for parameter \"{param}\" (must occur at most once)"
    ));
}

/// Build a boolean filter; only the exact tokens `true` and `false` parse.
pub fn parse_boolean_filter(
    field: &str,
    values: &[String],
    negated: bool,
    problems: &mut Problems,
) -> Option<BooleanFilter> {
    if values.len() > 1 {
        too_many(problems, values.len(), field);
        return None;
    }
    let value = match values.first().map(String::as_str) {
        Some("true") => true,
        Some("false") => false,
        _ => {
            problems.push(format!("{field} requires a boolean (true or false)"));
            return None;
        }
    };
    Some(BooleanFilter {
        field: field.to_string(),
        value,
        negated,
    })
}

/// Build a date filter from `from:<date>,to:<date>` (either order, both optional).
///
/// Key problems are reported in the order they appear; bad `from` values are
/// always reported before bad `to` values.
pub fn parse_date_filter(
    field: &str,
    values: &[String],
    negated: bool,
    problems: &mut Problems,
) -> Option<DateRangeFilter> {
    if values.len() > 1 {
        too_many(problems, values.len(), field);
        return None;
    }
    let raw = values.first().map(String::as_str).unwrap_or("");

    let mut from_raw = None;
    let mut to_raw = None;
    let mut valid = true;
    for part in raw.split(',') {
        let (key, value) = part.split_once(':').unwrap_or((part, ""));
        match key {
            "from" => from_raw = Some(value),
            "to" => to_raw = Some(value),
            other => {
                problems.push(format!(
                    "Invalid date filter parameter \"{other}:\" (expected \"from:\" or \"to:\")"
                ));
                valid = false;
            }
        }
    }

    let mut bound = |label: &str, value: Option<&str>, end_of_day: bool| match value {
        None => Some(None),
        Some(text) => match parse_date_bound(text, end_of_day) {
            Some(instant) => Some(Some(instant)),
            None => {
                problems.push(format!(
                    "Invalid \"{label}\" value \"{text}\" for parameter \"{field}\" (expected ISO8601 date)"
                ));
                None
            }
        },
    };
    let from = bound("from", from_raw, false);
    let to = bound("to", to_raw, true);

    match (from, to, valid) {
        (Some(from), Some(to), true) => Some(DateRangeFilter {
            field: field.to_string(),
            from,
            to,
            negated,
        }),
        _ => None,
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Parse one date bound and normalise it to UTC.
///
/// A bare date is the start of that day, or the last second of the day when
/// `end_of_day` is set (the `to` bound). Datetimes may omit seconds and may
/// carry an offset; without one they are taken as UTC.
pub fn parse_date_bound(text: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59)?
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)?
        };
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let without_zulu = text.strip_suffix('Z').unwrap_or(text);
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(without_zulu, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
