// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Advanced search parameters.
//!
//! ```text
//! page=1&per_page=20                      required, page ≤ max_page
//! keywords=vat
//! format=guide&organisations[]=hmrc       property filters (term / terms)
//! is_withdrawn=0                          boolean property: true|1|false|0
//! public_timestamp[from]=2014-01-01       date property: from|to|before|after
//! order[public_timestamp]=desc
//! ```
//!
//! Property names are checked against the index's mapped fields. All
//! property problems are reported together, joined with ". ".

use chrono::NaiveDate;

use crate::params::{
    parse_date_bound, quoted_list, BooleanFilter, DateRangeFilter, Filter, MultivalueMode,
    ParseError, RawParams, SortDirection, TextFilter,
};
use crate::schema::{FieldType, SearchSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedSearchParams {
    /// 1-based page
    pub page: usize,
    pub per_page: usize,
    pub keywords: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, SortDirection)>,
}

impl AdvancedSearchParams {
    /// Offset of the first result.
    pub fn from(&self) -> usize {
        if self.page <= 1 {
            0
        } else {
            self.per_page.saturating_mul(self.page - 1)
        }
    }
}

/// `name[key]` → (`name`, `key`).
fn split_nested(name: &str) -> (&str, Option<&str>) {
    match name.split_once('[') {
        Some((base, rest)) => match rest.strip_suffix(']') {
            Some(key) => (base, Some(key)),
            None => (name, None),
        },
        None => (name, None),
    }
}

fn pagination_value(raw: &RawParams, name: &str) -> Result<Option<usize>, ParseError> {
    let Some(value) = raw.get(name).first() else {
        return Ok(None);
    };
    let valid = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
    match value.parse::<usize>() {
        Ok(n) if valid => Ok(Some(n)),
        _ => Err(ParseError::Invalid(format!(
            "Invalid value \"{value}\" for parameter \"{name}\" (expected positive integer)"
        ))),
    }
}

fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn boolean_value(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Default)]
struct DateBounds {
    from: Option<String>,
    to: Option<String>,
    invalid: Option<String>,
}

pub fn parse_advanced(
    raw: &RawParams,
    schema: &SearchSchema,
    max_page: usize,
) -> Result<AdvancedSearchParams, ParseError> {
    let (Some(per_page), Some(page)) = (pagination_value(raw, "per_page")?, pagination_value(raw, "page")?) else {
        return Err(ParseError::Invalid("Pagination params are required.".into()));
    };
    if page > max_page {
        return Err(ParseError::Invalid(format!(
            "The maximum for `page` parameter is {max_page}."
        )));
    }

    let keywords = raw
        .get("keywords")
        .first()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());

    let mut unknown: Vec<String> = Vec::new();
    let mut unknown_sort: Vec<String> = Vec::new();
    let mut invalid_booleans: Vec<String> = Vec::new();
    let mut order = None;
    let mut text_filters: Vec<(String, Vec<String>)> = Vec::new();
    let mut date_filters: Vec<(String, DateBounds)> = Vec::new();
    let mut filters = Vec::new();

    for (name, values) in raw.iter() {
        if matches!(name, "page" | "per_page" | "keywords") {
            continue;
        }
        let (base, key) = split_nested(name);
        if base == "order" {
            if let Some(property) = key {
                if schema.field(property).is_none() {
                    unknown_sort.push(property.to_string());
                } else {
                    let direction = match values.first().map(String::as_str) {
                        Some("desc") => SortDirection::Desc,
                        _ => SortDirection::Asc,
                    };
                    let field = schema.sort_field(property).unwrap_or(property);
                    order = Some((field.to_string(), direction));
                }
            }
            continue;
        }

        let Some(definition) = schema.field(base) else {
            if !unknown.iter().any(|u| u == base) {
                unknown.push(base.to_string());
            }
            continue;
        };

        match definition.field_type {
            FieldType::Date => {
                let bounds = match date_filters.iter_mut().find(|(p, _)| p == base) {
                    Some((_, bounds)) => bounds,
                    None => {
                        date_filters.push((base.to_string(), DateBounds::default()));
                        let last = date_filters.len() - 1;
                        &mut date_filters[last].1
                    }
                };
                let value = values.first().cloned().unwrap_or_default();
                match key {
                    Some("from" | "after") if is_iso_date(&value) => bounds.from = Some(value),
                    Some("to" | "before") if is_iso_date(&value) => bounds.to = Some(value),
                    _ => {
                        if bounds.invalid.is_none() {
                            bounds.invalid = Some(value);
                        }
                    }
                }
            }
            FieldType::Boolean => {
                let value = values.first().map(String::as_str).unwrap_or_default();
                match boolean_value(value) {
                    Some(b) => filters.push(Filter::Boolean(BooleanFilter {
                        field: base.to_string(),
                        value: b,
                        negated: false,
                    })),
                    None => invalid_booleans.push(format!(
                        "Invalid value \"{value}\" for boolean property \"{base}\""
                    )),
                }
            }
            _ => {
                let present: Vec<String> = values.iter().filter(|v| !v.is_empty()).cloned().collect();
                if present.is_empty() {
                    continue;
                }
                match text_filters.iter_mut().find(|(p, _)| p == base) {
                    Some((_, existing)) => existing.extend(present),
                    None => text_filters.push((base.to_string(), present)),
                }
            }
        }
    }

    let mut invalid_dates = Vec::new();
    for (property, bounds) in date_filters {
        if let Some(value) = bounds.invalid {
            invalid_dates.push(format!("Invalid value \"{value}\" for date property \"{property}\""));
            continue;
        }
        filters.push(Filter::DateRange(DateRangeFilter {
            from: bounds.from.as_deref().and_then(|d| parse_date_bound(d, false)),
            to: bounds.to.as_deref().and_then(|d| parse_date_bound(d, true)),
            field: property,
            negated: false,
        }));
    }
    for (property, values) in text_filters {
        filters.push(Filter::Text(TextFilter::new(property, &values, false, MultivalueMode::Any)));
    }

    let mut errors = Vec::new();
    if !unknown.is_empty() {
        errors.push(format!("Querying unknown properties {}", quoted_list(&unknown)));
    }
    if !unknown_sort.is_empty() {
        errors.push(format!("Sorting on unknown property {}", quoted_list(&unknown_sort)));
    }
    errors.extend(invalid_booleans);
    errors.extend(invalid_dates);
    if !errors.is_empty() {
        return Err(ParseError::Invalid(errors.join(". ")));
    }

    Ok(AdvancedSearchParams {
        page,
        per_page,
        keywords,
        filters,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<AdvancedSearchParams, String> {
        parse_advanced(&RawParams::from_query_string(query), &SearchSchema::government(), 500_000)
            .map_err(|e| e.message().to_string())
    }

    #[test]
    fn test_pagination_required() {
        assert_eq!(parse("keywords=vat").unwrap_err(), "Pagination params are required.");
        assert_eq!(parse("page=1").unwrap_err(), "Pagination params are required.");
        assert_eq!(
            parse("page=one&per_page=10").unwrap_err(),
            "Invalid value \"one\" for parameter \"page\" (expected positive integer)"
        );
        assert_eq!(
            parse("page=500001&per_page=10").unwrap_err(),
            "The maximum for `page` parameter is 500000."
        );
    }

    #[test]
    fn test_offsets() {
        assert_eq!(parse("page=1&per_page=20").unwrap().from(), 0);
        assert_eq!(parse("page=0&per_page=20").unwrap().from(), 0);
        assert_eq!(parse("page=3&per_page=20").unwrap().from(), 40);
    }

    #[test]
    fn test_property_filters() {
        let params = parse(
            "page=1&per_page=10&keywords=tax&format=guide&organisations[]=hmrc&organisations[]=dvla&is_withdrawn=0&public_timestamp[after]=2014-01-01&order[title]=desc",
        )
        .unwrap();
        assert_eq!(params.keywords.as_deref(), Some("tax"));
        assert_eq!(params.order, Some(("title.sort".to_string(), SortDirection::Desc)));
        assert_eq!(params.filters.len(), 4);
        assert!(params.filters.iter().any(|f| matches!(
            f,
            Filter::Boolean(BooleanFilter { field, value: false, .. }) if field == "is_withdrawn"
        )));
        assert!(params.filters.iter().any(|f| matches!(
            f,
            Filter::Text(t) if t.field == "organisations" && t.values == vec!["hmrc", "dvla"]
        )));
        assert!(params.filters.iter().any(|f| matches!(
            f,
            Filter::DateRange(d) if d.field == "public_timestamp" && d.from.is_some() && d.to.is_none()
        )));
    }

    #[test]
    fn test_errors_reported_together() {
        assert_eq!(
            parse("page=1&per_page=10&wibble=1&wobble=2&order[nonsense]=asc&is_withdrawn=maybe&public_timestamp[from]=01/02/2014")
                .unwrap_err(),
            "Querying unknown properties [\"wibble\", \"wobble\"]. Sorting on unknown property [\"nonsense\"]. \
             Invalid value \"maybe\" for boolean property \"is_withdrawn\". \
             Invalid value \"01/02/2014\" for date property \"public_timestamp\""
        );
    }

    #[test]
    fn test_bare_date_property_is_invalid() {
        assert_eq!(
            parse("page=1&per_page=10&public_timestamp=2014-01-01").unwrap_err(),
            "Invalid value \"2014-01-01\" for date property \"public_timestamp\""
        );
    }
}
