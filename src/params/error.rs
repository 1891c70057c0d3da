// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Parse errors and the problem collector shared by the parameter parsers.
//!
//! Parsers keep going after a problem so that every still-valid parameter
//! ends up in the fallback parameters, but a request only ever reports one
//! message. Precedence:
//!
//! 1. request-shape problems (integer magnitude, query length) → 400
//! 2. unknown parameter names, listed together in first-seen order → 422
//! 3. the first problem encountered in processing order → 422

use thiserror::Error;

/// Largest integer accepted for numeric parameters.
pub const MAX_INTEGER: u64 = i32::MAX as u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Structural validation error; reported as 422 with a JSON body.
    #[error("{0}")]
    Invalid(String),
    /// Request-shape error; reported as 400 with a plain-text body.
    #[error("{0}")]
    BadRequest(String),
}

impl ParseError {
    pub fn message(&self) -> &str {
        match self {
            Self::Invalid(m) | Self::BadRequest(m) => m,
        }
    }
}

/// Problems found while parsing one request.
#[derive(Debug, Default)]
pub struct Problems {
    errors: Vec<String>,
    unknown: Vec<String>,
    bad_request: Option<String>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn unknown(&mut self, name: impl Into<String>) {
        self.unknown.push(name.into());
    }

    /// Record a request-shape problem; the first one wins.
    pub fn bad_request(&mut self, message: impl Into<String>) {
        if self.bad_request.is_none() {
            self.bad_request = Some(message.into());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.unknown.is_empty() && self.bad_request.is_none()
    }

    /// Absorb problems from a nested parser, keeping order.
    pub fn extend(&mut self, other: Problems) {
        self.errors.extend(other.errors);
        self.unknown.extend(other.unknown);
        if let Some(msg) = other.bad_request {
            self.bad_request(msg);
        }
    }

    /// The single error reported for the request, if any.
    pub fn into_error(self) -> Option<ParseError> {
        if let Some(msg) = self.bad_request {
            return Some(ParseError::BadRequest(msg));
        }
        if !self.unknown.is_empty() {
            return Some(ParseError::Invalid(format!(
                "Unexpected parameters: {}",
                self.unknown.join(", ")
            )));
        }
        self.errors.into_iter().next().map(ParseError::Invalid)
    }

    /// Every collected message, in order (for logging).
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.bad_request
            .iter()
            .chain(self.errors.iter())
            .map(String::as_str)
    }

    /// Parse a strictly non-negative integer.
    ///
    /// `description` completes the message, e.g. `parameter "start"`.
    /// Leading zeros are fine; signs, decimals and whitespace are not.
    pub fn integer(&mut self, raw: &str, description: &str) -> Option<usize> {
        let digits_only = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

        if digits_only(raw) {
            let trimmed = raw.trim_start_matches('0');
            let within_ceiling = trimmed.len() <= 10
                && trimmed.parse::<u64>().map_or(trimmed.is_empty(), |v| v <= MAX_INTEGER);
            if !within_ceiling {
                self.bad_request(format!("Integer value of {raw} exceeds maximum allowed"));
                return None;
            }
            return trimmed.parse::<usize>().ok().or(Some(0));
        }

        if raw.strip_prefix('-').is_some_and(digits_only) {
            self.push(format!(
                "Invalid negative value \"{raw}\" for {description} (expected positive integer)"
            ));
        } else {
            self.push(format!(
                "Invalid value \"{raw}\" for {description} (expected positive integer)"
            ));
        }
        None
    }
}

/// Format names the way client error messages list them: `["a", "b"]`.
pub fn quoted_list(names: &[String]) -> String {
    let items: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_accepts_leading_zeros() {
        let mut p = Problems::new();
        assert_eq!(p.integer("09", "parameter \"start\""), Some(9));
        assert_eq!(p.integer("000", "parameter \"start\""), Some(0));
        assert!(p.is_empty());
    }

    #[test]
    fn test_integer_negative_message() {
        let mut p = Problems::new();
        assert_eq!(p.integer("-7", "parameter \"start\""), None);
        assert_eq!(
            p.into_error(),
            Some(ParseError::Invalid(
                "Invalid negative value \"-7\" for parameter \"start\" (expected positive integer)".into()
            ))
        );
    }

    #[test]
    fn test_integer_non_numeric_message() {
        let mut p = Problems::new();
        assert_eq!(p.integer("1.5", "parameter \"count\""), None);
        assert_eq!(
            p.into_error().unwrap().message(),
            "Invalid value \"1.5\" for parameter \"count\" (expected positive integer)"
        );
    }

    #[test]
    fn test_integer_magnitude_is_bad_request() {
        let mut p = Problems::new();
        assert_eq!(p.integer("99999999999999999999", "parameter \"start\""), None);
        assert_eq!(
            p.into_error(),
            Some(ParseError::BadRequest(
                "Integer value of 99999999999999999999 exceeds maximum allowed".into()
            ))
        );
    }

    #[test]
    fn test_integer_ceiling_boundary() {
        let mut p = Problems::new();
        assert_eq!(p.integer("2147483647", "x"), Some(2_147_483_647));
        assert_eq!(p.integer("2147483648", "x"), None);
    }

    #[test]
    fn test_unknown_takes_precedence_over_errors() {
        let mut p = Problems::new();
        p.push("first problem");
        p.unknown("foo");
        p.unknown("bar");
        assert_eq!(
            p.into_error(),
            Some(ParseError::Invalid("Unexpected parameters: foo, bar".into()))
        );
    }

    #[test]
    fn test_quoted_list() {
        assert_eq!(quoted_list(&["waffle".into()]), "[\"waffle\"]");
        assert_eq!(quoted_list(&["a".into(), "b".into()]), "[\"a\", \"b\"]");
    }
}
