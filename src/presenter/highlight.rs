// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `title_with_highlighting` and `description_with_highlighting`.
//!
//! Engine fragments arrive HTML-escaped with `<mark>` tags around matches and
//! are passed through untouched. Without a fragment the stored text is
//! escaped here instead.

use crate::engine::{html_escape, RawHit};
use crate::search::{HIGHLIGHT_POST_TAG, HIGHLIGHT_PRE_TAG};

pub const ELLIPSIS: &str = "…";

fn first_fragment<'a>(hit: &'a RawHit, field: &str) -> Option<&'a str> {
    hit.highlight
        .get(field)
        .and_then(|fragments| fragments.first())
        .map(String::as_str)
}

fn source_text<'a>(hit: &'a RawHit, field: &str) -> Option<&'a str> {
    match hit.source.get(field)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()),
        _ => None,
    }
}

pub fn highlighted_title(hit: &RawHit) -> Option<String> {
    if let Some(fragment) = first_fragment(hit, "title") {
        return Some(fragment.to_string());
    }
    source_text(hit, "title").map(html_escape)
}

/// Highlighted description, with an ellipsis on each side the fragment cut.
/// Unhighlighted descriptions are cut to `budget` characters.
pub fn highlighted_description(hit: &RawHit, budget: usize) -> Option<String> {
    let description = source_text(hit, "description");
    if let Some(fragment) = first_fragment(hit, "description") {
        let plain = strip_markup(fragment);
        let full = description.unwrap_or_default().trim();
        let mut text = String::new();
        if !full.starts_with(plain.trim()) {
            text.push_str(ELLIPSIS);
        }
        text.push_str(fragment);
        if !full.ends_with(plain.trim()) {
            text.push_str(ELLIPSIS);
        }
        return Some(text);
    }

    let description = description?;
    if description.chars().count() <= budget {
        return Some(html_escape(description));
    }
    let cut: String = description
        .chars()
        .take(budget.saturating_sub(1))
        .collect();
    Some(format!("{}{ELLIPSIS}", html_escape(cut.trim_end())))
}

/// Fragment text with highlight tags removed and entities decoded.
fn strip_markup(fragment: &str) -> String {
    decode_entities(&fragment.replace(HIGHLIGHT_PRE_TAG, "").replace(HIGHLIGHT_POST_TAG, ""))
}

/// Decode named and numeric character references in one pass.
///
/// Unknown or malformed references are kept as written.
fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let reference = after
            .find(';')
            .filter(|&end| end <= 8)
            .and_then(|end| decode_reference(&after[..end]).map(|c| (c, end)));
        match reference {
            Some((c, end)) => {
                decoded.push(c);
                rest = &after[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = after;
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
