//! Localized substitutions on single lines. Everything outside the edited
//! token is left byte-for-byte as it was.

use std::ops::Range;

use chrono::{Duration, NaiveDate};

use crate::model::task::CheckboxState;
use crate::parse::{TaskLine, parse_iso_date, parse_task_line};

fn splice(line: &str, range: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(line.len() + replacement.len());
    out.push_str(&line[..range.start]);
    out.push_str(replacement);
    out.push_str(&line[range.end..]);
    out
}

pub fn set_checkbox(line: &str, task: &TaskLine, state: CheckboxState) -> String {
    let at = task.checkbox_at;
    let width = line[at..].chars().next().map_or(0, char::len_utf8);
    splice(line, at..at + width, &state.checkbox_char().to_string())
}

/// Set a property's value. An existing token is rewritten in place; a new
/// `key:: value` token goes before the trailing block reference, or at the
/// end of the line.
pub fn set_property(line: &str, task: &TaskLine, key: &str, value: &str) -> String {
    if let Some(token) = task.property(key) {
        let span = token.value_span.clone();
        let needs_space = span.is_empty()
            && !token.bracketed
            && !line[..span.start].ends_with(char::is_whitespace);
        let value = if needs_space {
            format!(" {}", value)
        } else {
            value.to_string()
        };
        return splice(line, span, &value);
    }

    let insert_at = match &task.block_ref {
        Some((_, span)) => span.start,
        None => line.len(),
    };
    let head = line[..insert_at].trim_end();
    let tail = &line[insert_at..];
    let sep = if tail.is_empty() { "" } else { " " };
    format!("{} {}:: {}{}{}", head, key, value, sep, tail)
}

/// Remove every token with the given key, together with the whitespace
/// that separated it from the preceding text.
pub fn remove_property(line: &str, task: &TaskLine, key: &str) -> String {
    let key = crate::parse::normalize_key(key);
    let mut spans: Vec<Range<usize>> = task
        .properties
        .iter()
        .filter(|p| p.key == key)
        .map(|p| p.span.clone())
        .collect();
    if spans.is_empty() {
        return line.to_string();
    }
    spans.sort_by_key(|r| std::cmp::Reverse(r.start));

    let mut out = line.to_string();
    for span in spans {
        let lead = out[..span.start].len() - out[..span.start].trim_end().len();
        let start = (span.start - lead).max(task.body_start.min(span.start));
        out = splice(&out, start..span.end, "");
    }
    out
}

/// Shift an ISO date by a signed number of days
pub fn shift_date(value: &str, days: i64) -> Option<NaiveDate> {
    let date = parse_iso_date(value)?;
    date.checked_add_signed(Duration::days(days))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Outcome of shifting one date-valued property on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateShift {
    Shifted(String),
    /// The line has no such property
    Missing,
    /// The property's value is not an ISO date
    Invalid,
}

pub fn shift_date_property(line: &str, key: &str, days: i64) -> DateShift {
    let Some(task) = parse_task_line(line) else {
        return DateShift::Missing;
    };
    let Some(token) = task.property(key) else {
        return DateShift::Missing;
    };
    match shift_date(&token.value, days) {
        Some(date) => DateShift::Shifted(set_property(line, &task, key, &format_date(date))),
        None => DateShift::Invalid,
    }
}

/// Replace a front-matter value in place, keeping surrounding quotes
pub fn replace_front_matter_value(line: &str, value_span: Range<usize>, value: &str) -> String {
    let current = &line[value_span.clone()];
    let quoted = current.len() >= 2
        && ((current.starts_with('"') && current.ends_with('"'))
            || (current.starts_with('\'') && current.ends_with('\'')));
    let inner = if quoted {
        value_span.start + 1..value_span.end - 1
    } else {
        value_span
    };
    splice(line, inner, value)
}

// ---------------------------------------------------------------------------
// Whole-document helpers
// ---------------------------------------------------------------------------

/// Replace line `idx` (0-indexed) of `text`, keeping its line ending.
/// Returns `None` when the line does not exist.
pub fn replace_line(text: &str, idx: usize, new_line: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + new_line.len());
    let mut found = false;
    for (i, raw) in text.split_inclusive('\n').enumerate() {
        if i == idx {
            let body = raw.trim_end_matches(['\n', '\r']);
            out.push_str(new_line);
            out.push_str(&raw[body.len()..]);
            found = true;
        } else {
            out.push_str(raw);
        }
    }
    found.then_some(out)
}
