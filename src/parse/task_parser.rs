use std::ops::Range;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::model::task::CheckboxState;

/// `<indent><marker> [c] <body>` where marker is `-`, `*`, `+`, `1.` or `1)`
static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)(?:[-*+]|\d+[.)])[ \t]+\[(.)\](?:[ \t]+|$)").unwrap()
});

/// Bare `key:: value` token start. The key may contain non-breaking spaces.
static BARE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[ \t])([\p{L}\p{N}_-][\p{L}\p{N}_\-\x{a0}]*)::").unwrap()
});

/// Bracketed `[key:: value]` or `(key:: value)` token
static BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(]([^\[\]()]+?)::([^\[\]()]*)[\])]").unwrap()
});

/// A hashtag after a bare value closes that value
static VALUE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+#").unwrap());

/// Trailing Obsidian-style block reference: `^block-id`
static BLOCK_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[ \t])\^([A-Za-z0-9_-]+)[ \t]*$").unwrap());

/// One inline property as it appears in the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyToken {
    /// Normalized key (see `normalize_key`)
    pub key: String,
    /// Key as written
    pub raw_key: String,
    pub value: String,
    /// Byte range of the whole token in the line (brackets included)
    pub span: Range<usize>,
    /// Byte range of the trimmed value in the line
    pub value_span: Range<usize>,
    pub bracketed: bool,
}

/// A parsed task line. All ranges are byte offsets into the original line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    pub indent: usize,
    pub checkbox: CheckboxState,
    /// Byte offset of the checkbox character
    pub checkbox_at: usize,
    /// Byte offset where the text after the checkbox begins
    pub body_start: usize,
    /// Display text with property tokens and the block reference removed
    pub text: String,
    pub properties: Vec<PropertyToken>,
    /// Block id without the `^`, and the byte range of `^id`
    pub block_ref: Option<(String, Range<usize>)>,
}

impl TaskLine {
    /// First token with the given key (any spelling)
    pub fn property(&self, key: &str) -> Option<&PropertyToken> {
        let key = normalize_key(key);
        self.properties.iter().find(|p| p.key == key)
    }
}

/// Fold a property key: lowercase, whitespace (including non-breaking
/// spaces) removed.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Parse a strict `YYYY-MM-DD` date. Surrounding quotes and whitespace are
/// tolerated.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a task line. Returns `None` for anything that is not a list item
/// with a recognized checkbox.
pub fn parse_task_line(line: &str) -> Option<TaskLine> {
    let caps = TASK_LINE_RE.captures(line)?;
    let indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
    let state = caps.get(2)?;
    let checkbox = CheckboxState::from_checkbox_char(state.as_str().chars().next()?)?;
    let body_start = caps.get(0)?.end();

    let (properties, block_ref) = tokenize(line, body_start);

    // Display text: body minus every token, whitespace collapsed
    let mut cut: Vec<Range<usize>> = properties.iter().map(|p| p.span.clone()).collect();
    if let Some((_, span)) = &block_ref {
        cut.push(span.clone());
    }
    cut.sort_by_key(|r| r.start);
    let mut text = String::new();
    let mut pos = body_start;
    for range in &cut {
        if range.start > pos {
            text.push_str(&line[pos..range.start]);
            text.push(' ');
        }
        pos = pos.max(range.end);
    }
    if pos < line.len() {
        text.push_str(&line[pos..]);
    }
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    Some(TaskLine {
        indent,
        checkbox,
        checkbox_at: state.start(),
        body_start,
        text,
        properties,
        block_ref,
    })
}

/// Find property tokens and the block reference in `line[body_start..]`.
fn tokenize(
    line: &str,
    body_start: usize,
) -> (Vec<PropertyToken>, Option<(String, Range<usize>)>) {
    let body = &line[body_start..];

    let block_ref = BLOCK_REF_RE.captures(body).and_then(|caps| {
        let id = caps.get(1)?;
        // include the `^`
        let start = body_start + id.start() - 1;
        // `story:: ^S-1` at the end of a line is a value, not a block id
        if line[..start].trim_end().ends_with("::") {
            return None;
        }
        Some((id.as_str().to_string(), start..body_start + id.end()))
    });
    let body_end = block_ref
        .as_ref()
        .map_or(line.len(), |(_, span)| span.start);

    let mut tokens = Vec::new();

    for caps in BRACKET_RE.captures_iter(&line[body_start..body_end]) {
        let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let value_span = trimmed_span(line, body_start + value.start()..body_start + value.end());
        tokens.push(PropertyToken {
            key: normalize_key(key.as_str()),
            raw_key: key.as_str().trim().to_string(),
            value: line[value_span.clone()].to_string(),
            span: body_start + whole.start()..body_start + whole.end(),
            value_span,
            bracketed: true,
        });
    }

    // Bare keys outside of bracketed tokens
    let bracketed: Vec<Range<usize>> = tokens.iter().map(|t| t.span.clone()).collect();
    let inside_bracket = |pos: usize| bracketed.iter().any(|r| r.contains(&pos));
    let mut bare_keys: Vec<(Range<usize>, usize)> = Vec::new(); // (key range, end of `::`)
    for caps in BARE_KEY_RE.captures_iter(&line[body_start..body_end]) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let key_start = body_start + key.start();
        if inside_bracket(key_start) {
            continue;
        }
        bare_keys.push((key_start..body_start + key.end(), body_start + whole.end()));
    }

    for (i, (key_range, value_start)) in bare_keys.iter().enumerate() {
        let mut value_end = body_end;
        if let Some((next_key, _)) = bare_keys.get(i + 1) {
            value_end = value_end.min(next_key.start);
        }
        if let Some(next_bracket) = bracketed.iter().find(|r| r.start >= *value_start) {
            value_end = value_end.min(next_bracket.start);
        }
        let raw_value = &line[*value_start..value_end];
        let lead = raw_value.len() - raw_value.trim_start().len();
        if let Some(tag) = VALUE_TAG_RE.find(&raw_value[lead..]) {
            value_end = *value_start + lead + tag.start();
        }
        let value_span = trimmed_span(line, *value_start..value_end);
        let raw_key = &line[key_range.clone()];
        tokens.push(PropertyToken {
            key: normalize_key(raw_key),
            raw_key: raw_key.to_string(),
            value: line[value_span.clone()].to_string(),
            span: key_range.start..value_span.end.max(*value_start),
            value_span,
            bracketed: false,
        });
    }

    tokens.sort_by_key(|t| t.span.start);
    (tokens, block_ref)
}

/// Shrink a byte range so it excludes surrounding whitespace
fn trimmed_span(line: &str, range: Range<usize>) -> Range<usize> {
    let slice = &line[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead == slice.len() {
        return range.start..range.start;
    }
    range.start + lead..range.end - trail
}
