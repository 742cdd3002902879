use std::ops::Range;

use chrono::NaiveDate;

use super::task_parser::parse_iso_date;

/// One `key: value` line of a front-matter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatterEntry {
    /// Folded key (see `normalize_front_matter_key`)
    pub key: String,
    pub value: String,
    /// 0-indexed line
    pub line: usize,
    /// Byte range of the trimmed value within its line
    pub value_span: Range<usize>,
}

/// The `---` delimited header of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub entries: Vec<FrontMatterEntry>,
    /// 0-indexed line of the closing `---`
    pub end_line: usize,
}

impl FrontMatter {
    pub fn get(&self, key: &str) -> Option<&FrontMatterEntry> {
        let key = normalize_front_matter_key(key);
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn start_entry(&self) -> Option<&FrontMatterEntry> {
        self.get("start").or_else(|| self.get("start date"))
    }

    pub fn end_entry(&self) -> Option<&FrontMatterEntry> {
        self.get("end").or_else(|| self.get("end date"))
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start_entry().and_then(|e| parse_iso_date(&e.value))
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end_entry().and_then(|e| parse_iso_date(&e.value))
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title")
            .map(|e| e.value.trim_matches(|c| c == '"' || c == '\''))
            .filter(|t| !t.is_empty())
    }
}

/// Fold a front-matter key: case, spaces and underscores are ignored
pub fn normalize_front_matter_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Parse the front-matter block at the top of `lines`. Only top-level
/// `key: value` lines are collected; nested YAML is skipped. An unterminated
/// block yields `None`.
pub fn parse_front_matter<S: AsRef<str>>(lines: &[S]) -> Option<FrontMatter> {
    if lines.first().map(|l| l.as_ref().trim_end()) != Some("---") {
        return None;
    }

    let mut entries = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(1) {
        let line = line.as_ref();
        if line.trim_end() == "---" {
            return Some(FrontMatter {
                entries,
                end_line: idx,
            });
        }
        if line.starts_with([' ', '\t', '-', '#']) {
            continue;
        }
        let Some((key, _)) = line.split_once(':') else {
            continue;
        };
        let value_start = key.len() + 1;
        let raw_value = &line[value_start..];
        let lead = raw_value.len() - raw_value.trim_start().len();
        let value = raw_value.trim();
        let start = value_start + lead;
        entries.push(FrontMatterEntry {
            key: normalize_front_matter_key(key),
            value: value.to_string(),
            line: idx,
            value_span: start..start + value.len(),
        });
    }
    None
}
