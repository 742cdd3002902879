//! Derived task fields, resolved once when a record is built so that no
//! downstream reader re-evaluates completion or priority on its own.

use std::sync::LazyLock;

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;

use crate::model::diagnostic::OmissionReason;
use crate::model::task::{
    CheckboxState, CompletionSignal, HierarchyRole, Priority, TaskKey, TaskRecord, TaskStatus,
};
use crate::parse::task_parser::{TaskLine, parse_iso_date};
use crate::parse::{DependencyRef, parse_depends};

static PRIORITY_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)#(high|medium|low)\b").unwrap());

pub(crate) const COMPLETION_DATE_KEYS: &[&str] = &["completed", "completion", "donedate", "done-date"];

/// Properties whose values must be ISO dates
pub(crate) const DATE_KEYS: &[&str] = &[
    "start",
    "due",
    "scheduled",
    "completed",
    "completion",
    "donedate",
    "done-date",
];

/// The raw signals that decide whether a task is finished
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionInputs {
    /// `done:: true`
    pub done_flag: bool,
    /// Recognized `status::` keyword
    pub status: Option<TaskStatus>,
    /// `progress::` as a 0..1 ratio
    pub ratio: Option<f64>,
    pub checkbox: CheckboxState,
    /// Any completion-date property is present
    pub completion_date: bool,
}

/// First completion signal that holds, in precedence order:
/// done flag, status string, ratio, checkbox, completion date.
pub fn completion_signal(inputs: &CompletionInputs) -> Option<CompletionSignal> {
    if inputs.done_flag {
        Some(CompletionSignal::DoneFlag)
    } else if inputs.status == Some(TaskStatus::Done) {
        Some(CompletionSignal::StatusString)
    } else if inputs.ratio.is_some_and(|r| r >= 1.0) {
        Some(CompletionSignal::Ratio)
    } else if inputs.checkbox == CheckboxState::Done {
        Some(CompletionSignal::Checkbox)
    } else if inputs.completion_date {
        Some(CompletionSignal::CompletionDate)
    } else {
        None
    }
}

/// Status uses the completion precedence first, then an explicit status
/// keyword ahead of the checkbox and ratio.
pub fn classify_status(inputs: &CompletionInputs) -> TaskStatus {
    if completion_signal(inputs).is_some() {
        return TaskStatus::Done;
    }
    if let Some(status) = inputs.status {
        return status;
    }
    match inputs.checkbox {
        CheckboxState::InProgress => TaskStatus::InProgress,
        CheckboxState::OnHold => TaskStatus::OnHold,
        _ if inputs.ratio.is_some_and(|r| r > 0.0) => TaskStatus::InProgress,
        _ => TaskStatus::NotStarted,
    }
}

/// Explicit `priority::` first, then `#high`/`#medium`/`#low` in the text
pub fn classify_priority(properties: &IndexMap<String, String>, text: &str) -> Priority {
    if let Some(p) = properties.get("priority").and_then(|v| Priority::from_keyword(v)) {
        return p;
    }
    PRIORITY_TAG_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Priority::from_keyword(m.as_str()))
        .unwrap_or(Priority::None)
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}

/// `0.4`, `40%` and `40` all mean 40%. Values above 1 are percents.
pub fn parse_ratio(value: &str) -> Option<f64> {
    let value = value.trim();
    let (number, percent) = match value.strip_suffix('%') {
        Some(n) => (n.trim(), true),
        None => (value, false),
    };
    let n: f64 = number.parse().ok()?;
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    let ratio = if percent || n > 1.0 { n / 100.0 } else { n };
    Some(ratio.min(1.0))
}

/// Fold an `epic::`/`story::` value to a bare lowercase id
pub fn normalize_reference(value: &str) -> Option<String> {
    let value = value.trim();
    let value = value
        .strip_prefix("[[")
        .and_then(|v| v.strip_suffix("]]"))
        .unwrap_or(value);
    let value = value.rsplit('#').next().unwrap_or(value);
    let id = value.trim().trim_start_matches('^').to_lowercase();
    (!id.is_empty()).then_some(id)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | '|' | '[' | ']' | '#'))
}

fn date_property(
    properties: &IndexMap<String, String>,
    key: &str,
) -> Result<Option<NaiveDate>, OmissionReason> {
    match properties.get(key) {
        None => Ok(None),
        Some(value) => parse_iso_date(value)
            .map(Some)
            .ok_or_else(|| OmissionReason::InvalidDate {
                key: key.to_string(),
                value: value.clone(),
            }),
    }
}

/// Build a record from a parsed task line. Unparsable ids or dates reject
/// the whole record; the caller reports the omission and moves on.
pub fn build_record(
    owner: &str,
    line: usize,
    task: &TaskLine,
) -> Result<(TaskRecord, Vec<DependencyRef>), OmissionReason> {
    let mut properties: IndexMap<String, String> = IndexMap::new();
    for token in &task.properties {
        // First occurrence of a key wins
        properties
            .entry(token.key.clone())
            .or_insert_with(|| token.value.clone());
    }

    let (local_id, synthetic_id) = match properties.get("id") {
        Some(id) => {
            let id = id.trim().trim_start_matches('^');
            if !is_valid_id(id) {
                return Err(OmissionReason::InvalidId {
                    value: id.to_string(),
                });
            }
            (id.to_string(), false)
        }
        None => match &task.block_ref {
            Some((id, _)) => (id.clone(), false),
            None => (format!("line-{}", line + 1), true),
        },
    };

    let start = date_property(&properties, "start")?;
    let due = date_property(&properties, "due")?;
    let scheduled = date_property(&properties, "scheduled")?;
    let mut completed = None;
    for key in COMPLETION_DATE_KEYS {
        if let Some(date) = date_property(&properties, key)? {
            completed.get_or_insert(date);
        }
    }

    let ratio = properties.get("progress").and_then(|v| parse_ratio(v));
    let inputs = CompletionInputs {
        done_flag: properties
            .get("done")
            .and_then(|v| parse_flag(v))
            .unwrap_or(false),
        status: properties
            .get("status")
            .and_then(|v| TaskStatus::from_keyword(v)),
        ratio,
        checkbox: task.checkbox,
        completion_date: completed.is_some(),
    };
    let done_by = completion_signal(&inputs);
    let status = classify_status(&inputs);
    let completion = if done_by.is_some() {
        1.0
    } else {
        ratio.unwrap_or(0.0)
    };

    let key = TaskKey::new(owner, &local_id);
    let dep_refs = properties
        .get("depends")
        .map(|v| parse_depends(v))
        .unwrap_or_default();

    let record = TaskRecord {
        role: HierarchyRole::from_id(&local_id),
        priority: classify_priority(&properties, &task.text),
        epic_ref: properties.get("epic").and_then(|v| normalize_reference(v)),
        story_ref: properties.get("story").and_then(|v| normalize_reference(v)),
        key,
        local_id,
        synthetic_id,
        owner: owner.to_string(),
        line,
        indent: task.indent,
        text: task.text.clone(),
        checkbox: task.checkbox,
        status,
        completion,
        done_by,
        start,
        due,
        scheduled,
        completed,
        depends: Vec::new(),
        properties,
    };
    Ok((record, dep_refs))
}
