//! Mutation gateway: state changes and reschedules become targeted edits of
//! the owning document's text, followed by one reindex.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::io::store::{DocumentStore, StoreError};
use crate::model::intent::RescheduleIntent;
use crate::model::task::{CheckboxState, TaskKey, TaskRecord, TaskStatus};
use crate::ops::derive::{COMPLETION_DATE_KEYS, DATE_KEYS, parse_flag, parse_ratio};
use crate::ops::index::IndexEngine;
use crate::ops::line_edit::{
    DateShift, format_date, remove_property, replace_front_matter_value, replace_line,
    set_checkbox, set_property, shift_date, shift_date_property,
};
use crate::parse::document::is_fence;
use crate::parse::{TaskLine, normalize_key, parse_front_matter, parse_iso_date, parse_task_line};

/// Result of a mutation that did not fail on I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationOutcome {
    /// The document was rewritten and reindexed
    Applied,
    /// Nothing to change; the store was not written
    Unchanged,
    /// No owning document or no matching line
    NotFound,
    /// A date involved is not a valid ISO date
    InvalidDate,
}

/// Edits to one task line, applied in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub checkbox: Option<CheckboxState>,
    /// `(key, value)` pairs to set
    pub set: Vec<(String, String)>,
    /// Keys whose tokens are removed
    pub remove: Vec<String>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.checkbox.is_none() && self.set.is_empty() && self.remove.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Locating lines
// ---------------------------------------------------------------------------

/// Id written on a task line: the `id::` property, else the block reference
fn written_id(task: &TaskLine) -> Option<String> {
    task.property("id")
        .map(|p| p.value.trim().trim_start_matches('^').to_lowercase())
        .or_else(|| task.block_ref.as_ref().map(|(id, _)| id.to_lowercase()))
}

fn line_matches(line: &str, record: &TaskRecord) -> bool {
    let Some(task) = parse_task_line(line) else {
        return false;
    };
    match written_id(&task) {
        Some(id) => !record.synthetic_id && id == record.key.local_id(),
        None => record.synthetic_id && task.text == record.text,
    }
}

/// Find the record's line: the cached line number if it still holds the
/// task, otherwise the first matching task line outside code fences.
pub fn locate_task_line(lines: &[&str], record: &TaskRecord) -> Option<usize> {
    if lines
        .get(record.line)
        .is_some_and(|line| line_matches(line, record))
    {
        return Some(record.line);
    }
    let mut in_fence = false;
    for (idx, line) in lines.iter().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && line_matches(line, record) {
            debug!(task = %record.key, cached = record.line, found = idx, "task line moved");
            return Some(idx);
        }
    }
    None
}

/// Read a document, treating an unknown document as "not found"
fn read_document<S: DocumentStore>(
    engine: &IndexEngine<S>,
    key: &str,
) -> Result<Option<String>, StoreError> {
    match engine.store().read(key) {
        Ok(text) => Ok(Some(text)),
        Err(StoreError::UnknownDocument(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_and_reindex<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    document: &str,
    text: &str,
) -> Result<MutationOutcome, StoreError> {
    engine.store_mut().write(document, text)?;
    info!(document, "document updated");
    engine.reindex()?;
    Ok(MutationOutcome::Applied)
}

/// Locate a task's line, let `edit` rewrite it, and persist the result.
/// `edit` returns `Err(outcome)` to stop without writing.
fn edit_task_line<S, F>(
    engine: &mut IndexEngine<S>,
    key: &TaskKey,
    edit: F,
) -> Result<MutationOutcome, StoreError>
where
    S: DocumentStore,
    F: FnOnce(&str) -> Result<String, MutationOutcome>,
{
    let Some(record) = engine.task(key).cloned() else {
        debug!(task = %key, "mutation target not in snapshot");
        return Ok(MutationOutcome::NotFound);
    };
    let Some(text) = read_document(engine, &record.owner)? else {
        return Ok(MutationOutcome::NotFound);
    };
    let lines: Vec<&str> = text.lines().collect();
    let Some(idx) = locate_task_line(&lines, &record) else {
        debug!(task = %key, "no matching line");
        return Ok(MutationOutcome::NotFound);
    };

    let new_line = match edit(lines[idx]) {
        Ok(line) => line,
        Err(outcome) => return Ok(outcome),
    };
    if new_line == lines[idx] {
        return Ok(MutationOutcome::Unchanged);
    }
    let Some(new_text) = replace_line(&text, idx, &new_line) else {
        return Ok(MutationOutcome::NotFound);
    };
    write_and_reindex(engine, &record.owner, &new_text)
}

/// Re-parse after each step so later edits see current token spans
fn reparse(line: &str) -> Result<TaskLine, MutationOutcome> {
    parse_task_line(line).ok_or(MutationOutcome::NotFound)
}

// ---------------------------------------------------------------------------
// Task edits
// ---------------------------------------------------------------------------

/// Apply checkbox and property edits to a task's line. Date-valued keys must
/// be given ISO dates.
pub fn update_task<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    key: &TaskKey,
    changes: &TaskChanges,
) -> Result<MutationOutcome, StoreError> {
    if changes.is_empty() {
        return Ok(MutationOutcome::Unchanged);
    }
    let bad_date = changes
        .set
        .iter()
        .any(|(k, v)| DATE_KEYS.contains(&normalize_key(k).as_str()) && parse_iso_date(v).is_none());
    if bad_date {
        return Ok(MutationOutcome::InvalidDate);
    }

    edit_task_line(engine, key, |line| {
        let mut line = line.to_string();
        if let Some(state) = changes.checkbox {
            line = set_checkbox(&line, &reparse(&line)?, state);
        }
        for (k, v) in &changes.set {
            line = set_property(&line, &reparse(&line)?, k, v);
        }
        for k in &changes.remove {
            line = remove_property(&line, &reparse(&line)?, k);
        }
        Ok(line)
    })
}

/// Rewrite a task line so it derives to `status`.
///
/// The checkbox and any `status::` token are rewritten. Leaving done clears
/// the other completion signals (`done::` becomes false, completion dates
/// and full `progress::` are removed); entering done records
/// `completed:: <today>` unless a completion date is already there.
pub fn status_line(line: &str, status: TaskStatus, today: NaiveDate) -> Result<String, MutationOutcome> {
    let mut line = set_checkbox(line, &reparse(line)?, status.checkbox());

    let task = reparse(&line)?;
    if task.property("status").is_some() {
        line = set_property(&line, &task, "status", status.keyword());
    }

    if status == TaskStatus::Done {
        let task = reparse(&line)?;
        let has_date = COMPLETION_DATE_KEYS.iter().any(|k| task.property(k).is_some());
        if !has_date {
            line = set_property(&line, &task, "completed", &format_date(today));
        }
        return Ok(line);
    }

    let task = reparse(&line)?;
    if task
        .property("done")
        .is_some_and(|p| parse_flag(&p.value) == Some(true))
    {
        line = set_property(&line, &task, "done", "false");
    }
    for k in COMPLETION_DATE_KEYS {
        line = remove_property(&line, &reparse(&line)?, k);
    }
    let task = reparse(&line)?;
    if task
        .property("progress")
        .and_then(|p| parse_ratio(&p.value))
        .is_some_and(|r| r >= 1.0)
    {
        line = remove_property(&line, &task, "progress");
    }
    Ok(line)
}

pub fn move_task_to_status<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    key: &TaskKey,
    status: TaskStatus,
    today: NaiveDate,
) -> Result<MutationOutcome, StoreError> {
    edit_task_line(engine, key, |line| status_line(line, status, today))
}

// ---------------------------------------------------------------------------
// Date shifts
// ---------------------------------------------------------------------------

/// Shift a task line's `start::` and `due::` dates.
///
/// A task with only a due date is drawn as a one-day bar at that date, so
/// moving its start edge adds a `start::` relative to the due date.
pub fn shift_line_dates(line: &str, delta_start: i64, delta_due: i64) -> Result<String, MutationOutcome> {
    let task = reparse(line)?;
    let due = task.property("due").map(|p| p.value.clone());
    let has_start = task.property("start").is_some();
    let mut line = line.to_string();

    if delta_start != 0 {
        if has_start {
            line = match shift_date_property(&line, "start", delta_start) {
                DateShift::Shifted(l) => l,
                DateShift::Invalid => return Err(MutationOutcome::InvalidDate),
                DateShift::Missing => line,
            };
        } else if let Some(due) = &due {
            let start = shift_date(due, delta_start).ok_or(MutationOutcome::InvalidDate)?;
            // a move shifts the due date below, so the bar keeps its length
            if delta_start != delta_due {
                line = set_property(&line, &reparse(&line)?, "start", &format_date(start));
            }
        }
    }

    if delta_due != 0 && due.is_some() {
        line = match shift_date_property(&line, "due", delta_due) {
            DateShift::Shifted(l) => l,
            DateShift::Invalid => return Err(MutationOutcome::InvalidDate),
            DateShift::Missing => line,
        };
    }

    // A dragged edge stops at the other one: the bar keeps at least one day
    if delta_start != delta_due {
        let task = reparse(&line)?;
        let date = |key: &str| task.property(key).and_then(|p| parse_iso_date(&p.value));
        if let (Some(start), Some(due)) = (date("start"), date("due"))
            && start > due
        {
            line = if delta_start != 0 {
                set_property(&line, &task, "start", &format_date(due))
            } else {
                set_property(&line, &task, "due", &format_date(start))
            };
        }
    }
    Ok(line)
}

pub fn shift_task_dates<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    key: &TaskKey,
    delta_start: i64,
    delta_due: i64,
) -> Result<MutationOutcome, StoreError> {
    if delta_start == 0 && delta_due == 0 {
        return Ok(MutationOutcome::Unchanged);
    }
    edit_task_line(engine, key, |line| shift_line_dates(line, delta_start, delta_due))
}

pub fn move_task<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    key: &TaskKey,
    delta_days: i64,
) -> Result<MutationOutcome, StoreError> {
    shift_task_dates(engine, key, delta_days, delta_days)
}

/// Shift a project's front-matter Start/End lines in place
pub fn shift_project_dates<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    project: &str,
    delta_start: i64,
    delta_end: i64,
) -> Result<MutationOutcome, StoreError> {
    if delta_start == 0 && delta_end == 0 {
        return Ok(MutationOutcome::Unchanged);
    }
    let Some(text) = read_document(engine, project)? else {
        return Ok(MutationOutcome::NotFound);
    };
    let lines: Vec<&str> = text.lines().collect();
    let Some(fm) = parse_front_matter(&lines) else {
        return Ok(MutationOutcome::NotFound);
    };

    let mut edits = Vec::new();
    for (entry, delta) in [(fm.start_entry(), delta_start), (fm.end_entry(), delta_end)] {
        let Some(entry) = entry else {
            continue;
        };
        if delta == 0 {
            continue;
        }
        let Some(date) = shift_date(&entry.value, delta) else {
            return Ok(MutationOutcome::InvalidDate);
        };
        let line = replace_front_matter_value(
            lines[entry.line],
            entry.value_span.clone(),
            &format_date(date),
        );
        edits.push((entry.line, line));
    }
    if edits.is_empty() {
        return Ok(MutationOutcome::Unchanged);
    }

    let mut new_text = text.clone();
    for (idx, line) in &edits {
        if let Some(t) = replace_line(&new_text, *idx, line) {
            new_text = t;
        }
    }
    write_and_reindex(engine, project, &new_text)
}

/// Route a reschedule intent from the timeline. All-zero intents never
/// touch the store.
pub fn apply_intent<S: DocumentStore>(
    engine: &mut IndexEngine<S>,
    intent: &RescheduleIntent,
) -> Result<MutationOutcome, StoreError> {
    if intent.is_noop() {
        return Ok(MutationOutcome::Unchanged);
    }
    debug!(?intent, "applying reschedule");
    match intent {
        RescheduleIntent::BarMoved { task, delta_days } => move_task(engine, task, *delta_days),
        RescheduleIntent::BarResized {
            task,
            delta_start,
            delta_due,
        } => shift_task_dates(engine, task, *delta_start, *delta_due),
        RescheduleIntent::ProjectBarMoved {
            project,
            delta_days,
        } => shift_project_dates(engine, project, *delta_days, *delta_days),
        RescheduleIntent::ProjectBarResized {
            project,
            delta_start,
            delta_end,
        } => shift_project_dates(engine, project, *delta_start, *delta_end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use pretty_assertions::assert_eq;

    const DOC: &str = "\
---
title: Alpha
Start: 2026-01-05
end_date: \"2026-03-27\"
---
- [ ] Schema id:: SB-1 start:: 2026-01-12 due:: 2026-01-16
- [x] Handlers due:: 2026-01-20 completed:: 2026-01-19 ^sb-2
- [ ] Untracked chore
- [/] Review status:: in-progress progress:: 40%
";

    fn engine() -> IndexEngine<MemoryStore> {
        let mut engine = IndexEngine::new(MemoryStore::new().with("alpha.md", DOC));
        engine.reindex().unwrap();
        engine
    }

    fn key(id: &str) -> TaskKey {
        TaskKey::new("alpha.md", id)
    }

    fn line(engine: &IndexEngine<MemoryStore>, n: usize) -> String {
        engine.store().get("alpha.md").unwrap().lines().nth(n).unwrap().to_string()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    #[test]
    fn test_move_to_done_and_back() {
        let mut engine = engine();
        let outcome = move_task_to_status(&mut engine, &key("sb-1"), TaskStatus::Done, today()).unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(
            line(&engine, 5),
            "- [x] Schema id:: SB-1 start:: 2026-01-12 due:: 2026-01-16 completed:: 2026-02-01"
        );
        assert!(engine.task(&key("sb-1")).unwrap().is_done());
        assert_eq!(engine.snapshot().generation, 2);

        move_task_to_status(&mut engine, &key("sb-2"), TaskStatus::InProgress, today()).unwrap();
        assert_eq!(line(&engine, 6), "- [/] Handlers due:: 2026-01-20 ^sb-2");
        let sb2 = engine.task(&key("sb-2")).unwrap();
        assert_eq!(sb2.status, TaskStatus::InProgress);
        assert!(!sb2.is_done());
    }

    #[test]
    fn test_status_token_rewritten() {
        let mut engine = engine();
        let review = engine.find_task("line-9").unwrap().key.clone();
        move_task_to_status(&mut engine, &review, TaskStatus::OnHold, today()).unwrap();
        assert_eq!(line(&engine, 8), "- [-] Review status:: on-hold progress:: 40%");
    }

    #[test]
    fn test_same_status_is_unchanged() {
        let mut engine = engine();
        let outcome = move_task_to_status(&mut engine, &key("sb-2"), TaskStatus::Done, today()).unwrap();
        assert_eq!(outcome, MutationOutcome::Unchanged);
        assert_eq!(engine.store().writes(), 0);
    }

    #[test]
    fn test_line_drift_falls_back_to_scan() {
        let mut engine = engine();
        // an unrelated edit shifts every task down two lines
        let drifted = DOC.replace("---\n- [ ] Schema", "---\nNotes\n\n- [ ] Schema");
        engine.store_mut().insert("alpha.md", &drifted);

        let outcome = move_task(&mut engine, &key("sb-1"), 2).unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(
            line(&engine, 7),
            "- [ ] Schema id:: SB-1 start:: 2026-01-14 due:: 2026-01-18"
        );
    }

    #[test]
    fn test_missing_line_is_not_found() {
        let mut engine = engine();
        engine
            .store_mut()
            .insert("alpha.md", "- [ ] Something else id:: X-1\n");
        let outcome = move_task(&mut engine, &key("sb-1"), 1).unwrap();
        assert_eq!(outcome, MutationOutcome::NotFound);
        assert_eq!(
            move_task(&mut engine, &key("nope"), 1).unwrap(),
            MutationOutcome::NotFound
        );
    }

    #[test]
    fn test_zero_delta_intent_never_writes() {
        let mut engine = engine();
        for intent in [
            RescheduleIntent::BarMoved {
                task: key("sb-1"),
                delta_days: 0,
            },
            RescheduleIntent::BarResized {
                task: key("sb-1"),
                delta_start: 0,
                delta_due: 0,
            },
            RescheduleIntent::ProjectBarMoved {
                project: "alpha.md".into(),
                delta_days: 0,
            },
        ] {
            assert_eq!(apply_intent(&mut engine, &intent).unwrap(), MutationOutcome::Unchanged);
        }
        assert_eq!(engine.store().writes(), 0);
        assert_eq!(engine.snapshot().generation, 1);
    }

    #[test]
    fn test_resize_due_only_task_adds_start() {
        assert_eq!(
            shift_line_dates("- [ ] A due:: 2026-01-20 ^a", -3, 0).unwrap(),
            "- [ ] A due:: 2026-01-20 start:: 2026-01-17 ^a"
        );
        assert_eq!(
            shift_line_dates("- [ ] A due:: 2026-01-20 ^a", 2, 2).unwrap(),
            "- [ ] A due:: 2026-01-22 ^a"
        );
    }

    #[test]
    fn test_resized_edge_stops_at_the_other_edge() {
        let line = "- [ ] A start:: 2026-01-12 due:: 2026-01-16 ^a";
        assert_eq!(
            shift_line_dates(line, 10, 0).unwrap(),
            "- [ ] A start:: 2026-01-16 due:: 2026-01-16 ^a"
        );
        assert_eq!(
            shift_line_dates(line, 0, -9).unwrap(),
            "- [ ] A start:: 2026-01-12 due:: 2026-01-12 ^a"
        );
        assert_eq!(
            shift_line_dates("- [ ] B due:: 2026-01-20", 3, 0).unwrap(),
            "- [ ] B due:: 2026-01-20 start:: 2026-01-20"
        );
        // a move keeps the length whatever the delta
        assert_eq!(
            shift_line_dates(line, 30, 30).unwrap(),
            "- [ ] A start:: 2026-02-11 due:: 2026-02-15 ^a"
        );
    }

    #[test]
    fn test_resize_task() {
        let mut engine = engine();
        let intent = RescheduleIntent::BarResized {
            task: key("sb-1"),
            delta_start: -2,
            delta_due: 3,
        };
        assert_eq!(apply_intent(&mut engine, &intent).unwrap(), MutationOutcome::Applied);
        let task = engine.task(&key("sb-1")).unwrap();
        assert_eq!(task.start, NaiveDate::from_ymd_opt(2026, 1, 10));
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2026, 1, 19));
    }

    #[test]
    fn test_project_shift_edits_front_matter() {
        let mut engine = engine();
        let intent = RescheduleIntent::ProjectBarMoved {
            project: "alpha.md".into(),
            delta_days: 7,
        };
        assert_eq!(apply_intent(&mut engine, &intent).unwrap(), MutationOutcome::Applied);
        assert_eq!(line(&engine, 2), "Start: 2026-01-12");
        assert_eq!(line(&engine, 3), "end_date: \"2026-04-03\"");
        let project = engine.project("alpha.md").unwrap();
        assert_eq!(project.start, NaiveDate::from_ymd_opt(2026, 1, 12));

        let resize = RescheduleIntent::ProjectBarResized {
            project: "alpha.md".into(),
            delta_start: 0,
            delta_end: -3,
        };
        apply_intent(&mut engine, &resize).unwrap();
        assert_eq!(line(&engine, 2), "Start: 2026-01-12");
        assert_eq!(line(&engine, 3), "end_date: \"2026-03-31\"");
        assert_eq!(
            shift_project_dates(&mut engine, "missing.md", 1, 1).unwrap(),
            MutationOutcome::NotFound
        );
    }

    #[test]
    fn test_update_task_properties() {
        let mut engine = engine();
        let changes = TaskChanges {
            checkbox: Some(CheckboxState::InProgress),
            set: vec![("priority".into(), "high".into()), ("due".into(), "2026-01-30".into())],
            remove: vec!["start".into()],
        };
        assert_eq!(
            update_task(&mut engine, &key("sb-1"), &changes).unwrap(),
            MutationOutcome::Applied
        );
        assert_eq!(
            line(&engine, 5),
            "- [/] Schema id:: SB-1 due:: 2026-01-30 priority:: high"
        );

        let bad = TaskChanges {
            set: vec![("due".into(), "next week".into())],
            ..Default::default()
        };
        assert_eq!(
            update_task(&mut engine, &key("sb-1"), &bad).unwrap(),
            MutationOutcome::InvalidDate
        );
    }

    #[test]
    fn test_every_applied_mutation_reindexes_once() {
        let mut engine = engine();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let sink = count.clone();
        engine.bus().subscribe(move |_| sink.set(sink.get() + 1));
        move_task(&mut engine, &key("sb-1"), 1).unwrap();
        move_task(&mut engine, &key("sb-1"), 0).unwrap();
        assert_eq!(count.get(), 1);
    }
}
