use chrono::NaiveDate;
use serde::Serialize;

use crate::model::diagnostic::Omission;
use crate::model::project::{ProjectRecord, TaskCounts};
use crate::model::snapshot::Snapshot;
use crate::model::task::{CompletionSignal, HierarchyRole, Priority, TaskRecord, TaskStatus};
use crate::ops::mutate::MutationOutcome;
use crate::timeline::{HeatCell, RouteReport, Routing, TimelineLayout};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ProjectJson {
    pub key: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// 0..100
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due: Option<NaiveDate>,
    pub counts: TaskCounts,
    pub milestones: usize,
}

#[derive(Serialize)]
pub struct IndexJson {
    pub generation: u64,
    pub projects: Vec<ProjectJson>,
    pub omissions: usize,
}

#[derive(Serialize)]
pub struct TaskJson {
    pub key: String,
    pub id: String,
    pub text: String,
    pub status: TaskStatus,
    pub percent: f64,
    pub role: HierarchyRole,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_by: Option<CompletionSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
    pub line: usize,
}

#[derive(Serialize)]
pub struct TreeEntryJson {
    pub depth: usize,
    #[serde(flatten)]
    pub task: TaskJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descendants: Option<usize>,
}

#[derive(Serialize)]
pub struct TreeJson {
    pub project: String,
    pub title: String,
    pub entries: Vec<TreeEntryJson>,
}

#[derive(Serialize)]
pub struct TimelineJson<'a> {
    pub layout: &'a TimelineLayout,
    pub heat: &'a [HeatCell],
    pub routing: &'a Routing,
}

#[derive(Serialize)]
pub struct MutationJson {
    pub target: String,
    pub outcome: MutationOutcome,
}

#[derive(Serialize)]
pub struct CheckJson<'a> {
    pub generation: u64,
    pub omissions: &'a [Omission],
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &TaskRecord) -> TaskJson {
    TaskJson {
        key: task.key.to_string(),
        id: task.local_id.clone(),
        text: task.text.clone(),
        status: task.status,
        percent: round1(task.percent()),
        role: task.role,
        priority: task.priority,
        done_by: task.done_by,
        start: task.start,
        due: task.due,
        completed: task.completed,
        epic: task.epic_ref.clone(),
        story: task.story_ref.clone(),
        depends: task
            .depends
            .iter()
            .map(|e| format!("{}:{}", e.source, e.link.short()))
            .collect(),
        line: task.line + 1,
    }
}

pub fn project_to_json(snapshot: &Snapshot, project: &ProjectRecord) -> ProjectJson {
    ProjectJson {
        key: project.key.clone(),
        title: project.title.clone(),
        start: project.start,
        end: project.end,
        percent: round1(project.completion * 100.0),
        next_due: project.next_due,
        counts: project.counts,
        milestones: snapshot.milestones_for(&project.key).count(),
    }
}

pub fn tree_to_json(snapshot: &Snapshot, project: &ProjectRecord) -> TreeJson {
    let entries = project
        .cascade
        .iter()
        .filter_map(|entry| {
            let task = snapshot.task(&entry.key)?;
            Some(TreeEntryJson {
                depth: entry.depth,
                task: task_to_json(task),
                rollup: project.story_rollups.get(&entry.key).map(|r| round1(r.percent)),
                descendants: project.epic_descendants.get(&entry.key).copied(),
            })
        })
        .collect();
    TreeJson {
        project: project.key.clone(),
        title: project.title.clone(),
        entries,
    }
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

pub fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "[ ]",
        TaskStatus::InProgress => "[/]",
        TaskStatus::OnHold => "[-]",
        TaskStatus::Done => "[x]",
    }
}

pub fn format_project_line(project: &ProjectRecord) -> String {
    let c = &project.counts;
    let mut line = format!(
        "{}  {}  {:>5.1}%  {} tasks ({} done, {} active, {} on hold)",
        project.key,
        project.title,
        project.completion * 100.0,
        c.total,
        c.done,
        c.in_progress,
        c.on_hold,
    );
    if let Some(due) = project.next_due {
        line.push_str(&format!("  next due {}", due));
    }
    line
}

pub fn format_task_detail(task: &TaskRecord) -> Vec<String> {
    let mut lines = vec![format!("{} {} {}", status_marker(task.status), task.key, task.text)];
    lines.push(format!(
        "  status: {} ({:.0}%)  role: {:?}  priority: {:?}",
        task.status,
        task.percent(),
        task.role,
        task.priority
    ));
    if let Some(signal) = task.done_by {
        lines.push(format!("  done by: {:?}", signal));
    }
    for (label, date) in [
        ("start", task.start),
        ("due", task.due),
        ("scheduled", task.scheduled),
        ("completed", task.completed),
    ] {
        if let Some(d) = date {
            lines.push(format!("  {}: {}", label, d));
        }
    }
    if let Some(epic) = &task.epic_ref {
        lines.push(format!("  epic: {}", epic));
    }
    if let Some(story) = &task.story_ref {
        lines.push(format!("  story: {}", story));
    }
    for edge in &task.depends {
        lines.push(format!("  depends on: {} ({})", edge.source, edge.link.short()));
    }
    lines.push(format!("  line: {}", task.line + 1));
    lines
}

pub fn format_report(report: &RouteReport) -> String {
    format!(
        "connectors: {} drawn, {} suppressed, {} cross-document, {} unresolved",
        report.drawn, report.suppressed, report.cross_document, report.unresolved
    )
}

pub fn outcome_text(outcome: MutationOutcome) -> &'static str {
    match outcome {
        MutationOutcome::Applied => "updated",
        MutationOutcome::Unchanged => "unchanged",
        MutationOutcome::NotFound => "not found",
        MutationOutcome::InvalidDate => "invalid date",
    }
}
