use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::task::TaskKey;

/// Task tallies by derived status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub on_hold: usize,
    pub done: usize,
}

/// One row of the Epic → Story → Subtask cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeEntry {
    pub key: TaskKey,
    /// 0 = top level, 1 = under an epic or story, 2 = subtask under an epic's story
    pub depth: usize,
}

/// Progress of a story computed from its subtasks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoryRollup {
    /// Mean of the subtasks' completion on a 0..100 scale
    pub percent: f64,
    pub done: bool,
    pub subtasks: usize,
}

/// A document that holds tasks, a front-matter schedule or milestones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Owner document key (path relative to the root)
    pub key: String,
    pub title: String,
    /// Front-matter `Start`
    pub start: Option<NaiveDate>,
    /// Front-matter `End`
    pub end: Option<NaiveDate>,
    /// Task keys in cascade order
    pub tasks: Vec<TaskKey>,
    pub cascade: Vec<CascadeEntry>,
    pub story_rollups: BTreeMap<TaskKey, StoryRollup>,
    /// Transitive subtask count per epic
    pub epic_descendants: BTreeMap<TaskKey, usize>,
    /// Mean task completion, 0.0..=1.0 (0 when the project has no tasks)
    pub completion: f64,
    /// Earliest due date among tasks that are not done
    pub next_due: Option<NaiveDate>,
    pub counts: TaskCounts,
}

/// A dated marker parsed from a milestone table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    /// Owning project; the containing document unless the row names another
    pub owner: String,
    /// Document the row was read from
    pub source: String,
    /// 0-indexed line of the row
    pub line: usize,
}
