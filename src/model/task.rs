use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Checkbox marker state as written in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckboxState {
    Unchecked,
    InProgress,
    OnHold,
    Done,
}

impl CheckboxState {
    /// The character used inside the checkbox `[ ]`
    pub fn checkbox_char(self) -> char {
        match self {
            CheckboxState::Unchecked => ' ',
            CheckboxState::InProgress => '/',
            CheckboxState::OnHold => '-',
            CheckboxState::Done => 'x',
        }
    }

    /// Parse a checkbox character into a state
    pub fn from_checkbox_char(c: char) -> Option<CheckboxState> {
        match c {
            ' ' => Some(CheckboxState::Unchecked),
            '/' => Some(CheckboxState::InProgress),
            '-' => Some(CheckboxState::OnHold),
            'x' | 'X' => Some(CheckboxState::Done),
            _ => None,
        }
    }
}

/// Derived task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    OnHold,
    Done,
}

impl TaskStatus {
    /// Classify a free-form `status::` value. Unknown words yield `None`.
    pub fn from_keyword(s: &str) -> Option<TaskStatus> {
        let folded: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect();
        match folded.as_str() {
            "done" | "complete" | "completed" => Some(TaskStatus::Done),
            "inprogress" | "doing" | "active" | "started" | "wip" => Some(TaskStatus::InProgress),
            "onhold" | "hold" | "blocked" | "paused" | "waiting" => Some(TaskStatus::OnHold),
            "notstarted" | "todo" | "open" | "backlog" => Some(TaskStatus::NotStarted),
            _ => None,
        }
    }

    /// The checkbox marker that represents this status
    pub fn checkbox(self) -> CheckboxState {
        match self {
            TaskStatus::NotStarted => CheckboxState::Unchecked,
            TaskStatus::InProgress => CheckboxState::InProgress,
            TaskStatus::OnHold => CheckboxState::OnHold,
            TaskStatus::Done => CheckboxState::Done,
        }
    }

    /// Canonical keyword, as written back into `status::` tokens
    pub fn keyword(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::OnHold => "on-hold",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    pub fn from_keyword(s: &str) -> Option<Priority> {
        match s.trim().trim_start_matches('#').to_lowercase().as_str() {
            "high" | "h" | "1" | "p1" => Some(Priority::High),
            "medium" | "med" | "m" | "2" | "p2" => Some(Priority::Medium),
            "low" | "l" | "3" | "p3" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// Position in the Epic → Story → Subtask hierarchy, inferred from the id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyRole {
    Epic,
    Story,
    Subtask,
    Other,
}

impl HierarchyRole {
    pub fn from_id(id: &str) -> HierarchyRole {
        let id = id.trim_start_matches('^').to_ascii_lowercase();
        // `sb-` must be tested before `s-`
        if id.starts_with("sb-") {
            HierarchyRole::Subtask
        } else if id.starts_with("s-") {
            HierarchyRole::Story
        } else if id.starts_with("e-") {
            HierarchyRole::Epic
        } else {
            HierarchyRole::Other
        }
    }
}

/// Scheduling relation between a prerequisite and its dependent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    #[default]
    FinishStart,
    StartStart,
    FinishFinish,
    StartFinish,
}

impl LinkType {
    /// Parse a link-type token such as `FS` or `finish-start`
    pub fn parse_token(token: &str) -> Option<LinkType> {
        let folded: String = token
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_' | '2'))
            .collect();
        match folded.as_str() {
            "fs" | "finishstart" => Some(LinkType::FinishStart),
            "ss" | "startstart" => Some(LinkType::StartStart),
            "ff" | "finishfinish" => Some(LinkType::FinishFinish),
            "sf" | "startfinish" => Some(LinkType::StartFinish),
            _ => None,
        }
    }

    pub fn short(self) -> &'static str {
        match self {
            LinkType::FinishStart => "FS",
            LinkType::StartStart => "SS",
            LinkType::FinishFinish => "FF",
            LinkType::StartFinish => "SF",
        }
    }
}

/// Global task identity: `ownerKey::lowercase(localId)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    pub const SEPARATOR: &'static str = "::";

    pub fn new(owner: &str, local_id: &str) -> Self {
        TaskKey(format!(
            "{}{}{}",
            owner,
            Self::SEPARATOR,
            local_id.trim_start_matches('^').to_lowercase()
        ))
    }

    /// Split a user-supplied `doc::id` string. Returns `None` for bare ids.
    pub fn parse(s: &str) -> Option<TaskKey> {
        let (owner, id) = s.rsplit_once(Self::SEPARATOR)?;
        if owner.is_empty() || id.is_empty() {
            return None;
        }
        Some(TaskKey::new(owner, id))
    }

    pub fn owner(&self) -> &str {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(owner, _)| owner)
            .unwrap_or("")
    }

    pub fn local_id(&self) -> &str {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(_, id)| id)
            .unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dependency between two tasks. `source` is the prerequisite,
/// `destination` the task that declared `depends::`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: TaskKey,
    pub destination: TaskKey,
    pub link: LinkType,
}

impl DependencyEdge {
    /// Only edges within one document can be drawn by the router
    pub fn is_same_document(&self) -> bool {
        self.source.owner() == self.destination.owner()
    }
}

/// Which completion signal made a task count as done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionSignal {
    DoneFlag,
    StatusString,
    Ratio,
    Checkbox,
    CompletionDate,
    /// A story whose subtasks average 100%, applied after the hierarchy is resolved
    Rollup,
}

/// A task extracted from a document line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub key: TaskKey,
    /// Id as written (without `^`); unique only within `owner`
    pub local_id: String,
    /// True when no id was written and one was synthesized from the line number
    pub synthetic_id: bool,
    /// Owner document key
    pub owner: String,
    /// 0-indexed line of the task in its document at scan time
    pub line: usize,
    pub indent: usize,
    pub text: String,
    /// Raw inline properties, keyed by normalized key, in document order
    pub properties: IndexMap<String, String>,
    pub checkbox: CheckboxState,
    pub status: TaskStatus,
    /// 0.0..=1.0
    pub completion: f64,
    pub done_by: Option<CompletionSignal>,
    pub priority: Priority,
    pub role: HierarchyRole,
    pub start: Option<NaiveDate>,
    pub due: Option<NaiveDate>,
    pub scheduled: Option<NaiveDate>,
    pub completed: Option<NaiveDate>,
    /// Normalized `epic::` reference (lowercase, no `^`)
    pub epic_ref: Option<String>,
    /// Normalized `story::` reference (lowercase, no `^`)
    pub story_ref: Option<String>,
    /// Edges whose destination is this task
    pub depends: Vec<DependencyEdge>,
}

impl TaskRecord {
    pub fn is_done(&self) -> bool {
        self.done_by.is_some()
    }

    /// Look up a raw property by any spelling of its key
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(&crate::parse::normalize_key(key))
            .map(|s| s.as_str())
    }

    /// Completion on the 0..100 scale used by rollups; done counts as 100
    pub fn percent(&self) -> f64 {
        if self.is_done() {
            100.0
        } else {
            (self.completion * 100.0).clamp(0.0, 100.0)
        }
    }
}
