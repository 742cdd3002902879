use crate::model::diagnostic::OmissionReason;

use super::frontmatter::{FrontMatter, parse_front_matter};
use super::milestone_parser::{MilestoneRow, parse_milestones};
use super::task_parser::{TaskLine, parse_task_line};

/// Everything extracted from one document's text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub front_matter: Option<FrontMatter>,
    /// First `# ` heading after the front matter
    pub heading: Option<String>,
    /// `(0-indexed line, task)` in document order
    pub tasks: Vec<(usize, TaskLine)>,
    pub milestones: Vec<MilestoneRow>,
    /// `(0-indexed line, reason)` for rows that could not be read
    pub omitted: Vec<(usize, OmissionReason)>,
}

impl ParsedDocument {
    /// True when the document carries anything a timeline can show
    pub fn is_project(&self) -> bool {
        !self.tasks.is_empty()
            || !self.milestones.is_empty()
            || self
                .front_matter
                .as_ref()
                .is_some_and(|fm| fm.start_entry().is_some() || fm.end_entry().is_some())
    }
}

/// Opening or closing line of a fenced code block
pub(crate) fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Parse a document: front matter, task lines (outside code fences) and
/// milestone tables.
pub fn parse_document(source: &str) -> ParsedDocument {
    let lines: Vec<&str> = source.lines().collect();
    let front_matter = parse_front_matter(&lines);
    let body_start = front_matter.as_ref().map_or(0, |fm| fm.end_line + 1);

    let mut heading = None;
    let mut tasks = Vec::new();
    let mut in_fence = false;

    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        let trimmed = line.trim_start();
        if in_fence {
            continue;
        }
        if heading.is_none()
            && let Some(title) = trimmed.strip_prefix("# ")
        {
            heading = Some(title.trim().to_string());
            continue;
        }
        if let Some(task) = parse_task_line(line) {
            tasks.push((idx, task));
        }
    }

    let (milestones, omitted) = parse_milestones(&lines, body_start);

    ParsedDocument {
        front_matter,
        heading,
        tasks,
        milestones,
        omitted,
    }
}
