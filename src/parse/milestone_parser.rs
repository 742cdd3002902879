use chrono::NaiveDate;

use crate::model::diagnostic::OmissionReason;

use super::document::is_fence;
use super::task_parser::parse_iso_date;

/// A milestone table row, before its owner reference is resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneRow {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    /// Value of a `project`/`owner` column, if the table has one
    pub owner: Option<String>,
    /// 0-indexed line
    pub line: usize,
}

/// Which cell holds which field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    id: usize,
    title: usize,
    date: usize,
    description: Option<usize>,
    owner: Option<usize>,
}

impl Columns {
    /// `id | title | date | description`, for tables without a header row
    const POSITIONAL: Columns = Columns {
        id: 0,
        title: 1,
        date: 2,
        description: Some(3),
        owner: None,
    };

    fn from_header(cells: &[String]) -> Option<Columns> {
        let find = |names: &[&str]| {
            cells.iter().position(|c| {
                let c = c.to_lowercase();
                names.iter().any(|n| c == *n)
            })
        };
        Some(Columns {
            id: find(&["id", "key"])?,
            title: find(&["title", "name", "milestone"])?,
            date: find(&["date", "due", "when"])?,
            description: find(&["description", "notes", "note", "details"]),
            owner: find(&["project", "owner", "document"]),
        })
    }
}

/// Read milestone rows from every pipe table in `lines`, starting at
/// `start`. Rows that cannot be resolved to an id and a date are reported as
/// omissions `(line, reason)` and skipped; the rest of the table still loads.
pub fn parse_milestones<S: AsRef<str>>(
    lines: &[S],
    start: usize,
) -> (Vec<MilestoneRow>, Vec<(usize, OmissionReason)>) {
    let mut rows = Vec::new();
    let mut omitted = Vec::new();
    let mut idx = start;
    let mut in_fence = false;

    while idx < lines.len() {
        let line = lines[idx].as_ref().trim();
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if in_fence || !line.starts_with('|') {
            idx += 1;
            continue;
        }

        // Collect the table block
        let table_start = idx;
        while idx < lines.len() && lines[idx].as_ref().trim().starts_with('|') {
            idx += 1;
        }
        let block: Vec<(usize, Vec<String>)> = (table_start..idx)
            .map(|i| (i, split_cells(lines[i].as_ref())))
            .collect();
        read_table(&block, &mut rows, &mut omitted);
    }

    (rows, omitted)
}

fn read_table(
    block: &[(usize, Vec<String>)],
    rows: &mut Vec<MilestoneRow>,
    omitted: &mut Vec<(usize, OmissionReason)>,
) {
    let has_header = block.get(1).is_some_and(|(_, cells)| is_separator(cells));
    let (columns, data) = if has_header {
        match Columns::from_header(&block[0].1) {
            Some(columns) => (columns, &block[2..]),
            // Some other table
            None => return,
        }
    } else {
        (Columns::POSITIONAL, block)
    };

    for (line, cells) in data {
        if is_separator(cells) || cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        match read_row(*line, cells, columns) {
            Ok(row) => rows.push(row),
            Err(reason) => omitted.push((*line, reason)),
        }
    }
}

fn read_row(line: usize, cells: &[String], columns: Columns) -> Result<MilestoneRow, OmissionReason> {
    let cell = |i: usize| cells.get(i).map(|s| s.as_str()).unwrap_or("");

    let id = cell(columns.id).trim_start_matches('^');
    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(OmissionReason::InvalidMilestone {
            detail: format!("missing or invalid id '{}'", id),
        });
    }
    let raw_date = cell(columns.date);
    let date = parse_iso_date(raw_date).ok_or_else(|| OmissionReason::InvalidDate {
        key: "date".to_string(),
        value: raw_date.to_string(),
    })?;
    let title = match cell(columns.title) {
        "" => id.to_string(),
        t => t.to_string(),
    };
    let description = columns
        .description
        .map(cell)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let owner = columns
        .owner
        .map(cell)
        .map(|o| o.trim_start_matches("[[").trim_end_matches("]]").trim())
        .filter(|o| !o.is_empty())
        .map(str::to_string);

    Ok(MilestoneRow {
        id: id.to_string(),
        title,
        date,
        description,
        owner,
        line,
    })
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| {
            !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' '))
        })
}
