use std::collections::HashMap;

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::model::config::TimelineConfig;
use crate::model::snapshot::Snapshot;
use crate::model::task::{HierarchyRole, TaskKey, TaskRecord};

use super::zoom::Zoom;

/// Inputs that fix the day axis and row geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineParams {
    pub anchor: NaiveDate,
    pub zoom: Zoom,
    pub min_horizon_months: u32,
    pub row_height: f64,
    pub bar_height: f64,
}

impl TimelineParams {
    pub fn from_config(config: &TimelineConfig, today: NaiveDate) -> Self {
        TimelineParams {
            anchor: config.anchor.resolve(today),
            zoom: Zoom::new(config.zoom),
            min_horizon_months: config.min_horizon_months,
            row_height: config.row_height,
            bar_height: config.bar_height,
        }
    }

    pub fn pixels_per_day(&self) -> f64 {
        self.zoom.pixels_per_day()
    }
}

/// Days from `anchor` to `date`; negative before the anchor
pub fn day_offset(anchor: NaiveDate, date: NaiveDate) -> i64 {
    (date - anchor).num_days()
}

/// First day and length in days of a bar.
///
/// With both dates the span is `max(due - start, 0) + 1`; with only a due
/// date it is a single day at the due date; without a due date there is
/// no bar.
pub fn bar_days(start: Option<NaiveDate>, due: Option<NaiveDate>) -> Option<(NaiveDate, i64)> {
    let due = due?;
    match start {
        Some(start) => Some((start, (due - start).num_days().max(0) + 1)),
        None => Some((due, 1)),
    }
}

/// Days rendered: through the latest date, and never less than
/// `min_months` after the anchor
pub fn horizon_days(anchor: NaiveDate, latest: Option<NaiveDate>, min_months: u32) -> i64 {
    let minimum = anchor
        .checked_add_months(Months::new(min_months))
        .map_or(0, |end| day_offset(anchor, end));
    let through_latest = latest.map_or(0, |d| day_offset(anchor, d) + 1);
    minimum.max(through_latest).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    /// Day offset of the first day
    pub offset: i64,
    pub span: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bar {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn last_offset(&self) -> i64 {
        self.offset + self.span - 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RowKind {
    Project { key: String },
    Task { key: TaskKey, role: HierarchyRole },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    pub index: usize,
    pub kind: RowKind,
    pub label: String,
    /// Cascade depth for task rows; 0 for project rows
    pub depth: usize,
    pub done: bool,
    pub bar: Option<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneMarker {
    pub id: String,
    pub title: String,
    pub project: String,
    pub date: NaiveDate,
    pub offset: i64,
    pub x: f64,
    /// Row of the owning project, when it has one
    pub row: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineLayout {
    pub anchor: NaiveDate,
    pub pixels_per_day: f64,
    pub horizon_days: i64,
    pub row_height: f64,
    pub bar_height: f64,
    pub rows: Vec<TimelineRow>,
    pub milestones: Vec<MilestoneMarker>,
    #[serde(skip)]
    task_rows: HashMap<TaskKey, usize>,
    #[serde(skip)]
    project_rows: HashMap<String, usize>,
}

impl TimelineLayout {
    pub fn width(&self) -> f64 {
        self.horizon_days as f64 * self.pixels_per_day
    }

    pub fn height(&self) -> f64 {
        self.rows.len() as f64 * self.row_height
    }

    pub fn task_row(&self, key: &TaskKey) -> Option<&TimelineRow> {
        self.task_rows.get(key).map(|&i| &self.rows[i])
    }

    pub fn project_row(&self, key: &str) -> Option<&TimelineRow> {
        self.project_rows.get(key).map(|&i| &self.rows[i])
    }

    pub fn task_bar(&self, key: &TaskKey) -> Option<&Bar> {
        self.task_row(key).and_then(|r| r.bar.as_ref())
    }

    /// Day offset under an x coordinate
    pub fn offset_at(&self, x: f64) -> i64 {
        (x / self.pixels_per_day).floor() as i64
    }

    pub fn date_at(&self, offset: i64) -> Option<NaiveDate> {
        self.anchor.checked_add_signed(chrono::Duration::days(offset))
    }

    pub fn row_at(&self, y: f64) -> Option<&TimelineRow> {
        if y < 0.0 {
            return None;
        }
        self.rows.get((y / self.row_height) as usize)
    }
}

struct Geometry {
    anchor: NaiveDate,
    ppd: f64,
    row_height: f64,
    bar_height: f64,
}

impl Geometry {
    fn bar(&self, row: usize, start: Option<NaiveDate>, due: Option<NaiveDate>) -> Option<Bar> {
        let (first, span) = bar_days(start, due)?;
        let offset = day_offset(self.anchor, first);
        Some(Bar {
            offset,
            span,
            x: offset as f64 * self.ppd,
            y: row as f64 * self.row_height + (self.row_height - self.bar_height) / 2.0,
            width: span as f64 * self.ppd,
            height: self.bar_height,
        })
    }
}

/// Lay out every project row followed by its visible tasks in cascade order
pub fn layout(
    snapshot: &Snapshot,
    params: &TimelineParams,
    visible: impl Fn(&TaskRecord) -> bool,
) -> TimelineLayout {
    let geo = Geometry {
        anchor: params.anchor,
        ppd: params.pixels_per_day(),
        row_height: params.row_height,
        bar_height: params.bar_height,
    };

    let mut rows = Vec::new();
    let mut task_rows = HashMap::new();
    let mut project_rows = HashMap::new();
    let mut latest: Option<NaiveDate> = None;
    let mut see = |d: Option<NaiveDate>| {
        if let Some(d) = d {
            latest = Some(latest.map_or(d, |l| l.max(d)));
        }
    };

    for project in &snapshot.projects {
        let index = rows.len();
        project_rows.insert(project.key.clone(), index);
        see(project.end);
        rows.push(TimelineRow {
            index,
            kind: RowKind::Project {
                key: project.key.clone(),
            },
            label: project.title.clone(),
            depth: 0,
            done: project.counts.total > 0 && project.counts.done == project.counts.total,
            bar: geo.bar(index, project.start, project.end),
        });

        for entry in &project.cascade {
            let Some(task) = snapshot.task(&entry.key) else {
                continue;
            };
            if !visible(task) {
                continue;
            }
            let index = rows.len();
            task_rows.insert(task.key.clone(), index);
            see(task.due);
            rows.push(TimelineRow {
                index,
                kind: RowKind::Task {
                    key: task.key.clone(),
                    role: task.role,
                },
                label: task.text.clone(),
                depth: entry.depth,
                done: task.is_done(),
                bar: geo.bar(index, task.start, task.due),
            });
        }
    }

    let milestones = snapshot
        .milestones
        .iter()
        .map(|m| {
            see(Some(m.date));
            let offset = day_offset(params.anchor, m.date);
            MilestoneMarker {
                id: m.id.clone(),
                title: m.title.clone(),
                project: m.owner.clone(),
                date: m.date,
                offset,
                x: offset as f64 * geo.ppd,
                row: project_rows.get(&m.owner).copied(),
            }
        })
        .collect();

    TimelineLayout {
        anchor: params.anchor,
        pixels_per_day: geo.ppd,
        horizon_days: horizon_days(params.anchor, latest, params.min_horizon_months),
        row_height: params.row_height,
        bar_height: params.bar_height,
        rows,
        milestones,
        task_rows,
        project_rows,
    }
}
