use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::model::task::HierarchyRole;

use super::layout::{RowKind, TimelineLayout};

/// Load on one day of the horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatCell {
    pub offset: i64,
    pub date: NaiveDate,
    pub weekend: bool,
    /// Task bars covering the day; always 0 on weekends
    pub count: usize,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// One cell per horizon day counting overlapping task bars. Epics, stories
/// and project bars are not counted.
pub fn heat_map(layout: &TimelineLayout) -> Vec<HeatCell> {
    let days = layout.horizon_days.max(0) as usize;
    // difference array: +1 at a bar's first day, -1 after its last
    let mut delta = vec![0i64; days + 1];
    for row in &layout.rows {
        let RowKind::Task { role, .. } = &row.kind else {
            continue;
        };
        if matches!(role, HierarchyRole::Epic | HierarchyRole::Story) {
            continue;
        }
        let Some(bar) = &row.bar else {
            continue;
        };
        let first = bar.offset.max(0);
        let end = (bar.offset + bar.span).min(days as i64);
        if first >= end {
            continue;
        }
        delta[first as usize] += 1;
        delta[end as usize] -= 1;
    }

    let mut cells = Vec::with_capacity(days);
    let mut running = 0i64;
    for (offset, d) in delta.iter().take(days).enumerate() {
        running += d;
        let Some(date) = layout.date_at(offset as i64) else {
            break;
        };
        let weekend = is_weekend(date);
        cells.push(HeatCell {
            offset: offset as i64,
            date,
            weekend,
            count: if weekend { 0 } else { running as usize },
        });
    }
    cells
}
