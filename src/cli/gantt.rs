//! Plain-text rendering of a timeline layout, one character per day.

use chrono::{Datelike, Duration, Weekday};

use crate::timeline::{HeatCell, RowKind, TimelineLayout};
use crate::util::unicode::{display_width, truncate_to_width};

const OPEN: char = '█';
const DONE: char = '░';
const PROJECT: char = '━';
const MILESTONE: char = '◆';
const WEEKEND: char = '·';

fn pad_to_width(s: &str, width: usize) -> String {
    let s = truncate_to_width(s, width);
    let pad = width.saturating_sub(display_width(&s));
    format!("{}{}", s, " ".repeat(pad))
}

fn empty_cells(layout: &TimelineLayout, days: usize) -> Vec<char> {
    (0..days)
        .map(|d| {
            let date = layout.anchor + Duration::days(d as i64);
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                WEEKEND
            } else {
                ' '
            }
        })
        .collect()
}

/// Render `days` columns starting at the anchor. Bars outside the window
/// are clipped.
pub fn render(layout: &TimelineLayout, heat: &[HeatCell], days: usize, label_width: usize) -> Vec<String> {
    let mut out = Vec::new();

    let mut header: Vec<char> = vec![' '; days];
    for (d, cell) in header.iter_mut().enumerate() {
        let date = layout.anchor + Duration::days(d as i64);
        if date.weekday() == Weekday::Mon {
            *cell = '|';
        }
    }
    out.push(format!(
        "{} {}",
        pad_to_width(&format!("from {}", layout.anchor), label_width),
        header.into_iter().collect::<String>()
    ));

    for row in &layout.rows {
        let mut cells = empty_cells(layout, days);
        if let Some(bar) = &row.bar {
            let fill = match (&row.kind, row.done) {
                (RowKind::Project { .. }, _) => PROJECT,
                (_, true) => DONE,
                (_, false) => OPEN,
            };
            let first = bar.offset.max(0);
            let end = (bar.offset + bar.span).min(days as i64);
            for d in first..end {
                cells[d as usize] = fill;
            }
        }
        if let RowKind::Project { key } = &row.kind {
            for m in layout.milestones.iter().filter(|m| &m.project == key) {
                if (0..days as i64).contains(&m.offset) {
                    cells[m.offset as usize] = MILESTONE;
                }
            }
        }
        let label = format!("{}{}", "  ".repeat(row.depth), row.label);
        out.push(format!(
            "{} {}",
            pad_to_width(&label, label_width),
            cells.into_iter().collect::<String>()
        ));
    }

    let load: String = (0..days)
        .map(|d| match heat.get(d).map_or(0, |c| c.count) {
            0 => ' ',
            n @ 1..=9 => char::from_digit(n as u32, 10).unwrap_or('+'),
            _ => '+',
        })
        .collect();
    out.push(format!("{} {}", pad_to_width("load", label_width), load));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::index::build_snapshot;
    use crate::timeline::layout::{TimelineParams, layout};
    use crate::timeline::zoom::Zoom;
    use crate::timeline::heat_map;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_rows_and_load() {
        let doc = "---\nStart: 2026-01-05\nEnd: 2026-01-09\n---\n\
                   - [ ] Build id:: SB-1 start:: 2026-01-06 due:: 2026-01-07\n\
                   - [x] Ship id:: SB-2 due:: 2026-01-07\n\
                   \n| id | title | date |\n|---|---|---|\n| M-1 | Beta | 2026-01-08 |\n";
        let snapshot = build_snapshot(1, vec![("plan.md".into(), doc.into())]);
        let params = TimelineParams {
            anchor: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            zoom: Zoom::new(5),
            min_horizon_months: 1,
            row_height: 28.0,
            bar_height: 18.0,
        };
        let layout = layout(&snapshot, &params, |_| true);
        let heat = heat_map(&layout);
        let lines = render(&layout, &heat, 7, 10);

        let row = |label: &str, cells: &str| format!("{:<10} {}", label, cells);
        assert_eq!(
            lines,
            vec![
                row("from 2026\u{2026}", "|      "),
                row("plan", "━━━◆━··"),
                row("Build", " ██  ··"),
                row("Ship", "  ░  ··"),
                row("load", " 12    "),
            ]
        );
    }

    #[test]
    fn test_pad_to_width_handles_wide_chars() {
        assert_eq!(pad_to_width("日本", 6), "日本  ");
        assert_eq!(display_width(&pad_to_width("a very long label", 6)), 6);
    }
}
