use crate::model::intent::RescheduleIntent;
use crate::model::task::TaskKey;

use super::layout::{RowKind, TimelineLayout};

/// Pointer distance from a bar end that grabs the edge instead of the body
pub const EDGE_GRAB_PX: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragTarget {
    Task(TaskKey),
    Project(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragHandle {
    /// Move the whole bar
    Body,
    StartEdge,
    EndEdge,
}

/// The bar (and part of it) under a pointer position
pub fn hit_test(layout: &TimelineLayout, x: f64, y: f64) -> Option<(DragTarget, DragHandle)> {
    let row = layout.row_at(y)?;
    let bar = row.bar.as_ref()?;
    if y < bar.y || y > bar.y + bar.height || x < bar.x || x > bar.right() {
        return None;
    }
    let target = match &row.kind {
        RowKind::Task { key, .. } => DragTarget::Task(key.clone()),
        RowKind::Project { key } => DragTarget::Project(key.clone()),
    };
    // narrow bars are all body
    let grab = EDGE_GRAB_PX.min(bar.width / 4.0);
    let handle = if x - bar.x < grab {
        DragHandle::StartEdge
    } else if bar.right() - x < grab {
        DragHandle::EndEdge
    } else {
        DragHandle::Body
    };
    Some((target, handle))
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    target: DragTarget,
    handle: DragHandle,
    origin_x: f64,
}

/// Turns pointer gestures on bars into reschedule intents.
///
/// Moves only produce previews; the single intent of a gesture is returned
/// from `pointer_up`, and a gesture that ends where it started returns none.
#[derive(Debug, Clone)]
pub struct DragController {
    pixels_per_day: f64,
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn new(pixels_per_day: f64) -> Self {
        DragController {
            pixels_per_day,
            active: None,
        }
    }

    /// Takes effect for the next gesture
    pub fn set_pixels_per_day(&mut self, pixels_per_day: f64) {
        if self.active.is_none() {
            self.pixels_per_day = pixels_per_day;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn pointer_down(&mut self, target: DragTarget, handle: DragHandle, x: f64) {
        self.active = Some(ActiveDrag {
            target,
            handle,
            origin_x: x,
        });
    }

    fn delta_days(&self, origin_x: f64, x: f64) -> i64 {
        if self.pixels_per_day <= 0.0 {
            return 0;
        }
        ((x - origin_x) / self.pixels_per_day).round() as i64
    }

    /// Whole-day offset the bar would move by if released here
    pub fn pointer_move(&self, x: f64) -> Option<i64> {
        let drag = self.active.as_ref()?;
        Some(self.delta_days(drag.origin_x, x))
    }

    pub fn pointer_up(&mut self, x: f64) -> Option<RescheduleIntent> {
        let drag = self.active.take()?;
        let delta = self.delta_days(drag.origin_x, x);
        if delta == 0 {
            return None;
        }
        let (delta_start, delta_end) = match drag.handle {
            DragHandle::Body => (delta, delta),
            DragHandle::StartEdge => (delta, 0),
            DragHandle::EndEdge => (0, delta),
        };
        Some(match (drag.target, drag.handle) {
            (DragTarget::Task(task), DragHandle::Body) => RescheduleIntent::BarMoved {
                task,
                delta_days: delta,
            },
            (DragTarget::Task(task), _) => RescheduleIntent::BarResized {
                task,
                delta_start,
                delta_due: delta_end,
            },
            (DragTarget::Project(project), DragHandle::Body) => RescheduleIntent::ProjectBarMoved {
                project,
                delta_days: delta,
            },
            (DragTarget::Project(project), _) => RescheduleIntent::ProjectBarResized {
                project,
                delta_start,
                delta_end,
            },
        })
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::index::build_snapshot;
    use crate::timeline::layout::{TimelineParams, layout};
    use crate::timeline::zoom::{ZOOM_STOPS, Zoom};
    use chrono::NaiveDate;

    fn task() -> TaskKey {
        TaskKey::new("a.md", "sb-1")
    }

    #[test]
    fn test_one_day_drag_emits_once_on_release() {
        let ppd = ZOOM_STOPS[5];
        let mut drag = DragController::new(ppd);
        drag.pointer_down(DragTarget::Task(task()), DragHandle::Body, 100.0);

        let mut emitted = Vec::new();
        for x in [103.0, 110.0, 116.0] {
            assert!(drag.pointer_move(x).is_some());
        }
        assert_eq!(drag.pointer_move(100.0 + ppd), Some(1));
        emitted.extend(drag.pointer_up(100.0 + ppd));
        assert_eq!(
            emitted,
            vec![RescheduleIntent::BarMoved {
                task: task(),
                delta_days: 1
            }]
        );
        assert!(!drag.is_dragging());
        assert_eq!(drag.pointer_up(200.0), None);
    }

    #[test]
    fn test_return_to_origin_emits_nothing() {
        let mut drag = DragController::new(8.0);
        drag.pointer_down(DragTarget::Task(task()), DragHandle::Body, 40.0);
        assert_eq!(drag.pointer_move(120.0), Some(10));
        assert_eq!(drag.pointer_up(42.0), None);
    }

    #[test]
    fn test_resize_and_project_intents() {
        let mut drag = DragController::new(8.0);
        drag.pointer_down(DragTarget::Task(task()), DragHandle::StartEdge, 40.0);
        assert_eq!(
            drag.pointer_up(20.0),
            Some(RescheduleIntent::BarResized {
                task: task(),
                delta_start: -3,
                delta_due: 0
            })
        );

        drag.pointer_down(DragTarget::Project("a.md".into()), DragHandle::EndEdge, 40.0);
        assert_eq!(
            drag.pointer_up(56.0),
            Some(RescheduleIntent::ProjectBarResized {
                project: "a.md".into(),
                delta_start: 0,
                delta_end: 2
            })
        );

        drag.pointer_down(DragTarget::Project("a.md".into()), DragHandle::Body, 40.0);
        drag.cancel();
        assert_eq!(drag.pointer_up(400.0), None);
    }

    #[test]
    fn test_hit_test() {
        let snapshot = build_snapshot(
            1,
            vec![(
                "a.md".into(),
                "- [ ] A id:: SB-1 start:: 2026-01-07 due:: 2026-01-11\n".into(),
            )],
        );
        let params = TimelineParams {
            anchor: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            zoom: Zoom::new(3),
            min_horizon_months: 1,
            row_height: 28.0,
            bar_height: 18.0,
        };
        let layout = layout(&snapshot, &params, |_| true);
        // bar: x 16..56, row 1 at y 33..51
        assert_eq!(
            hit_test(&layout, 30.0, 40.0),
            Some((DragTarget::Task(task()), DragHandle::Body))
        );
        assert_eq!(
            hit_test(&layout, 17.0, 40.0).map(|h| h.1),
            Some(DragHandle::StartEdge)
        );
        assert_eq!(
            hit_test(&layout, 55.0, 40.0).map(|h| h.1),
            Some(DragHandle::EndEdge)
        );
        assert_eq!(hit_test(&layout, 80.0, 40.0), None);
        assert_eq!(hit_test(&layout, 30.0, 10.0), None);
    }
}
