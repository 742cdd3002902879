use serde::{Deserialize, Serialize};

use super::task::TaskKey;

/// Reschedule request emitted by the timeline when a gesture ends.
/// The only contract between the layout engine and the mutation gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RescheduleIntent {
    BarMoved {
        task: TaskKey,
        delta_days: i64,
    },
    BarResized {
        task: TaskKey,
        delta_start: i64,
        delta_due: i64,
    },
    ProjectBarMoved {
        project: String,
        delta_days: i64,
    },
    ProjectBarResized {
        project: String,
        delta_start: i64,
        delta_end: i64,
    },
}

impl RescheduleIntent {
    /// True when applying the intent could not change any date
    pub fn is_noop(&self) -> bool {
        match self {
            RescheduleIntent::BarMoved { delta_days, .. }
            | RescheduleIntent::ProjectBarMoved { delta_days, .. } => *delta_days == 0,
            RescheduleIntent::BarResized {
                delta_start,
                delta_due,
                ..
            } => *delta_start == 0 && *delta_due == 0,
            RescheduleIntent::ProjectBarResized {
                delta_start,
                delta_end,
                ..
            } => *delta_start == 0 && *delta_end == 0,
        }
    }
}
