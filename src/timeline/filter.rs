use crate::model::snapshot::Snapshot;
use crate::model::task::{HierarchyRole, TaskRecord};

/// Per-view toggles. Presentation state owned by the caller, turned into a
/// predicate for `visible_tasks` and `layout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewFilter {
    pub show_epics: bool,
    pub show_stories: bool,
    pub show_done: bool,
}

impl Default for ViewFilter {
    fn default() -> Self {
        ViewFilter {
            show_epics: true,
            show_stories: true,
            show_done: true,
        }
    }
}

impl ViewFilter {
    pub fn accepts(&self, task: &TaskRecord) -> bool {
        match task.role {
            HierarchyRole::Epic if !self.show_epics => return false,
            HierarchyRole::Story if !self.show_stories => return false,
            _ => {}
        }
        self.show_done || !task.is_done()
    }

    pub fn predicate(self) -> impl Fn(&TaskRecord) -> bool {
        move |task| self.accepts(task)
    }
}

/// Tasks passing `predicate`, project by project in cascade order
pub fn visible_tasks<'a>(
    snapshot: &'a Snapshot,
    predicate: impl Fn(&TaskRecord) -> bool,
) -> Vec<&'a TaskRecord> {
    snapshot
        .projects
        .iter()
        .flat_map(|p| snapshot.project_tasks(&p.key))
        .filter(|t| predicate(t))
        .collect()
}
