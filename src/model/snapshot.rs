use std::collections::HashMap;

use super::diagnostic::Omission;
use super::project::{MilestoneRecord, ProjectRecord};
use super::task::{DependencyEdge, TaskKey, TaskRecord};

/// The complete result of one committed scan. Rebuilt wholesale on every
/// reindex; references into an older snapshot must be re-resolved by key.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub generation: u64,
    /// Sorted by document key
    pub projects: Vec<ProjectRecord>,
    /// Document key order, then line order
    pub tasks: Vec<TaskRecord>,
    pub milestones: Vec<MilestoneRecord>,
    pub omissions: Vec<Omission>,
    task_index: HashMap<TaskKey, usize>,
    project_index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn new(
        generation: u64,
        projects: Vec<ProjectRecord>,
        tasks: Vec<TaskRecord>,
        milestones: Vec<MilestoneRecord>,
        omissions: Vec<Omission>,
    ) -> Self {
        let mut task_index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            task_index.entry(task.key.clone()).or_insert(i);
        }
        let project_index = projects
            .iter()
            .enumerate()
            .map(|(i, p)| (p.key.clone(), i))
            .collect();
        Snapshot {
            generation,
            projects,
            tasks,
            milestones,
            omissions,
            task_index,
            project_index,
        }
    }

    pub fn project(&self, key: &str) -> Option<&ProjectRecord> {
        self.project_index.get(key).map(|&i| &self.projects[i])
    }

    pub fn task(&self, key: &TaskKey) -> Option<&TaskRecord> {
        self.task_index.get(key).map(|&i| &self.tasks[i])
    }

    /// Resolve a user reference: a full `doc::id` key, or a bare id.
    ///
    /// Local ids are only unique per document, so a bare id is ambiguous when
    /// several documents use it. The first match in document-key order, then
    /// line order, wins.
    pub fn find_task(&self, reference: &str) -> Option<&TaskRecord> {
        if let Some(key) = TaskKey::parse(reference)
            && let Some(task) = self.task(&key)
        {
            return Some(task);
        }
        let wanted = reference.trim().trim_start_matches('^').to_lowercase();
        self.tasks
            .iter()
            .find(|t| t.key.local_id() == wanted)
    }

    /// Tasks of one project in cascade order
    pub fn project_tasks<'a>(&'a self, key: &str) -> Vec<&'a TaskRecord> {
        match self.project(key) {
            Some(project) => project.tasks.iter().filter_map(|k| self.task(k)).collect(),
            None => Vec::new(),
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.tasks.iter().flat_map(|t| t.depends.iter())
    }

    pub fn milestones_for<'a>(&'a self, project: &'a str) -> impl Iterator<Item = &'a MilestoneRecord> {
        self.milestones.iter().filter(move |m| m.owner == project)
    }
}
