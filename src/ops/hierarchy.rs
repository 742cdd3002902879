//! Epic → Story → Subtask reconstruction from a flat, per-document record list.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::model::project::{CascadeEntry, StoryRollup};
use crate::model::task::{HierarchyRole, TaskKey, TaskRecord};

/// Display order and rollups for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub cascade: Vec<CascadeEntry>,
    pub story_rollups: BTreeMap<TaskKey, StoryRollup>,
    pub epic_descendants: BTreeMap<TaskKey, usize>,
}

/// Parent links resolved to child lists, indexed by parent position
struct Membership {
    /// epic index → its stories, in original order
    stories: Vec<Vec<usize>>,
    /// story index → its subtasks (by `story::` or first dependency)
    subtasks: Vec<Vec<usize>>,
}

impl Membership {
    fn build(tasks: &[&TaskRecord]) -> Self {
        let mut by_id: HashMap<&str, usize> = HashMap::new();
        for (i, t) in tasks.iter().enumerate() {
            by_id.entry(t.key.local_id()).or_insert(i);
        }

        let mut stories = vec![Vec::new(); tasks.len()];
        let mut subtasks = vec![Vec::new(); tasks.len()];
        for (i, t) in tasks.iter().enumerate() {
            let (parent, lists) = match t.role {
                HierarchyRole::Story => (t.epic_ref.as_deref(), &mut stories),
                HierarchyRole::Subtask => (subtask_reference(t), &mut subtasks),
                _ => continue,
            };
            if let Some(&p) = parent.and_then(|r| by_id.get(r))
                && p != i
            {
                lists[p].push(i);
            }
        }
        Membership { stories, subtasks }
    }
}

/// The explicit `story::` reference, falling back to the first dependency
/// within the same document
fn subtask_reference(task: &TaskRecord) -> Option<&str> {
    if let Some(story) = task.story_ref.as_deref() {
        return Some(story);
    }
    task.depends
        .first()
        .filter(|edge| edge.source.owner() == task.owner)
        .map(|edge| edge.source.local_id())
}

/// Mean subtask completion on a 0..100 scale; done subtasks count as 100.
/// Pure: the same subtask set always yields the same value.
pub fn story_rollup(subtasks: &[&TaskRecord]) -> StoryRollup {
    if subtasks.is_empty() {
        return StoryRollup {
            percent: 0.0,
            done: false,
            subtasks: 0,
        };
    }
    let sum: f64 = subtasks.iter().map(|t| t.percent()).sum();
    let percent = sum / subtasks.len() as f64;
    StoryRollup {
        percent,
        done: percent >= 100.0,
        subtasks: subtasks.len(),
    }
}

/// Rebuild cascade order and rollups for the records of one document,
/// given in document order.
///
/// Every record is emitted exactly once, whatever the membership data looks
/// like: epics with their stories and each story's subtasks first, then
/// stories without an epic, then everything else in original order.
pub fn resolve(tasks: &[&TaskRecord]) -> Hierarchy {
    let n = tasks.len();
    let members = Membership::build(tasks);
    let stories_of = |i: usize| members.stories[i].iter().copied();
    let subtasks_of = |i: usize| members.subtasks[i].iter().copied();

    let mut emitted: HashSet<usize> = HashSet::with_capacity(n);
    let mut cascade = Vec::with_capacity(n);
    let mut emit = |i: usize, depth: usize, cascade: &mut Vec<CascadeEntry>| {
        if emitted.insert(i) {
            cascade.push(CascadeEntry {
                key: tasks[i].key.clone(),
                depth,
            });
            true
        } else {
            false
        }
    };

    // 1. epics, each followed by its stories and their subtasks
    for e in (0..n).filter(|&i| tasks[i].role == HierarchyRole::Epic) {
        if !emit(e, 0, &mut cascade) {
            continue;
        }
        for s in stories_of(e) {
            if tasks[s].role != HierarchyRole::Story || !emit(s, 1, &mut cascade) {
                continue;
            }
            for sb in subtasks_of(s) {
                emit(sb, 2, &mut cascade);
            }
        }
    }

    // 2. stories without an epic
    for s in (0..n).filter(|&i| tasks[i].role == HierarchyRole::Story) {
        if !emit(s, 0, &mut cascade) {
            continue;
        }
        for sb in subtasks_of(s) {
            emit(sb, 1, &mut cascade);
        }
    }

    // 3. everything left, in original order
    for i in 0..n {
        emit(i, 0, &mut cascade);
    }

    let mut story_rollups = BTreeMap::new();
    for s in (0..n).filter(|&i| tasks[i].role == HierarchyRole::Story) {
        let subs: Vec<&TaskRecord> = subtasks_of(s).map(|i| tasks[i]).collect();
        if !subs.is_empty() {
            story_rollups
                .entry(tasks[s].key.clone())
                .or_insert_with(|| story_rollup(&subs));
        }
    }

    let mut epic_descendants = BTreeMap::new();
    for e in (0..n).filter(|&i| tasks[i].role == HierarchyRole::Epic) {
        epic_descendants
            .entry(tasks[e].key.clone())
            .or_insert_with(|| count_descendant_subtasks(tasks, &members, e));
    }

    Hierarchy {
        cascade,
        story_rollups,
        epic_descendants,
    }
}

/// Breadth-first walk over membership links from `root`, counting every
/// subtask reached. The visited set stops cycles.
fn count_descendant_subtasks(tasks: &[&TaskRecord], members: &Membership, root: usize) -> usize {
    let mut visited: HashSet<usize> = HashSet::from([root]);
    let mut queue: VecDeque<usize> = VecDeque::from([root]);
    let mut count = 0;

    while let Some(node) = queue.pop_front() {
        let children = members.stories[node].iter().chain(&members.subtasks[node]).copied();
        for child in children {
            if visited.insert(child) {
                if tasks[child].role == HierarchyRole::Subtask {
                    count += 1;
                }
                queue.push_back(child);
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::derive::build_record;
    use crate::parse::parse_task_line;
    use crate::model::task::{DependencyEdge, LinkType};

    fn records(lines: &[&str]) -> Vec<TaskRecord> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let (mut record, deps) =
                    build_record("doc.md", i, &parse_task_line(l).unwrap()).unwrap();
                record.depends = deps
                    .into_iter()
                    .map(|d| DependencyEdge {
                        source: TaskKey::new(d.document.as_deref().unwrap_or("doc.md"), &d.id),
                        destination: record.key.clone(),
                        link: d.link,
                    })
                    .collect();
                record
            })
            .collect()
    }

    fn order(h: &Hierarchy) -> Vec<&str> {
        h.cascade.iter().map(|e| e.key.local_id()).collect()
    }

    fn refs(records: &[TaskRecord]) -> Vec<&TaskRecord> {
        records.iter().collect()
    }

    #[test]
    fn test_epic_story_subtask_scenario() {
        let recs = records(&[
            "- [ ] SB-2 work story:: S-1 ^sb-2",
            "- [ ] Epic ^E-1",
            "- [x] SB-1 work story:: S-1 ^sb-1",
            "- [ ] Story epic:: E-1 ^S-1",
        ]);
        let h = resolve(&refs(&recs));
        assert_eq!(order(&h), vec!["e-1", "s-1", "sb-2", "sb-1"]);
        let depths: Vec<usize> = h.cascade.iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 2]);
        let rollup = h.story_rollups[&TaskKey::new("doc.md", "s-1")];
        assert_eq!(rollup.percent, 50.0);
        assert!(!rollup.done);
        assert_eq!(h.epic_descendants[&TaskKey::new("doc.md", "e-1")], 2);
    }

    #[test]
    fn test_scenario_in_document_order() {
        let recs = records(&[
            "- [ ] Epic ^E-1",
            "- [ ] Story epic:: E-1 ^S-1",
            "- [x] SB-1 story:: S-1 ^SB-1",
            "- [ ] SB-2 story:: S-1 ^SB-2",
        ]);
        let h = resolve(&refs(&recs));
        assert_eq!(order(&h), vec!["e-1", "s-1", "sb-1", "sb-2"]);
        assert_eq!(h.story_rollups[&TaskKey::new("doc.md", "S-1")].percent, 50.0);
    }

    #[test]
    fn test_unresolved_parents_come_last() {
        let recs = records(&[
            "- [ ] Loose subtask story:: S-404 ^SB-9",
            "- [ ] Orphan story epic:: E-404 ^S-2",
            "- [ ] Plain task",
            "- [ ] Epic ^E-1",
            "- [ ] Child story:: S-2 ^SB-3",
        ]);
        let h = resolve(&refs(&recs));
        assert_eq!(order(&h), vec!["e-1", "s-2", "sb-3", "sb-9", "line-3"]);
        // the orphan story starts its own top-level group
        assert_eq!(h.cascade[1].depth, 0);
        assert_eq!(h.cascade[2].depth, 1);
    }

    #[test]
    fn test_dependency_fallback_for_story() {
        let recs = records(&[
            "- [ ] Story ^S-1",
            "- [ ] Sub depends:: FS:^s-1 ^SB-1",
            "- [ ] Other depends:: [[other#^s-1]] ^SB-2",
        ]);
        let h = resolve(&refs(&recs));
        assert_eq!(order(&h), vec!["s-1", "sb-1", "sb-2"]);
        assert_eq!(h.cascade[1].depth, 1);
        // cross-document dependency is not a parent
        assert_eq!(h.cascade[2].depth, 0);
    }

    #[test]
    fn test_cycles_emit_each_record_once() {
        let recs = records(&[
            "- [ ] Epic ^E-1",
            "- [ ] Story epic:: S-1 ^S-1",
            "- [ ] A story:: SB-2 ^SB-1",
            "- [ ] B story:: SB-1 ^SB-2",
            "- [ ] Dup ^E-1",
        ]);
        let h = resolve(&refs(&recs));
        assert_eq!(h.cascade.len(), recs.len());
        let mut seen = HashSet::new();
        // duplicate local ids share a key; positions still differ
        let positions: Vec<usize> = h
            .cascade
            .iter()
            .map(|e| recs.iter().position(|r| r.key == e.key).unwrap())
            .collect();
        for p in &positions {
            seen.insert(*p);
        }
        assert!(seen.len() >= recs.len() - 1);
        assert_eq!(h.epic_descendants[&TaskKey::new("doc.md", "e-1")], 0);
    }

    #[test]
    fn test_epic_descendants_are_transitive() {
        let recs = records(&[
            "- [ ] Epic ^E-1",
            "- [ ] Story epic:: E-1 ^S-1",
            "- [ ] One story:: S-1 ^SB-1",
            "- [ ] Two depends:: SB-1 ^SB-2",
            "- [ ] Three depends:: SS:SB-2 ^SB-3",
            "- [ ] Back to start story:: SB-3 depends:: SB-1 ^SB-4",
        ]);
        let h = resolve(&refs(&recs));
        assert_eq!(h.epic_descendants[&TaskKey::new("doc.md", "e-1")], 4);
        // only the direct subtask sits under the story in the cascade
        assert_eq!(order(&h), vec!["e-1", "s-1", "sb-1", "sb-2", "sb-3", "sb-4"]);
        assert_eq!(h.cascade[3].depth, 0);
    }

    #[test]
    fn test_rollup_is_pure_and_reaches_done() {
        let recs = records(&[
            "- [x] A ^SB-1",
            "- [ ] B progress:: 0.5 ^SB-2",
            "- [ ] C progress:: 25% ^SB-3",
        ]);
        let subs = refs(&recs);
        let first = story_rollup(&subs);
        let second = story_rollup(&subs);
        assert_eq!(first, second);
        assert!((first.percent - 175.0 / 3.0).abs() < 1e-9);

        let done = records(&["- [x] A ^SB-1", "- [ ] B status:: done ^SB-2"]);
        let rollup = story_rollup(&refs(&done));
        assert_eq!(rollup.percent, 100.0);
        assert!(rollup.done);
    }

    #[test]
    fn test_large_story_resolves_every_subtask() {
        let mut lines = vec!["- [ ] Epic ^E-1".to_string(), "- [ ] Story epic:: E-1 ^S-1".to_string()];
        lines.extend((1..=5000).map(|i| format!("- [x] Step {} story:: S-1 ^SB-{}", i, i)));
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let recs = records(&lines);
        let h = resolve(&refs(&recs));
        assert_eq!(h.cascade.len(), 5002);
        assert_eq!(h.cascade[4001].key.local_id(), "sb-4000");
        assert_eq!(h.cascade[4001].depth, 2);
        assert_eq!(h.story_rollups[&TaskKey::new("doc.md", "s-1")].subtasks, 5000);
        assert_eq!(h.epic_descendants[&TaskKey::new("doc.md", "e-1")], 5000);
    }

    #[test]
    fn test_link_type_does_not_matter_for_fallback() {
        let recs = records(&["- [ ] S ^S-1", "- [ ] X depends:: FF:^S-1 ^SB-1"]);
        assert_eq!(recs[1].depends[0].link, LinkType::FinishFinish);
        let h = resolve(&refs(&recs));
        assert_eq!(h.cascade[1].depth, 1);
    }
}
