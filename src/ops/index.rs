//! Full-scan indexing: documents in, one immutable `Snapshot` out.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::io::store::{DocumentStore, StoreError};
use crate::model::diagnostic::{Omission, OmissionReason};
use crate::model::project::{MilestoneRecord, ProjectRecord, TaskCounts};
use crate::model::snapshot::Snapshot;
use crate::model::task::{CompletionSignal, DependencyEdge, TaskKey, TaskRecord, TaskStatus};
use crate::ops::bus::ChangeBus;
use crate::ops::derive::build_record;
use crate::ops::hierarchy;
use crate::parse::{ParsedDocument, parse_document};

/// External triggers for a reindex
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSignal {
    /// Documents (by key) were created, modified or removed
    DocumentChanged(Vec<String>),
    /// The store finished resolving metadata it had deferred
    MetadataResolved,
}

/// Handed out by `begin_scan`; identifies one scan's generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTicket {
    generation: u64,
}

impl ScanTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A finished but not yet committed scan
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub generation: u64,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Committed {
        generation: u64,
        projects: usize,
        tasks: usize,
        omissions: usize,
        /// Subscribers called
        notified: usize,
    },
    /// A newer scan was committed first; this one was discarded
    Stale { generation: u64, superseded_by: u64 },
}

/// Owns the store and the last committed snapshot.
///
/// Scans are split into `begin_scan` / `scan` / `commit` so callers that
/// interleave them can never let an older scan replace a newer one.
pub struct IndexEngine<S: DocumentStore> {
    store: S,
    snapshot: Rc<Snapshot>,
    bus: ChangeBus,
    issued: u64,
    committed: u64,
}

impl<S: DocumentStore> IndexEngine<S> {
    pub fn new(store: S) -> Self {
        IndexEngine {
            store,
            snapshot: Rc::new(Snapshot::default()),
            bus: ChangeBus::new(),
            issued: 0,
            committed: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// The last committed snapshot
    pub fn snapshot(&self) -> Rc<Snapshot> {
        Rc::clone(&self.snapshot)
    }

    pub fn project(&self, key: &str) -> Option<&ProjectRecord> {
        self.snapshot.project(key)
    }

    pub fn task(&self, key: &TaskKey) -> Option<&TaskRecord> {
        self.snapshot.task(key)
    }

    /// Bare ids resolve to the first match in document-key order, then line order
    pub fn find_task(&self, reference: &str) -> Option<&TaskRecord> {
        self.snapshot.find_task(reference)
    }

    pub fn tasks(&self) -> &[TaskRecord] {
        &self.snapshot.tasks
    }

    pub fn milestones(&self) -> &[MilestoneRecord] {
        &self.snapshot.milestones
    }

    pub fn begin_scan(&mut self) -> ScanTicket {
        self.issued += 1;
        ScanTicket {
            generation: self.issued,
        }
    }

    /// Read every document and build a snapshot. Documents that fail to read
    /// are skipped; a failed listing fails the scan.
    pub fn scan(&self, ticket: ScanTicket) -> Result<ScanResult, StoreError> {
        let keys = self.store.list()?;
        let mut docs = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.read(&key) {
                Ok(text) => docs.push((key, text)),
                Err(e) => warn!(document = %key, error = %e, "skipping unreadable document"),
            }
        }
        Ok(ScanResult {
            generation: ticket.generation,
            snapshot: build_snapshot(ticket.generation, docs),
        })
    }

    /// Install a scan's snapshot and notify subscribers once, unless a newer
    /// scan has already been committed.
    pub fn commit(&mut self, result: ScanResult) -> ScanOutcome {
        if result.generation <= self.committed {
            warn!(
                generation = result.generation,
                superseded_by = self.committed,
                "discarding stale scan"
            );
            return ScanOutcome::Stale {
                generation: result.generation,
                superseded_by: self.committed,
            };
        }
        self.committed = result.generation;
        self.snapshot = Rc::new(result.snapshot);
        let notified = self.bus.publish(&self.snapshot);
        debug!(
            generation = self.committed,
            tasks = self.snapshot.tasks.len(),
            projects = self.snapshot.projects.len(),
            notified,
            "snapshot committed"
        );
        ScanOutcome::Committed {
            generation: self.committed,
            projects: self.snapshot.projects.len(),
            tasks: self.snapshot.tasks.len(),
            omissions: self.snapshot.omissions.len(),
            notified,
        }
    }

    pub fn reindex(&mut self) -> Result<ScanOutcome, StoreError> {
        let ticket = self.begin_scan();
        let result = self.scan(ticket)?;
        Ok(self.commit(result))
    }

    pub fn handle_signal(&mut self, signal: ChangeSignal) -> Result<ScanOutcome, StoreError> {
        match &signal {
            ChangeSignal::DocumentChanged(keys) => {
                debug!(documents = ?keys, "documents changed")
            }
            ChangeSignal::MetadataResolved => debug!("metadata resolved"),
        }
        self.reindex()
    }
}

// ---------------------------------------------------------------------------
// Snapshot construction
// ---------------------------------------------------------------------------

/// Maps the document part of a reference to an owner key: exact key, key
/// without `.md`, or file stem, compared case-insensitively. The first
/// document in key order wins a contested name.
struct DocumentResolver {
    names: HashMap<String, String>,
}

impl DocumentResolver {
    fn new<'a>(keys: impl Iterator<Item = &'a str>) -> Self {
        let keys: Vec<&str> = keys.collect();
        let mut names = HashMap::new();
        for key in &keys {
            names.insert(key.to_lowercase(), key.to_string());
        }
        for key in &keys {
            let bare = key.strip_suffix(".md").unwrap_or(key);
            names
                .entry(bare.to_lowercase())
                .or_insert_with(|| key.to_string());
        }
        for key in &keys {
            let bare = key.strip_suffix(".md").unwrap_or(key);
            let stem = bare.rsplit('/').next().unwrap_or(bare);
            names
                .entry(stem.to_lowercase())
                .or_insert_with(|| key.to_string());
        }
        DocumentResolver { names }
    }

    /// Unknown names are kept verbatim
    fn resolve(&self, name: &str) -> String {
        let name = name.trim();
        self.names
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

fn project_title(key: &str, parsed: &ParsedDocument) -> String {
    if let Some(title) = parsed.front_matter.as_ref().and_then(|fm| fm.title()) {
        return title.to_string();
    }
    if let Some(heading) = &parsed.heading {
        return heading.clone();
    }
    let bare = key.strip_suffix(".md").unwrap_or(key);
    bare.rsplit('/').next().unwrap_or(bare).to_string()
}

/// Apply story rollups to the stories themselves and build the project record
fn build_project(key: &str, parsed: &ParsedDocument, records: &mut [TaskRecord]) -> ProjectRecord {
    let refs: Vec<&TaskRecord> = records.iter().collect();
    let resolved = hierarchy::resolve(&refs);

    for record in records.iter_mut() {
        let Some(rollup) = resolved.story_rollups.get(&record.key) else {
            continue;
        };
        if record.is_done() {
            continue;
        }
        record.completion = rollup.percent / 100.0;
        if rollup.done {
            record.done_by = Some(CompletionSignal::Rollup);
            record.status = TaskStatus::Done;
            record.completion = 1.0;
        }
    }

    let mut counts = TaskCounts::default();
    for record in records.iter() {
        counts.total += 1;
        match record.status {
            TaskStatus::NotStarted => counts.not_started += 1,
            TaskStatus::InProgress => counts.in_progress += 1,
            TaskStatus::OnHold => counts.on_hold += 1,
            TaskStatus::Done => counts.done += 1,
        }
    }
    let completion = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.percent() / 100.0).sum::<f64>() / records.len() as f64
    };
    let next_due = records
        .iter()
        .filter(|r| !r.is_done())
        .filter_map(|r| r.due)
        .min();

    let fm = parsed.front_matter.as_ref();
    ProjectRecord {
        key: key.to_string(),
        title: project_title(key, parsed),
        start: fm.and_then(|fm| fm.start()),
        end: fm.and_then(|fm| fm.end()),
        tasks: resolved.cascade.iter().map(|c| c.key.clone()).collect(),
        cascade: resolved.cascade,
        story_rollups: resolved.story_rollups,
        epic_descendants: resolved.epic_descendants,
        completion,
        next_due,
        counts,
    }
}

/// Build a snapshot from `(key, text)` pairs. Pure and deterministic: the
/// same documents always give the same records, whatever their input order.
pub fn build_snapshot(generation: u64, mut docs: Vec<(String, String)>) -> Snapshot {
    docs.sort_by(|a, b| a.0.cmp(&b.0));
    let resolver = DocumentResolver::new(docs.iter().map(|(k, _)| k.as_str()));

    let mut projects = Vec::new();
    let mut tasks = Vec::new();
    let mut milestones = Vec::new();
    let mut omissions = Vec::new();

    for (key, text) in &docs {
        let parsed = parse_document(text);

        let mut records = Vec::with_capacity(parsed.tasks.len());
        let mut seen: HashMap<TaskKey, usize> = HashMap::with_capacity(parsed.tasks.len());
        for (line, task_line) in &parsed.tasks {
            match build_record(key, *line, task_line) {
                Ok((record, _)) if seen.contains_key(&record.key) => {
                    omissions.push(Omission {
                        document: key.clone(),
                        line: line + 1,
                        reason: OmissionReason::DuplicateId {
                            id: record.local_id.clone(),
                            first_line: seen[&record.key] + 1,
                        },
                    });
                }
                Ok((mut record, refs)) => {
                    seen.insert(record.key.clone(), *line);
                    record.depends = refs
                        .into_iter()
                        .map(|r| {
                            let owner = match &r.document {
                                Some(doc) => resolver.resolve(doc),
                                None => key.clone(),
                            };
                            DependencyEdge {
                                source: TaskKey::new(&owner, &r.id),
                                destination: record.key.clone(),
                                link: r.link,
                            }
                        })
                        .collect();
                    records.push(record);
                }
                Err(reason) => omissions.push(Omission {
                    document: key.clone(),
                    line: line + 1,
                    reason,
                }),
            }
        }
        for (line, reason) in &parsed.omitted {
            omissions.push(Omission {
                document: key.clone(),
                line: line + 1,
                reason: reason.clone(),
            });
        }

        for row in &parsed.milestones {
            milestones.push(MilestoneRecord {
                id: row.id.clone(),
                title: row.title.clone(),
                date: row.date,
                description: row.description.clone(),
                owner: match &row.owner {
                    Some(owner) => resolver.resolve(owner),
                    None => key.clone(),
                },
                source: key.clone(),
                line: row.line,
            });
        }

        if parsed.is_project() {
            projects.push(build_project(key, &parsed, &mut records));
        }
        tasks.extend(records);
    }

    omissions.sort_by(|a, b| a.document.cmp(&b.document).then(a.line.cmp(&b.line)));
    for omission in &omissions {
        warn!(
            document = %omission.document,
            line = omission.line,
            reason = %omission.reason,
            "record omitted"
        );
    }
    debug!(
        generation,
        documents = docs.len(),
        tasks = tasks.len(),
        milestones = milestones.len(),
        "scan built"
    );

    Snapshot::new(generation, projects, tasks, milestones, omissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::model::task::{HierarchyRole, LinkType};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    const PLAN: &str = "\
---
title: Alpha
start: 2026-01-05
end: 2026-03-27
---
# Ignored heading

- [ ] Platform id:: E-1
- [ ] Login flow id:: S-1 epic:: E-1
- [x] Schema id:: SB-1 story:: S-1 due:: 2026-01-20
- [ ] Handlers id:: SB-2 story:: S-1 depends:: FS:^sb-1 due:: 2026-02-10
";

    fn engine(docs: &[(&str, &str)]) -> IndexEngine<MemoryStore> {
        let mut store = MemoryStore::new();
        for (k, v) in docs {
            store.insert(k, v);
        }
        IndexEngine::new(store)
    }

    fn key(s: &str) -> TaskKey {
        TaskKey::parse(s).unwrap()
    }

    #[test]
    fn test_reindex_builds_project() {
        let mut engine = engine(&[("alpha.md", PLAN)]);
        let outcome = engine.reindex().unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Committed {
                generation: 1,
                projects: 1,
                tasks: 4,
                omissions: 0,
                notified: 0,
            }
        );

        let project = engine.project("alpha.md").unwrap();
        assert_eq!(project.title, "Alpha");
        let order: Vec<&str> = project.tasks.iter().map(|k| k.local_id()).collect();
        assert_eq!(order, vec!["e-1", "s-1", "sb-1", "sb-2"]);
        assert_eq!(project.story_rollups[&key("alpha.md::s-1")].percent, 50.0);
        assert_eq!(project.epic_descendants[&key("alpha.md::e-1")], 2);
        assert_eq!(project.counts.done, 1);
        assert_eq!(project.next_due, crate::parse::parse_iso_date("2026-02-10"));

        let story = engine.task(&key("alpha.md::s-1")).unwrap();
        assert_eq!(story.role, HierarchyRole::Story);
        assert_eq!(story.completion, 0.5);
        assert!(!story.is_done());

        let sb2 = engine.find_task("SB-2").unwrap();
        assert_eq!(
            sb2.depends,
            vec![DependencyEdge {
                source: key("alpha.md::sb-1"),
                destination: key("alpha.md::sb-2"),
                link: LinkType::FinishStart,
            }]
        );
    }

    #[test]
    fn test_story_done_by_rollup() {
        let text = PLAN.replace("- [ ] Handlers", "- [x] Handlers");
        let mut engine = engine(&[("alpha.md", &text)]);
        engine.reindex().unwrap();
        let story = engine.task(&key("alpha.md::s-1")).unwrap();
        assert_eq!(story.done_by, Some(CompletionSignal::Rollup));
        assert_eq!(story.status, TaskStatus::Done);
    }

    #[test]
    fn test_idempotent() {
        let a = build_snapshot(1, vec![("alpha.md".into(), PLAN.into())]);
        let b = build_snapshot(1, vec![("alpha.md".into(), PLAN.into())]);
        let keys = |s: &Snapshot| s.tasks.iter().map(|t| t.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&a), keys(&b));
        assert_eq!(
            a.projects[0].cascade, b.projects[0].cascade
        );
        assert_eq!(a.projects[0].completion, b.projects[0].completion);
    }

    #[test]
    fn test_bad_records_are_omitted_not_fatal() {
        let text = "\
- [ ] Good id:: A-1 due:: 2026-01-10
- [ ] Bad date id:: A-2 due:: 2026-13-45
- [ ] Bad id id:: [x y]
- [ ] Also good
";
        let snapshot = build_snapshot(1, vec![("a.md".into(), text.into())]);
        let ids: Vec<&str> = snapshot.tasks.iter().map(|t| t.local_id.as_str()).collect();
        assert_eq!(ids, vec!["A-1", "line-4"]);
        assert_eq!(snapshot.omissions.len(), 2);
        assert_eq!(snapshot.omissions[0].line, 2);
        assert_eq!(
            snapshot.omissions[0].reason,
            OmissionReason::InvalidDate {
                key: "due".to_string(),
                value: "2026-13-45".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_ids_keep_the_first_task() {
        let text = "\
- [ ] Story id:: S-1
- [ ] First id:: SB-1 story:: S-1
- [ ] Again id:: sb-1 story:: S-1
";
        let snapshot = build_snapshot(1, vec![("a.md".into(), text.into())]);
        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(
            snapshot.omissions[0].reason,
            OmissionReason::DuplicateId {
                id: "sb-1".to_string(),
                first_line: 2
            }
        );
        assert_eq!(snapshot.omissions[0].line, 3);

        let project = &snapshot.projects[0];
        let order: Vec<&str> = project.cascade.iter().map(|c| c.key.local_id()).collect();
        assert_eq!(order, vec!["s-1", "sb-1"]);
        let titles: Vec<&str> = snapshot
            .project_tasks("a.md")
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(titles, vec!["Story", "First"]);
        assert_eq!(project.story_rollups[&key("a.md::s-1")].subtasks, 1);
    }

    #[test]
    fn test_cross_document_references_resolve_by_stem() {
        let snapshot = build_snapshot(
            1,
            vec![
                ("plans/beta.md".into(), "- [ ] Deploy id:: B-1 depends:: [[alpha#^sb-1]]\n".into()),
                ("plans/alpha.md".into(), "- [ ] Build id:: SB-1\n".into()),
            ],
        );
        let deploy = snapshot.find_task("b-1").unwrap();
        assert_eq!(deploy.depends[0].source, key("plans/alpha.md::sb-1"));
        assert!(!deploy.depends[0].is_same_document());
    }

    #[test]
    fn test_first_match_wins_for_bare_ids() {
        let snapshot = build_snapshot(
            1,
            vec![
                ("b.md".into(), "- [ ] Second id:: X-1\n".into()),
                ("a.md".into(), "- [ ] First id:: X-1\n".into()),
            ],
        );
        assert_eq!(snapshot.find_task("x-1").unwrap().owner, "a.md");
        assert_eq!(snapshot.find_task("b.md::x-1").unwrap().text, "Second");
    }

    #[test]
    fn test_milestone_owner_resolution() {
        let text = "\
| id | title | date | project |
|----|-------|------|---------|
| M-1 | Beta | 2026-02-01 | |
| M-2 | GA | 2026-03-01 | alpha |
";
        let snapshot = build_snapshot(
            1,
            vec![
                ("milestones.md".into(), text.into()),
                ("alpha.md".into(), PLAN.into()),
            ],
        );
        let owners: Vec<(&str, &str)> = snapshot
            .milestones
            .iter()
            .map(|m| (m.id.as_str(), m.owner.as_str()))
            .collect();
        assert_eq!(owners, vec![("M-1", "milestones.md"), ("M-2", "alpha.md")]);
        assert_eq!(snapshot.milestones_for("alpha.md").count(), 1);
    }

    #[test]
    fn test_stale_scan_is_discarded() {
        let mut engine = engine(&[("alpha.md", PLAN)]);
        let heard = Rc::new(RefCell::new(Vec::new()));
        let sink = heard.clone();
        engine
            .bus()
            .subscribe(move |snap| sink.borrow_mut().push(snap.generation));

        let older = engine.begin_scan();
        let newer = engine.begin_scan();
        let old_result = engine.scan(older).unwrap();
        engine.store_mut().insert("beta.md", "- [ ] Extra id:: B-1\n");
        let new_result = engine.scan(newer).unwrap();

        assert!(matches!(
            engine.commit(new_result),
            ScanOutcome::Committed { generation: 2, tasks: 5, .. }
        ));
        assert_eq!(
            engine.commit(old_result),
            ScanOutcome::Stale {
                generation: 1,
                superseded_by: 2
            }
        );
        assert_eq!(engine.snapshot().generation, 2);
        assert_eq!(engine.tasks().len(), 5);
        assert_eq!(*heard.borrow(), vec![2]);
    }

    #[test]
    fn test_signals_map_to_one_reindex_each() {
        let mut engine = engine(&[("alpha.md", PLAN)]);
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        engine.bus().subscribe(move |_| *sink.borrow_mut() += 1);

        engine
            .handle_signal(ChangeSignal::DocumentChanged(vec!["alpha.md".into()]))
            .unwrap();
        engine.handle_signal(ChangeSignal::MetadataResolved).unwrap();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(engine.snapshot().generation, 2);
    }
}
