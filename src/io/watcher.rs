use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::ops::index::ChangeSignal;

/// A file system watcher over the monitored root, producing change signals
/// for the index engine.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    rx: mpsc::Receiver<Vec<PathBuf>>,
}

/// Paths the watcher reports: markdown documents and the config file,
/// outside the `.taskline` state directory
fn is_relevant(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    if rel.starts_with(".taskline") {
        return false;
    }
    if rel == Path::new(crate::io::config_io::CONFIG_FILE) {
        return true;
    }
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

impl DocumentWatcher {
    pub fn start(root: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let root_owned = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_relevant(&root_owned, p))
                    .collect();
                if !relevant.is_empty() {
                    let _ = tx.send(relevant);
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(DocumentWatcher {
            _watcher: watcher,
            root: root.to_path_buf(),
            rx,
        })
    }

    fn to_signal(&self, paths: Vec<PathBuf>) -> ChangeSignal {
        let mut keys: Vec<String> = paths
            .iter()
            .filter_map(|p| p.strip_prefix(&self.root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        keys.sort();
        keys.dedup();
        ChangeSignal::DocumentChanged(keys)
    }

    /// Non-blocking: all pending events folded into at most one signal
    pub fn poll(&self) -> Option<ChangeSignal> {
        let mut paths = Vec::new();
        while let Ok(batch) = self.rx.try_recv() {
            paths.extend(batch);
        }
        (!paths.is_empty()).then(|| self.to_signal(paths))
    }

    /// Block until something changes, then drain whatever else arrives
    /// within `settle` so an editor's burst of writes becomes one signal
    pub fn wait(&self, settle: Duration) -> Option<ChangeSignal> {
        let mut paths = self.rx.recv().ok()?;
        while let Ok(batch) = self.rx.recv_timeout(settle) {
            paths.extend(batch);
        }
        Some(self.to_signal(paths))
    }
}
