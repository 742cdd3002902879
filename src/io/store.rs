use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::IndexConfig;

/// Error type for document store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("document key escapes the root: {0}")]
    OutsideRoot(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Read/write access to the monitored documents, addressed by key
/// (root-relative path with `/` separators).
pub trait DocumentStore {
    /// All document keys
    fn list(&self) -> Result<Vec<String>, StoreError>;
    fn read(&self, key: &str) -> Result<String, StoreError>;
    /// Replace a document's text. Only existing documents can be written.
    fn write(&mut self, key: &str, text: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// Markdown files under a root directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl FsStore {
    pub fn new(root: &Path, config: &IndexConfig) -> Self {
        FsStore {
            root: root.to_path_buf(),
            include: config.include.clone(),
            exclude: config.exclude.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path, refusing anything that leaves the root
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(StoreError::OutsideRoot(key.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Key for a markdown file under the root
    pub fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if rel.extension().and_then(|e| e.to_str()) != Some("md") {
            return None;
        }
        let parts: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    fn skip_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.exclude.iter().any(|x| x == name)
    }

    fn walk(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = fs::read_dir(dir).map_err(|e| StoreError::ReadError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !self.skip_dir(&name) {
                    self.walk(&path, keys)?;
                }
            } else if let Some(key) = self.key_for(&path) {
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl DocumentStore for FsStore {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for dir in &self.include {
            let dir = self.path_for(dir).unwrap_or_else(|_| self.root.clone());
            if dir.is_dir() {
                self.walk(&dir, &mut keys)?;
            }
        }
        keys.sort();
        keys.dedup();
        debug!(documents = keys.len(), root = %self.root.display(), "listed documents");
        Ok(keys)
    }

    fn read(&self, key: &str) -> Result<String, StoreError> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(StoreError::UnknownDocument(key.to_string()));
        }
        fs::read_to_string(&path).map_err(|e| StoreError::ReadError { path, source: e })
    }

    fn write(&mut self, key: &str, text: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(StoreError::UnknownDocument(key.to_string()));
        }
        if let Err(e) = recovery::atomic_write(&path, text.as_bytes()) {
            recovery::log_recovery(
                &self.root,
                RecoveryEntry {
                    timestamp: Utc::now(),
                    category: RecoveryCategory::Write,
                    description: format!("could not save {}", key),
                    fields: vec![
                        ("Document".to_string(), key.to_string()),
                        ("Error".to_string(), e.to_string()),
                    ],
                    body: text.to_string(),
                },
            );
            return Err(StoreError::WriteError { path, source: e });
        }
        debug!(document = key, bytes = text.len(), "document written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Documents held in memory, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, text: &str) -> Self {
        self.insert(key, text);
        self
    }

    pub fn insert(&mut self, key: &str, text: &str) {
        self.docs.insert(key.to_string(), text.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.docs.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.docs.get(key).map(|s| s.as_str())
    }

    /// Successful `write` calls so far
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DocumentStore for MemoryStore {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.docs.keys().cloned().collect())
    }

    fn read(&self, key: &str) -> Result<String, StoreError> {
        self.docs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownDocument(key.to_string()))
    }

    fn write(&mut self, key: &str, text: &str) -> Result<(), StoreError> {
        match self.docs.get_mut(key) {
            Some(doc) => {
                *doc = text.to_string();
                self.writes += 1;
                Ok(())
            }
            None => Err(StoreError::UnknownDocument(key.to_string())),
        }
    }
}
