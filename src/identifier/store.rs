//! Identifier pool storage
//!
//! The pool remembers every identifier ever minted so reruns never hand out
//! a duplicate. Inserts are write-through: the file on disk is rewritten
//! before `insert` returns.
//!
//! Only one process may use a pool file at a time; there is no file locking.

use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Capability the mint needs from a pool
pub trait IdentifierStore {
    fn contains(&self, id: &str) -> bool;

    /// Record `id` and make it durable before returning.
    fn insert(&mut self, id: String) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Volatile pool for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    ids: FxHashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl IdentifierStore for MemoryStore {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: String) -> Result<(), StoreError> {
        self.ids.insert(id);
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Pool persisted as a pretty-printed JSON array, in mint order
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    order: Vec<String>,
    index: FxHashSet<String>,
}

impl JsonFileStore {
    /// Load the pool, or start empty when the file does not exist yet.
    ///
    /// A corrupt file is an error rather than a silent reset: starting
    /// fresh would allow old identifiers to be minted again.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let order: Vec<String> = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            debug!(path = %path.display(), "Identifier pool not found, starting empty");
            Vec::new()
        };

        let index: FxHashSet<String> = order.iter().cloned().collect();
        if index.len() != order.len() {
            warn!(
                path = %path.display(),
                duplicates = order.len() - index.len(),
                "Identifier pool contains duplicate entries"
            );
        }

        Ok(Self { path, order, index })
    }

    /// Explicit reset: forget every identifier and persist the empty pool.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.order.clear();
        self.index.clear();
        self.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }
        let content = serde_json::to_string_pretty(&self.order)?;
        // Write beside the target and rename so a crash never truncates the pool
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

impl IdentifierStore for JsonFileStore {
    fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    fn insert(&mut self, id: String) -> Result<(), StoreError> {
        if self.index.insert(id.clone()) {
            self.order.push(id);
        }
        self.flush()
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
