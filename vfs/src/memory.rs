use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::VfsError;
use crate::provider::VfsProvider;

/// In-memory VFS provider for tests and embedded assets.
///
/// Clones share the same file table, so a handle kept outside a [`Vfs`](crate::Vfs)
/// still sees (and can seed) files written through it.
///
/// Directories are implicit: they exist whenever a file path contains
/// that directory prefix.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file at the given path, overwriting any existing one.
    pub fn insert(&self, path: impl Into<String>, data: Vec<u8>) {
        self.files.write().insert(path.into(), data);
    }

    /// Remove a file at the given path, returning its data if it existed.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.write().remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl VfsProvider for MemoryProvider {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_owned()))
    }

    fn exists(&self, path: &str) -> Result<bool, VfsError> {
        Ok(self.files.read().contains_key(path))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>, VfsError> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let files = self.files.read();
        let children: BTreeSet<String> = files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|child| !child.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(children.into_iter().collect())
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        self.files.write().insert(path.to_owned(), data.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), VfsError> {
        self.files
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| VfsError::NotFound(path.to_owned()))
    }
}
