use std::path::PathBuf;

use crate::error::VfsError;
use crate::provider::VfsProvider;

/// File system VFS provider for reading and writing assets on disk.
///
/// The root path is joined with the VFS path to form the actual filesystem
/// path. Path traversal is prevented by the VFS path normalization which
/// rejects `..` segments before they reach the provider.
pub struct FileSystemProvider {
    root: PathBuf,
}

impl FileSystemProvider {
    /// Create a provider rooted at the given directory.
    ///
    /// The directory does not need to exist yet; it is checked at
    /// read/write time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl VfsProvider for FileSystemProvider {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        Ok(std::fs::read(self.resolve(path))?)
    }

    fn exists(&self, path: &str) -> Result<bool, VfsError> {
        Ok(self.resolve(path).exists())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>, VfsError> {
        let full_path = self.resolve(path);
        if !full_path.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(full_path)? {
            if let Some(name) = entry?.file_name().to_str() {
                entries.push(name.to_owned());
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full_path, data)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), VfsError> {
        std::fs::remove_file(self.resolve(path))?;
        Ok(())
    }
}
