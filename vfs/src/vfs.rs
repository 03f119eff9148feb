use std::collections::HashMap;

use crate::error::VfsError;
use crate::path;
use crate::provider::VfsProvider;

/// Virtual file system that routes paths to mounted providers.
///
/// Paths are structured as `"source_name/rest/of/path"`. The first path
/// segment selects the provider. If no source name matches, the default
/// source (if set) is tried with the full path.
///
/// # Example
///
/// ```
/// use worlds_vfs::{MemoryProvider, Vfs};
///
/// let mem = MemoryProvider::new();
/// mem.insert("levels/intro.json", b"{}".to_vec());
///
/// let mut vfs = Vfs::new();
/// vfs.mount("game", mem);
/// vfs.set_default("game");
///
/// assert_eq!(vfs.read("game/levels/intro.json").unwrap(), b"{}");
/// assert_eq!(vfs.read("levels/intro.json").unwrap(), b"{}");
/// ```
#[derive(Default)]
pub struct Vfs {
    sources: HashMap<String, Box<dyn VfsProvider>>,
    default_source: Option<String>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a provider under the given source name, replacing any previous
    /// provider with that name.
    pub fn mount(&mut self, name: impl Into<String>, provider: impl VfsProvider) {
        let name = name.into();
        log::debug!("vfs: mounted source '{name}'");
        self.sources.insert(name, Box::new(provider));
    }

    /// Set the default source name used when a path does not match any mount.
    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_source = Some(name.into());
    }

    pub fn read(&self, raw_path: &str) -> Result<Vec<u8>, VfsError> {
        let (provider, resolved) = self.resolve(raw_path)?;
        provider.read(&resolved)
    }

    pub fn exists(&self, raw_path: &str) -> Result<bool, VfsError> {
        let (provider, resolved) = self.resolve(raw_path)?;
        provider.exists(&resolved)
    }

    pub fn list_dir(&self, raw_path: &str) -> Result<Vec<String>, VfsError> {
        let (provider, resolved) = self.resolve(raw_path)?;
        provider.list_dir(&resolved)
    }

    /// Write data to a file.
    ///
    /// Returns [`VfsError::ReadOnly`] if the resolved provider does not
    /// support writes.
    pub fn write(&self, raw_path: &str, data: &[u8]) -> Result<(), VfsError> {
        let (provider, resolved) = self.resolve(raw_path)?;
        if provider.is_read_only() {
            return Err(VfsError::ReadOnly);
        }
        provider.write(&resolved, data)
    }

    pub fn delete(&self, raw_path: &str) -> Result<(), VfsError> {
        let (provider, resolved) = self.resolve(raw_path)?;
        provider.delete(&resolved)
    }

    /// Resolve a raw path to a provider and the path within that provider.
    fn resolve(&self, raw_path: &str) -> Result<(&dyn VfsProvider, String), VfsError> {
        let normalized = path::normalize(raw_path)?;
        let (source, rest) = path::split_source(&normalized);

        if let Some(provider) = self.sources.get(source) {
            return Ok((provider.as_ref(), rest.to_owned()));
        }

        let fallback = self
            .default_source
            .as_ref()
            .and_then(|name| self.sources.get(name));
        match fallback {
            Some(provider) => Ok((provider.as_ref(), normalized)),
            None => Err(VfsError::NoSuchSource(source.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryProvider;

    #[test]
    fn mount_and_read() {
        let mem = MemoryProvider::new();
        mem.insert("hello.txt", b"world".to_vec());

        let mut vfs = Vfs::new();
        vfs.mount("data", mem);

        assert_eq!(vfs.read("data/hello.txt").unwrap(), b"world");
        assert_eq!(vfs.read("data//./hello.txt").unwrap(), b"world");
    }

    #[test]
    fn no_source_error() {
        let vfs = Vfs::new();
        assert!(matches!(
            vfs.read("unknown/file.txt"),
            Err(VfsError::NoSuchSource(_))
        ));
    }

    #[test]
    fn default_source_receives_full_path() {
        let mem = MemoryProvider::new();
        let mut vfs = Vfs::new();
        vfs.mount("data", mem.clone());
        vfs.set_default("data");

        vfs.write("Prefabs/lamp.json", b"{}").unwrap();
        assert!(mem.exists("Prefabs/lamp.json").unwrap());
        assert_eq!(vfs.list_dir("Prefabs").unwrap(), vec!["lamp.json"]);
        vfs.delete("Prefabs/lamp.json").unwrap();
        assert!(!vfs.exists("data/Prefabs/lamp.json").unwrap());
    }

    struct ReadOnlyProvider;

    impl VfsProvider for ReadOnlyProvider {
        fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
            Err(VfsError::NotFound(path.to_owned()))
        }
        fn exists(&self, _path: &str) -> Result<bool, VfsError> {
            Ok(false)
        }
        fn list_dir(&self, _path: &str) -> Result<Vec<String>, VfsError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn write_to_read_only_source_fails() {
        let mut vfs = Vfs::new();
        vfs.mount("builtin", ReadOnlyProvider);
        assert!(matches!(
            vfs.write("builtin/x.json", b"{}"),
            Err(VfsError::ReadOnly)
        ));
    }
}
