//! Numeric asset ids on top of the [`Vfs`].
//!
//! Persisted binary scenes refer to assets (meshes, materials, prefabs) by a
//! numeric id while JSON scenes use paths. [`AssetStore`] is the bridge; the
//! scene layer never touches providers directly.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::VfsError;
use crate::path;
use crate::vfs::Vfs;

/// Numeric handle for an asset path, stable for the lifetime of the table
/// that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub u32);

impl AssetId {
    /// Marks "no asset". Written where an optional asset slot is empty.
    pub const INVALID: AssetId = AssetId(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "asset#{}", self.0)
        } else {
            write!(f, "asset#INVALID")
        }
    }
}

/// Asset collaborator consumed by scene codecs.
pub trait AssetStore: Send + Sync {
    /// Reads the whole asset.
    fn read(&self, id: AssetId) -> Result<Vec<u8>, VfsError>;

    /// Creates or overwrites the asset.
    fn write(&self, id: AssetId, data: &[u8]) -> Result<(), VfsError>;

    /// Returns the id for `path`, registering the path if it has none yet.
    fn path_to_id(&self, path: &str) -> Result<AssetId, VfsError>;

    /// Returns the path an id was issued for.
    fn id_to_path(&self, id: AssetId) -> Option<String>;
}

#[derive(Default)]
struct AssetTable {
    by_path: HashMap<String, AssetId>,
    paths: Vec<String>,
}

/// [`AssetStore`] backed by a [`Vfs`] and an in-memory id table.
///
/// Ids are handed out sequentially in registration order. The table is not
/// persisted, so ids are only meaningful within one process.
pub struct AssetDb {
    vfs: Vfs,
    table: RwLock<AssetTable>,
}

impl AssetDb {
    pub fn new(vfs: Vfs) -> Self {
        Self {
            vfs,
            table: RwLock::new(AssetTable::default()),
        }
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.table.read().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, id: AssetId) -> Result<String, VfsError> {
        self.id_to_path(id).ok_or(VfsError::UnknownAsset(id.0))
    }
}

impl AssetStore for AssetDb {
    fn read(&self, id: AssetId) -> Result<Vec<u8>, VfsError> {
        let path = self.resolve(id)?;
        self.vfs.read(&path)
    }

    fn write(&self, id: AssetId, data: &[u8]) -> Result<(), VfsError> {
        let path = self.resolve(id)?;
        self.vfs.write(&path, data)
    }

    fn path_to_id(&self, raw_path: &str) -> Result<AssetId, VfsError> {
        let normalized = path::normalize(raw_path)?;
        if let Some(id) = self.table.read().by_path.get(&normalized) {
            return Ok(*id);
        }

        let mut table = self.table.write();
        // Another caller may have registered it between the two locks
        if let Some(id) = table.by_path.get(&normalized) {
            return Ok(*id);
        }
        let id = AssetId(table.paths.len() as u32);
        log::debug!("assets: registered {normalized} as {id}");
        table.paths.push(normalized.clone());
        table.by_path.insert(normalized, id);
        Ok(id)
    }

    fn id_to_path(&self, id: AssetId) -> Option<String> {
        self.table.read().paths.get(id.0 as usize).cloned()
    }
}
