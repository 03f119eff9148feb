use crate::VfsError;

/// Trait for virtual file system backends.
///
/// All operations are blocking and complete before returning. Scene loads
/// run to completion on the calling thread, so callers that need to keep a
/// UI responsive move the whole load onto a worker instead.
///
/// # Read vs Write
///
/// All providers must implement read operations (`read`, `exists`, `list_dir`).
/// Write operations have default implementations that return
/// [`VfsError::ReadOnly`].
///
/// # Path Contract
///
/// Paths passed to provider methods are already normalized by the [`Vfs`](crate::Vfs)
/// router: forward slashes, no leading/trailing slashes, no `..` or `.` segments.
/// The path is relative to the provider's root (the source prefix has been stripped).
pub trait VfsProvider: Send + Sync + 'static {
    /// Read the entire contents of a file at the given path.
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError>;

    fn exists(&self, path: &str) -> Result<bool, VfsError>;

    /// List the immediate children of a directory.
    ///
    /// Returns sorted file and directory names (not full paths), or an empty
    /// vec for non-existent directories.
    fn list_dir(&self, path: &str) -> Result<Vec<String>, VfsError>;

    fn is_read_only(&self) -> bool {
        true
    }

    /// Write data to a file, creating or overwriting it.
    fn write(&self, _path: &str, _data: &[u8]) -> Result<(), VfsError> {
        Err(VfsError::ReadOnly)
    }

    fn delete(&self, _path: &str) -> Result<(), VfsError> {
        Err(VfsError::ReadOnly)
    }
}
