use thiserror::Error;

/// Errors that can occur during virtual file system operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The requested path was not found in the provider.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),
    /// The path is invalid (empty, contains `..`, or other normalization failure).
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// No provider is mounted at the given source name.
    #[error("no such source: {0}")]
    NoSuchSource(String),
    #[error("provider is read-only")]
    ReadOnly,
    /// An asset id that was never handed out by the asset table.
    #[error("unknown asset id {0}")]
    UnknownAsset(u32),
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            VfsError::NotFound(err.to_string())
        } else {
            VfsError::Io(err)
        }
    }
}
