//! Virtual file system and asset id table.
//!
//! Provides a unified, blocking API for reading and writing assets from
//! multiple storage backends through the [`VfsProvider`] trait and the
//! [`Vfs`] router, plus [`AssetDb`], which maps asset paths to the numeric
//! [`AssetId`]s that binary scene files store.
//!
//! # Providers
//!
//! - [`MemoryProvider`]: In-memory storage for tests and embedded assets
//! - [`FileSystemProvider`]: Native filesystem access
//!
//! Write operations are optional for providers and default to returning
//! [`VfsError::ReadOnly`].

mod asset;
mod error;
#[cfg(feature = "filesystem")]
mod filesystem;
mod memory;
pub mod path;
mod provider;
mod vfs;

pub use asset::{AssetDb, AssetId, AssetStore};
pub use error::VfsError;
#[cfg(feature = "filesystem")]
pub use filesystem::FileSystemProvider;
pub use memory::MemoryProvider;
pub use provider::VfsProvider;
pub use vfs::Vfs;
