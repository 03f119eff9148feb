//! Error types for scene loading and saving.
//!
//! Fatal errors ([`FormatError`], [`TruncatedStreamError`], binary
//! [`SchemaError`]s) abort a call before the world is touched. Per-entity
//! problems in JSON documents are logged and counted in the
//! [`LoadReport`](crate::LoadReport) instead of being returned.

use thiserror::Error;
use worlds_ecs::ComponentNotRegistered;
use worlds_vfs::VfsError;

use crate::format::BinaryFamily;
use crate::remap::StoredEntityId;

/// The input could not be classified or its version is not supported.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Leading bytes match no known scene format.
    #[error("unrecognized scene format (leading bytes {0:02x?})")]
    Unknown(Vec<u8>),
    #[error("{family} version {version} is not supported (supported: 1..={max})")]
    UnsupportedVersion {
        family: BinaryFamily,
        version: u8,
        max: u8,
    },
}

/// The stream ended before a complete value could be read.
#[derive(Debug, Error)]
#[error("stream truncated at byte {offset} while reading {reading}")]
pub struct TruncatedStreamError {
    pub offset: u64,
    pub reading: &'static str,
}

/// The document is well-formed but does not match the component schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("entity {stored} has no Transform")]
    MissingTransform { stored: StoredEntityId },
    #[error("unknown component id {id} on entity {stored} ({family} v{version})")]
    UnknownComponentId {
        id: u32,
        stored: StoredEntityId,
        family: BinaryFamily,
        version: u8,
    },
    #[error(
        "component '{component}' on entity {stored} first appeared in v{since}, stream declares v{version}"
    )]
    ComponentTooNew {
        component: &'static str,
        stored: StoredEntityId,
        since: u8,
        version: u8,
    },
    #[error("component bits {bits:#04x} on entity {stored} are not defined for ESCN v{version}")]
    UndefinedComponentBits {
        bits: u8,
        stored: StoredEntityId,
        version: u8,
    },
    #[error("entity {stored} appears twice")]
    DuplicateEntity { stored: StoredEntityId },
    #[error("component '{component}' requires '{requires}' on the same entity")]
    MissingDependency {
        component: &'static str,
        requires: &'static str,
    },
    #[error("invalid value for '{component}': {message}")]
    InvalidValue { component: String, message: String },
    #[error("malformed document: {0}")]
    Document(String),
}

impl SchemaError {
    pub fn invalid(component: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::InvalidValue {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// A JSON Patch operation could not be applied to its base document.
#[derive(Debug, Clone, Error)]
#[error("patch operation #{index} ({op} {path}) failed: {reason}")]
pub struct PatchConflictError {
    pub index: usize,
    pub op: &'static str,
    pub path: String,
    pub reason: String,
}

/// A component registry failed validation while being built.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("component '{0}' registered twice")]
    DuplicateName(String),
    #[error("serialized id {id} used by both '{first}' and '{second}'")]
    DuplicateSerializedId {
        id: u32,
        first: &'static str,
        second: &'static str,
    },
    #[error("'{component}' depends on unregistered component '{dependency}'")]
    UnknownDependency {
        component: &'static str,
        dependency: &'static str,
    },
    #[error(
        "'{component}' (sort key {sort_key}) must sort after its dependency '{dependency}' (sort key {dependency_sort_key})"
    )]
    DependencyOrder {
        component: &'static str,
        sort_key: i32,
        dependency: &'static str,
        dependency_sort_key: i32,
    },
    #[error("no native Transform component registered")]
    MissingTransform,
}

/// Top-level error for scene operations.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Truncated(#[from] TruncatedStreamError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    PatchConflict(#[from] PatchConflictError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("MessagePack encode error: {0}")]
    MessagePackEncode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    MessagePackDecode(#[from] rmp_serde::decode::Error),
    #[error("asset error: {0}")]
    Asset(#[from] VfsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    World(#[from] ComponentNotRegistered),
    #[error("config error: {0}")]
    Config(String),
}
