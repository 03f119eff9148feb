//! # Worlds Scene
//!
//! Persistence for [`worlds_ecs::World`]: binary (WSCN, legacy ESCN), JSON
//! and MessagePack scene files, prefab instances stored as JSON Patch diffs
//! against their template, and the reconstruction pipeline that turns any of
//! them back into live entities.
//!
//! ## Core Types
//!
//! - [`ComponentRegistry`]: Read-only table of persisted components, built
//!   once at startup
//! - [`SceneSerializer`]: Load/save entry points, clipboard and prefab helpers
//! - [`EntityReconstructor`]: Three-phase document to world pipeline
//! - [`SceneDocument`]: Format-independent parsed scene
//! - [`PrefabCache`]: Per-batch template cache
//! - [`EntityIdRemapper`]: Stored to live entity ids for one load
//!
//! ## Example
//!
//! ```
//! use worlds_ecs::World;
//! use worlds_ecs::components::Transform;
//! use worlds_scene::{ComponentRegistry, NoManagedComponents, SceneFormat, SceneSerializer};
//! use worlds_vfs::{AssetDb, Vfs};
//!
//! let registry = ComponentRegistry::with_builtin();
//! let assets = AssetDb::new(Vfs::new());
//! let mut serializer = SceneSerializer::new(&registry, &assets, &NoManagedComponents);
//!
//! let mut world = World::new();
//! registry.register_storages(&mut world);
//! let e = world.spawn();
//! world.insert(e, Transform::from_xyz(1.0, 2.0, 3.0)).unwrap();
//!
//! let bytes = serializer.save_scene(&world, SceneFormat::Json).unwrap();
//! let mut loaded = World::new();
//! let report = serializer.load_scene(&mut loaded, &bytes, false).unwrap();
//! assert_eq!(report.entities.len(), 1);
//! ```

pub mod binary;
pub mod components;
mod config;
mod context;
mod document;
mod error;
mod format;
pub mod json;
mod loader;
mod managed;
pub mod msgpack;
pub mod patch;
mod prefab;
mod reconstruct;
mod registry;
mod remap;
mod snapshot;

pub use config::{MountConfig, SaveFormat, SceneConfig, SceneOptions};
pub use context::{LoadContext, SaveContext, NULL_ID};
pub use document::{
    erase, ComponentBag, ComponentPayload, DiffRecord, EntityRecord, ErasedComponent,
    SceneDocument, SceneSettings, SettingsJson,
};
pub use error::{
    FormatError, PatchConflictError, RegistryError, SceneError, SchemaError, TruncatedStreamError,
};
pub use format::{
    detect, detect_stream, BinaryFamily, SceneFormat, ESCN_MAGIC, MSGPACK_MAGIC, WSCN_MAGIC,
};
pub use loader::SceneSerializer;
pub use managed::{ManagedComponentHook, NoManagedComponents};
pub use prefab::{PrefabCache, PrefabDocument};
pub use reconstruct::{EntityReconstructor, LoadReport};
pub use registry::{
    ComponentDescriptor, ComponentKind, ComponentRegistry, ComponentRegistryBuilder,
    NativeCallbacks, SceneComponent,
};
pub use remap::{EntityIdRemapper, StoredEntityId};
pub use snapshot::{saved_entities, SceneWriter};
