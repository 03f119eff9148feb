//! # Worlds ECS
//!
//! Minimal entity/component world consumed by the scene persistence layer.
//!
//! ## Core Types
//!
//! - [`Entity`]: Generational entity handle (`index` + `spawn_tick`)
//! - [`World`]: Container owning entities, components, and resources
//! - [`SparseSetInner`]: Per-type component storage
//! - [`Component`]: Stable component naming
//!
//! Entities can be re-created at a chosen slot with [`World::spawn_at`], which
//! lets undo/redo restore the exact index an entity had before.

mod component;
pub mod components;
mod entity;
mod resource;
mod sparse_set;
mod world;

pub use component::Component;
pub use entity::Entity;
pub use sparse_set::SparseSetInner;
pub use world::{ComponentNotRegistered, World};
