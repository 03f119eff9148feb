//! Bridge to components owned by a scripting runtime.

use serde_json::Value;
use worlds_ecs::{Entity, World};

use crate::context::LoadContext;
use crate::error::SceneError;

/// Name-keyed (de)serialization for components the native registry does
/// not know how to build.
///
/// Managed components are applied after every native component of the
/// load, and only ever travel through JSON and MessagePack documents.
pub trait ManagedComponentHook {
    /// Returns `(component name, value)` for each managed component on
    /// `entity`.
    fn serialize(&self, world: &World, entity: Entity) -> Vec<(String, Value)>;

    fn deserialize(
        &self,
        world: &mut World,
        entity: Entity,
        name: &str,
        value: &Value,
        ctx: &mut LoadContext,
    ) -> Result<(), SceneError>;
}

/// Hook for hosts without a scripting runtime. Managed data is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoManagedComponents;

impl ManagedComponentHook for NoManagedComponents {
    fn serialize(&self, _world: &World, _entity: Entity) -> Vec<(String, Value)> {
        Vec::new()
    }

    fn deserialize(
        &self,
        _world: &mut World,
        entity: Entity,
        name: &str,
        _value: &Value,
        ctx: &mut LoadContext,
    ) -> Result<(), SceneError> {
        log::warn!(
            "{}: no managed runtime, dropping component '{name}' on {entity}",
            ctx.format()
        );
        Ok(())
    }
}
