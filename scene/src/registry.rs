//! Component metadata consumed by every codec.
//!
//! The registry is built once at startup and passed by reference; nothing
//! mutates it during a load or save. Each native entry carries type-erased
//! callbacks generated from a [`SceneComponent`] implementation, in the same
//! way a sparse-set storage erases its removal function.

use std::collections::HashMap;

use serde_json::Value;
use worlds_ecs::{Component, Entity, World};

use crate::binary::io::{BinaryReader, BinaryWriter};
use crate::context::{LoadContext, SaveContext};
use crate::document::{erase, ErasedComponent};
use crate::error::{RegistryError, SceneError};

/// A component that can be persisted.
///
/// `SERIALIZED_ID` is written into binary streams and must never change or
/// be reused once files carrying it have shipped.
pub trait SceneComponent: Component + Sized {
    const SERIALIZED_ID: u32;
    /// Deserialization order across all entities. Lower runs first.
    const SORT_KEY: i32 = 0;
    /// First WSCN version whose streams may contain this component.
    const SINCE_VERSION: u8 = 1;
    /// Components that must already be on the entity when this one loads.
    const DEPENDS_ON: &'static [&'static str] = &[];

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError>;

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError>;

    /// Writes the payload at the current WSCN version.
    fn write_binary(&self, out: &mut BinaryWriter, ctx: &mut SaveContext);

    /// Reads a payload written at `version`, touching only the fields that
    /// version defined.
    fn read_binary(
        input: &mut BinaryReader,
        version: u8,
        ctx: &mut LoadContext,
    ) -> Result<Self, SceneError>;
}

// ---------------------------------------------------------------------------
// Type-erased callbacks
// ---------------------------------------------------------------------------

type RegisterFn = fn(&mut World);
type HasFn = fn(&World, Entity) -> bool;
type RemoveFn = fn(&mut World, Entity) -> bool;
type ToJsonFn = fn(&World, Entity, &mut SaveContext) -> Option<Result<Value, SceneError>>;
type FromJsonFn = fn(&Value, &mut LoadContext) -> Result<Box<dyn ErasedComponent>, SceneError>;
type WriteBinaryFn = fn(&World, Entity, &mut BinaryWriter, &mut SaveContext) -> bool;
type ReadBinaryFn =
    fn(&mut BinaryReader, u8, &mut LoadContext) -> Result<Box<dyn ErasedComponent>, SceneError>;
type CanonicalFn = fn(&Value, &mut LoadContext, &mut SaveContext) -> Result<Value, SceneError>;

/// Callbacks of a native component, monomorphized from its
/// [`SceneComponent`] impl.
#[derive(Clone, Copy)]
pub struct NativeCallbacks {
    pub register: RegisterFn,
    pub has: HasFn,
    pub remove: RemoveFn,
    /// `None` when the entity lacks the component.
    pub to_json: ToJsonFn,
    pub from_json: FromJsonFn,
    /// Returns `false` (writing nothing) when the entity lacks the component.
    pub write_binary: WriteBinaryFn,
    pub read_binary: ReadBinaryFn,
    /// Decodes and re-encodes a JSON value, filling defaults.
    pub canonical_json: CanonicalFn,
}

impl NativeCallbacks {
    fn of<T: SceneComponent>() -> Self {
        Self {
            register: |world| world.register_component::<T>(),
            has: |world, entity| world.has::<T>(entity),
            remove: |world, entity| world.remove::<T>(entity).is_some(),
            to_json: |world, entity, ctx| world.get::<T>(entity).map(|c| c.to_json(ctx)),
            from_json: |value, ctx| Ok(erase(T::from_json(value, ctx)?)),
            write_binary: |world, entity, out, ctx| match world.get::<T>(entity) {
                Some(component) => {
                    component.write_binary(out, ctx);
                    true
                }
                None => false,
            },
            read_binary: |input, version, ctx| Ok(erase(T::read_binary(input, version, ctx)?)),
            canonical_json: |value, load, save| T::from_json(value, load)?.to_json(save),
        }
    }
}

/// Native components are (de)serialized in Rust; managed ones belong to a
/// scripting runtime and go through a
/// [`ManagedComponentHook`](crate::ManagedComponentHook).
#[derive(Clone, Copy)]
pub enum ComponentKind {
    Native(NativeCallbacks),
    Managed,
}

#[derive(Clone)]
pub struct ComponentDescriptor {
    pub name: &'static str,
    /// `None` for managed components, which never appear in binary streams.
    pub serialized_id: Option<u32>,
    pub sort_key: i32,
    pub since_version: u8,
    pub depends_on: &'static [&'static str],
    pub kind: ComponentKind,
}

impl ComponentDescriptor {
    pub fn native<T: SceneComponent>() -> Self {
        Self {
            name: T::NAME,
            serialized_id: Some(T::SERIALIZED_ID),
            sort_key: T::SORT_KEY,
            since_version: T::SINCE_VERSION,
            depends_on: T::DEPENDS_ON,
            kind: ComponentKind::Native(NativeCallbacks::of::<T>()),
        }
    }

    pub fn managed(name: &'static str, sort_key: i32) -> Self {
        Self {
            name,
            serialized_id: None,
            sort_key,
            since_version: 1,
            depends_on: &[],
            kind: ComponentKind::Managed,
        }
    }

    pub fn native_callbacks(&self) -> Option<&NativeCallbacks> {
        match &self.kind {
            ComponentKind::Native(callbacks) => Some(callbacks),
            ComponentKind::Managed => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, ComponentKind::Native(_))
    }
}

impl std::fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("serialized_id", &self.serialized_id)
            .field("sort_key", &self.sort_key)
            .field("native", &self.is_native())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Read-only table of component descriptors, ordered by sort key.
pub struct ComponentRegistry {
    descriptors: Vec<ComponentDescriptor>,
    by_name: HashMap<&'static str, usize>,
    by_id: HashMap<u32, usize>,
}

impl ComponentRegistry {
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// Registry holding the built-in component set.
    pub fn with_builtin() -> Self {
        match crate::components::register_builtin(Self::builder()).build() {
            Ok(registry) => registry,
            // The built-in set is fixed; failing here is a programming error
            Err(err) => panic!("built-in component set is inconsistent: {err}"),
        }
    }

    /// Descriptors in ascending sort key, ties broken by name.
    pub fn sorted(&self) -> &[ComponentDescriptor] {
        &self.descriptors
    }

    pub fn by_name(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    pub fn by_serialized_id(&self, id: u32) -> Option<&ComponentDescriptor> {
        self.by_id.get(&id).map(|&i| &self.descriptors[i])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Position of `name` in [`sorted`](Self::sorted).
    pub fn order_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Registers storage for every native component and the scene markers
    /// in `world`.
    pub fn register_storages(&self, world: &mut World) {
        for callbacks in self.descriptors.iter().filter_map(|d| d.native_callbacks()) {
            (callbacks.register)(world);
        }
        crate::components::register_markers(world);
    }

    pub fn native(&self) -> impl Iterator<Item = (&ComponentDescriptor, &NativeCallbacks)> {
        self.descriptors
            .iter()
            .filter_map(|d| d.native_callbacks().map(|c| (d, c)))
    }
}

/// Collects descriptors and validates them on [`build`](Self::build).
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    descriptors: Vec<ComponentDescriptor>,
}

impl ComponentRegistryBuilder {
    pub fn register<T: SceneComponent>(self) -> Self {
        self.descriptor(ComponentDescriptor::native::<T>())
    }

    pub fn register_managed(self, name: &'static str, sort_key: i32) -> Self {
        self.descriptor(ComponentDescriptor::managed(name, sort_key))
    }

    pub fn descriptor(mut self, descriptor: ComponentDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn build(mut self) -> Result<ComponentRegistry, RegistryError> {
        self.descriptors
            .sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.name.cmp(b.name)));

        let mut by_name = HashMap::new();
        let mut by_id: HashMap<u32, usize> = HashMap::new();
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            if by_name.insert(descriptor.name, index).is_some() {
                return Err(RegistryError::DuplicateName(descriptor.name.to_owned()));
            }
            if let Some(id) = descriptor.serialized_id {
                if let Some(&first) = by_id.get(&id) {
                    return Err(RegistryError::DuplicateSerializedId {
                        id,
                        first: self.descriptors[first].name,
                        second: descriptor.name,
                    });
                }
                by_id.insert(id, index);
            }
        }

        for descriptor in &self.descriptors {
            for &dependency in descriptor.depends_on {
                let Some(&dep_index) = by_name.get(dependency) else {
                    return Err(RegistryError::UnknownDependency {
                        component: descriptor.name,
                        dependency,
                    });
                };
                let dep = &self.descriptors[dep_index];
                if dep.sort_key >= descriptor.sort_key {
                    return Err(RegistryError::DependencyOrder {
                        component: descriptor.name,
                        sort_key: descriptor.sort_key,
                        dependency: dep.name,
                        dependency_sort_key: dep.sort_key,
                    });
                }
            }
        }

        // Reconstruction applies Transform natively before anything else
        let transform = by_name
            .get(worlds_ecs::components::Transform::NAME)
            .map(|&i| &self.descriptors[i]);
        if !transform.is_some_and(ComponentDescriptor::is_native) {
            return Err(RegistryError::MissingTransform);
        }

        Ok(ComponentRegistry {
            descriptors: self.descriptors,
            by_name,
            by_id,
        })
    }
}
