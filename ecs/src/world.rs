use std::any::TypeId;
use std::collections::HashMap;

use crate::entity::{Entity, EntityAllocator};
use crate::resource::ResourceMap;
use crate::sparse_set::{ComponentStorage, SparseSetInner};

/// Error returned when a component type has not been registered in the [`World`].
///
/// This happens when calling [`World::insert`] or [`World::storage`] on a
/// type that was never passed to [`World::register_component`].
#[derive(Debug)]
pub struct ComponentNotRegistered {
    /// The name of the unregistered component type.
    pub type_name: &'static str,
}

impl std::fmt::Display for ComponentNotRegistered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Component type `{}` has never been registered. Call register_component() first.",
            self.type_name
        )
    }
}

impl std::error::Error for ComponentNotRegistered {}

/// An independent ECS world containing entities, components, and resources.
///
/// # Example
///
/// ```
/// use worlds_ecs::World;
///
/// struct Position { x: f32, y: f32 }
///
/// let mut world = World::new();
/// world.register_component::<Position>();
///
/// let entity = world.spawn();
/// world.insert(entity, Position { x: 0.0, y: 1.0 }).unwrap();
/// assert_eq!(world.get::<Position>(entity).map(|p| p.y), Some(1.0));
/// ```
pub struct World {
    entities: EntityAllocator,
    components: HashMap<TypeId, ComponentStorage>,
    resources: ResourceMap,
    /// Monotonic tick stamped into spawned entities.
    tick: u64,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            components: HashMap::new(),
            resources: ResourceMap::default(),
            tick: 0,
        }
    }

    // ---- Entity management ----

    /// Spawns a new entity and returns its handle.
    pub fn spawn(&mut self) -> Entity {
        self.entities.allocate(self.tick)
    }

    /// Spawns an entity in a specific slot.
    ///
    /// Returns `None` if that slot is occupied by a live entity. Used when a
    /// previously despawned entity must come back with the same index.
    pub fn spawn_at(&mut self, index: u32) -> Option<Entity> {
        let entity = self.entities.allocate_at(index, self.tick);
        if entity.is_none() {
            log::trace!("world: slot {index} is occupied");
        }
        entity
    }

    /// Despawns an entity, removing all its components.
    ///
    /// Returns `false` if the entity was already dead.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.deallocate(entity) {
            return false;
        }

        let index = entity.index();
        for storage in self.components.values_mut() {
            storage.remove_untyped(index);
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> u32 {
        self.entities.count()
    }

    /// Highest slot index handed out so far, plus one. Free slots count.
    pub fn slot_count(&self) -> u32 {
        self.entities.slot_count()
    }

    /// Returns the live entity occupying `index`, if any.
    pub fn entity_at_index(&self, index: u32) -> Option<Entity> {
        self.entities.entity_at_index(index)
    }

    // ---- Component management ----

    /// Registers a component type without inserting any data.
    pub fn register_component<T: Send + Sync + 'static>(&mut self) {
        self.components
            .entry(TypeId::of::<T>())
            .or_insert_with(ComponentStorage::new::<T>);
    }

    pub fn is_component_registered<T: 'static>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Inserts a component on an entity, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentNotRegistered`] if `T` has never been registered
    /// via [`register_component`](World::register_component).
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive.
    pub fn insert<T: Send + Sync + 'static>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), ComponentNotRegistered> {
        assert!(
            self.entities.is_alive(entity),
            "Cannot insert component on dead entity {entity}"
        );

        let storage =
            self.components
                .get_mut(&TypeId::of::<T>())
                .ok_or(ComponentNotRegistered {
                    type_name: std::any::type_name::<T>(),
                })?;

        storage.typed_mut::<T>().insert(entity.index(), component);
        Ok(())
    }

    /// Removes a component from an entity.
    ///
    /// Returns the removed value, or `None` if the entity did not have it.
    pub fn remove<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let storage = self.components.get_mut(&TypeId::of::<T>())?;
        storage.typed_mut::<T>().remove(entity.index())
    }

    /// Returns a reference to a component on an entity.
    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let storage = self.components.get(&TypeId::of::<T>())?;
        storage.typed::<T>().get(entity.index())
    }

    /// Returns a mutable reference to a component on an entity.
    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let storage = self.components.get_mut(&TypeId::of::<T>())?;
        storage.typed_mut::<T>().get_mut(entity.index())
    }

    /// Returns whether `entity` is alive and has a `T`.
    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
            && self
                .components
                .get(&TypeId::of::<T>())
                .is_some_and(|storage| storage.contains_untyped(entity.index()))
    }

    /// Shared access to the whole storage of `T`.
    pub fn storage<T: 'static>(&self) -> Result<&SparseSetInner<T>, ComponentNotRegistered> {
        self.components
            .get(&TypeId::of::<T>())
            .map(|storage| storage.typed::<T>())
            .ok_or(ComponentNotRegistered {
                type_name: std::any::type_name::<T>(),
            })
    }

    /// Iterates over the live entities that have a `T`.
    pub fn entities_with<T: 'static>(&self) -> impl Iterator<Item = Entity> + '_ {
        self.components
            .get(&TypeId::of::<T>())
            .map(|storage| storage.typed::<T>().entities())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&index| self.entities.entity_at_index(index))
    }

    /// Short type names of the components stored on `entity`, sorted.
    pub fn component_type_names(&self, entity: Entity) -> Vec<&'static str> {
        if !self.entities.is_alive(entity) {
            return Vec::new();
        }
        let mut names: Vec<_> = self
            .components
            .values()
            .filter(|storage| storage.contains_untyped(entity.index()))
            .map(|storage| storage.short_name())
            .collect();
        names.sort_unstable();
        names
    }

    // ---- Resources ----

    /// Inserts a singleton resource, returning the value it replaced.
    pub fn insert_resource<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    pub fn remove_resource<T: 'static>(&mut self) -> Option<T> {
        self.resources.remove::<T>()
    }

    pub fn has_resource<T: 'static>(&self) -> bool {
        self.resources.contains::<T>()
    }

    pub fn resource<T: 'static>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn resource_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources.get_mut::<T>()
    }

    // ---- Ticks ----

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Advances the world tick. Entities spawned afterwards carry the new tick.
    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn insert_requires_registration() {
        let mut world = World::new();
        let e = world.spawn();
        let err = world.insert(e, Health(1)).unwrap_err();
        assert!(err.type_name.ends_with("Health"));

        world.register_component::<Health>();
        world.insert(e, Health(1)).unwrap();
        assert_eq!(world.get::<Health>(e), Some(&Health(1)));
    }

    #[test]
    fn despawn_removes_components() {
        let mut world = World::new();
        world.register_component::<Health>();
        let e = world.spawn();
        world.insert(e, Health(3)).unwrap();

        assert!(world.despawn(e));
        assert!(!world.despawn(e));
        assert!(!world.has::<Health>(e));
        assert_eq!(world.storage::<Health>().unwrap().len(), 0);
    }

    #[test]
    fn stale_handle_sees_nothing() {
        let mut world = World::new();
        world.register_component::<Health>();
        let old = world.spawn();
        world.despawn(old);
        let new = world.spawn();
        world.insert(new, Health(9)).unwrap();

        assert_eq!(new.index(), old.index());
        assert!(world.get::<Health>(old).is_none());
    }

    #[test]
    fn spawn_at_restores_index() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.despawn(a);

        let restored = world.spawn_at(a.index()).unwrap();
        assert_eq!(restored.index(), a.index());
        assert!(world.spawn_at(b.index()).is_none());
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn entities_with_filters_by_component() {
        let mut world = World::new();
        world.register_component::<Health>();
        let a = world.spawn();
        let _b = world.spawn();
        let c = world.spawn();
        world.insert(a, Health(1)).unwrap();
        world.insert(c, Health(2)).unwrap();

        let mut with: Vec<_> = world.entities_with::<Health>().collect();
        with.sort_by_key(|e| e.index());
        assert_eq!(with, vec![a, c]);
    }

    #[test]
    fn resources_roundtrip() {
        let mut world = World::new();
        world.insert_resource(Health(5));
        assert!(world.has_resource::<Health>());
        world.resource_mut::<Health>().unwrap().0 = 6;
        assert_eq!(world.resource::<Health>(), Some(&Health(6)));
        assert_eq!(world.remove_resource::<Health>(), Some(Health(6)));
    }
}
