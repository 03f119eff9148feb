//! Stored-to-live entity id mapping for one load operation.

use std::collections::HashMap;

use worlds_ecs::{Entity, World};

/// Entity id as written in a scene document.
///
/// Only meaningful inside the document that carries it. The sole way to turn
/// one into a live [`Entity`] is [`EntityIdRemapper::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredEntityId(pub u32);

impl std::fmt::Display for StoredEntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Builds the `StoredEntityId -> Entity` table for one load.
///
/// Phase 1 of reconstruction calls [`declare`](Self::declare) for every
/// entity in the document; only after that do reference-bearing components
/// call [`resolve`](Self::resolve).
pub struct EntityIdRemapper {
    map: HashMap<StoredEntityId, Entity>,
    /// Stored ids below this limit try to reclaim the slot with the same
    /// index. Zero disables restoring.
    restore_below: u32,
}

impl EntityIdRemapper {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            restore_below: 0,
        }
    }

    /// A remapper that re-creates entities with their stored index where
    /// the slot is free. Used by undo/redo to restore exact identities.
    ///
    /// Stored ids at or above `slot_limit` get a fresh entity instead, so a
    /// document cannot make the world grow past what it could populate.
    pub fn restoring_identity(slot_limit: u32) -> Self {
        Self {
            map: HashMap::new(),
            restore_below: slot_limit,
        }
    }

    /// The limit for restoring `entity_count` entities into `world`.
    pub fn slot_limit(world: &World, entity_count: usize) -> u32 {
        let count = u32::try_from(entity_count).unwrap_or(u32::MAX);
        world.slot_count().saturating_add(count)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Creates the live entity for `stored` and records the mapping.
    pub fn declare(&mut self, world: &mut World, stored: StoredEntityId) -> Entity {
        let entity = if stored.0 < self.restore_below {
            match world.spawn_at(stored.0) {
                Some(entity) => entity,
                None => {
                    log::debug!("remap: slot {} is taken, {stored} gets a fresh entity", stored.0);
                    world.spawn()
                }
            }
        } else if self.restore_below > 0 {
            log::debug!("remap: {stored} is past slot {}, not restored", self.restore_below);
            world.spawn()
        } else {
            world.spawn()
        };
        if let Some(previous) = self.map.insert(stored, entity) {
            log::warn!("remap: {stored} declared twice, {previous} is no longer reachable");
        }
        entity
    }

    /// Looks up the live entity for `stored`.
    pub fn resolve(&self, stored: StoredEntityId) -> Option<Entity> {
        self.map.get(&stored).copied()
    }

    /// Drops a mapping, e.g. after its entity was discarded mid-load.
    pub fn forget(&mut self, stored: StoredEntityId) -> Option<Entity> {
        self.map.remove(&stored)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StoredEntityId, Entity)> + '_ {
        self.map.iter().map(|(stored, live)| (*stored, *live))
    }
}

impl Default for EntityIdRemapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_resolve() {
        let mut world = World::new();
        let mut remap = EntityIdRemapper::new();
        let a = remap.declare(&mut world, StoredEntityId(40));
        let b = remap.declare(&mut world, StoredEntityId(7));

        assert_eq!(remap.resolve(StoredEntityId(40)), Some(a));
        assert_eq!(remap.resolve(StoredEntityId(7)), Some(b));
        assert_eq!(remap.resolve(StoredEntityId(8)), None);
        assert!(world.is_alive(a) && world.is_alive(b));
    }

    #[test]
    fn restoring_identity_reuses_slots() {
        let mut world = World::new();
        let occupied = world.spawn();
        let mut remap = EntityIdRemapper::restoring_identity(16);

        let free = remap.declare(&mut world, StoredEntityId(5));
        assert_eq!(free.index(), 5);

        let taken = remap.declare(&mut world, StoredEntityId(occupied.index()));
        assert_ne!(taken, occupied);
        assert!(world.is_alive(occupied));
    }

    #[test]
    fn restoring_identity_ignores_ids_past_the_limit() {
        let mut world = World::new();
        world.spawn();
        let limit = EntityIdRemapper::slot_limit(&world, 2);
        assert_eq!(limit, 3);
        let mut remap = EntityIdRemapper::restoring_identity(limit);

        let near = remap.declare(&mut world, StoredEntityId(2));
        let far = remap.declare(&mut world, StoredEntityId(40_000_000));
        assert_eq!(near.index(), 2);
        assert_eq!(far.index(), 1);
        assert_eq!(world.slot_count(), 3);
        assert_eq!(world.spawn().index(), 3);
    }

    #[test]
    fn clear_and_forget() {
        let mut world = World::new();
        let mut remap = EntityIdRemapper::new();
        remap.declare(&mut world, StoredEntityId(1));
        remap.declare(&mut world, StoredEntityId(2));

        assert!(remap.forget(StoredEntityId(1)).is_some());
        assert_eq!(remap.len(), 1);
        remap.clear();
        assert!(remap.is_empty());
    }
}
