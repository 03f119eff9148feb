use std::hash::{Hash, Hasher};

/// A live entity handle: slot index plus the tick at which the slot was
/// claimed.
///
/// Two handles are equal only if both the index and the spawn tick match,
/// so a handle to a despawned entity never aliases whatever reuses its slot.
#[derive(Clone, Copy)]
pub struct Entity {
    id: u32,
    spawn_tick: u64,
}

impl Entity {
    /// Null handle. Never alive in any world.
    ///
    /// Entity-reference fields that could not be resolved are set to this.
    pub const INVALID: Entity = Entity {
        id: u32::MAX,
        spawn_tick: u64::MAX,
    };

    pub(crate) fn new(index: u32, spawn_tick: u64) -> Self {
        Self {
            id: index,
            spawn_tick,
        }
    }

    /// Returns the slot index of this entity.
    pub fn index(&self) -> u32 {
        self.id
    }

    /// Returns the spawn tick of this entity.
    pub fn spawn_tick(&self) -> u64 {
        self.spawn_tick
    }

    /// Returns `false` for [`Entity::INVALID`].
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.spawn_tick == other.spawn_tick
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.spawn_tick.hash(state);
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "Entity({}@{})", self.index(), self.spawn_tick())
        } else {
            write!(f, "Entity(INVALID)")
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Allocates and recycles entity slots with spawn-tick tracking.
///
/// When an entity is despawned, its slot is added to a free list.
/// The next spawn reuses the slot with the current world tick as the
/// new spawn_tick, invalidating any old Entity handles.
pub(crate) struct EntityAllocator {
    /// Spawn tick for each slot. Index = entity index.
    spawn_ticks: Vec<u64>,
    alive: Vec<bool>,
    /// Free list of recyclable indices (LIFO stack).
    free_list: Vec<u32>,
    count: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            spawn_ticks: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            count: 0,
        }
    }

    /// Allocates a new entity, reusing a recycled slot if available.
    pub fn allocate(&mut self, tick: u64) -> Entity {
        self.count += 1;

        if let Some(index) = self.free_list.pop() {
            let idx = index as usize;
            // Never below the tick bumped on despawn, or stale handles alias
            let spawn_tick = tick.max(self.spawn_ticks[idx]);
            self.alive[idx] = true;
            self.spawn_ticks[idx] = spawn_tick;
            Entity::new(index, spawn_tick)
        } else {
            let index = self.spawn_ticks.len() as u32;
            self.spawn_ticks.push(tick);
            self.alive.push(true);
            Entity::new(index, tick)
        }
    }

    /// Claims a specific slot. Used to re-create an entity with the exact
    /// index it had before it was despawned (undo/redo).
    ///
    /// Returns `None` if the slot is currently alive or is the reserved
    /// invalid index.
    pub fn allocate_at(&mut self, index: u32, tick: u64) -> Option<Entity> {
        if index == u32::MAX {
            return None;
        }
        let idx = index as usize;

        if idx >= self.alive.len() {
            // Slots skipped over become free
            for skipped in self.alive.len()..idx {
                self.free_list.push(skipped as u32);
            }
            self.spawn_ticks.resize(idx + 1, 0);
            self.alive.resize(idx + 1, false);
        } else if self.alive[idx] {
            return None;
        } else {
            self.free_list.retain(|&free| free != index);
        }

        let spawn_tick = tick.max(self.spawn_ticks[idx]);
        self.alive[idx] = true;
        self.spawn_ticks[idx] = spawn_tick;
        self.count += 1;
        Some(Entity::new(index, spawn_tick))
    }

    /// Deallocates an entity. Returns false if already dead or spawn_tick mismatch.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let idx = entity.index() as usize;
        self.alive[idx] = false;
        // Bump the tick so stale handles never match a reuse in the same tick
        self.spawn_ticks[idx] = self.spawn_ticks[idx].wrapping_add(1);
        self.free_list.push(entity.index());
        self.count -= 1;
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.alive.len() && self.alive[idx] && self.spawn_ticks[idx] == entity.spawn_tick()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the alive entity at the given index, if any.
    pub fn entity_at_index(&self, index: u32) -> Option<Entity> {
        let idx = index as usize;
        if idx < self.alive.len() && self.alive[idx] {
            Some(Entity::new(index, self.spawn_ticks[idx]))
        } else {
            None
        }
    }

    /// Number of slots ever handed out, alive or free.
    pub fn slot_count(&self) -> u32 {
        self.alive.len() as u32
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
