use std::any::Any;

/// Typed sparse set storing components of type T.
///
/// Uses a sparse array (entity index → dense index) and a dense array
/// (contiguous component data + entity mapping) for O(1) insert/remove/get
/// and cache-friendly iteration.
pub struct SparseSetInner<T: 'static> {
    /// `entity_index -> dense_index`. `None` means the entity does not have
    /// this component.
    sparse: Vec<Option<u32>>,
    dense: Vec<T>,
    /// Entity indices corresponding to each dense element.
    entities: Vec<u32>,
}

impl<T: 'static> SparseSetInner<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Inserts a component for the given entity index.
    /// If the entity already has this component, the value is replaced.
    pub fn insert(&mut self, entity_index: u32, value: T) {
        let idx = entity_index as usize;

        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }

        if let Some(dense_idx) = self.sparse[idx] {
            self.dense[dense_idx as usize] = value;
        } else {
            let dense_idx = self.dense.len() as u32;
            self.sparse[idx] = Some(dense_idx);
            self.dense.push(value);
            self.entities.push(entity_index);
        }
    }

    /// Removes a component for the given entity index.
    /// Returns the removed value, or `None` if the entity did not have this component.
    pub fn remove(&mut self, entity_index: u32) -> Option<T> {
        let idx = entity_index as usize;
        if idx >= self.sparse.len() {
            return None;
        }

        let dense_idx = self.sparse[idx]? as usize;
        self.sparse[idx] = None;

        let last_dense = self.dense.len() - 1;
        if dense_idx != last_dense {
            // Swap-remove: move last element into the removed slot
            let swapped_entity = self.entities[last_dense];
            self.sparse[swapped_entity as usize] = Some(dense_idx as u32);
            self.entities[dense_idx] = swapped_entity;
        }

        self.entities.pop();
        Some(self.dense.swap_remove(dense_idx))
    }

    pub fn get(&self, entity_index: u32) -> Option<&T> {
        let dense_idx = (*self.sparse.get(entity_index as usize)?)? as usize;
        Some(&self.dense[dense_idx])
    }

    pub fn get_mut(&mut self, entity_index: u32) -> Option<&mut T> {
        let dense_idx = (*self.sparse.get(entity_index as usize)?)? as usize;
        Some(&mut self.dense[dense_idx])
    }

    pub fn contains(&self, entity_index: u32) -> bool {
        matches!(self.sparse.get(entity_index as usize), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Iterates over `(entity_index, &component)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// Returns a slice of entity indices in dense order.
    pub fn entities(&self) -> &[u32] {
        &self.entities
    }
}

impl<T: 'static> Default for SparseSetInner<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe view of a [`SparseSetInner`] for callers that only know
/// the entity: despawn cleanup and per-entity component listings.
trait ErasedSet: Send + Sync {
    fn remove_index(&mut self, entity_index: u32) -> bool;
    fn contains_index(&self, entity_index: u32) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + Sync + 'static> ErasedSet for SparseSetInner<T> {
    fn remove_index(&mut self, entity_index: u32) -> bool {
        self.remove(entity_index).is_some()
    }

    fn contains_index(&self, entity_index: u32) -> bool {
        self.contains(entity_index)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Storage for one component type, keyed by its `TypeId` in
/// [`World`](crate::World).
pub(crate) struct ComponentStorage {
    set: Box<dyn ErasedSet>,
    type_name: &'static str,
}

impl ComponentStorage {
    pub fn new<T: Send + Sync + 'static>() -> Self {
        Self {
            set: Box::new(SparseSetInner::<T>::new()),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The typed set. `T` must be the type this storage was created for;
    /// the world only ever looks storages up by `TypeId::of::<T>()`.
    pub fn typed<T: 'static>(&self) -> &SparseSetInner<T> {
        match self.set.as_any().downcast_ref::<SparseSetInner<T>>() {
            Some(set) => set,
            None => panic!("storage of {} read as {}", self.type_name, std::any::type_name::<T>()),
        }
    }

    pub fn typed_mut<T: 'static>(&mut self) -> &mut SparseSetInner<T> {
        let type_name = self.type_name;
        match self.set.as_any_mut().downcast_mut::<SparseSetInner<T>>() {
            Some(set) => set,
            None => panic!("storage of {type_name} written as {}", std::any::type_name::<T>()),
        }
    }

    /// Short type name without the module path, as shown in logs.
    pub fn short_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }

    pub fn remove_untyped(&mut self, entity_index: u32) -> bool {
        self.set.remove_index(entity_index)
    }

    pub fn contains_untyped(&self, entity_index: u32) -> bool {
        self.set.contains_index(entity_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_replace() {
        let mut set = SparseSetInner::new();
        set.insert(5, "a");
        assert_eq!(set.get(5), Some(&"a"));
        set.insert(5, "b");
        assert_eq!(set.get(5), Some(&"b"));
        assert_eq!(set.len(), 1);
        assert!(set.get(4).is_none());
        assert!(set.get(500).is_none());
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut set = SparseSetInner::new();
        set.insert(0, 10);
        set.insert(1, 11);
        set.insert(2, 12);

        assert_eq!(set.remove(0), Some(10));
        assert_eq!(set.get(2), Some(&12));
        assert_eq!(set.get(1), Some(&11));
        assert_eq!(set.entities(), &[2, 1]);
        assert_eq!(set.remove(0), None);
    }

    #[test]
    fn storage_type_erased_ops() {
        let mut storage = ComponentStorage::new::<u64>();
        storage.typed_mut::<u64>().insert(3, 99);
        assert!(storage.contains_untyped(3));
        assert!(storage.remove_untyped(3));
        assert!(!storage.contains_untyped(3));
        assert!(!storage.remove_untyped(3));
        assert_eq!(storage.short_name(), "u64");
    }

    #[test]
    fn short_name_drops_module_path() {
        let storage = ComponentStorage::new::<crate::components::Transform>();
        assert_eq!(storage.short_name(), "Transform");
        assert!(storage.type_name.ends_with("::Transform"));
    }
}
