use std::any::{Any, TypeId};
use std::collections::HashMap;

/// World-wide singletons keyed by type, such as the active scene settings.
#[derive(Default)]
pub(crate) struct ResourceMap {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ResourceMap {
    /// Stores `value`, returning the one it replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        let previous = self.entries.insert(TypeId::of::<T>(), Box::new(value))?;
        previous.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        let value = self.entries.remove(&TypeId::of::<T>())?;
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.entries.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }
}
