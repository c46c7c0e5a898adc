use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type Slot = Arc<dyn Any + Send + Sync>;

/// Typed side table of cached metadata attached to an entity.
///
/// One value per metadata type. Values are computed lazily through
/// [`Extensions::get_or_insert_with`] and dropped whenever the owning entity
/// or one of its dependencies changes.
#[derive(Default)]
pub struct Extensions {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|slot| slot.downcast::<T>().ok())
    }

    pub fn insert<T: Any + Send + Sync>(&self, value: Arc<T>) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.insert(TypeId::of::<T>(), value);
    }

    /// Return the cached value, computing and storing it on a miss.
    ///
    /// Nothing is stored when `compute` yields `None`.
    pub fn get_or_insert_with<T, F>(&self, compute: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Option<Arc<T>>,
    {
        if let Some(cached) = self.get::<T>() {
            return Some(cached);
        }
        let value = compute()?;
        self.insert(Arc::clone(&value));
        Some(value)
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn clear(&self) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for Extensions {
    fn clone(&self) -> Self {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Self {
            slots: RwLock::new(slots.clone()),
        }
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Size(usize);

    #[test]
    fn computes_once_and_caches() {
        let ext = Extensions::new();
        let mut calls = 0;
        let first = ext.get_or_insert_with(|| {
            calls += 1;
            Some(Arc::new(Size(4)))
        });
        let second = ext.get_or_insert_with::<Size, _>(|| unreachable!("cached"));

        assert_eq!(calls, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn failed_compute_stores_nothing() {
        let ext = Extensions::new();
        assert!(ext.get_or_insert_with::<Size, _>(|| None).is_none());
        assert!(ext.is_empty());
    }

    #[test]
    fn clone_is_independent() {
        let ext = Extensions::new();
        ext.insert(Arc::new(Size(1)));
        let copy = ext.clone();
        ext.clear();

        assert!(ext.get::<Size>().is_none());
        assert_eq!(copy.get::<Size>().as_deref(), Some(&Size(1)));
    }
}
