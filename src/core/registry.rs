//! Type-indexed store of shared collaborators.
//!
//! One registry is owned by each [`ServiceContext`](crate::core::ServiceContext);
//! there is no process-wide instance. Components receive the context and look
//! up the collaborators they need by type.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::SchedulerError;

type Model = Arc<dyn Any + Send + Sync>;

/// Map from a concrete type to its single shared instance.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<TypeId, Model>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `model` as the instance of `T`, returning the one it replaced.
    pub fn insert<T>(&self, model: Arc<T>) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.models
            .write()
            .insert(TypeId::of::<T>(), model)
            .and_then(|old| old.downcast::<T>().ok())
    }

    /// Instance registered for `T`, if any.
    #[must_use]
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let model = self.models.read().get(&TypeId::of::<T>()).cloned()?;
        model.downcast::<T>().ok()
    }

    /// Instance registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] naming `T` when nothing is registered.
    pub fn require<T>(&self) -> Result<Arc<T>, SchedulerError>
    where
        T: Any + Send + Sync,
    {
        self.get::<T>().ok_or_else(|| {
            SchedulerError::Backend(format!("no model registered for {}", type_name::<T>()))
        })
    }

    /// Unregister `T` and return its instance.
    pub fn remove<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.models
            .write()
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok())
    }

    /// Whether `T` has an instance.
    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.models.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Greeter(&'static str);

    #[test]
    fn test_insert_get_replace() {
        let registry = ModelRegistry::new();
        assert!(registry.get::<Greeter>().is_none());

        assert!(registry.insert(Arc::new(Greeter("hi"))).is_none());
        assert_eq!(registry.get::<Greeter>().map(|g| g.0), Some("hi"));

        let old = registry.insert(Arc::new(Greeter("hello")));
        assert_eq!(old.map(|g| g.0), Some("hi"));
        assert_eq!(registry.require::<Greeter>().unwrap().0, "hello");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_require_missing_names_type() {
        let registry = ModelRegistry::new();
        let err = registry.require::<Greeter>().unwrap_err();
        assert!(err.to_string().contains("Greeter"));
    }

    #[test]
    fn test_remove() {
        let registry = ModelRegistry::new();
        registry.insert(Arc::new(5_u32));
        assert!(registry.contains::<u32>());
        assert_eq!(registry.remove::<u32>().as_deref(), Some(&5));
        assert!(registry.is_empty());
    }
}
