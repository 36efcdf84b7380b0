//! Bus - Request-scoped Injection
//!
//! One Bus is created per request. Middleware writes the values it owns
//! (the request `Context`, a loaded user, ...) and downstream handlers pull
//! them back out by type.
//!
//! The Bus does NOT use string keys.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use crate::module::ModuleError;

/// Type-keyed value container (TypeMap pattern).
#[derive(Default)]
pub struct Bus {
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Bus {
    pub fn new() -> Self {
        Bus {
            resources: HashMap::new(),
        }
    }

    /// Insert a value into the Bus.
    ///
    /// A value of the same type already present is replaced and returned.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.resources
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Like [`Bus::get_mut`], but a missing value becomes a module error
    /// naming the type, so handlers can use `?`.
    pub fn require_mut<T: 'static>(&mut self) -> Result<&mut T, ModuleError> {
        self.get_mut::<T>()
            .ok_or_else(|| ModuleError::Missing(type_name::<T>()))
    }

    pub fn require<T: 'static>(&self) -> Result<&T, ModuleError> {
        self.get::<T>().ok_or_else(|| ModuleError::Missing(type_name::<T>()))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Remove a value from the Bus, returning it if present.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("resource_count", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct UserId(u64);

    #[test]
    fn test_insert_and_get() {
        let mut bus = Bus::new();
        bus.insert(UserId(7));
        bus.insert("hello".to_string());

        assert_eq!(bus.get::<UserId>(), Some(&UserId(7)));
        assert_eq!(bus.get::<String>(), Some(&"hello".to_string()));
        assert_eq!(bus.get::<f64>(), None);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let mut bus = Bus::new();
        assert_eq!(bus.insert(UserId(1)), None);
        assert_eq!(bus.insert(UserId(2)), Some(UserId(1)));
        assert_eq!(bus.get::<UserId>(), Some(&UserId(2)));
    }

    #[test]
    fn test_require_reports_missing_type() {
        let mut bus = Bus::new();
        let err = bus.require_mut::<UserId>().unwrap_err();
        assert!(err.to_string().contains("UserId"));

        bus.insert(UserId(3));
        bus.require_mut::<UserId>().unwrap().0 += 1;
        assert_eq!(bus.require::<UserId>().unwrap(), &UserId(4));
    }

    #[test]
    fn test_remove() {
        let mut bus = Bus::new();
        bus.insert(vec![1, 2, 3]);

        assert_eq!(bus.remove::<Vec<i32>>(), Some(vec![1, 2, 3]));
        assert!(!bus.contains::<Vec<i32>>());
        assert!(bus.is_empty());
    }
}
