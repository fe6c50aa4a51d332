//! Name-to-resource lookup table.

use bridge_traits::media::{ResourceId, ResourceResolver};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Registered table of bundled audio resources.
#[derive(Debug, Default)]
pub struct ResourceCatalog {
    entries: RwLock<HashMap<String, ResourceId>>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with_resource(self, name: impl Into<String>, raw_id: u32) -> Self {
        self.register(name, raw_id);
        self
    }

    /// Register (or replace) a resource. Id `0` is reserved and ignored.
    pub fn register(&self, name: impl Into<String>, raw_id: u32) {
        if raw_id == 0 {
            return;
        }
        self.entries.write().insert(name.into(), ResourceId::new(raw_id));
    }

    /// Whether some registered name maps to `resource`.
    pub fn contains(&self, resource: ResourceId) -> bool {
        self.entries.read().values().any(|id| *id == resource)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ResourceResolver for ResourceCatalog {
    fn resolve(&self, name: &str) -> Option<ResourceId> {
        self.entries.read().get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_names() {
        let catalog = ResourceCatalog::new()
            .with_resource("rain", 11)
            .with_resource("waves", 12);

        assert_eq!(catalog.resolve("rain"), Some(ResourceId::new(11)));
        assert_eq!(catalog.resolve("waves"), Some(ResourceId::new(12)));
        assert_eq!(catalog.resolve("thunder"), None);
        assert!(catalog.contains(ResourceId::new(12)));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn zero_id_is_reserved() {
        let catalog = ResourceCatalog::new().with_resource("silence", 0);
        assert!(catalog.is_empty());
        assert_eq!(catalog.resolve("silence"), None);
    }
}
