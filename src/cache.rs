//! Lazy handler-instance cache

use crate::handler::{HandlerFactory, HookHandler};
use dashmap::DashMap;
use std::sync::Arc;

/// Memoizes one handler object per handler-class name.
///
/// A class backing many hook methods is constructed once, on first use as a
/// `class_method` target, and the instance is reused for every later fire
/// until the dispatcher itself is dropped. Factories are supplied at
/// startup; a class name with no factory resolves to nothing.
pub struct HandlerCache {
    factories: DashMap<String, Box<dyn HandlerFactory>>,
    instances: DashMap<String, Arc<dyn HookHandler>>,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Register a factory under a class name.
    ///
    /// Replacing a factory does not evict an instance already constructed
    /// under that name.
    pub fn register_factory<F: HandlerFactory + 'static>(&self, class: impl Into<String>, factory: F) {
        let class = class.into();
        tracing::debug!(class = %class, "registering handler class factory");
        self.factories.insert(class, Box::new(factory));
    }

    /// Whether a factory is registered under the class name
    pub fn has_factory(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Fetch the cached instance for a class, constructing it on first use.
    ///
    /// Returns `None` when no factory is registered under the name; the
    /// caller treats that as a silently skipped handler.
    pub fn get_or_create(&self, class: &str) -> Option<Arc<dyn HookHandler>> {
        if let Some(instance) = self.instances.get(class) {
            return Some(instance.clone());
        }

        let factory = self.factories.get(class)?;
        let instance = self
            .instances
            .entry(class.to_string())
            .or_insert_with(|| factory.create())
            .clone();
        Some(instance)
    }

    /// Number of constructed instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for HandlerCache {
    fn default() -> Self {
        Self::new()
    }
}
