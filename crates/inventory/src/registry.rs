//! Name → constructor map for inventory backends.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use tapevault_core::{ConfigError, Options};

use crate::in_memory::InMemoryInventory;
use crate::postgres::PostgresInventory;
use crate::r#trait::Inventory;

/// Inventory constructor function type.
pub type InventoryFactory = fn(&Options) -> Result<Arc<dyn Inventory>, ConfigError>;

/// Explicit registry of inventory backends, built once at startup.
#[derive(Clone, Default)]
pub struct InventoryRegistry {
    factories: HashMap<String, InventoryFactory>,
}

impl InventoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in backends: `postgres` and `memory`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("postgres", PostgresInventory::from_options);
        registry.register("memory", InMemoryInventory::from_options);
        registry
    }

    /// Register a backend. A later registration under the same name wins.
    pub fn register(&mut self, name: impl Into<String>, factory: InventoryFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Construct the backend registered as `name`.
    ///
    /// The `postgres` backend creates its pool lazily, so this needs a tokio
    /// runtime but never a reachable database.
    pub fn build(&self, name: &str, options: &Options) -> Result<Arc<dyn Inventory>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownBackend(name.to_string()))?;
        debug!(backend = name, "constructing inventory");
        factory(options)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for InventoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
