//! Name → constructor map for changer backends.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use tapevault_core::{ConfigError, Options};

use crate::null::NullChanger;
use crate::r#trait::Changer;
use crate::simulated::SimulatedChanger;

/// Changer constructor function type.
pub type ChangerFactory = fn(&Options) -> Result<Arc<dyn Changer>, ConfigError>;

/// Explicit registry of changer backends, built once at startup.
#[derive(Clone, Default)]
pub struct ChangerRegistry {
    factories: HashMap<String, ChangerFactory>,
}

impl ChangerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in backends: `null`, `fake` and `simulated`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("null", NullChanger::from_options);
        registry.register("fake", NullChanger::from_options);
        registry.register("simulated", SimulatedChanger::from_options);
        registry
    }

    /// Register a backend. A later registration under the same name wins.
    pub fn register(&mut self, name: impl Into<String>, factory: ChangerFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn build(&self, name: &str, options: &Options) -> Result<Arc<dyn Changer>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownBackend(name.to_string()))?;
        debug!(backend = name, "constructing changer");
        factory(options)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ChangerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangerRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
