use crate::engine_trait::EngineFactory;
use std::collections::HashMap;
use std::sync::Arc;
use voxbridge_core::EngineError;

/// Engine factories selectable by name from the application config.
pub struct FactoryRegistry {
    factories: HashMap<String, fn() -> Arc<dyn EngineFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("null", || Arc::new(crate::null_engine::NullEngineFactory::new()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: fn() -> Arc<dyn EngineFactory>) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn EngineFactory>, EngineError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| EngineError::FactoryNotFound(name.to_string()))
    }

    pub fn list_factories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullEngineFactory;

    #[test]
    fn test_registry_new_has_null_factory() {
        let registry = FactoryRegistry::new();
        let factory = registry.create("null").unwrap();
        assert_eq!(factory.name(), "null");
    }

    #[test]
    fn test_registry_create_unknown_returns_error() {
        let registry = FactoryRegistry::new();
        match registry.create("nope") {
            Err(EngineError::FactoryNotFound(name)) => assert_eq!(name, "nope"),
            _ => panic!("expected FactoryNotFound error"),
        }
    }

    #[test]
    fn test_registry_register_custom_factory() {
        let mut registry = FactoryRegistry::new();
        registry.register("custom", || Arc::new(NullEngineFactory::new()));
        assert!(registry.create("custom").is_ok());
        assert_eq!(registry.list_factories(), vec!["custom", "null"]);
    }
}
