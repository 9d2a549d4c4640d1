use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Service = Arc<dyn Any + Send + Sync>;

/// Named services injected into command handlers.
///
/// The registry is cheap to clone and is shared by every handler of a command.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<HashMap<String, Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        ServiceRegistry::default()
    }

    pub fn with_service<S>(mut self, name: impl Into<String>, service: S) -> Self
    where
        S: Any + Send + Sync,
    {
        Arc::make_mut(&mut self.services).insert(name.into(), Arc::new(service));
        self
    }

    /// Looks up a service, returning `None` if it is missing or of another type.
    pub fn get<S>(&self, name: &str) -> Option<Arc<S>>
    where
        S: Any + Send + Sync,
    {
        let service = Arc::clone(self.services.get(name)?);
        service.downcast::<S>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.services.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let services = ServiceRegistry::new()
            .with_service("multiplier", 3_i64)
            .with_service("greeting", String::from("hi"));
        let cloned = services.clone();

        assert_eq!(*cloned.get::<i64>("multiplier").unwrap(), 3);
        assert_eq!(cloned.get::<String>("greeting").unwrap().as_str(), "hi");
        assert!(cloned.get::<u8>("multiplier").is_none());
        assert!(cloned.get::<i64>("missing").is_none());
        assert!(services.contains("greeting"));
    }
}
