//! In-process handlers: constructors registered by type name (CUSTOM_CLASS)
//! and pre-built named components (CUSTOM_BEAN).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use relay_events::{EventHandler, ProcessorResult};

/// Constructor for a CUSTOM_CLASS handler.
pub type HandlerConstructor = Arc<dyn Fn() -> ProcessorResult<Arc<dyn EventHandler>> + Send + Sync>;

/// Type name → handler constructor.
#[derive(Default, Clone)]
pub struct HandlerClasses {
    constructors: Arc<RwLock<HashMap<String, HandlerConstructor>>>,
}

impl fmt::Debug for HandlerClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerClasses")
            .field("type_names", &self.type_names())
            .finish()
    }
}

impl HandlerClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `type_name`, replacing any earlier one.
    pub fn register<F>(&self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> ProcessorResult<Arc<dyn EventHandler>> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name.into(), Arc::new(constructor));
    }

    /// Register a handler type built through `Default`.
    pub fn register_default<H>(&self, type_name: impl Into<String>)
    where
        H: EventHandler + Default + 'static,
    {
        self.register(type_name, || Ok(Arc::new(H::default()) as Arc<dyn EventHandler>));
    }

    pub fn constructor(&self, type_name: &str) -> Option<HandlerConstructor> {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .cloned()
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// The host's named-component container.
pub trait ComponentRegistry: Send + Sync {
    /// Look up the component registered under `name`, if any.
    fn lookup(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Map-backed [`ComponentRegistry`]; components can be added at any time.
#[derive(Default)]
pub struct InMemoryComponentRegistry {
    components: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl InMemoryComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component of any type under `name`.
    pub fn insert<T>(&self, name: impl Into<String>, component: T)
    where
        T: Any + Send + Sync,
    {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(component));
    }

    /// Register an event handler under `name`.
    pub fn insert_handler(&self, name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.insert(name, handler);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

impl ComponentRegistry for InMemoryComponentRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Recover an event handler from a looked-up component.
///
/// Components registered as `Arc<dyn EventHandler>` qualify; anything else is
/// of the wrong capability.
pub fn as_event_handler(component: &Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn EventHandler>> {
    component.downcast_ref::<Arc<dyn EventHandler>>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_events::Event;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl EventHandler for Noop {
        async fn dispatch(&self, event: &Event) -> ProcessorResult<Event> {
            Ok(event.clone())
        }
    }

    #[test]
    fn classes_build_registered_types_only() {
        let classes = HandlerClasses::new();
        classes.register_default::<Noop>("acme.Noop");

        let ctor = classes.constructor("acme.Noop").unwrap();
        assert!(ctor().is_ok());
        assert!(classes.constructor("acme.Missing").is_none());
        assert_eq!(classes.type_names(), vec!["acme.Noop".to_string()]);
    }

    #[test]
    fn only_handler_components_have_the_dispatch_capability() {
        let registry = InMemoryComponentRegistry::new();
        registry.insert_handler("sink", Arc::new(Noop));
        registry.insert("config", String::from("not a handler"));

        let sink = registry.lookup("sink").unwrap();
        assert!(as_event_handler(&sink).is_some());

        let config = registry.lookup("config").unwrap();
        assert!(as_event_handler(&config).is_none());

        assert!(registry.lookup("absent").is_none());
        assert!(registry.remove("sink"));
        assert!(registry.lookup("sink").is_none());
    }
}
