//! # Class Registry
//!
//! Factories for prefabs and components, keyed by the names templates use.
//! A `Create` can only instantiate what the host registered here.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::object::ObjectHandle;

/// Builds a fresh instance of a registered class
pub type Factory = Box<dyn Fn() -> ObjectHandle>;

#[derive(Default)]
pub struct ClassRegistry {
    prefabs: HashMap<String, Factory>,
    components: HashMap<String, Factory>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prefab under the name templates refer to, e.g. `Prefabs/Ball`
    pub fn register_prefab<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> ObjectHandle + 'static,
    {
        if self.prefabs.insert(name.to_string(), Box::new(factory)).is_some() {
            warn!("Replacing existing prefab registration: {}", name);
        }
        debug!("Registered prefab: {}", name);
    }

    pub fn register_component<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> ObjectHandle + 'static,
    {
        if self.components.insert(name.to_string(), Box::new(factory)).is_some() {
            warn!("Replacing existing component registration: {}", name);
        }
        debug!("Registered component: {}", name);
    }

    pub fn has_prefab(&self, name: &str) -> bool {
        self.prefabs.contains_key(name)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn instantiate_prefab(&self, name: &str) -> Option<ObjectHandle> {
        let factory = self.prefabs.get(name)?;
        info!("Instantiating prefab {}", name);
        Some(factory())
    }

    pub fn create_component(&self, name: &str) -> Option<ObjectHandle> {
        self.components.get(name).map(|factory| factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{handle, Behaviour, GameObject};
    use std::rc::Rc;

    #[test]
    fn factories_build_fresh_instances() {
        let mut classes = ClassRegistry::new();
        classes.register_prefab("Prefabs/Ball", || handle(GameObject::new("Ball")));
        classes.register_component("Spin", || handle(Behaviour::new("Spin")));

        let a = classes.instantiate_prefab("Prefabs/Ball").unwrap();
        let b = classes.instantiate_prefab("Prefabs/Ball").unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a.borrow().type_name(), "GameObject");

        assert!(classes.has_component("Spin"));
        assert!(classes.create_component("Wobble").is_none());
        assert!(classes.instantiate_prefab("Prefabs/Cube").is_none());
    }
}
