//! Loaded-class registry
//!
//! Class loading itself is the interpreter's business. The engine only
//! needs to know which classes exist in the current state and where their
//! static fields live, because that is part of the state being explored.

use super::{Heap, ObjRef};
use crate::domain::memento::Restorable;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A loaded class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassInfo {
    /// Class name
    pub name: Arc<str>,
    /// Heap object holding the static fields; its monitor is the class lock
    pub class_object: ObjRef,
    /// Whether static initialization ran
    pub initialized: bool,
}

/// Registry of loaded classes, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClassRegistry {
    classes: Arc<BTreeMap<Arc<str>, ClassInfo>>,
}

impl ClassRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `name` with `num_statics` static fields, or return the
    /// existing class object
    pub fn load(&mut self, heap: &mut Heap, name: &str, num_statics: usize) -> ObjRef {
        if let Some(info) = self.classes.get(name) {
            return info.class_object;
        }
        let class_object = heap.allocate(name, num_statics);
        let name: Arc<str> = Arc::from(name);
        Arc::make_mut(&mut self.classes).insert(
            Arc::clone(&name),
            ClassInfo {
                name,
                class_object,
                initialized: false,
            },
        );
        class_object
    }

    /// Mark static initialization as done
    pub fn mark_initialized(&mut self, name: &str) -> bool {
        match Arc::make_mut(&mut self.classes).get_mut(name) {
            Some(info) => {
                info.initialized = true;
                true
            }
            None => false,
        }
    }

    /// Lookup
    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Whether `name` is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Number of loaded classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Restorable for ClassRegistry {
    type Memento = ClassRegistry;

    fn backtrack_memento(&self) -> Self::Memento {
        self.clone()
    }

    fn storage_memento(&self) -> Self::Memento {
        Self {
            classes: Arc::new(self.classes.as_ref().clone()),
        }
    }

    fn restore(&mut self, memento: &Self::Memento) {
        self.classes = Arc::clone(&memento.classes);
    }
}
