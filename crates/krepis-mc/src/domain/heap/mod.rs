//! Heap Model
//!
//! The engine consumes the heap through a narrow interface: allocate an
//! object, read and write its integer fields, and reach its [`Monitor`].
//! Storage is persistent so that checkpoints share every object the next
//! transition does not touch.

pub mod classes;
pub mod monitor;

pub use classes::{ClassInfo, ClassRegistry};
pub use monitor::Monitor;

use crate::domain::error::InternalError;
use crate::domain::memento::Restorable;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Object reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjRef(pub usize);

impl ObjRef {
    /// Create a new object reference
    #[inline(always)]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// One heap object: a class tag, integer fields and a monitor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeapObject {
    class_name: Arc<str>,
    fields: Vec<i64>,
    monitor: Monitor,
}

impl HeapObject {
    /// Class tag
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Field values
    pub fn fields(&self) -> &[i64] {
        &self.fields
    }

    /// Monitor
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

/// Persistent object store
///
/// # Design Notes
///
/// Objects are individually reference counted inside a reference-counted
/// slot vector. Writing an object after a snapshot copies the slot vector
/// (pointer copies only) and that single object.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Arc<Vec<Arc<HeapObject>>>,
}

impl Heap {
    /// Empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object with `num_fields` zeroed fields
    pub fn allocate(&mut self, class_name: &str, num_fields: usize) -> ObjRef {
        let objects = Arc::make_mut(&mut self.objects);
        let obj = ObjRef::new(objects.len());
        objects.push(Arc::new(HeapObject {
            class_name: Arc::from(class_name),
            fields: vec![0; num_fields],
            monitor: Monitor::new(),
        }));
        obj
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Read access
    pub fn get(&self, obj: ObjRef) -> Result<&HeapObject, InternalError> {
        self.objects
            .get(obj.as_usize())
            .map(Arc::as_ref)
            .ok_or(InternalError::UnknownObject(obj))
    }

    /// Write access, copying shared structure on demand
    pub fn get_mut(&mut self, obj: ObjRef) -> Result<&mut HeapObject, InternalError> {
        Arc::make_mut(&mut self.objects)
            .get_mut(obj.as_usize())
            .map(Arc::make_mut)
            .ok_or(InternalError::UnknownObject(obj))
    }

    /// Monitor of `obj`
    pub fn monitor(&self, obj: ObjRef) -> Result<&Monitor, InternalError> {
        self.get(obj).map(HeapObject::monitor)
    }

    /// Modifiable monitor of `obj`
    pub fn monitor_mut(&mut self, obj: ObjRef) -> Result<&mut Monitor, InternalError> {
        self.get_mut(obj).map(|o| &mut o.monitor)
    }

    /// Read field `index`
    pub fn field(&self, obj: ObjRef, index: usize) -> Result<i64, InternalError> {
        self.get(obj)?
            .fields
            .get(index)
            .copied()
            .ok_or(InternalError::FieldOutOfRange { object: obj, field: index })
    }

    /// Write field `index`
    pub fn set_field(&mut self, obj: ObjRef, index: usize, value: i64) -> Result<(), InternalError> {
        // check before make_mut so a bad index does not copy anything
        if index >= self.get(obj)?.fields.len() {
            return Err(InternalError::FieldOutOfRange { object: obj, field: index });
        }
        self.get_mut(obj)?.fields[index] = value;
        Ok(())
    }

    /// Whether `other` still shares the storage of `obj` with `self`
    pub fn shares_object_with(&self, other: &Self, obj: ObjRef) -> bool {
        match (self.objects.get(obj.as_usize()), other.objects.get(obj.as_usize())) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Restorable for Heap {
    type Memento = Heap;

    fn backtrack_memento(&self) -> Self::Memento {
        self.clone()
    }

    fn storage_memento(&self) -> Self::Memento {
        let objects = self
            .objects
            .iter()
            .map(|o| Arc::new(o.as_ref().clone()))
            .collect();
        Self {
            objects: Arc::new(objects),
        }
    }

    fn restore(&mut self, memento: &Self::Memento) {
        self.objects = Arc::clone(&memento.objects);
    }
}

impl PartialEq for Heap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.objects, &other.objects) || self.objects == other.objects
    }
}

impl Eq for Heap {}

impl std::hash::Hash for Heap {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.objects.hash(state);
    }
}
