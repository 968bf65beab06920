#![forbid(unsafe_code)]

//! The document contract the undo engine works against.
//!
//! The engine never looks inside a host document except through
//! [`Document`]. A host adapts its own object model by implementing the
//! trait; [`PropertyTree`](crate::PropertyTree) is a ready-made in-memory
//! implementation.
//!
//! # Invariants expected from implementors
//!
//! 1. `object_ids()` lists parents before their children and siblings in
//!    their container order.
//! 2. `object_info(id).position` is the index of `id` among its parent's
//!    children (or among the roots when `parent` is `None`).
//! 3. `create_object` either creates the object and returns its live id, or
//!    fails without side effects.
//! 4. `destroy_object` does not destroy children; they are detached to the
//!    root level and linked again by the caller.

use crate::error::DocumentError;
use crate::value::{ObjectId, PropertyPath, Value, ValueKind};

/// Where an object sits in the document hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub type_name: String,
    pub parent: Option<ObjectId>,
    pub position: usize,
}

/// One enumerated top-level property of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: ValueKind,
}

/// A hierarchical property document.
pub trait Document {
    /// All object ids in hierarchy order.
    fn object_ids(&self) -> Vec<ObjectId>;

    /// Type and placement of an object.
    fn object_info(&self, id: ObjectId) -> Option<ObjectInfo>;

    /// Top-level properties of an object, in declaration order.
    fn properties(&self, id: ObjectId) -> Vec<PropertyDescriptor>;

    /// Read the value at `path`.
    fn value(&self, id: ObjectId, path: &PropertyPath) -> Option<Value>;

    /// Overwrite the value at `path`.
    fn set_value(
        &mut self,
        id: ObjectId,
        path: &PropertyPath,
        value: Value,
    ) -> Result<(), DocumentError>;

    /// Insert an entry into the table at `table`.
    fn insert_entry(
        &mut self,
        id: ObjectId,
        table: &PropertyPath,
        index: usize,
        key: Option<String>,
        value: Value,
    ) -> Result<(), DocumentError>;

    /// Remove the entry at `index` from the table at `table`.
    fn remove_entry(
        &mut self,
        id: ObjectId,
        table: &PropertyPath,
        index: usize,
    ) -> Result<Value, DocumentError>;

    /// Construct a new object of `type_name`, preferably with identity `id`.
    ///
    /// Returns the live id of the created object.
    fn create_object(&mut self, type_name: &str, id: ObjectId) -> Result<ObjectId, DocumentError>;

    /// Move an object under `parent` at `position`.
    fn link_object(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
        position: usize,
    ) -> Result<(), DocumentError>;

    /// Remove an object. Its children are detached, not destroyed.
    fn destroy_object(&mut self, id: ObjectId) -> Result<(), DocumentError>;

    /// Map a (possibly stale) identity to a live object.
    fn resolve_reference(&self, id: ObjectId) -> Option<ObjectId> {
        self.contains(id).then_some(id)
    }

    /// True if an object with this identity exists.
    fn contains(&self, id: ObjectId) -> bool {
        self.object_info(id).is_some()
    }
}
