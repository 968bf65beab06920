#![forbid(unsafe_code)]

//! Snapshot-based undo/redo for hierarchical property documents.
//!
//! A host exposes its object model through the [`Document`] trait. The
//! [`UndoEngine`] records a full [`DocumentSnapshot`] per committed edit and
//! restores earlier states by [`reconcile`]-ing a snapshot into the live
//! document, which preserves the identity of every object that still exists
//! and reports each applied mutation as a [`Change`].
//!
//! # Quick Start
//!
//! ```
//! use composer_undo::{PropertyTree, TypeRegistry, UndoConfig, UndoEngine, Value};
//!
//! let registry = TypeRegistry::new().with_type("Node", [("x", Value::Double(0.0))]);
//! let mut doc = PropertyTree::new(registry);
//! let node = doc.add_object("Node", None).unwrap();
//!
//! let mut undo = UndoEngine::new(&doc, UndoConfig::default());
//! doc.set(node, "x", 4.0).unwrap();
//! undo.push(&doc, "move node");
//!
//! undo.undo(&mut doc).unwrap().unwrap();
//! assert_eq!(doc.get(node, "x"), Some(&Value::Double(0.0)));
//! ```
//!
//! # Module Structure
//!
//! - [`value`]: property values, tables and paths
//! - [`document`]: the host document contract
//! - [`tree`]: an in-memory [`Document`] with a type registry
//! - [`snapshot`]: deep document copies
//! - [`reconcile`](mod@reconcile): diff-and-patch of a document against a snapshot
//! - [`engine`]: the undo stack, merging and composite transactions

pub mod document;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod snapshot;
pub mod tree;
pub mod value;

pub use document::{Document, ObjectInfo, PropertyDescriptor};
pub use engine::{AuxState, Entry, StepReport, SubscriptionId, UndoConfig, UndoEngine};
pub use error::{DocumentError, UndoError};
pub use reconcile::{Change, ReconcileOptions, reconcile};
pub use snapshot::{DocumentSnapshot, ObjectRecord};
pub use tree::{PropertyTree, TypeRegistry};
pub use value::{
    Fields, ObjectId, PathSegment, PropertyPath, Table, TableEntry, TableKind, Value, ValueKind,
};
