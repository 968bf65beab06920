#![forbid(unsafe_code)]

//! Error types for documents and undo navigation.

use thiserror::Error;

use crate::value::{ObjectId, PropertyPath};

/// Errors a [`Document`](crate::Document) implementation reports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("object factory cannot construct type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("object {0} already exists")]
    DuplicateObject(ObjectId),

    #[error("property path '{path}' not found on object {object}")]
    PathNotFound { object: ObjectId, path: PropertyPath },

    #[error("property '{path}' on object {object} is not a table")]
    NotATable { object: ObjectId, path: PropertyPath },

    #[error("entry index {index} out of bounds (length {len}) in '{path}' on object {object}")]
    EntryOutOfBounds {
        object: ObjectId,
        path: PropertyPath,
        index: usize,
        len: usize,
    },

    #[error("linking object {object} under {parent} would create a cycle")]
    ParentCycle { object: ObjectId, parent: ObjectId },
}

/// Errors returned by undo/redo navigation and reconciliation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UndoError {
    /// A step failed; the document was rolled back to its pre-attempt state.
    #[error("reconciliation failed and was rolled back: {source}")]
    Reconcile {
        #[source]
        source: DocumentError,
    },

    /// A step failed and the rollback failed too.
    #[error("document may be corrupted: {source} (rollback failed: {rollback})")]
    Corrupted {
        #[source]
        source: DocumentError,
        rollback: DocumentError,
    },

    /// The snapshot references an object it does not contain.
    #[error("property '{property}' on object {object} references missing object {target}")]
    DanglingReference {
        object: ObjectId,
        property: String,
        target: ObjectId,
    },

    #[error("undo index {index} out of range (size {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

impl UndoError {
    /// True if the document is known to be in its pre-attempt state.
    #[must_use]
    pub fn document_intact(&self) -> bool {
        !matches!(self, Self::Corrupted { .. })
    }
}
