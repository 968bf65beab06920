#![forbid(unsafe_code)]

//! Deep, independent copies of a document.
//!
//! A [`DocumentSnapshot`] owns every value it holds: mutating the live
//! document after capture never changes a snapshot. Snapshots are stored
//! behind [`Arc`](std::sync::Arc) by the engine so an entry and a rollback
//! copy can share one capture.

use crate::document::Document;
use crate::value::{ObjectId, Value};

/// One object as it was at capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub type_name: String,
    pub parent: Option<ObjectId>,
    pub position: usize,
    pub properties: Vec<(String, Value)>,
}

impl ObjectRecord {
    /// Look up a captured property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Full copy of a document, objects in hierarchy order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentSnapshot {
    objects: Vec<ObjectRecord>,
}

impl DocumentSnapshot {
    /// Copy every object and property of `doc`.
    #[must_use]
    pub fn capture<D: Document + ?Sized>(doc: &D) -> Self {
        let objects = doc
            .object_ids()
            .into_iter()
            .filter_map(|id| {
                let info = doc.object_info(id)?;
                let properties = doc
                    .properties(id)
                    .into_iter()
                    .filter_map(|desc| {
                        let path = crate::value::PropertyPath::property(desc.name.clone());
                        doc.value(id, &path).map(|v| (desc.name, v))
                    })
                    .collect();
                Some(ObjectRecord {
                    id,
                    type_name: info.type_name,
                    parent: info.parent,
                    position: info.position,
                    properties,
                })
            })
            .collect();
        Self { objects }
    }

    /// Captured objects in hierarchy order.
    #[must_use]
    pub fn objects(&self) -> &[ObjectRecord] {
        &self.objects
    }

    /// Find a captured object by id.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// True if the snapshot contains `id`.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.iter().any(|o| o.id == id)
    }

    /// Number of captured objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if no objects were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Rough heap footprint, used for diagnostics.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        fn value_bytes(v: &Value) -> usize {
            std::mem::size_of::<Value>()
                + match v {
                    Value::String(s) => s.len(),
                    Value::Struct(f) => f
                        .fields
                        .iter()
                        .map(|(n, v)| n.len() + value_bytes(v))
                        .sum(),
                    Value::Table(t) => t
                        .entries
                        .iter()
                        .map(|e| e.key.as_ref().map_or(0, String::len) + value_bytes(&e.value))
                        .sum(),
                    _ => 0,
                }
        }
        self.objects
            .iter()
            .map(|o| {
                std::mem::size_of::<ObjectRecord>()
                    + o.type_name.len()
                    + o.properties
                        .iter()
                        .map(|(n, v)| n.len() + value_bytes(v))
                        .sum::<usize>()
            })
            .sum()
    }
}
