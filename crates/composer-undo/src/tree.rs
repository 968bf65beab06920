#![forbid(unsafe_code)]

//! In-memory property document.
//!
//! [`PropertyTree`] is an arena of typed objects arranged in a forest. Each
//! object carries an ordered list of top-level properties whose initial
//! values come from the [`TypeRegistry`], which doubles as the object
//! factory used when undo has to re-create an object that was deleted.
//!
//! ```text
//! roots:  [scene#1]
//!            ├── node#2  (translation, rotation, material -> #4)
//!            │     └── node#3
//!            └── material#4
//! ```

use ahash::AHashMap;

use crate::document::{Document, ObjectInfo, PropertyDescriptor};
use crate::error::DocumentError;
use crate::value::{ObjectId, PropertyPath, Value};

/// Registry of constructible object types and their default properties.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: AHashMap<String, Vec<(String, Value)>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type with its default property schema (builder pattern).
    #[must_use]
    pub fn with_type<N, I>(mut self, type_name: N, schema: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        self.register(type_name, schema);
        self
    }

    /// Register or replace a type.
    pub fn register<N, I>(&mut self, type_name: N, schema: I)
    where
        N: Into<String>,
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let schema = schema
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.types.insert(type_name.into(), schema);
    }

    /// Default properties of a type, if registered.
    #[must_use]
    pub fn schema(&self, type_name: &str) -> Option<&[(String, Value)]> {
        self.types.get(type_name).map(Vec::as_slice)
    }

    /// True if the type can be constructed.
    #[must_use]
    pub fn knows(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }
}

#[derive(Debug, Clone)]
struct Node {
    type_name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    properties: Vec<(String, Value)>,
}

impl Node {
    fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn property_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.properties
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// A forest of typed objects with named properties.
#[derive(Debug, Clone)]
pub struct PropertyTree {
    registry: TypeRegistry,
    nodes: AHashMap<ObjectId, Node>,
    roots: Vec<ObjectId>,
    next_id: u64,
}

impl PropertyTree {
    /// Create an empty document backed by `registry`.
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            nodes: AHashMap::new(),
            roots: Vec::new(),
            next_id: 1,
        }
    }

    /// The type registry (object factory).
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the document has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a new object with a fresh id, appended under `parent`.
    pub fn add_object(
        &mut self,
        type_name: &str,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId, DocumentError> {
        if let Some(p) = parent.filter(|p| !self.nodes.contains_key(p)) {
            return Err(DocumentError::ObjectNotFound(p));
        }
        let id = self.create_object(type_name, ObjectId(self.next_id))?;
        if parent.is_some() {
            self.link_object(id, parent, usize::MAX)?;
        }
        Ok(id)
    }

    /// Read a top-level property.
    #[must_use]
    pub fn get(&self, id: ObjectId, name: &str) -> Option<&Value> {
        self.nodes.get(&id)?.property(name)
    }

    /// Overwrite a top-level property.
    pub fn set(
        &mut self,
        id: ObjectId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), DocumentError> {
        self.set_value(id, &PropertyPath::property(name), value.into())
    }

    /// Children of an object, in order.
    #[must_use]
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Root objects, in order.
    #[must_use]
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Type name of an object.
    #[must_use]
    pub fn type_name(&self, id: ObjectId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.type_name.as_str())
    }

    fn container(&self, parent: Option<ObjectId>) -> Option<&Vec<ObjectId>> {
        match parent {
            Some(p) => self.nodes.get(&p).map(|n| &n.children),
            None => Some(&self.roots),
        }
    }

    fn container_mut(&mut self, parent: Option<ObjectId>) -> Option<&mut Vec<ObjectId>> {
        match parent {
            Some(p) => self.nodes.get_mut(&p).map(|n| &mut n.children),
            None => Some(&mut self.roots),
        }
    }

    fn detach(&mut self, id: ObjectId, parent: Option<ObjectId>) {
        if let Some(list) = self.container_mut(parent) {
            list.retain(|c| *c != id);
        }
    }

    fn is_ancestor(&self, ancestor: ObjectId, mut id: ObjectId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(&id).and_then(|n| n.parent) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn table_at(
        &mut self,
        id: ObjectId,
        path: &PropertyPath,
    ) -> Result<&mut crate::value::Table, DocumentError> {
        let value = self.value_mut(id, path)?;
        value.as_table_mut().ok_or_else(|| DocumentError::NotATable {
            object: id,
            path: path.clone(),
        })
    }

    fn value_mut(&mut self, id: ObjectId, path: &PropertyPath) -> Result<&mut Value, DocumentError> {
        let not_found = || DocumentError::PathNotFound {
            object: id,
            path: path.clone(),
        };
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(DocumentError::ObjectNotFound(id))?;
        let name = path.root_name().ok_or_else(not_found)?;
        node.property_mut(name)
            .and_then(|v| v.get_path_mut(&path.segments()[1..]))
            .ok_or_else(not_found)
    }
}

impl Document for PropertyTree {
    fn object_ids(&self) -> Vec<ObjectId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<ObjectId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn object_info(&self, id: ObjectId) -> Option<ObjectInfo> {
        let node = self.nodes.get(&id)?;
        let position = self
            .container(node.parent)
            .and_then(|list| list.iter().position(|c| *c == id))
            .unwrap_or(0);
        Some(ObjectInfo {
            type_name: node.type_name.clone(),
            parent: node.parent,
            position,
        })
    }

    fn properties(&self, id: ObjectId) -> Vec<PropertyDescriptor> {
        self.nodes
            .get(&id)
            .map(|n| {
                n.properties
                    .iter()
                    .map(|(name, v)| PropertyDescriptor {
                        name: name.clone(),
                        kind: v.kind(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn value(&self, id: ObjectId, path: &PropertyPath) -> Option<Value> {
        let node = self.nodes.get(&id)?;
        node.property(path.root_name()?)?
            .get_path(&path.segments()[1..])
            .cloned()
    }

    fn set_value(
        &mut self,
        id: ObjectId,
        path: &PropertyPath,
        value: Value,
    ) -> Result<(), DocumentError> {
        *self.value_mut(id, path)? = value;
        Ok(())
    }

    fn insert_entry(
        &mut self,
        id: ObjectId,
        table: &PropertyPath,
        index: usize,
        key: Option<String>,
        value: Value,
    ) -> Result<(), DocumentError> {
        let t = self.table_at(id, table)?;
        if index > t.entries.len() {
            return Err(DocumentError::EntryOutOfBounds {
                object: id,
                path: table.clone(),
                index,
                len: t.entries.len(),
            });
        }
        t.entries
            .insert(index, crate::value::TableEntry { key, value });
        Ok(())
    }

    fn remove_entry(
        &mut self,
        id: ObjectId,
        table: &PropertyPath,
        index: usize,
    ) -> Result<Value, DocumentError> {
        let t = self.table_at(id, table)?;
        if index >= t.entries.len() {
            return Err(DocumentError::EntryOutOfBounds {
                object: id,
                path: table.clone(),
                index,
                len: t.entries.len(),
            });
        }
        Ok(t.entries.remove(index).value)
    }

    fn create_object(&mut self, type_name: &str, id: ObjectId) -> Result<ObjectId, DocumentError> {
        let schema = self
            .registry
            .schema(type_name)
            .ok_or_else(|| DocumentError::UnknownType {
                type_name: type_name.to_string(),
            })?
            .to_vec();
        if self.nodes.contains_key(&id) {
            return Err(DocumentError::DuplicateObject(id));
        }
        self.nodes.insert(
            id,
            Node {
                type_name: type_name.to_string(),
                parent: None,
                children: Vec::new(),
                properties: schema,
            },
        );
        self.roots.push(id);
        self.next_id = self.next_id.max(id.raw() + 1);
        Ok(id)
    }

    fn link_object(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
        position: usize,
    ) -> Result<(), DocumentError> {
        let old_parent = self
            .nodes
            .get(&id)
            .ok_or(DocumentError::ObjectNotFound(id))?
            .parent;
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(DocumentError::ObjectNotFound(p));
            }
            if self.is_ancestor(id, p) {
                return Err(DocumentError::ParentCycle { object: id, parent: p });
            }
        }
        self.detach(id, old_parent);
        if let Some(list) = self.container_mut(parent) {
            let at = position.min(list.len());
            list.insert(at, id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
        Ok(())
    }

    fn destroy_object(&mut self, id: ObjectId) -> Result<(), DocumentError> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or(DocumentError::ObjectNotFound(id))?;
        self.detach(id, node.parent);
        for child in node.children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = None;
                self.roots.push(child);
            }
        }
        Ok(())
    }

    fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Table;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type("Node", [("name", Value::from("")), ("x", Value::Double(0.0))])
            .with_type("List", [("items", Value::Table(Table::array()))])
    }

    #[test]
    fn add_object_assigns_fresh_ids_and_defaults() {
        let mut doc = PropertyTree::new(registry());
        let a = doc.add_object("Node", None).unwrap();
        let b = doc.add_object("Node", Some(a)).unwrap();
        assert_ne!(a, b);
        assert_eq!(doc.get(b, "x"), Some(&Value::Double(0.0)));
        assert_eq!(doc.children(a), &[b]);
        assert_eq!(doc.object_ids(), vec![a, b]);
    }

    #[test]
    fn unknown_type_is_a_factory_failure() {
        let mut doc = PropertyTree::new(registry());
        let err = doc.add_object("Camera", None).unwrap_err();
        assert!(matches!(err, DocumentError::UnknownType { .. }));
        assert!(doc.is_empty());
    }

    #[test]
    fn object_ids_are_preorder() {
        let mut doc = PropertyTree::new(registry());
        let a = doc.add_object("Node", None).unwrap();
        let a1 = doc.add_object("Node", Some(a)).unwrap();
        let b = doc.add_object("Node", None).unwrap();
        let a2 = doc.add_object("Node", Some(a)).unwrap();
        let a11 = doc.add_object("Node", Some(a1)).unwrap();
        assert_eq!(doc.object_ids(), vec![a, a1, a11, a2, b]);
        assert_eq!(doc.object_info(a2).unwrap().position, 1);
    }

    #[test]
    fn link_rejects_cycles() {
        let mut doc = PropertyTree::new(registry());
        let a = doc.add_object("Node", None).unwrap();
        let b = doc.add_object("Node", Some(a)).unwrap();
        let err = doc.link_object(a, Some(b), 0).unwrap_err();
        assert_eq!(err, DocumentError::ParentCycle { object: a, parent: b });
    }

    #[test]
    fn destroy_detaches_children_to_roots() {
        let mut doc = PropertyTree::new(registry());
        let a = doc.add_object("Node", None).unwrap();
        let b = doc.add_object("Node", Some(a)).unwrap();
        doc.destroy_object(a).unwrap();
        assert!(!doc.contains(a));
        assert_eq!(doc.roots(), &[b]);
        assert_eq!(doc.object_info(b).unwrap().parent, None);
    }

    #[test]
    fn table_entries_insert_and_remove() {
        let mut doc = PropertyTree::new(registry());
        let l = doc.add_object("List", None).unwrap();
        let path = PropertyPath::property("items");
        doc.insert_entry(l, &path, 0, None, Value::Int(1)).unwrap();
        doc.insert_entry(l, &path, 1, None, Value::Int(2)).unwrap();
        assert_eq!(doc.value(l, &path.index(1)), Some(Value::Int(2)));
        assert_eq!(doc.remove_entry(l, &path, 0).unwrap(), Value::Int(1));
        assert!(doc.remove_entry(l, &path, 5).is_err());
        assert!(doc.insert_entry(l, &PropertyPath::property("nope"), 0, None, Value::Int(0)).is_err());
    }
}
