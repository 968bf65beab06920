#![forbid(unsafe_code)]

//! Property values stored in a document.
//!
//! [`Value`] is a closed sum type over the small set of kinds a document
//! property can hold. Nested data is expressed with [`Fields`] (fixed-schema
//! structs) and [`Table`] (arrays and keyed tables), so reconciliation can
//! match on the shape exhaustively instead of dispatching on runtime types.
//!
//! # Addressing
//!
//! A [`PropertyPath`] walks from an object's top-level property down into
//! nested values:
//!
//! ```text
//! translation            -> [Key("translation")]
//! materials[2].uniforms  -> [Key("materials"), Index(2), Key("uniforms")]
//! options["wrap"]        -> [Key("options"), Key("wrap")]
//! ```
//!
//! `Key` addresses struct fields and keyed-table entries; `Index` addresses
//! table entries by position.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a document object.
///
/// Identities survive snapshots: the same object has the same id in the live
/// document and in every snapshot that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Create an object id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discriminant of a [`Value`], used by property descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueKind {
    Bool,
    Int,
    Double,
    String,
    Vec2,
    Vec3,
    Vec4,
    Ref,
    Struct,
    Table,
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Vec4([f64; 4]),
    /// Reference to another document object (`None` = unset).
    Ref(Option<ObjectId>),
    /// Nested struct with a fixed field list.
    Struct(Fields),
    /// Ordered array or keyed table.
    Table(Table),
}

impl Value {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Vec4(_) => ValueKind::Vec4,
            Self::Ref(_) => ValueKind::Ref,
            Self::Struct(_) => ValueKind::Struct,
            Self::Table(_) => ValueKind::Table,
        }
    }

    /// Exact comparison: floats compare by bit pattern so `NaN == NaN` and
    /// `0.0 != -0.0`. Reconciliation uses this to decide whether a write is
    /// needed at all.
    #[must_use]
    pub fn same_as(&self, other: &Value) -> bool {
        fn bits<const N: usize>(a: &[f64; N], b: &[f64; N]) -> bool {
            a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Vec2(a), Self::Vec2(b)) => bits(a, b),
            (Self::Vec3(a), Self::Vec3(b)) => bits(a, b),
            (Self::Vec4(a), Self::Vec4(b)) => bits(a, b),
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => {
                a.fields.len() == b.fields.len()
                    && a
                        .fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((na, va), (nb, vb))| na == nb && va.same_as(vb))
            }
            (Self::Table(a), Self::Table(b)) => {
                a.kind == b.kind
                    && a.entries.len() == b.entries.len()
                    && a
                        .entries
                        .iter()
                        .zip(&b.entries)
                        .all(|(ea, eb)| ea.key == eb.key && ea.value.same_as(&eb.value))
            }
            _ => false,
        }
    }

    /// Call `f` for every reference target contained in this value,
    /// including nested struct fields and table entries.
    pub fn visit_refs(&self, f: &mut impl FnMut(ObjectId)) {
        match self {
            Self::Ref(Some(id)) => f(*id),
            Self::Struct(s) => s.fields.iter().for_each(|(_, v)| v.visit_refs(f)),
            Self::Table(t) => t.entries.iter().for_each(|e| e.value.visit_refs(f)),
            _ => {}
        }
    }

    /// Return a copy with every reference rewritten through `map`.
    ///
    /// References for which `map` returns `None` become unset.
    #[must_use]
    pub fn map_refs(&self, map: &impl Fn(ObjectId) -> Option<ObjectId>) -> Value {
        match self {
            Self::Ref(Some(id)) => Self::Ref(map(*id)),
            Self::Struct(s) => Self::Struct(Fields {
                fields: s
                    .fields
                    .iter()
                    .map(|(n, v)| (n.clone(), v.map_refs(map)))
                    .collect(),
            }),
            Self::Table(t) => Self::Table(Table {
                kind: t.kind,
                entries: t
                    .entries
                    .iter()
                    .map(|e| TableEntry {
                        key: e.key.clone(),
                        value: e.value.map_refs(map),
                    })
                    .collect(),
            }),
            other => other.clone(),
        }
    }

    /// Resolve a path relative to this value.
    #[must_use]
    pub fn get_path(&self, path: &[PathSegment]) -> Option<&Value> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        let child = match (self, head) {
            (Self::Struct(s), PathSegment::Key(k)) => s.get(k),
            (Self::Table(t), PathSegment::Key(k)) => t.get_key(k),
            (Self::Table(t), PathSegment::Index(i)) => t.entries.get(*i).map(|e| &e.value),
            _ => None,
        }?;
        child.get_path(rest)
    }

    /// Resolve a path relative to this value, mutably.
    pub fn get_path_mut(&mut self, path: &[PathSegment]) -> Option<&mut Value> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        let child = match (self, head) {
            (Self::Struct(s), PathSegment::Key(k)) => s.get_mut(k),
            (Self::Table(t), PathSegment::Key(k)) => t.get_key_mut(k),
            (Self::Table(t), PathSegment::Index(i)) => {
                t.entries.get_mut(*i).map(|e| &mut e.value)
            }
            _ => None,
        }?;
        child.get_path_mut(rest)
    }

    /// Borrow as a table, if this is one.
    #[must_use]
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as a table mutably, if this is one.
    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Get the double payload, if this is a `Double`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Fixed-schema nested struct: ordered `(field name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fields {
    pub fields: Vec<(String, Value)>,
}

impl Fields {
    /// Create an empty field list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder pattern).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Look up a field by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// True if both field lists have the same names in the same order.
    #[must_use]
    pub fn same_schema(&self, other: &Fields) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|((a, _), (b, _))| a == b)
    }
}

/// How a table's entries are matched during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TableKind {
    /// Ordered array of uniform elements, matched by index.
    Array,
    /// Heterogeneous table, matched by entry name.
    Keyed,
}

/// One entry of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableEntry {
    pub key: Option<String>,
    pub value: Value,
}

/// Ordered container of entries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table {
    pub kind: TableKind,
    pub entries: Vec<TableEntry>,
}

impl Table {
    /// Create an empty array table.
    #[must_use]
    pub fn array() -> Self {
        Self {
            kind: TableKind::Array,
            entries: Vec::new(),
        }
    }

    /// Create an empty keyed table.
    #[must_use]
    pub fn keyed() -> Self {
        Self {
            kind: TableKind::Keyed,
            entries: Vec::new(),
        }
    }

    /// Append an unnamed entry (builder pattern).
    #[must_use]
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.entries.push(TableEntry {
            key: None,
            value: value.into(),
        });
        self
    }

    /// Append a named entry (builder pattern).
    #[must_use]
    pub fn with_named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push(TableEntry {
            key: Some(key.into()),
            value: value.into(),
        });
        self
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the first entry named `key`.
    #[must_use]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.key.as_deref() == Some(key))
    }

    /// Value of the first entry named `key`.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].value)
    }

    fn get_key_mut(&mut self, key: &str) -> Option<&mut Value> {
        let i = self.position(key)?;
        Some(&mut self.entries[i].value)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Self::Struct(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Self::Table(v)
    }
}

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathSegment {
    /// Struct field or keyed-table entry name.
    Key(String),
    /// Table entry position.
    Index(usize),
}

/// Path from an object's top-level property into a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PropertyPath {
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Path to a top-level property.
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Key(name.into())],
        }
    }

    /// Extend with a named segment.
    #[must_use]
    pub fn key(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Key(name.into()));
        next
    }

    /// Extend with an index segment.
    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(i));
        next
    }

    /// All segments, top-level property first.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Name of the top-level property this path starts at.
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if i == 0 => write!(f, "{k}")?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_as_compares_floats_by_bits() {
        assert!(Value::Double(f64::NAN).same_as(&Value::Double(f64::NAN)));
        assert!(!Value::Double(0.0).same_as(&Value::Double(-0.0)));
        assert!(Value::Vec3([1.0, 2.0, 3.0]).same_as(&Value::Vec3([1.0, 2.0, 3.0])));
        assert!(!Value::Int(1).same_as(&Value::Double(1.0)));
    }

    #[test]
    fn get_path_walks_structs_and_tables() {
        let v = Value::Table(
            Table::keyed()
                .with_named("a", Fields::new().with("x", 1.5))
                .with_named("b", Table::array().with(7i64).with(8i64)),
        );
        let p = PropertyPath::property("unused");
        assert_eq!(
            v.get_path(&[PathSegment::Key("a".into()), PathSegment::Key("x".into())]),
            Some(&Value::Double(1.5))
        );
        assert_eq!(
            v.get_path(&[PathSegment::Key("b".into()), PathSegment::Index(1)]),
            Some(&Value::Int(8))
        );
        assert!(v.get_path(&[PathSegment::Index(5)]).is_none());
        assert_eq!(p.root_name(), Some("unused"));
    }

    #[test]
    fn visit_and_map_refs_reach_nested_values() {
        let v = Value::Struct(
            Fields::new()
                .with("target", Value::Ref(Some(ObjectId(3))))
                .with("list", Table::array().with(Value::Ref(Some(ObjectId(4))))),
        );
        let mut seen = Vec::new();
        v.visit_refs(&mut |id| seen.push(id));
        assert_eq!(seen, vec![ObjectId(3), ObjectId(4)]);

        let mapped = v.map_refs(&|id| (id.raw() == 3).then_some(ObjectId(30)));
        let mut seen = Vec::new();
        mapped.visit_refs(&mut |id| seen.push(id));
        assert_eq!(seen, vec![ObjectId(30)]);
    }

    #[test]
    fn path_display() {
        let p = PropertyPath::property("materials").index(2).key("uniforms");
        assert_eq!(p.to_string(), "materials[2].uniforms");
    }
}
