#![forbid(unsafe_code)]

//! Diff-and-patch of a live document against a snapshot.
//!
//! [`reconcile`] makes `dest` observably equal to `src` while touching as
//! little as possible: objects that already exist keep their identity,
//! scalars are only written when they differ, and tables are patched entry
//! by entry. Every mutation is reported as a [`Change`] so hosts can refresh
//! exactly what moved.
//!
//! # Phases
//!
//! ```text
//! validate   every Ref in src points at an object in src     (no mutation)
//! rollback   capture dest
//! create     src objects missing from dest -> factory         id map built
//! destroy    dest objects missing from src
//! link       parent / position fixed in hierarchy order
//! values     per property, refs translated through the id map
//! ```
//!
//! References are translated only after every object has been created or
//! matched, so cycles between objects in the snapshot resolve correctly.
//!
//! # Failure Modes
//!
//! - Dangling reference in `src`: rejected up front, `dest` untouched.
//! - Factory or structural failure mid-way: the rollback capture is
//!   reconciled back into `dest` and [`UndoError::Reconcile`] is returned.
//! - Rollback failure: [`UndoError::Corrupted`].

use ahash::{AHashMap, AHashSet};

use crate::document::Document;
use crate::error::{DocumentError, UndoError};
use crate::snapshot::DocumentSnapshot;
use crate::value::{ObjectId, PropertyPath, Table, TableEntry, TableKind, Value};

/// One mutation applied to the live document.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    ObjectCreated {
        id: ObjectId,
        type_name: String,
    },
    ObjectDestroyed {
        id: ObjectId,
    },
    ObjectMoved {
        id: ObjectId,
        parent: Option<ObjectId>,
        position: usize,
    },
    ValueChanged {
        id: ObjectId,
        path: PropertyPath,
    },
    EntryInserted {
        id: ObjectId,
        table: PropertyPath,
        index: usize,
    },
    EntryRemoved {
        id: ObjectId,
        table: PropertyPath,
        index: usize,
    },
    EntryMoved {
        id: ObjectId,
        table: PropertyPath,
        from: usize,
        to: usize,
    },
}

impl Change {
    /// The object this change applies to.
    #[must_use]
    pub fn object(&self) -> ObjectId {
        match self {
            Self::ObjectCreated { id, .. }
            | Self::ObjectDestroyed { id }
            | Self::ObjectMoved { id, .. }
            | Self::ValueChanged { id, .. }
            | Self::EntryInserted { id, .. }
            | Self::EntryRemoved { id, .. }
            | Self::EntryMoved { id, .. } => *id,
        }
    }
}

/// Knobs for a single reconciliation.
#[derive(Default, Clone, Copy)]
pub struct ReconcileOptions<'a> {
    /// Property or field names to leave untouched.
    pub exclude_property: Option<&'a dyn Fn(&str) -> bool>,
}

impl ReconcileOptions<'_> {
    fn excludes(&self, name: &str) -> bool {
        self.exclude_property.is_some_and(|f| f(name))
    }
}

impl std::fmt::Debug for ReconcileOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileOptions")
            .field("exclude_property", &self.exclude_property.is_some())
            .finish()
    }
}

/// Make `dest` match `src`, returning the applied changes.
pub fn reconcile<D: Document + ?Sized>(
    src: &DocumentSnapshot,
    dest: &mut D,
    options: ReconcileOptions<'_>,
) -> Result<Vec<Change>, UndoError> {
    let span = tracing::debug_span!(
        "undo.reconcile",
        objects = src.len(),
        changes = tracing::field::Empty
    );
    let _guard = span.enter();

    validate_references(src)?;

    let rollback = DocumentSnapshot::capture(dest);
    let mut changes = Vec::new();
    match apply(src, dest, options, &mut changes) {
        Ok(()) => {
            span.record("changes", changes.len());
            Ok(changes)
        }
        Err(source) => {
            tracing::warn!(message = "undo.reconcile.rollback", error = %source);
            let mut discarded = Vec::new();
            match apply(&rollback, dest, ReconcileOptions::default(), &mut discarded) {
                Ok(()) => Err(UndoError::Reconcile { source }),
                Err(rollback) => {
                    tracing::error!(message = "undo.reconcile.corrupted", error = %rollback);
                    Err(UndoError::Corrupted { source, rollback })
                }
            }
        }
    }
}

fn validate_references(src: &DocumentSnapshot) -> Result<(), UndoError> {
    let known: AHashSet<ObjectId> = src.objects().iter().map(|o| o.id).collect();
    for record in src.objects() {
        for (name, value) in &record.properties {
            let mut missing = None;
            value.visit_refs(&mut |target| {
                if missing.is_none() && !known.contains(&target) {
                    missing = Some(target);
                }
            });
            if let Some(target) = missing {
                return Err(UndoError::DanglingReference {
                    object: record.id,
                    property: name.clone(),
                    target,
                });
            }
        }
    }
    Ok(())
}

fn apply<D: Document + ?Sized>(
    src: &DocumentSnapshot,
    dest: &mut D,
    options: ReconcileOptions<'_>,
    changes: &mut Vec<Change>,
) -> Result<(), DocumentError> {
    let ids = instantiate(src, dest, changes)?;

    let keep: AHashSet<ObjectId> = ids.values().copied().collect();
    for id in dest.object_ids() {
        if !keep.contains(&id) {
            dest.destroy_object(id)?;
            tracing::trace!(message = "undo.reconcile.destroy", object = %id);
            changes.push(Change::ObjectDestroyed { id });
        }
    }

    let live = |id: ObjectId| ids.get(&id).copied().ok_or(DocumentError::ObjectNotFound(id));

    for record in src.objects() {
        let id = live(record.id)?;
        let parent = record.parent.map(live).transpose()?;
        let info = dest
            .object_info(id)
            .ok_or(DocumentError::ObjectNotFound(id))?;
        if info.parent != parent || info.position != record.position {
            dest.link_object(id, parent, record.position)?;
            changes.push(Change::ObjectMoved {
                id,
                parent,
                position: record.position,
            });
        }
    }

    let translate = |id: ObjectId| ids.get(&id).copied();
    for record in src.objects() {
        let id = live(record.id)?;
        for (name, value) in &record.properties {
            if options.excludes(name) {
                continue;
            }
            let path = PropertyPath::property(name.clone());
            let wanted = value.map_refs(&translate);
            match dest.value(id, &path) {
                Some(current) => {
                    reconcile_value(dest, id, &path, &wanted, &current, options, changes)?;
                }
                None => set(dest, id, &path, wanted, changes)?,
            }
        }
    }
    Ok(())
}

/// Match or create every snapshot object, returning snapshot id -> live id.
fn instantiate<D: Document + ?Sized>(
    src: &DocumentSnapshot,
    dest: &mut D,
    changes: &mut Vec<Change>,
) -> Result<AHashMap<ObjectId, ObjectId>, DocumentError> {
    let mut ids = AHashMap::with_capacity(src.len());
    for record in src.objects() {
        let existing = dest.resolve_reference(record.id).filter(|live| {
            dest.object_info(*live)
                .is_some_and(|info| info.type_name == record.type_name)
        });
        let live = match existing {
            Some(live) => live,
            None => {
                if dest.contains(record.id) {
                    // Same identity, different type: the old object cannot be patched.
                    dest.destroy_object(record.id)?;
                    changes.push(Change::ObjectDestroyed { id: record.id });
                }
                let live = dest.create_object(&record.type_name, record.id)?;
                tracing::trace!(
                    message = "undo.reconcile.create",
                    object = %live,
                    type_name = %record.type_name
                );
                changes.push(Change::ObjectCreated {
                    id: live,
                    type_name: record.type_name.clone(),
                });
                live
            }
        };
        ids.insert(record.id, live);
    }
    Ok(ids)
}

fn set<D: Document + ?Sized>(
    dest: &mut D,
    id: ObjectId,
    path: &PropertyPath,
    value: Value,
    changes: &mut Vec<Change>,
) -> Result<(), DocumentError> {
    dest.set_value(id, path, value)?;
    tracing::trace!(message = "undo.reconcile.set", object = %id, path = %path);
    changes.push(Change::ValueChanged {
        id,
        path: path.clone(),
    });
    Ok(())
}

fn reconcile_value<D: Document + ?Sized>(
    dest: &mut D,
    id: ObjectId,
    path: &PropertyPath,
    wanted: &Value,
    current: &Value,
    options: ReconcileOptions<'_>,
    changes: &mut Vec<Change>,
) -> Result<(), DocumentError> {
    match (wanted, current) {
        (Value::Struct(w), Value::Struct(c)) if w.same_schema(c) => {
            for ((name, wv), (_, cv)) in w.fields.iter().zip(&c.fields) {
                if options.excludes(name) {
                    continue;
                }
                reconcile_value(dest, id, &path.key(name.clone()), wv, cv, options, changes)?;
            }
            Ok(())
        }
        (Value::Table(w), Value::Table(c)) if w.kind == c.kind => match w.kind {
            TableKind::Array => reconcile_array(dest, id, path, w, c, options, changes),
            TableKind::Keyed => reconcile_keyed(dest, id, path, w, c, options, changes),
        },
        _ if wanted.same_as(current) => Ok(()),
        _ => set(dest, id, path, wanted.clone(), changes),
    }
}

fn reconcile_array<D: Document + ?Sized>(
    dest: &mut D,
    id: ObjectId,
    path: &PropertyPath,
    wanted: &Table,
    current: &Table,
    options: ReconcileOptions<'_>,
    changes: &mut Vec<Change>,
) -> Result<(), DocumentError> {
    let common = wanted.len().min(current.len());
    for i in 0..common {
        let (w, c) = (&wanted.entries[i], &current.entries[i]);
        if w.key == c.key {
            reconcile_value(dest, id, &path.index(i), &w.value, &c.value, options, changes)?;
        } else {
            dest.remove_entry(id, path, i)?;
            dest.insert_entry(id, path, i, w.key.clone(), w.value.clone())?;
            changes.push(Change::EntryRemoved {
                id,
                table: path.clone(),
                index: i,
            });
            changes.push(Change::EntryInserted {
                id,
                table: path.clone(),
                index: i,
            });
        }
    }
    for i in (wanted.len()..current.len()).rev() {
        dest.remove_entry(id, path, i)?;
        changes.push(Change::EntryRemoved {
            id,
            table: path.clone(),
            index: i,
        });
    }
    for (i, entry) in wanted.entries.iter().enumerate().skip(common) {
        dest.insert_entry(id, path, i, entry.key.clone(), entry.value.clone())?;
        changes.push(Change::EntryInserted {
            id,
            table: path.clone(),
            index: i,
        });
    }
    Ok(())
}

fn reconcile_keyed<D: Document + ?Sized>(
    dest: &mut D,
    id: ObjectId,
    path: &PropertyPath,
    wanted: &Table,
    current: &Table,
    options: ReconcileOptions<'_>,
    changes: &mut Vec<Change>,
) -> Result<(), DocumentError> {
    // Mirror of dest's entry order as it is patched in place.
    let mut mirror: Vec<TableEntry> = current.entries.clone();

    for (target, entry) in wanted.entries.iter().enumerate() {
        let found = match &entry.key {
            Some(key) => mirror
                .iter()
                .skip(target)
                .position(|e| e.key.as_deref() == Some(key.as_str()))
                .map(|p| p + target),
            None => mirror
                .get(target)
                .is_some_and(|e| e.key.is_none())
                .then_some(target),
        };

        match found {
            Some(from) => {
                if from != target {
                    let value = dest.remove_entry(id, path, from)?;
                    let moved = mirror.remove(from);
                    dest.insert_entry(id, path, target, moved.key.clone(), value)?;
                    mirror.insert(target, moved);
                    changes.push(Change::EntryMoved {
                        id,
                        table: path.clone(),
                        from,
                        to: target,
                    });
                }
                let current_value = mirror[target].value.clone();
                reconcile_value(
                    dest,
                    id,
                    &path.index(target),
                    &entry.value,
                    &current_value,
                    options,
                    changes,
                )?;
                mirror[target].value = entry.value.clone();
            }
            None => {
                dest.insert_entry(id, path, target, entry.key.clone(), entry.value.clone())?;
                mirror.insert(target, entry.clone());
                changes.push(Change::EntryInserted {
                    id,
                    table: path.clone(),
                    index: target,
                });
            }
        }
    }

    while mirror.len() > wanted.len() {
        let index = mirror.len() - 1;
        dest.remove_entry(id, path, index)?;
        mirror.pop();
        changes.push(Change::EntryRemoved {
            id,
            table: path.clone(),
            index,
        });
    }
    Ok(())
}
