#![forbid(unsafe_code)]

//! End-to-end tests for undo navigation against host documents.
//!
//! Covers:
//! - Hosts whose factory cannot honor the requested identity (references are
//!   remapped through `resolve_reference`).
//! - Failed steps leave both the document and the stack position untouched.
//! - Reconciliation diagnostics: the `undo.reconcile` span and its events.
//!
//! Run:
//!   cargo test -p composer-undo --test e2e_reconcile

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use composer_undo::{
    Change, Document, DocumentError, DocumentSnapshot, ObjectId, ObjectInfo, PropertyDescriptor,
    PropertyPath, PropertyTree, TypeRegistry, UndoConfig, UndoEngine, UndoError, Value,
};

// ============================================================================
// Host document that allocates its own identities
// ============================================================================

/// Wraps a [`PropertyTree`] but ignores requested ids on creation, the way
/// an engine with its own handle allocator would.
struct AllocatingHost {
    inner: PropertyTree,
    aliases: HashMap<ObjectId, ObjectId>,
    next: u64,
    refuse_create: bool,
}

impl AllocatingHost {
    fn new() -> Self {
        let registry = TypeRegistry::new()
            .with_type("Mesh", [("vertices", Value::Int(0))])
            .with_type(
                "Instance",
                [("mesh", Value::Ref(None)), ("visible", Value::Bool(true))],
            );
        Self {
            inner: PropertyTree::new(registry),
            aliases: HashMap::new(),
            next: 1000,
            refuse_create: false,
        }
    }
}

impl Document for AllocatingHost {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.inner.object_ids()
    }

    fn object_info(&self, id: ObjectId) -> Option<ObjectInfo> {
        self.inner.object_info(id)
    }

    fn properties(&self, id: ObjectId) -> Vec<PropertyDescriptor> {
        self.inner.properties(id)
    }

    fn value(&self, id: ObjectId, path: &PropertyPath) -> Option<Value> {
        self.inner.value(id, path)
    }

    fn set_value(
        &mut self,
        id: ObjectId,
        path: &PropertyPath,
        value: Value,
    ) -> Result<(), DocumentError> {
        self.inner.set_value(id, path, value)
    }

    fn insert_entry(
        &mut self,
        id: ObjectId,
        table: &PropertyPath,
        index: usize,
        key: Option<String>,
        value: Value,
    ) -> Result<(), DocumentError> {
        self.inner.insert_entry(id, table, index, key, value)
    }

    fn remove_entry(
        &mut self,
        id: ObjectId,
        table: &PropertyPath,
        index: usize,
    ) -> Result<Value, DocumentError> {
        self.inner.remove_entry(id, table, index)
    }

    fn create_object(&mut self, type_name: &str, id: ObjectId) -> Result<ObjectId, DocumentError> {
        if self.refuse_create {
            return Err(DocumentError::UnknownType {
                type_name: type_name.to_string(),
            });
        }
        let fresh = ObjectId::new(self.next);
        self.next += 1;
        let live = self.inner.create_object(type_name, fresh)?;
        self.aliases.insert(id, live);
        Ok(live)
    }

    fn link_object(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
        position: usize,
    ) -> Result<(), DocumentError> {
        self.inner.link_object(id, parent, position)
    }

    fn destroy_object(&mut self, id: ObjectId) -> Result<(), DocumentError> {
        self.inner.destroy_object(id)
    }

    fn resolve_reference(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = id;
        loop {
            if self.inner.contains(current) {
                return Some(current);
            }
            current = *self.aliases.get(&current)?;
        }
    }
}

fn scene() -> (AllocatingHost, ObjectId, ObjectId) {
    let mut host = AllocatingHost::new();
    let mesh = host.inner.add_object("Mesh", None).unwrap();
    let instance = host.inner.add_object("Instance", None).unwrap();
    host.inner
        .set(instance, "mesh", Value::Ref(Some(mesh)))
        .unwrap();
    (host, mesh, instance)
}

fn delete_mesh(host: &mut AllocatingHost, engine: &mut UndoEngine, mesh: ObjectId, instance: ObjectId) {
    host.inner.set(instance, "mesh", Value::Ref(None)).unwrap();
    host.destroy_object(mesh).unwrap();
    engine.push(&*host, "delete mesh");
}

// ============================================================================
// Identity remapping
// ============================================================================

#[test]
fn recreated_object_gets_references_retargeted() {
    let (mut host, mesh, instance) = scene();
    let mut engine = UndoEngine::new(&host, UndoConfig::default());
    delete_mesh(&mut host, &mut engine, mesh, instance);

    let report = engine.undo(&mut host).unwrap().unwrap();
    let recreated = report
        .changes
        .iter()
        .find_map(|c| match c {
            Change::ObjectCreated { id, .. } => Some(*id),
            _ => None,
        })
        .expect("mesh recreated");

    assert_ne!(recreated, mesh);
    assert_eq!(host.resolve_reference(mesh), Some(recreated));
    assert_eq!(
        host.inner.get(instance, "mesh"),
        Some(&Value::Ref(Some(recreated)))
    );
    assert_eq!(host.inner.roots(), &[recreated, instance]);
}

#[test]
fn redo_then_undo_again_follows_the_newest_identity() {
    let (mut host, mesh, instance) = scene();
    let mut engine = UndoEngine::new(&host, UndoConfig::default());
    delete_mesh(&mut host, &mut engine, mesh, instance);

    engine.undo(&mut host).unwrap().unwrap();
    let first = host.resolve_reference(mesh).unwrap();

    let report = engine.redo(&mut host).unwrap().unwrap();
    assert!(report.changes.contains(&Change::ObjectDestroyed { id: first }));
    assert!(!host.contains(first));
    assert_eq!(host.inner.get(instance, "mesh"), Some(&Value::Ref(None)));

    engine.undo(&mut host).unwrap().unwrap();
    let second = host.resolve_reference(mesh).unwrap();
    assert_ne!(second, first);
    assert_eq!(
        host.inner.get(instance, "mesh"),
        Some(&Value::Ref(Some(second)))
    );
}

#[test]
fn untouched_objects_keep_identity_across_steps() {
    let (mut host, mesh, instance) = scene();
    let mut engine = UndoEngine::new(&host, UndoConfig::default());
    host.inner.set(mesh, "vertices", 12i64).unwrap();
    engine.push(&host, "edit mesh");

    let report = engine.undo(&mut host).unwrap().unwrap();
    assert_eq!(
        report.changes,
        vec![Change::ValueChanged {
            id: mesh,
            path: PropertyPath::property("vertices"),
        }]
    );
    assert!(host.contains(mesh));
    assert!(host.contains(instance));
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn failed_undo_keeps_document_and_position() {
    let (mut host, mesh, instance) = scene();
    let mut engine = UndoEngine::new(&host, UndoConfig::default());
    delete_mesh(&mut host, &mut engine, mesh, instance);
    host.inner.set(instance, "visible", false).unwrap();
    let before = DocumentSnapshot::capture(&host);

    host.refuse_create = true;
    let err = engine.undo(&mut host).unwrap().unwrap_err();

    assert!(matches!(err, UndoError::Reconcile { .. }));
    assert!(err.document_intact());
    assert_eq!(engine.index(), 1);
    assert_eq!(DocumentSnapshot::capture(&host), before);

    host.refuse_create = false;
    engine.undo(&mut host).unwrap().unwrap();
    assert_eq!(engine.index(), 0);
}

// ============================================================================
// Tracing capture
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    parent_span_name: Option<String>,
}

struct SpanCapture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    span_index: Arc<Mutex<HashMap<u64, usize>>>,
}

struct CaptureHandle {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureHandle {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        for field in attrs.metadata().fields() {
            fields.entry(field.name().to_string()).or_default();
        }
        let mut spans = self.spans.lock().unwrap();
        self.span_index
            .lock()
            .unwrap()
            .insert(id.into_u64(), spans.len());
        spans.push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields,
        });
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        let index = self.span_index.lock().unwrap();
        if let Some(&idx) = index.get(&id.into_u64()) {
            if let Some(span) = self.spans.lock().unwrap().get_mut(idx) {
                span.fields.extend(visitor.0);
            }
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let message = visitor
            .0
            .iter()
            .find(|(k, _)| k == "message")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let parent_span_name = ctx
            .current_span()
            .id()
            .and_then(|id| ctx.span(id))
            .map(|span_ref| span_ref.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            parent_span_name,
        });
    }
}

fn with_captured_spans<F: FnOnce()>(f: F) -> CaptureHandle {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = SpanCapture {
        spans: Arc::clone(&spans),
        events: Arc::clone(&events),
        span_index: Arc::new(Mutex::new(HashMap::new())),
    };
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { spans, events }
}

#[test]
fn reconcile_emits_span_with_change_count() {
    let handle = with_captured_spans(|| {
        let (mut host, mesh, _) = scene();
        let mut engine = UndoEngine::new(&host, UndoConfig::default());
        host.inner.set(mesh, "vertices", 3i64).unwrap();
        engine.push(&host, "edit");
        engine.undo(&mut host).unwrap().unwrap();
    });

    let spans = handle.spans();
    let span = spans
        .iter()
        .find(|s| s.name == "undo.reconcile")
        .expect("reconcile span");
    assert_eq!(span.fields.get("objects").map(String::as_str), Some("2"));
    assert_eq!(span.fields.get("changes").map(String::as_str), Some("1"));

    let events = handle.events();
    let set = events
        .iter()
        .find(|e| e.message == "undo.reconcile.set")
        .expect("set event");
    assert_eq!(set.level, tracing::Level::TRACE);
    assert_eq!(set.parent_span_name.as_deref(), Some("undo.reconcile"));
    assert!(events.iter().any(|e| e.message == "undo.push"));
    assert!(events.iter().any(|e| e.message == "undo.restore"));
}

#[test]
fn rollback_is_logged_as_warning() {
    let handle = with_captured_spans(|| {
        let (mut host, mesh, instance) = scene();
        let mut engine = UndoEngine::new(&host, UndoConfig::default());
        delete_mesh(&mut host, &mut engine, mesh, instance);
        host.refuse_create = true;
        let _ = engine.undo(&mut host);
    });

    let events = handle.events();
    let rollback = events
        .iter()
        .find(|e| e.message == "undo.reconcile.rollback")
        .expect("rollback event");
    assert_eq!(rollback.level, tracing::Level::WARN);
}
