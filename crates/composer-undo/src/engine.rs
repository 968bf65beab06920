#![forbid(unsafe_code)]

//! Snapshot-based undo/redo stack with composite transactions.
//!
//! [`UndoEngine`] stores one full [`DocumentSnapshot`] per committed edit.
//! Navigating the stack never replaces the live document wholesale: the
//! target snapshot is reconciled into it (see [`reconcile`](crate::reconcile())),
//! so unchanged objects keep their identity and observers only hear about
//! what actually changed.
//!
//! # Architecture
//!
//! ```text
//! push("a"), push("b"), push("c")
//! ┌────────────────────────────────────────────────────┐
//! │ baseline   entries: [a, b, c]                       │
//! │                               ^ index = 3           │
//! └────────────────────────────────────────────────────┘
//!
//! undo() x2 -> document restored to state after "a"
//! ┌────────────────────────────────────────────────────┐
//! │ baseline   entries: [a, b, c]                       │
//! │                       ^ index = 1  (b, c redoable)  │
//! └────────────────────────────────────────────────────┘
//!
//! push("d") -> redo tail discarded
//! ┌────────────────────────────────────────────────────┐
//! │ baseline   entries: [a, d]                          │
//! │                           ^ index = 2               │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! The state at position `i` is the baseline for `i == 0` and
//! `entries[i - 1]` otherwise.
//!
//! # Invariants
//!
//! 1. `0 <= index <= size()`.
//! 2. `can_undo() == (index > 0)`, `can_redo() == (index < size())`.
//! 3. A push truncates every entry at or after `index`.
//! 4. While a composite is open, pushes are ignored; only the outermost
//!    `end_composite` produces an entry.
//! 5. `size() <= config.max_depth`; evicted entries fold into the baseline.
//!
//! # Failure Modes
//!
//! - Reconciliation failure: `index` is left unchanged and the document is
//!   rolled back (see [`UndoError`]).
//! - Unbalanced composite end: debug assertion; ignored with a warning in
//!   release builds.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::error::UndoError;
use crate::reconcile::{Change, ReconcileOptions, reconcile};
use crate::snapshot::DocumentSnapshot;

/// Opaque host state stored alongside a snapshot (selection, editor
/// side-tables, ...). The engine never interprets it.
pub type AuxState = Arc<[u8]>;

/// Configuration for the undo engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UndoConfig {
    /// Maximum number of entries kept. Oldest entries are folded into the
    /// baseline when this limit is exceeded.
    pub max_depth: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self { max_depth: 1000 }
    }
}

impl UndoConfig {
    /// Create a configuration with the given depth limit.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Create an unlimited configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
        }
    }
}

/// One committed checkpoint.
#[derive(Debug, Clone)]
pub struct Entry {
    description: String,
    merge_id: String,
    snapshot: Arc<DocumentSnapshot>,
    aux: Option<AuxState>,
}

impl Entry {
    /// Human-readable description for UI.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Merge id used for coalescing (empty = never merges).
    #[must_use]
    pub fn merge_id(&self) -> &str {
        &self.merge_id
    }

    /// The document state after this entry.
    #[must_use]
    pub fn snapshot(&self) -> &Arc<DocumentSnapshot> {
        &self.snapshot
    }

    /// Host state stored with the entry.
    #[must_use]
    pub fn aux(&self) -> Option<&AuxState> {
        self.aux.as_ref()
    }
}

/// Outcome of a successful undo, redo or index jump.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Description of the entry that was undone or redone.
    pub description: String,
    /// Stack position after the step.
    pub index: usize,
    /// Mutations applied to the live document.
    pub changes: Vec<Change>,
    /// Host state stored with the restored position.
    pub aux: Option<AuxState>,
}

/// Handle returned by [`UndoEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(&Change)>;
type ExcludePredicate = Box<dyn Fn(&str) -> bool>;

/// Undo/redo stack of document snapshots.
pub struct UndoEngine {
    baseline: Arc<DocumentSnapshot>,
    baseline_aux: Option<AuxState>,
    entries: VecDeque<Entry>,
    index: usize,
    composite_depth: usize,
    composite_start: Option<Arc<DocumentSnapshot>>,
    config: UndoConfig,
    exclude: Option<ExcludePredicate>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for UndoEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoEngine")
            .field("size", &self.entries.len())
            .field("index", &self.index)
            .field("composite_depth", &self.composite_depth)
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}

impl UndoEngine {
    /// Create an engine whose baseline is the current state of `doc`.
    #[must_use]
    pub fn new<D: Document + ?Sized>(doc: &D, config: UndoConfig) -> Self {
        Self {
            baseline: Arc::new(DocumentSnapshot::capture(doc)),
            baseline_aux: None,
            entries: VecDeque::new(),
            index: 0,
            composite_depth: 0,
            composite_start: None,
            config,
            exclude: None,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Create an engine with default configuration.
    #[must_use]
    pub fn with_default_config<D: Document + ?Sized>(doc: &D) -> Self {
        Self::new(doc, UndoConfig::default())
    }

    // ====================================================================
    // Recording
    // ====================================================================

    /// Record the current document state as a new entry.
    pub fn push<D: Document + ?Sized>(&mut self, doc: &D, description: impl Into<String>) {
        self.push_with_aux(doc, description, "", None);
    }

    /// Record a new entry, coalescing with the previous one when both carry
    /// the same non-empty `merge_id` (e.g. a continuous slider drag).
    pub fn push_merged<D: Document + ?Sized>(
        &mut self,
        doc: &D,
        description: impl Into<String>,
        merge_id: &str,
    ) {
        self.push_with_aux(doc, description, merge_id, None);
    }

    /// Record a new entry together with opaque host state.
    pub fn push_with_aux<D: Document + ?Sized>(
        &mut self,
        doc: &D,
        description: impl Into<String>,
        merge_id: &str,
        aux: Option<AuxState>,
    ) {
        let description = description.into();
        if self.composite_depth > 0 {
            tracing::trace!(message = "undo.push.suppressed", description = %description);
            return;
        }

        let had_redo_tail = self.index < self.entries.len();
        self.entries.truncate(self.index);

        let snapshot = Arc::new(DocumentSnapshot::capture(doc));
        if let Some(last) = self.entries.back_mut().filter(|last| {
            !had_redo_tail && !merge_id.is_empty() && last.merge_id == merge_id
        }) {
            tracing::debug!(
                message = "undo.push.merged",
                description = %description,
                merge_id
            );
            last.snapshot = snapshot;
            last.aux = aux;
            last.description = description;
            return;
        }

        tracing::debug!(
            message = "undo.push",
            description = %description,
            merge_id,
            index = self.entries.len() + 1
        );
        self.entries.push_back(Entry {
            description,
            merge_id: merge_id.to_string(),
            snapshot,
            aux,
        });
        self.index = self.entries.len();
        self.enforce_depth();
    }

    /// Set the host state paired with the baseline (position 0).
    pub fn set_baseline_aux(&mut self, aux: Option<AuxState>) {
        self.baseline_aux = aux;
    }

    // ====================================================================
    // Composite transactions
    // ====================================================================

    /// Open a (possibly nested) composite transaction.
    pub fn begin_composite<D: Document + ?Sized>(&mut self, doc: &D) {
        if self.composite_depth == 0 {
            self.composite_start = Some(Arc::new(DocumentSnapshot::capture(doc)));
        }
        self.composite_depth += 1;
        tracing::debug!(message = "undo.composite.begin", depth = self.composite_depth);
    }

    /// Close a composite transaction.
    ///
    /// Only the outermost close has an effect: with `abort` the document is
    /// restored to its state at the matching [`begin_composite`] and nothing
    /// is recorded; otherwise a single entry is pushed.
    ///
    /// [`begin_composite`]: Self::begin_composite
    pub fn end_composite<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        description: impl Into<String>,
        abort: bool,
    ) -> Result<(), UndoError> {
        self.end_composite_with_aux(doc, description, abort, None)
    }

    /// [`end_composite`](Self::end_composite) with host state for the entry.
    pub fn end_composite_with_aux<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        description: impl Into<String>,
        abort: bool,
        aux: Option<AuxState>,
    ) -> Result<(), UndoError> {
        debug_assert!(
            self.composite_depth > 0,
            "end_composite without matching begin_composite"
        );
        if self.composite_depth == 0 {
            tracing::warn!(message = "undo.composite.unbalanced");
            return Ok(());
        }
        self.composite_depth -= 1;
        tracing::debug!(
            message = "undo.composite.end",
            depth = self.composite_depth,
            abort
        );
        if self.composite_depth > 0 {
            return Ok(());
        }

        let start = self.composite_start.take();
        if abort {
            if let Some(start) = start {
                let changes = reconcile(&start, doc, self.options())?;
                self.notify(&changes);
            }
            return Ok(());
        }
        self.push_with_aux(doc, description, "", aux);
        Ok(())
    }

    /// True while a composite transaction is open.
    #[must_use]
    pub fn is_in_composite(&self) -> bool {
        self.composite_depth > 0
    }

    /// Current composite nesting depth.
    #[must_use]
    pub fn composite_depth(&self) -> usize {
        self.composite_depth
    }

    // ====================================================================
    // Navigation
    // ====================================================================

    /// Undo the entry before the current position.
    ///
    /// # Returns
    ///
    /// - `Some(Ok(report))` if the document was restored
    /// - `Some(Err(error))` if restoring failed (position unchanged)
    /// - `None` if there is nothing to undo
    pub fn undo<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
    ) -> Option<Result<StepReport, UndoError>> {
        if !self.can_undo() {
            return None;
        }
        let description = self.entries[self.index - 1].description.clone();
        Some(self.restore(doc, self.index - 1, description))
    }

    /// Redo the entry at the current position.
    ///
    /// Mirrors [`undo`](Self::undo).
    pub fn redo<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
    ) -> Option<Result<StepReport, UndoError>> {
        if !self.can_redo() {
            return None;
        }
        let description = self.entries[self.index].description.clone();
        Some(self.restore(doc, self.index + 1, description))
    }

    /// Jump directly to stack position `index`.
    ///
    /// Returns `Ok(None)` when already there and `force` is false.
    pub fn set_index<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        index: usize,
        force: bool,
    ) -> Result<Option<StepReport>, UndoError> {
        if index > self.entries.len() {
            tracing::warn!(message = "undo.set_index.rejected", index, size = self.entries.len());
            return Err(UndoError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        if index == self.index && !force {
            return Ok(None);
        }
        let description = self.description(index).unwrap_or_default().to_string();
        self.restore(doc, index, description).map(Some)
    }

    fn restore<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        target: usize,
        description: String,
    ) -> Result<StepReport, UndoError> {
        let (snapshot, aux) = match target.checked_sub(1) {
            None => (Arc::clone(&self.baseline), self.baseline_aux.clone()),
            Some(i) => {
                let entry = &self.entries[i];
                (Arc::clone(&entry.snapshot), entry.aux.clone())
            }
        };
        let changes = reconcile(&snapshot, doc, self.options())?;
        tracing::debug!(
            message = "undo.restore",
            from = self.index,
            to = target,
            changes = changes.len()
        );
        self.index = target;
        self.notify(&changes);
        Ok(StepReport {
            description,
            index: target,
            changes,
            aux,
        })
    }

    // ====================================================================
    // Query
    // ====================================================================

    /// Number of entries (excluding the baseline).
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Current position.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index < self.entries.len()
    }

    /// Description of the state at position `index` (`"Initial"` for the
    /// baseline).
    #[must_use]
    pub fn description(&self, index: usize) -> Option<&str> {
        match index.checked_sub(1) {
            None => Some("Initial"),
            Some(i) => self.entries.get(i).map(Entry::description),
        }
    }

    /// Entry at list position `i` (0-based, excluding the baseline).
    #[must_use]
    pub fn entry(&self, i: usize) -> Option<&Entry> {
        self.entries.get(i)
    }

    /// Host state stored for position `index`.
    #[must_use]
    pub fn aux(&self, index: usize) -> Option<&AuxState> {
        match index.checked_sub(1) {
            None => self.baseline_aux.as_ref(),
            Some(i) => self.entries.get(i).and_then(Entry::aux),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    // ====================================================================
    // Hooks
    // ====================================================================

    /// Skip properties (and struct fields) whose name matches `predicate`
    /// when restoring, e.g. transient UI-only state.
    pub fn set_exclude_property(&mut self, predicate: impl Fn(&str) -> bool + 'static) {
        self.exclude = Some(Box::new(predicate));
    }

    /// Remove the exclusion hook.
    pub fn clear_exclude_property(&mut self) {
        self.exclude = None;
    }

    /// Register a callback invoked for every change applied by a restore.
    pub fn subscribe(&mut self, observer: impl Fn(&Change) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    // ====================================================================
    // Maintenance
    // ====================================================================

    /// Drop all entries and make the current state of `doc` the baseline.
    pub fn reset<D: Document + ?Sized>(&mut self, doc: &D) {
        self.entries.clear();
        self.index = 0;
        self.composite_depth = 0;
        self.composite_start = None;
        self.baseline = Arc::new(DocumentSnapshot::capture(doc));
        self.baseline_aux = None;
        tracing::debug!(message = "undo.reset");
    }

    fn options(&self) -> ReconcileOptions<'_> {
        ReconcileOptions {
            exclude_property: self.exclude.as_deref(),
        }
    }

    fn notify(&self, changes: &[Change]) {
        for change in changes {
            for (_, observer) in &self.observers {
                observer(change);
            }
        }
    }

    /// Fold the oldest entries into the baseline until the depth limit holds.
    fn enforce_depth(&mut self) {
        while self.entries.len() > self.config.max_depth {
            let Some(oldest) = self.entries.pop_front() else {
                break;
            };
            self.baseline = oldest.snapshot;
            self.baseline_aux = oldest.aux;
            self.index = self.index.saturating_sub(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
