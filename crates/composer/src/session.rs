#![forbid(unsafe_code)]

//! One editing session: a host document and its animation curves under a
//! single undo history.
//!
//! # Recording
//!
//! Every committed edit becomes exactly one undo entry. The entry's
//! snapshot covers the document; its auxiliary blob carries the whole curve
//! registry as JSON, so restoring a position restores both together:
//!
//! ```text
//!   position:   0 (baseline)    1              2
//!   document:   snapshot        snapshot       snapshot
//!   curves:     baseline aux    entry aux      entry aux
//! ```
//!
//! Intermediate drag updates edit the curve model in place and record
//! nothing; the drag's release records one entry describing its net effect.
//!
//! # Invariants
//!
//! 1. After any successful undo/redo/jump, the curve registry equals the one
//!    stored with the new position.
//! 2. A failed document restore leaves both the document and the curves
//!    untouched.
//! 3. Undo, redo, jumps, recorded edits and composite boundaries first
//!    cancel an in-flight drag, so no entry ever holds a half-finished drag.

use std::fmt;

use composer_curve::{
    CurveDataType, CurveDragger, CurveModel, CurveModelState, DragOutcome, DragTarget, HandleType,
    Interpolation, Point, Tangent, Viewport, hit_test,
};
use composer_undo::{AuxState, Document, StepReport, UndoEngine};

use crate::config::EditorConfig;
use crate::error::SessionError;

/// A document, its curves, and their shared undo history.
pub struct EditorSession<D: Document> {
    document: D,
    curves: CurveModel,
    history: UndoEngine,
    viewport: Viewport,
    dragger: CurveDragger,
    /// Curve registry at the outermost `begin_composite`, for abort.
    composite_curves: Option<CurveModelState>,
}

impl<D: Document> fmt::Debug for EditorSession<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("curves", &self.curves.len())
            .field("history_size", &self.history.size())
            .field("history_index", &self.history.index())
            .field("drag_active", &self.dragger.is_active())
            .finish()
    }
}

impl<D: Document> EditorSession<D> {
    /// Start a session. The current document and an empty curve registry
    /// form the baseline.
    pub fn new(document: D, config: &EditorConfig) -> Result<Self, SessionError> {
        let curves = CurveModel::new(config.curve.clone());
        let mut history = UndoEngine::new(&document, config.undo.clone());
        history.set_baseline_aux(Some(encode(&curves)?));
        tracing::debug!(
            message = "session.new",
            max_depth = config.undo.max_depth,
            sample_step = config.curve.sample_step
        );
        Ok(Self {
            document,
            curves,
            history,
            viewport: Viewport::new(&config.viewport),
            dragger: CurveDragger::new(),
            composite_curves: None,
        })
    }

    /// [`new`](Self::new) with [`EditorConfig::default`].
    pub fn with_default_config(document: D) -> Result<Self, SessionError> {
        Self::new(document, &EditorConfig::default())
    }

    // ====================================================================
    // Accessors
    // ====================================================================

    #[must_use]
    pub fn document(&self) -> &D {
        &self.document
    }

    /// Mutable document access. Changes made here are recorded by the next
    /// [`commit`](Self::commit) or recording operation.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    #[must_use]
    pub fn curves(&self) -> &CurveModel {
        &self.curves
    }

    /// Mutable curve access, for observers and uncommitted edits.
    pub fn curves_mut(&mut self) -> &mut CurveModel {
        &mut self.curves
    }

    #[must_use]
    pub fn history(&self) -> &UndoEngine {
        &self.history
    }

    /// Mutable history access, for exclusion hooks and change observers.
    pub fn history_mut(&mut self) -> &mut UndoEngine {
        &mut self.history
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    #[must_use]
    pub fn dragger(&self) -> &CurveDragger {
        &self.dragger
    }

    /// Give the document back, ending the session.
    pub fn into_document(self) -> D {
        self.document
    }

    // ====================================================================
    // Document edits
    // ====================================================================

    /// Run `edit` on the document and record the result as one entry.
    pub fn edit<R>(
        &mut self,
        description: &str,
        edit: impl FnOnce(&mut D) -> R,
    ) -> Result<R, SessionError> {
        self.cancel_drag_for("edit");
        let result = edit(&mut self.document);
        self.record(description, "")?;
        Ok(result)
    }

    /// [`edit`](Self::edit), coalescing with the previous entry when it
    /// carries the same non-empty `merge_id`.
    pub fn edit_merged<R>(
        &mut self,
        description: &str,
        merge_id: &str,
        edit: impl FnOnce(&mut D) -> R,
    ) -> Result<R, SessionError> {
        self.cancel_drag_for("edit");
        let result = edit(&mut self.document);
        self.record(description, merge_id)?;
        Ok(result)
    }

    /// Record the current document and curves as one entry.
    pub fn commit(&mut self, description: &str) -> Result<(), SessionError> {
        self.cancel_drag_for("edit");
        self.record(description, "")
    }

    // ====================================================================
    // Curve edits (one entry each when they change something; an active
    // drag is cancelled first)
    // ====================================================================

    pub fn add_curve(&mut self, name: &str, data_type: CurveDataType) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let changed = self.curves.add_curve(name, data_type);
        self.record_if(changed, "add curve")
    }

    pub fn remove_curve(&mut self, name: &str) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let changed = self.curves.remove_curve(name).is_some();
        self.record_if(changed, "remove curve")
    }

    pub fn insert_point(
        &mut self,
        curve: &str,
        key_frame: i32,
        value: f64,
        interpolation: Interpolation,
    ) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let changed = self
            .curves
            .insert_point(curve, key_frame, value, interpolation);
        self.record_if(changed, "insert point")
    }

    pub fn delete_point(&mut self, curve: &str, key_frame: i32) -> Result<Option<Point>, SessionError> {
        self.cancel_drag_for("edit");
        let removed = self.curves.delete_point(curve, key_frame);
        self.record_if(removed.is_some(), "delete point")?;
        Ok(removed)
    }

    pub fn set_value(&mut self, curve: &str, key_frame: i32, value: f64) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let changed = self.curves.set_value(curve, key_frame, value);
        self.record_if(changed, "set point value")
    }

    pub fn set_interpolation(
        &mut self,
        curve: &str,
        key_frame: i32,
        kind: Interpolation,
    ) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let unchanged = self
            .curves
            .curve(curve)
            .and_then(|c| c.point(key_frame))
            .is_some_and(|p| p.interpolation == kind);
        let found = self.curves.set_interpolation(curve, key_frame, kind);
        self.record_if(found && !unchanged, "set interpolation")?;
        Ok(found)
    }

    pub fn set_handle_type(
        &mut self,
        curve: &str,
        key_frame: i32,
        handle_type: HandleType,
    ) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let changed = self.curves.set_handle_type(curve, key_frame, handle_type);
        self.record_if(changed, "set handle type")
    }

    pub fn set_tangents(
        &mut self,
        curve: &str,
        key_frame: i32,
        left: Tangent,
        right: Tangent,
    ) -> Result<bool, SessionError> {
        self.cancel_drag_for("edit");
        let changed = self.curves.set_tangents(curve, key_frame, left, right);
        self.record_if(changed, "set tangents")
    }

    /// Value of `curve` at `frame`.
    #[must_use]
    pub fn evaluate(&self, curve: &str, frame: f64) -> Option<f64> {
        self.curves.evaluate(curve, frame)
    }

    /// Value of `curve` at the viewport's playhead.
    #[must_use]
    pub fn evaluate_at_playhead(&self, curve: &str) -> Option<f64> {
        self.curves.evaluate(curve, f64::from(self.viewport.playhead()))
    }

    // ====================================================================
    // Dragging
    // ====================================================================

    /// Press on whatever lies under pixel `(x, y)`.
    ///
    /// Returns the picked target, or `None` if nothing was hit.
    pub fn press_at(&mut self, x: f64, y: f64) -> Result<Option<DragTarget>, SessionError> {
        let radius = self.curves.config().hit_radius_px;
        let Some(target) = hit_test(&self.curves, &self.viewport, x, y, radius) else {
            return Ok(None);
        };
        let pressed = self.dragger.press(&self.curves, target.clone())?;
        Ok(pressed.then_some(target))
    }

    /// Press on an explicit target. `Ok(false)` if the point does not exist.
    pub fn press(&mut self, target: DragTarget) -> Result<bool, SessionError> {
        Ok(self.dragger.press(&self.curves, target)?)
    }

    /// Move the dragged part to pixel `(x, y)`. Records nothing.
    pub fn drag_to(&mut self, x: f64, y: f64) -> Result<bool, SessionError> {
        Ok(self
            .dragger
            .drag_to(&mut self.curves, &self.viewport, x, y)?)
    }

    /// Finish the drag, recording one entry if anything moved.
    pub fn release(&mut self) -> Result<Option<DragOutcome>, SessionError> {
        let Some(outcome) = self.dragger.release(&mut self.curves) else {
            return Ok(None);
        };
        self.record(outcome.description, "")?;
        Ok(Some(outcome))
    }

    /// Abandon the drag, restoring the curve as it was at press time.
    pub fn cancel_drag(&mut self) -> bool {
        self.dragger.cancel(&mut self.curves)
    }

    // ====================================================================
    // Composite transactions
    // ====================================================================

    /// Open a (possibly nested) transaction; edits inside record nothing
    /// until the outermost [`end_composite`](Self::end_composite).
    pub fn begin_composite(&mut self) {
        self.cancel_drag_for("composite");
        if !self.history.is_in_composite() {
            self.composite_curves = Some(self.curves.snapshot());
        }
        self.history.begin_composite(&self.document);
    }

    /// Close a transaction. At the outermost level, `abort` restores both
    /// the document and the curves to their state at the matching begin;
    /// otherwise one entry is recorded.
    ///
    /// The curves are restored even when the document restore fails; the
    /// returned error says whether the document was left intact.
    pub fn end_composite(&mut self, description: &str, abort: bool) -> Result<(), SessionError> {
        self.cancel_drag_for("composite");
        let aux = encode(&self.curves)?;
        let saved = match self.history.composite_depth() {
            1 => self.composite_curves.take(),
            _ => None,
        };
        let ended = self
            .history
            .end_composite_with_aux(&mut self.document, description, abort, Some(aux));
        if let Some(state) = saved.filter(|_| abort) {
            self.curves.restore(state);
        }
        ended?;
        Ok(())
    }

    // ====================================================================
    // Navigation
    // ====================================================================

    /// Step back one entry. `Ok(None)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<StepReport>, SessionError> {
        self.cancel_drag_for("navigation");
        match self.history.undo(&mut self.document) {
            None => Ok(None),
            Some(result) => self.apply_step(result?).map(Some),
        }
    }

    /// Step forward one entry. `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<Option<StepReport>, SessionError> {
        self.cancel_drag_for("navigation");
        match self.history.redo(&mut self.document) {
            None => Ok(None),
            Some(result) => self.apply_step(result?).map(Some),
        }
    }

    /// Jump to history position `index` (0 is the baseline).
    pub fn set_index(&mut self, index: usize, force: bool) -> Result<Option<StepReport>, SessionError> {
        self.cancel_drag_for("navigation");
        match self.history.set_index(&mut self.document, index, force)? {
            None => Ok(None),
            Some(report) => self.apply_step(report).map(Some),
        }
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Forget the history; the current document and curves become the
    /// baseline.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.dragger.cancel(&mut self.curves);
        self.composite_curves = None;
        self.history.reset(&self.document);
        self.history.set_baseline_aux(Some(encode(&self.curves)?));
        Ok(())
    }

    // ====================================================================
    // Internals
    // ====================================================================

    fn record(&mut self, description: &str, merge_id: &str) -> Result<(), SessionError> {
        let aux = encode(&self.curves)?;
        self.history
            .push_with_aux(&self.document, description, merge_id, Some(aux));
        Ok(())
    }

    fn record_if(&mut self, changed: bool, description: &str) -> Result<bool, SessionError> {
        if changed {
            self.record(description, "")?;
        }
        Ok(changed)
    }

    fn apply_step(&mut self, report: StepReport) -> Result<StepReport, SessionError> {
        match &report.aux {
            Some(aux) => {
                let state: CurveModelState =
                    serde_json::from_slice(aux).map_err(SessionError::AuxState)?;
                self.curves.restore(state);
            }
            None => tracing::debug!(message = "session.restore.no_curves", index = report.index),
        }
        Ok(report)
    }

    fn cancel_drag_for(&mut self, reason: &'static str) {
        if self.dragger.cancel(&mut self.curves) {
            tracing::debug!(message = "session.drag.cancelled", reason);
        }
    }
}

fn encode(curves: &CurveModel) -> Result<AuxState, SessionError> {
    serde_json::to_vec(&curves.snapshot())
        .map(AuxState::from)
        .map_err(SessionError::AuxState)
}
