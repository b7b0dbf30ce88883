//! Pointer-driven drag sessions.
//!
//! A press only becomes a drag once the pointer has moved beyond
//! [`DRAG_THRESHOLD_PX`], so plain clicks on a row never reorder anything.

use super::ReorderRequest;
use crate::state::EntityId;

/// Movement threshold in pixels to start dragging
pub const DRAG_THRESHOLD_PX: i32 = 5;

/// Where the dragged entity would land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// After this sibling, optionally in an explicit parent
    Entity {
        id: EntityId,
        parent: Option<EntityId>,
    },
    /// At the end of this parent (e.g. an empty category)
    Parent(EntityId),
}

/// State of one drag interaction.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    threshold: i32,
    /// Pressed entity and press position, before the threshold is crossed
    pending: Option<(EntityId, i32, i32)>,
    dragging: Option<EntityId>,
    target: Option<DropTarget>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::with_threshold(DRAG_THRESHOLD_PX)
    }

    pub fn with_threshold(threshold: i32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Pointer pressed on a draggable entity
    pub fn press(&mut self, id: EntityId, x: i32, y: i32) {
        self.pending = Some((id, x, y));
        self.dragging = None;
        self.target = None;
    }

    /// Pointer moved. Returns `true` when this movement started the drag.
    pub fn motion(&mut self, x: i32, y: i32) -> bool {
        if self.dragging.is_some() {
            return false;
        }
        let Some((id, start_x, start_y)) = self.pending else {
            return false;
        };
        let dx = (x - start_x).abs();
        let dy = (y - start_y).abs();
        if dx > self.threshold || dy > self.threshold {
            tracing::trace!(id, "Drag started");
            self.dragging = Some(id);
            return true;
        }
        false
    }

    /// Pointer entered a potential drop target. Dropping onto itself is ignored.
    pub fn hover(&mut self, target: DropTarget) {
        let Some(dragging) = self.dragging else {
            return;
        };
        if matches!(target, DropTarget::Entity { id, .. } if id == dragging) {
            return;
        }
        self.target = Some(target);
    }

    /// Pointer left the current drop target
    pub fn leave(&mut self) {
        self.target = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    pub fn dragging(&self) -> Option<EntityId> {
        self.dragging
    }

    pub fn target(&self) -> Option<DropTarget> {
        self.target
    }

    /// Abort without reordering
    pub fn cancel(&mut self) {
        self.pending = None;
        self.dragging = None;
        self.target = None;
    }

    /// Pointer released. Returns the reorder to dispatch, if the interaction
    /// was a drag that ended over a target.
    pub fn release(&mut self) -> Option<ReorderRequest> {
        let dragging = self.dragging.take();
        let target = self.target.take();
        self.pending = None;

        let id = dragging?;
        let request = match target? {
            DropTarget::Entity { id: target, parent } => ReorderRequest {
                id,
                target_id: Some(target),
                target_parent_id: parent,
            },
            DropTarget::Parent(parent) => ReorderRequest {
                id,
                target_id: None,
                target_parent_id: Some(parent),
            },
        };
        tracing::debug!(?request, "Drag released over target");
        Some(request)
    }
}
