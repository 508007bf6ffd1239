//! Session state types and completion events.
//!
//! This module contains the editing-mode state machine and the events that
//! background store requests send back to the controller.

use super::placement::Pixel;
use super::surface::MarkerHandle;
use crate::error::AppError;
use crate::geometry::{GeometryKind, GeometryRecord, RecordId};
use std::fmt;

/// Which map input is currently meaningful.
///
/// Modes are mutually exclusive:
/// `None` -> `Add*` (armed, then drafting) -> `None` (on save or cancel)
/// `None` -> `MapDragUpdate` | `VertexEdit` (editing a selected record) -> `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditingMode {
    #[default]
    None,
    AddPoint,
    AddLine,
    AddPolygon,
    /// Dragging the marker of a selected point.
    MapDragUpdate,
    /// Direct vertex manipulation of a selected line or polygon.
    VertexEdit,
}

impl EditingMode {
    /// The add mode for a geometry kind.
    pub fn adding(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Point => Self::AddPoint,
            GeometryKind::LineString => Self::AddLine,
            GeometryKind::Polygon => Self::AddPolygon,
        }
    }

    /// The kind being added, if this is an add mode.
    pub fn adding_kind(self) -> Option<GeometryKind> {
        match self {
            Self::AddPoint => Some(GeometryKind::Point),
            Self::AddLine => Some(GeometryKind::LineString),
            Self::AddPolygon => Some(GeometryKind::Polygon),
            _ => None,
        }
    }
}

/// Identity of a stored record across collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub kind: GeometryKind,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(kind: GeometryKind, id: impl Into<RecordId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn of(record: &GeometryRecord) -> Option<Self> {
        record.id.clone().map(|id| Self {
            kind: record.kind,
            id,
        })
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Identity of a draft, so late create responses can be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftId(pub(crate) u64);

/// An unsaved geometry awaiting its name.
#[derive(Debug, Clone)]
pub struct PendingDraft {
    pub id: DraftId,
    /// Kind and geographic coordinates; the name is filled in on commit.
    pub record: GeometryRecord,
    /// The draft geometry on the overlay layer.
    pub marker: MarkerHandle,
    /// Circle around the placed point, or around the last vertex.
    pub highlight: MarkerHandle,
    /// A create request for this draft is outstanding.
    pub committing: bool,
}

/// An existing record the user is looking at or editing.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Bumped on every new selection so late update responses can be matched.
    pub generation: u64,
    pub record: GeometryRecord,
    /// The persisted marker currently representing the record.
    pub marker: Option<MarkerHandle>,
}

impl Selection {
    pub fn record_ref(&self) -> Option<RecordRef> {
        RecordRef::of(&self.record)
    }

    pub fn is(&self, target: &RecordRef) -> bool {
        self.record.kind == target.kind && self.record.id.as_ref() == Some(&target.id)
    }
}

/// Contextual panels. At most one is visible.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    /// Name entry for the current draft.
    NameEntry { kind: GeometryKind },
    /// Edit/detail panel of a selected record.
    RecordDetail { record: RecordRef },
    /// Blocking confirmation before a delete is issued.
    ConfirmDelete { record: RecordRef },
}

/// A visible panel and its top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub panel: Panel,
    pub position: Pixel,
}

/// Events received from background store requests.
///
/// Each carries the ticket it was issued under; the controller compares it
/// against current state before applying anything.
pub(crate) enum Completion {
    Created {
        draft: DraftId,
        kind: GeometryKind,
        result: Result<GeometryRecord, AppError>,
    },
    Updated {
        record: RecordRef,
        /// Selection generation at issue time, if the record was selected.
        selection: Option<u64>,
        result: Result<(), AppError>,
    },
    Deleted {
        record: RecordRef,
        result: Result<(), AppError>,
    },
    Fetched {
        record: RecordRef,
        /// Latest fetch at issue time; only that one opens its panel.
        ticket: u64,
        result: Result<GeometryRecord, AppError>,
    },
    Loaded {
        kind: GeometryKind,
        generation: u64,
        /// User asked for the table, so an empty result is reported.
        user_query: bool,
        result: Result<Vec<GeometryRecord>, AppError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_modes_round_trip_kinds() {
        for kind in GeometryKind::ALL {
            assert_eq!(EditingMode::adding(kind).adding_kind(), Some(kind));
        }
        assert_eq!(EditingMode::VertexEdit.adding_kind(), None);
    }
}
