//! Pointer gesture helpers.
//!
//! Small, surface-independent pieces of input handling: telling a drag from a
//! click, and accumulating the vertices of a line or polygon being drawn.

use super::placement::Pixel;
use crate::geometry::GeometryKind;
use crate::projection::MapPoint;

/// Minimum pointer travel (in pixels) for a drag to count as a move.
pub const MIN_DRAG_DISTANCE: f64 = 3.0;

/// Determines if a pointer press/release pair is a drag rather than a click.
///
/// # Arguments
/// * `start` - Pixel where the press happened
/// * `end` - Pixel where the pointer was released
pub fn is_drag(start: Pixel, end: Pixel) -> bool {
    start.distance(end) > MIN_DRAG_DISTANCE
}

/// Vertices collected by the draw gesture of a line or polygon.
///
/// Single clicks append vertices; only an explicit finish ends the gesture.
#[derive(Debug, Clone, Default)]
pub struct DrawGesture {
    kind: Option<GeometryKind>,
    vertices: Vec<MapPoint>,
}

impl DrawGesture {
    /// Starts a new gesture, discarding any previous vertices.
    pub fn begin(&mut self, kind: GeometryKind) {
        self.kind = Some(kind);
        self.vertices.clear();
    }

    pub fn push(&mut self, vertex: MapPoint) {
        self.vertices.push(vertex);
    }

    /// Drops the most recently added vertex.
    pub fn undo(&mut self) -> Option<MapPoint> {
        self.vertices.pop()
    }

    pub fn kind(&self) -> Option<GeometryKind> {
        self.kind
    }

    pub fn vertices(&self) -> &[MapPoint] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.kind = None;
        self.vertices.clear();
    }
}
