//! The rendering and interaction surface the controller drives.
//!
//! A surface owns everything visual (tiles, marker styling, panel widgets).
//! The controller only holds the opaque handles it gets back and says what a
//! marker *is* through [`MarkerRole`]; it never reads rendering state.

use super::notification::Notification;
use super::placement::{Pixel, Size};
use super::state::{Panel, RecordRef};
use crate::geometry::GeometryKind;
use crate::projection::MapPoint;

/// Opaque handle of a displayed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Opaque handle of an attached map interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionHandle(pub u64);

/// Logical layers markers are grouped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Points,
    Lines,
    Polygons,
    /// Drafts and highlight circles; never touched by reloads.
    Overlay,
}

impl Layer {
    /// The layer persisted records of `kind` are drawn in.
    pub fn for_kind(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Point => Self::Points,
            GeometryKind::LineString => Self::Lines,
            GeometryKind::Polygon => Self::Polygons,
        }
    }
}

/// What a marker represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerRole {
    /// Unsaved geometry being placed or drawn.
    Draft,
    /// Visual-only emphasis with no persisted identity.
    Highlight,
    /// A record as last loaded from the store.
    Persisted(RecordRef),
}

/// Geometry handed to the surface, already in display coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub role: MarkerRole,
    pub kind: GeometryKind,
    pub geometry: Vec<MapPoint>,
}

/// Map interactions the controller can attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Single clicks place a geometry of this kind.
    Place(GeometryKind),
    /// Clicks add vertices until the gesture is finished.
    Draw(GeometryKind),
    /// The marker can be dragged as a whole.
    Translate(MarkerHandle),
    /// The marker's vertices can be dragged individually.
    ModifyVertices(MarkerHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Crosshair,
    Move,
}

/// Interface the session controller needs from the map and its widgets.
///
/// Input flows the other way: the host forwards clicks, drags and draw
/// completions to the controller's `on_*` methods.
pub trait MapSurface {
    /// Size of the map viewport in pixels.
    fn viewport(&self) -> Size;

    /// Size of the box a panel will occupy.
    fn panel_size(&self, panel: &Panel) -> Size;

    fn set_view(&mut self, center: MapPoint, zoom: f64);

    fn add_marker(&mut self, layer: Layer, marker: Marker) -> MarkerHandle;

    /// Replaces the geometry of a displayed marker.
    fn update_marker(&mut self, handle: MarkerHandle, geometry: Vec<MapPoint>);

    fn remove_marker(&mut self, handle: MarkerHandle);

    fn clear_layer(&mut self, layer: Layer);

    /// The persisted marker under `pixel`, if any.
    fn hit_test(&self, pixel: Pixel) -> Option<MarkerHandle>;

    fn attach_interaction(&mut self, interaction: Interaction) -> InteractionHandle;

    fn detach_interaction(&mut self, handle: InteractionHandle);

    fn set_cursor(&mut self, cursor: Cursor);

    fn show_panel(&mut self, panel: &Panel, at: Pixel);

    fn hide_panel(&mut self);

    /// Displays a transient notification; the surface dismisses it itself.
    fn notify(&mut self, notification: &Notification);
}
