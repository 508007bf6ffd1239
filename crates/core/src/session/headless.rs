//! An off-screen [`MapSurface`].
//!
//! Keeps markers, interactions and panels in memory and maps pixels with a
//! plain Web-Mercator view transform. The CLI drives sessions through it, and
//! tests inspect it to check what the controller asked the surface to do.

use super::notification::Notification;
use super::placement::{Pixel, Size};
use super::state::Panel;
use super::surface::{
    Cursor, Interaction, InteractionHandle, Layer, MapSurface, Marker, MarkerHandle,
};
use crate::projection::{EARTH_RADIUS, MapPoint};
use log::debug;
use std::collections::BTreeMap;

/// Meters per pixel at zoom 0 for 256px tiles.
const ZOOM0_RESOLUTION: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS / 256.0;

/// Pixel radius within which a click hits a marker vertex.
pub const HIT_RADIUS: f64 = 6.0;

pub struct HeadlessSurface {
    viewport: Size,
    panel_size: Size,
    center: MapPoint,
    zoom: f64,
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, (Layer, Marker)>,
    interactions: BTreeMap<InteractionHandle, Interaction>,
    cursor: Cursor,
    panel: Option<(Panel, Pixel)>,
}

impl HeadlessSurface {
    pub fn new(viewport: Size, panel_size: Size) -> Self {
        Self {
            viewport,
            panel_size,
            center: MapPoint::new(0.0, 0.0),
            zoom: 0.0,
            next_handle: 0,
            markers: BTreeMap::new(),
            interactions: BTreeMap::new(),
            cursor: Cursor::Default,
            panel: None,
        }
    }

    fn resolution(&self) -> f64 {
        ZOOM0_RESOLUTION / 2f64.powf(self.zoom)
    }

    /// Pixel at which a display coordinate appears.
    pub fn pixel_for(&self, point: MapPoint) -> Pixel {
        let res = self.resolution();
        Pixel::new(
            (point.x - self.center.x) / res + self.viewport.width / 2.0,
            (self.center.y - point.y) / res + self.viewport.height / 2.0,
        )
    }

    /// Display coordinate under a pixel.
    pub fn map_point_at(&self, pixel: Pixel) -> MapPoint {
        let res = self.resolution();
        MapPoint::new(
            self.center.x + (pixel.x - self.viewport.width / 2.0) * res,
            self.center.y - (pixel.y - self.viewport.height / 2.0) * res,
        )
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&Marker> {
        self.markers.get(&handle).map(|(_, marker)| marker)
    }

    /// Markers in a layer, in insertion order.
    pub fn markers_in(&self, layer: Layer) -> Vec<(MarkerHandle, &Marker)> {
        self.markers
            .iter()
            .filter(|(_, (l, _))| *l == layer)
            .map(|(handle, (_, marker))| (*handle, marker))
            .collect()
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.interactions.values().copied().collect()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn panel(&self) -> Option<&(Panel, Pixel)> {
        self.panel.as_ref()
    }

    pub fn view(&self) -> (MapPoint, f64) {
        (self.center, self.zoom)
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapSurface for HeadlessSurface {
    fn viewport(&self) -> Size {
        self.viewport
    }

    fn panel_size(&self, _panel: &Panel) -> Size {
        self.panel_size
    }

    fn set_view(&mut self, center: MapPoint, zoom: f64) {
        self.center = center;
        self.zoom = zoom;
    }

    fn add_marker(&mut self, layer: Layer, marker: Marker) -> MarkerHandle {
        let handle = MarkerHandle(self.allocate());
        self.markers.insert(handle, (layer, marker));
        handle
    }

    fn update_marker(&mut self, handle: MarkerHandle, geometry: Vec<MapPoint>) {
        if let Some((_, marker)) = self.markers.get_mut(&handle) {
            marker.geometry = geometry;
        }
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.markers.remove(&handle);
    }

    fn clear_layer(&mut self, layer: Layer) {
        self.markers.retain(|_, (l, _)| *l != layer);
    }

    fn hit_test(&self, pixel: Pixel) -> Option<MarkerHandle> {
        self.markers
            .iter()
            .filter(|(_, (layer, _))| *layer != Layer::Overlay)
            .filter_map(|(handle, (_, marker))| {
                marker
                    .geometry
                    .iter()
                    .map(|p| self.pixel_for(*p).distance(pixel))
                    .min_by(f64::total_cmp)
                    .map(|d| (*handle, d))
            })
            .filter(|(_, d)| *d <= HIT_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(handle, _)| handle)
    }

    fn attach_interaction(&mut self, interaction: Interaction) -> InteractionHandle {
        let handle = InteractionHandle(self.allocate());
        self.interactions.insert(handle, interaction);
        handle
    }

    fn detach_interaction(&mut self, handle: InteractionHandle) {
        self.interactions.remove(&handle);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn show_panel(&mut self, panel: &Panel, at: Pixel) {
        self.panel = Some((panel.clone(), at));
    }

    fn hide_panel(&mut self) {
        self.panel = None;
    }

    fn notify(&mut self, notification: &Notification) {
        debug!("{:?}: {}", notification.level, notification.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeometryKind, LonLat};
    use crate::projection::from_lon_lat;
    use crate::session::state::RecordRef;
    use crate::session::surface::MarkerRole;

    fn surface() -> HeadlessSurface {
        let mut surface = HeadlessSurface::new(Size::new(800.0, 600.0), Size::new(100.0, 50.0));
        surface.set_view(from_lon_lat(LonLat::new(35.0, 39.0)), 6.0);
        surface
    }

    #[test]
    fn test_pixel_transform_is_invertible() {
        let surface = surface();
        let center = surface.pixel_for(from_lon_lat(LonLat::new(35.0, 39.0)));
        assert!((center.x - 400.0).abs() < 1e-9);
        assert!((center.y - 300.0).abs() < 1e-9);

        let p = MapPoint::new(3_900_000.0, 4_750_000.0);
        let back = surface.map_point_at(surface.pixel_for(p));
        assert!((back.x - p.x).abs() < 1e-6);
        assert!((back.y - p.y).abs() < 1e-6);
    }

    #[test]
    fn test_hit_test_ignores_overlay() {
        let mut surface = surface();
        let at = from_lon_lat(LonLat::new(35.0, 39.0));
        surface.add_marker(
            Layer::Overlay,
            Marker {
                role: MarkerRole::Highlight,
                kind: GeometryKind::Point,
                geometry: vec![at],
            },
        );
        assert_eq!(surface.hit_test(Pixel::new(400.0, 300.0)), None);

        let persisted = surface.add_marker(
            Layer::Points,
            Marker {
                role: MarkerRole::Persisted(RecordRef::new(GeometryKind::Point, "1")),
                kind: GeometryKind::Point,
                geometry: vec![at],
            },
        );
        assert_eq!(surface.hit_test(Pixel::new(403.0, 302.0)), Some(persisted));
        assert_eq!(surface.hit_test(Pixel::new(420.0, 300.0)), None);
    }

    #[test]
    fn test_clear_layer_only_clears_that_layer() {
        let mut surface = surface();
        let marker = |role| Marker {
            role,
            kind: GeometryKind::LineString,
            geometry: vec![MapPoint::new(0.0, 0.0)],
        };
        let persisted = RecordRef::new(GeometryKind::LineString, "1");
        surface.add_marker(Layer::Lines, marker(MarkerRole::Persisted(persisted)));
        surface.add_marker(Layer::Overlay, marker(MarkerRole::Draft));
        surface.clear_layer(Layer::Lines);
        assert!(surface.markers_in(Layer::Lines).is_empty());
        assert_eq!(surface.markers_in(Layer::Overlay).len(), 1);
    }
}
