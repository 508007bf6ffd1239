//! Conversion between geographic and display coordinates.
//!
//! The map surface works in spherical Web Mercator (EPSG:3857) meters while
//! the store holds longitude/latitude (EPSG:4326). Conversions happen only at
//! the boundary between the session controller and the surface.

use crate::geometry::LonLat;

/// WGS84 semi-major axis used by spherical Mercator.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes a square world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A position in the display projection, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

impl MapPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Projects a geographic position into display coordinates.
///
/// Latitudes beyond [`MAX_LATITUDE`] are clamped.
pub fn from_lon_lat(position: LonLat) -> MapPoint {
    let lat = position.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * position.lon.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    MapPoint::new(x, y)
}

/// Converts display coordinates back into longitude/latitude.
pub fn to_lon_lat(point: MapPoint) -> LonLat {
    let lon = (point.x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (point.y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    LonLat::new(lon, lat)
}

pub fn project_all(positions: &[LonLat]) -> Vec<MapPoint> {
    positions.iter().copied().map(from_lon_lat).collect()
}

pub fn unproject_all(points: &[MapPoint]) -> Vec<LonLat> {
    points.iter().copied().map(to_lon_lat).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::COORDINATE_TOLERANCE;

    #[test]
    fn test_origin_maps_to_origin() {
        let p = from_lon_lat(LonLat::new(0.0, 0.0));
        assert!(p.x.abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
    }

    #[test]
    fn test_known_value() {
        // 180 degrees east is half the equator.
        let p = from_lon_lat(LonLat::new(180.0, 0.0));
        assert!((p.x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn test_inverse() {
        let ankara = LonLat::new(35.2532, 39.5);
        let back = to_lon_lat(from_lon_lat(ankara));
        assert!(back.approx_eq(&ankara, COORDINATE_TOLERANCE));
    }

    #[test]
    fn test_polar_latitude_is_clamped() {
        let back = to_lon_lat(from_lon_lat(LonLat::new(10.0, 89.9)));
        assert!((back.lat - MAX_LATITUDE).abs() < 1e-6);
    }
}
