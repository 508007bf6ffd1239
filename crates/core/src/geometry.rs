//! Geometry records and their coordinate encoding.
//!
//! The remote store always holds geographic coordinates (longitude, latitude).
//! Points travel as separate `x`/`y` numbers; lines and polygons travel as a
//! flat comma-joined sequence `lon1,lat1,lon2,lat2,...` with six decimals.
//! Polygon rings are kept open: a closing vertex equal to the first one is
//! dropped whenever a ring is encoded or decoded.

use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimals used for every serialized coordinate.
pub const COORDINATE_DECIMALS: usize = 6;

/// Tolerance matching the fixed six-decimal serialization.
pub const COORDINATE_TOLERANCE: f64 = 1e-6;

/// Kind of geometry, which is also the remote collection it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    /// All kinds, in layer order.
    pub const ALL: [GeometryKind; 3] = [
        GeometryKind::Point,
        GeometryKind::LineString,
        GeometryKind::Polygon,
    ];

    /// Path segment of the remote collection.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
        }
    }

    /// Minimum number of vertices a valid geometry of this kind has.
    pub fn min_vertices(self) -> usize {
        match self {
            Self::Point => 1,
            Self::LineString => 2,
            Self::Polygon => 3,
        }
    }

    /// Whether the coordinates are edited vertex by vertex.
    pub fn has_vertices(self) -> bool {
        !matches!(self, Self::Point)
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for GeometryKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" | "points" => Ok(Self::Point),
            "line" | "lines" | "linestring" => Ok(Self::LineString),
            "polygon" | "polygons" => Ok(Self::Polygon),
            other => Err(AppError::validation(format!("unknown geometry kind {other:?}"))),
        }
    }
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Rejects non-finite values and positions outside the geographic range.
    pub fn validate(&self) -> Result<()> {
        if !self.lon.is_finite() || !self.lat.is_finite() {
            return Err(AppError::validation("coordinate is not a finite number"));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(AppError::validation(format!(
                "longitude {} is outside [-180, 180]",
                self.lon
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::validation(format!(
                "latitude {} is outside [-90, 90]",
                self.lat
            )));
        }
        Ok(())
    }

    pub fn approx_eq(&self, other: &LonLat, tolerance: f64) -> bool {
        (self.lon - other.lon).abs() <= tolerance && (self.lat - other.lat).abs() <= tolerance
    }
}

/// Server-assigned identifier. Opaque: numbers and strings are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}

/// A stored (or about to be stored) geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    /// Absent until the server has persisted the record.
    pub id: Option<RecordId>,
    pub kind: GeometryKind,
    pub name: String,
    pub coordinates: Vec<LonLat>,
}

impl GeometryRecord {
    pub fn new(kind: GeometryKind, name: impl Into<String>, coordinates: Vec<LonLat>) -> Self {
        Self {
            id: None,
            kind,
            name: name.into(),
            coordinates: normalize_ring(kind, coordinates),
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The position of a point record.
    pub fn position(&self) -> Option<LonLat> {
        match self.kind {
            GeometryKind::Point => self.coordinates.first().copied(),
            _ => None,
        }
    }

    /// Checks name and coordinates before anything is sent to the store.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_coordinates(self.kind, &self.coordinates)
    }
}

/// Partial change to a record. Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub coordinates: Option<Vec<LonLat>>,
}

impl RecordPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            coordinates: None,
        }
    }

    pub fn reshape(coordinates: Vec<LonLat>) -> Self {
        Self {
            name: None,
            coordinates: Some(coordinates),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.coordinates.is_none()
    }

    /// Merges the patch over a freshly fetched record.
    pub fn apply(&self, mut record: GeometryRecord) -> GeometryRecord {
        if let Some(name) = &self.name {
            record.name = name.trim().to_string();
        }
        if let Some(coordinates) = &self.coordinates {
            record.coordinates = normalize_ring(record.kind, coordinates.clone());
        }
        record
    }

    /// Validates only the fields the patch carries.
    pub fn validate(&self, kind: GeometryKind) -> Result<()> {
        if self.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(coordinates) = &self.coordinates {
            validate_coordinates(kind, &normalize_ring(kind, coordinates.clone()))?;
        }
        Ok(())
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    Ok(())
}

pub fn validate_coordinates(kind: GeometryKind, coordinates: &[LonLat]) -> Result<()> {
    let min = kind.min_vertices();
    if coordinates.len() < min {
        return Err(AppError::validation(format!(
            "{kind} needs at least {min} vertices, got {}",
            coordinates.len()
        )));
    }
    if kind == GeometryKind::Point && coordinates.len() != 1 {
        return Err(AppError::validation("a point has exactly one coordinate"));
    }
    coordinates.iter().try_for_each(LonLat::validate)
}

/// Drops the closing vertex of a polygon ring.
pub fn normalize_ring(kind: GeometryKind, mut coordinates: Vec<LonLat>) -> Vec<LonLat> {
    if kind == GeometryKind::Polygon && coordinates.len() > 1 {
        let first = coordinates[0];
        if coordinates
            .last()
            .is_some_and(|last| last.approx_eq(&first, COORDINATE_TOLERANCE))
        {
            coordinates.pop();
        }
    }
    coordinates
}

/// Formats a single degree value with the fixed number of decimals.
pub fn format_degrees(value: f64) -> String {
    format!("{:.*}", COORDINATE_DECIMALS, value)
}

/// Encodes vertices as `lon1,lat1,lon2,lat2,...`.
pub fn encode_coordinates(coordinates: &[LonLat]) -> String {
    coordinates
        .iter()
        .flat_map(|c| [format_degrees(c.lon), format_degrees(c.lat)])
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes `lon1,lat1,lon2,lat2,...` back into vertices.
///
/// # Errors
///
/// Returns [`AppError::Validation`] on a non-numeric entry or an odd number of
/// values.
pub fn decode_coordinates(encoded: &str) -> Result<Vec<LonLat>> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let values = trimmed
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| AppError::validation(format!("malformed coordinate {part:?}")))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() % 2 != 0 {
        return Err(AppError::validation(format!(
            "coordinate list has an odd number of values ({})",
            values.len()
        )));
    }

    Ok(values
        .chunks_exact(2)
        .map(|pair| LonLat::new(pair[0], pair[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_encoding_round_trip() {
        let line = vec![
            LonLat::new(32.5, 39.9),
            LonLat::new(33.123456, 40.0),
            LonLat::new(34.0, 41.654321),
        ];
        let encoded = encode_coordinates(&line);
        assert_eq!(
            encoded,
            "32.500000,39.900000,33.123456,40.000000,34.000000,41.654321"
        );
        assert_eq!(decode_coordinates(&encoded).unwrap(), line);
    }

    #[test]
    fn test_encoding_rounds_to_six_decimals() {
        let encoded = encode_coordinates(&[LonLat::new(35.12345678, -0.5)]);
        assert_eq!(encoded, "35.123457,-0.500000");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_coordinates("1.0,2.0,3.0").is_err());
        assert!(decode_coordinates("1.0,abc").is_err());
        assert!(decode_coordinates("").unwrap().is_empty());
    }

    #[test]
    fn test_polygon_ring_is_kept_open() {
        let ring = vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 1.0),
            LonLat::new(0.0, 0.0),
        ];
        let polygon = GeometryRecord::new(GeometryKind::Polygon, "square-ish", ring.clone());
        assert_eq!(polygon.coordinates.len(), 3);

        // Lines may legitimately end where they start.
        let line = GeometryRecord::new(GeometryKind::LineString, "loop", ring);
        assert_eq!(line.coordinates.len(), 4);
    }

    #[test]
    fn test_validation() {
        let ok = GeometryRecord::new(GeometryKind::Point, "A", vec![LonLat::new(35.0, 39.0)]);
        assert!(ok.validate().is_ok());

        let blank = GeometryRecord::new(GeometryKind::Point, "   ", vec![LonLat::new(35.0, 39.0)]);
        assert!(blank.validate().is_err());

        let short_line =
            GeometryRecord::new(GeometryKind::LineString, "L", vec![LonLat::new(1.0, 1.0)]);
        assert!(short_line.validate().is_err());

        let off_globe = GeometryRecord::new(GeometryKind::Point, "X", vec![LonLat::new(200.0, 0.0)]);
        assert!(off_globe.validate().is_err());

        let nan = GeometryRecord::new(GeometryKind::Point, "N", vec![LonLat::new(f64::NAN, 0.0)]);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_patch_apply_keeps_unpatched_fields() {
        let stored = GeometryRecord::new(GeometryKind::Point, "Server name", vec![LonLat::new(1.0, 2.0)])
            .with_id(4u64);
        let moved = RecordPatch::reshape(vec![LonLat::new(3.0, 4.0)]).apply(stored.clone());
        assert_eq!(moved.name, "Server name");
        assert_eq!(moved.position(), Some(LonLat::new(3.0, 4.0)));
        assert_eq!(moved.id, stored.id);

        let renamed = RecordPatch::rename("  New  ").apply(stored);
        assert_eq!(renamed.name, "New");
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        assert!(RecordPatch::default().validate(GeometryKind::Point).is_err());
        assert!(RecordPatch::rename("").validate(GeometryKind::Point).is_err());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("line".parse::<GeometryKind>().unwrap(), GeometryKind::LineString);
        assert_eq!("Polygon".parse::<GeometryKind>().unwrap(), GeometryKind::Polygon);
        assert!("circle".parse::<GeometryKind>().is_err());
    }

    #[test]
    fn test_record_id_accepts_numbers_and_strings() {
        let numeric: RecordId = serde_json::from_str("17").unwrap();
        let text: RecordId = serde_json::from_str("\"a-17\"").unwrap();
        assert_eq!(numeric.as_str(), "17");
        assert_eq!(text.as_str(), "a-17");
    }
}
