//! JSON shapes exchanged with the REST service.

use crate::error::{AppError, Result};
use crate::geometry::{
    GeometryKind, GeometryRecord, LonLat, RecordId, decode_coordinates, encode_coordinates,
};
use log::warn;
use serde::{Deserialize, Serialize};

/// Rounds a degree value to the serialized precision.
pub(crate) fn round_degrees(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Request body for `POST` and `PUT`.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum RecordBody<'a> {
    Point { x: f64, y: f64, name: &'a str },
    Vertices { coordinates: String, name: &'a str },
}

impl<'a> RecordBody<'a> {
    pub(crate) fn from_record(record: &'a GeometryRecord) -> Result<Self> {
        match record.kind {
            GeometryKind::Point => {
                let position = record
                    .position()
                    .ok_or_else(|| AppError::validation("point has no coordinate"))?;
                Ok(Self::Point {
                    x: round_degrees(position.lon),
                    y: round_degrees(position.lat),
                    name: &record.name,
                })
            }
            GeometryKind::LineString | GeometryKind::Polygon => Ok(Self::Vertices {
                coordinates: encode_coordinates(&record.coordinates),
                name: &record.name,
            }),
        }
    }
}

/// Numbers sometimes arrive quoted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Degrees {
    Number(f64),
    Text(String),
}

impl Degrees {
    fn value(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::network(format!("server sent malformed coordinate {s:?}"))),
        }
    }
}

/// A record as the server describes it.
#[derive(Debug, Deserialize)]
pub(crate) struct WireRecord {
    #[serde(default)]
    id: Option<RecordId>,
    #[serde(default, alias = "xCoord")]
    x: Option<Degrees>,
    #[serde(default, alias = "yCoord")]
    y: Option<Degrees>,
    #[serde(default)]
    coordinates: Option<String>,
    #[serde(default)]
    name: String,
}

impl WireRecord {
    pub(crate) fn into_record(self, kind: GeometryKind) -> Result<GeometryRecord> {
        let coordinates = match kind {
            GeometryKind::Point => match (&self.x, &self.y) {
                (Some(x), Some(y)) => vec![LonLat::new(x.value()?, y.value()?)],
                _ => return Err(AppError::network("server sent a point without x/y")),
            },
            GeometryKind::LineString | GeometryKind::Polygon => {
                let encoded = self.coordinates.as_deref().unwrap_or_default();
                decode_coordinates(encoded)
                    .map_err(|e| AppError::network(format!("server sent bad coordinates: {e}")))?
            }
        };

        let mut record = GeometryRecord::new(kind, self.name, coordinates);
        record.id = self.id;
        Ok(record)
    }

    pub(crate) fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

/// `GET /{Kind}` responses: `{ "value": [...] }`, or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListBody {
    Envelope { value: Vec<WireRecord> },
    Bare(Vec<WireRecord>),
}

impl ListBody {
    /// Converts every row it can; malformed rows are logged and skipped.
    pub(crate) fn into_records(self, kind: GeometryKind) -> Vec<GeometryRecord> {
        let items = match self {
            Self::Envelope { value } => value,
            Self::Bare(items) => items,
        };
        items
            .into_iter()
            .filter_map(|item| {
                let id = item.id().cloned();
                match item.into_record(kind) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        match id {
                            Some(id) => warn!("skipping {kind} {id}: {e}"),
                            None => warn!("skipping {kind} without an id: {e}"),
                        }
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_body() {
        let record = GeometryRecord::new(
            GeometryKind::Point,
            "A",
            vec![LonLat::new(35.00000012, 39.0)],
        );
        let body = serde_json::to_value(RecordBody::from_record(&record).unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "x": 35.0, "y": 39.0, "name": "A" }));
    }

    #[test]
    fn test_line_body() {
        let record = GeometryRecord::new(
            GeometryKind::LineString,
            "road",
            vec![LonLat::new(1.0, 2.0), LonLat::new(3.0, 4.0)],
        );
        let body = serde_json::to_value(RecordBody::from_record(&record).unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "coordinates": "1.000000,2.000000,3.000000,4.000000",
                "name": "road"
            })
        );
    }

    #[test]
    fn test_list_envelope() {
        let json = r#"{ "value": [
            { "id": 1, "x": 35.0, "y": 39.0, "name": "A" },
            { "id": "2", "xCoord": "30.5", "yCoord": "40.25", "name": "B" }
        ] }"#;
        let body: ListBody = serde_json::from_str(json).unwrap();
        let records = body.into_records(GeometryKind::Point);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, Some(RecordId::from("1")));
        assert_eq!(records[1].position(), Some(LonLat::new(30.5, 40.25)));
    }

    #[test]
    fn test_bare_list_of_polygons() {
        let json = r#"[ { "id": 9, "coordinates": "0,0,1,0,1,1,0,0", "name": "P" } ]"#;
        let body: ListBody = serde_json::from_str(json).unwrap();
        let records = body.into_records(GeometryKind::Polygon);
        assert_eq!(records[0].coordinates.len(), 3);
    }

    #[test]
    fn test_point_without_coordinates_is_rejected() {
        let wire: WireRecord = serde_json::from_str(r#"{ "id": 1, "name": "A" }"#).unwrap();
        assert!(wire.into_record(GeometryKind::Point).is_err());
    }

    #[test]
    fn test_malformed_row_does_not_drop_the_rest() {
        let json = r#"{ "value": [
            { "id": 1, "x": 35, "y": 39, "name": "good" },
            { "id": 2, "x": 36, "name": "missing y" },
            { "id": 3, "x": "east", "y": 40, "name": "bad x" },
            { "id": 4, "x": 37.5, "y": 40.5, "name": "also good" }
        ] }"#;
        let body: ListBody = serde_json::from_str(json).unwrap();
        let records = body.into_records(GeometryKind::Point);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["good", "also good"]);
        assert_eq!(records[0].id, Some(RecordId::from("1")));
        assert_eq!(records[1].position(), Some(LonLat::new(37.5, 40.5)));
    }
}
