//! Tabular view of stored records.
//!
//! Rows are derived from the records of the last reload and are never edited
//! in place; every change goes through the session and comes back on reload.

use crate::geometry::{GeometryRecord, encode_coordinates, format_degrees};
use std::fmt::Write;

/// One line of the records table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: String,
    pub name: String,
    /// `lon, lat` for points, the vertex count otherwise.
    pub geometry: String,
}

impl TableRow {
    pub fn from_record(record: &GeometryRecord) -> Self {
        let geometry = match record.position() {
            Some(position) => format!(
                "{}, {}",
                format_degrees(position.lon),
                format_degrees(position.lat)
            ),
            None => format!("{} vertices", record.coordinates.len()),
        };
        Self {
            id: record
                .id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            name: record.name.clone(),
            geometry,
        }
    }
}

pub fn rows(records: &[GeometryRecord]) -> Vec<TableRow> {
    records.iter().map(TableRow::from_record).collect()
}

/// Text shown when a single record is opened.
pub fn detail_text(record: &GeometryRecord) -> String {
    let id = record
        .id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    match record.position() {
        Some(position) => format!(
            "{} ID: {}\nX: {}\nY: {}\nName: {}",
            record.kind,
            id,
            format_degrees(position.lon),
            format_degrees(position.lat),
            record.name
        ),
        None => format!(
            "{} ID: {}\nVertices: {}\nCoordinates: {}\nName: {}",
            record.kind,
            id,
            record.coordinates.len(),
            encode_coordinates(&record.coordinates),
            record.name
        ),
    }
}

/// Renders rows as an aligned plain-text table.
pub fn render(rows: &[TableRow]) -> String {
    const HEADERS: [&str; 3] = ["ID", "NAME", "GEOMETRY"];

    let mut widths = HEADERS.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.id.chars().count());
        widths[1] = widths[1].max(row.name.chars().count());
        widths[2] = widths[2].max(row.geometry.chars().count());
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 3]| {
        let _ = writeln!(
            out,
            "{:<w0$}  {:<w1$}  {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1]
        );
    };
    line(HEADERS);
    for row in rows {
        line([row.id.as_str(), row.name.as_str(), row.geometry.as_str()]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeometryKind, LonLat};

    #[test]
    fn test_point_detail() {
        let record =
            GeometryRecord::new(GeometryKind::Point, "A", vec![LonLat::new(35.0, 39.0)]).with_id(7u64);
        assert_eq!(
            detail_text(&record),
            "Point ID: 7\nX: 35.000000\nY: 39.000000\nName: A"
        );
    }

    #[test]
    fn test_polygon_detail() {
        let record = GeometryRecord::new(
            GeometryKind::Polygon,
            "field",
            vec![
                LonLat::new(32.5, 39.9),
                LonLat::new(32.6, 39.9),
                LonLat::new(32.6, 40.0),
            ],
        )
        .with_id("12");
        assert_eq!(
            detail_text(&record),
            "Polygon ID: 12\nVertices: 3\nCoordinates: 32.500000,39.900000,32.600000,39.900000,32.600000,40.000000\nName: field"
        );
    }

    #[test]
    fn test_render_aligns_columns() {
        let records = vec![
            GeometryRecord::new(GeometryKind::Point, "Harbour", vec![LonLat::new(29.0, 41.0)])
                .with_id(1u64),
            GeometryRecord::new(GeometryKind::Point, "B", vec![LonLat::new(30.0, 40.5)])
                .with_id(22u64),
        ];
        let table = render(&rows(&records));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID  NAME     GEOMETRY");
        assert_eq!(lines[1], "1   Harbour  29.000000, 41.000000");
        assert_eq!(lines[2], "22  B        30.000000, 40.500000");
    }
}
