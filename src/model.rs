use crate::crs::Crs;
use crate::kernel::measure::polyline_length;
use geo_types::{Coord, Geometry, LineString};
use serde::{Deserialize, Serialize};

/// Ordered column name -> value mapping carried opaquely through the pipeline.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Attribute written on skeleton edges, matching the marker used by downstream routing tables.
pub const SKELETON_TABLE_NAME: &str = "__skeletons";

/// A raw input record.
#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub geometry: Geometry<f64>,
    pub attributes: Attributes,
}

impl Way {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(geometry: Geometry<f64>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WayTable {
    pub crs: Option<Crs>,
    pub ways: Vec<Way>,
}

impl WayTable {
    pub fn new(crs: Crs, ways: Vec<Way>) -> Self {
        Self {
            crs: Some(crs),
            ways,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminusRole {
    Start,
    End,
}

/// One endpoint of a line, referencing its owner by index into the table it was derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Terminus {
    pub point: Coord,
    pub line_index: usize,
    pub role: TerminusRole,
}

/// Marks edges that do not come from an input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticTag {
    /// Connector generated inside a polygon between two touching termini.
    Skeleton,
    /// Piece of a polygon ring segmented at touching termini.
    Outline,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub id: usize,
    pub geometry: LineString,
    pub attributes: Attributes,
    pub synthetic: Option<SyntheticTag>,
}

impl Edge {
    pub fn new(id: usize, geometry: LineString, attributes: Attributes) -> Self {
        Self {
            id,
            geometry,
            attributes,
            synthetic: None,
        }
    }

    pub fn length(&self) -> f64 {
        polyline_length(&self.geometry)
    }
}

/// Reassigns dense ids after a structural change.
pub fn renumber(edges: &mut [Edge]) {
    for (id, edge) in edges.iter_mut().enumerate() {
        edge.id = id;
    }
}

/// Drops edges shorter than `min_length` and renumbers the rest.
pub fn filter_short_edges(edges: Vec<Edge>, min_length: f64) -> Vec<Edge> {
    let mut kept: Vec<Edge> = edges
        .into_iter()
        .filter(|edge| edge.length() >= min_length)
        .collect();
    renumber(&mut kept);
    kept
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: usize,
    pub geometry: Coord,
    pub incident_edges: Vec<usize>,
    /// For each edge column, one value per incident edge (null where the edge lacks it).
    pub attributes: Attributes,
}

/// A line whose both endpoints touch nothing else in its set.
#[derive(Clone, Debug, PartialEq)]
pub struct Orphan {
    pub geometry: LineString,
    pub attributes: Attributes,
}

/// Name of a geometry variant, spelled the way GeoJSON spells it.
pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

pub fn is_linear(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::LineString(_) | Geometry::MultiLineString(_)
    )
}

pub fn is_areal(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn test_filter_short_edges_renumbers() {
        let edges = vec![
            Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)], Attributes::new()),
            Edge::new(1, line_string![(x: 10.0, y: 0.0), (x: 10.5, y: 0.0)], Attributes::new()),
            Edge::new(2, line_string![(x: 10.0, y: 0.0), (x: 10.0, y: 5.0)], Attributes::new()),
        ];
        let kept = filter_short_edges(edges, 1.6);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, 0);
        assert_eq!(kept[1].id, 1);
        assert_eq!(kept[1].geometry.0[1], Coord { x: 10.0, y: 5.0 });
    }
}
