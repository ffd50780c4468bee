//! Planar geometry capability the pipeline stages call into.
//!
//! Every stage takes a `&impl GeometryKernel` instead of reaching for free
//! functions, so a stage can be exercised against a different kernel.
//! [`PlanarKernel`] is the default, built on `geo` and `rstar`.

pub mod index;
pub mod measure;
pub mod noding;
pub mod repair;

use geo::{BooleanOps, Coord, Geometry, Intersects, LineString, MultiPolygon, Point, Polygon};

pub use index::SegmentIndex;
pub use measure::Located;
pub use noding::NodedPiece;
pub use repair::InvalidReason;

/// Exact-equality key for a coordinate. `-0.0` and `0.0` map to the same key.
pub type CoordKey = (u64, u64);

pub fn coord_key(c: Coord) -> CoordKey {
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

pub trait GeometryKernel {
    /// Planar union of linework: noded at every intersection, overlaps dissolved.
    fn union_lines(&self, lines: &[LineString]) -> Vec<NodedPiece>;

    /// Splits `lines` wherever they meet `cutters`. Cutter linework is not returned.
    fn split_lines(&self, lines: &[LineString], cutters: &[LineString]) -> Vec<NodedPiece>;

    fn union_polygons(&self, polygons: &[MultiPolygon]) -> MultiPolygon;

    /// Exterior and interior rings of every part.
    fn boundary(&self, polygons: &MultiPolygon) -> Vec<LineString>;

    /// Inside or on the boundary.
    fn covers(&self, polygons: &MultiPolygon, point: Coord) -> bool;

    fn distance(&self, point: Coord, curve: &LineString) -> f64;

    /// Nearest point on `curve` and its arc length from the curve's start.
    fn project(&self, curve: &LineString, point: Coord) -> Option<Located>;

    fn interpolate(&self, curve: &LineString, along: f64) -> Option<Coord>;

    fn substring(&self, curve: &LineString, start: f64, end: f64) -> Option<LineString>;

    fn length(&self, curve: &LineString) -> f64;

    /// True when `inner` lies entirely inside `outer` buffered by `tolerance`.
    fn within_buffer(&self, inner: &LineString, outer: &LineString, tolerance: f64) -> bool;

    fn segment_index<'a>(
        &self,
        curves: impl IntoIterator<Item = (usize, &'a LineString)>,
    ) -> SegmentIndex;

    fn explain_validity(&self, geometry: &Geometry<f64>) -> Option<InvalidReason>;

    fn make_valid(&self, geometry: &Geometry<f64>) -> Option<Geometry<f64>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarKernel;

impl GeometryKernel for PlanarKernel {
    fn union_lines(&self, lines: &[LineString]) -> Vec<NodedPiece> {
        noding::node_linework(lines, &[])
    }

    fn split_lines(&self, lines: &[LineString], cutters: &[LineString]) -> Vec<NodedPiece> {
        noding::node_linework(lines, cutters)
    }

    fn union_polygons(&self, polygons: &[MultiPolygon]) -> MultiPolygon {
        polygons
            .iter()
            .fold(MultiPolygon::<f64>::new(Vec::new()), |acc, next| {
                acc.union(next)
            })
    }

    fn boundary(&self, polygons: &MultiPolygon) -> Vec<LineString> {
        polygons
            .0
            .iter()
            .flat_map(|polygon: &Polygon| {
                std::iter::once(polygon.exterior().clone()).chain(polygon.interiors().to_vec())
            })
            .filter(|ring| ring.0.len() >= 2)
            .collect()
    }

    fn covers(&self, polygons: &MultiPolygon, point: Coord) -> bool {
        let point = Point::from(point);
        polygons.0.iter().any(|polygon| polygon.intersects(&point))
    }

    fn distance(&self, point: Coord, curve: &LineString) -> f64 {
        measure::point_polyline_distance(point, curve)
    }

    fn project(&self, curve: &LineString, point: Coord) -> Option<Located> {
        measure::locate_point(curve, point)
    }

    fn interpolate(&self, curve: &LineString, along: f64) -> Option<Coord> {
        measure::interpolate(curve, along)
    }

    fn substring(&self, curve: &LineString, start: f64, end: f64) -> Option<LineString> {
        measure::substring(curve, start, end)
    }

    fn length(&self, curve: &LineString) -> f64 {
        measure::polyline_length(curve)
    }

    fn within_buffer(&self, inner: &LineString, outer: &LineString, tolerance: f64) -> bool {
        measure::sample_points(inner)
            .into_iter()
            .all(|p| measure::point_polyline_distance(p, outer) <= tolerance)
    }

    fn segment_index<'a>(
        &self,
        curves: impl IntoIterator<Item = (usize, &'a LineString)>,
    ) -> SegmentIndex {
        SegmentIndex::build(curves)
    }

    fn explain_validity(&self, geometry: &Geometry<f64>) -> Option<InvalidReason> {
        repair::explain_validity(geometry)
    }

    fn make_valid(&self, geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
        repair::make_valid(geometry)
    }
}

/// Any admitted areal geometry as a multipolygon.
pub fn as_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(multi) => Some(multi.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};

    #[test]
    fn test_coord_key_ignores_zero_sign() {
        assert_eq!(
            coord_key(Coord { x: -0.0, y: 1.0 }),
            coord_key(Coord { x: 0.0, y: 1.0 })
        );
    }

    #[test]
    fn test_union_polygons_merges_overlap() {
        let kernel = PlanarKernel;
        let a = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)
        ]]);
        let b = MultiPolygon::new(vec![polygon![
            (x: 1.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 2.0), (x: 1.0, y: 2.0)
        ]]);
        let merged = kernel.union_polygons(&[a, b]);
        assert_eq!(merged.0.len(), 1);
        let perimeter: f64 = kernel
            .boundary(&merged)
            .iter()
            .map(|ring| kernel.length(ring))
            .sum();
        assert!((perimeter - 10.0).abs() < 1e-9, "got {}", perimeter);
    }

    #[test]
    fn test_covers_includes_boundary() {
        let kernel = PlanarKernel;
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)
        ]]);
        assert!(kernel.covers(&square, Coord { x: 0.5, y: 0.5 }));
        assert!(kernel.covers(&square, Coord { x: 1.0, y: 0.5 }));
        assert!(!kernel.covers(&square, Coord { x: 1.5, y: 0.5 }));
    }

    #[test]
    fn test_within_buffer() {
        let kernel = PlanarKernel;
        let source = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0)];
        let piece = line_string![(x: 5.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 2.0)];
        let other = line_string![(x: 5.0, y: 0.0), (x: 5.0, y: 3.0)];
        assert!(kernel.within_buffer(&piece, &source, 0.01));
        assert!(!kernel.within_buffer(&other, &source, 0.01));
    }
}
