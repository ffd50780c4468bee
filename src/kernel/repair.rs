use super::noding::has_self_intersection;
use geo::{BooleanOps, Coord, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use std::fmt;

/// Why a geometry failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvalidReason {
    Empty,
    NonFiniteCoordinate,
    TooFewPoints,
    RingSelfIntersection,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::Empty => "Empty geometry",
            InvalidReason::NonFiniteCoordinate => "Non-finite coordinate",
            InvalidReason::TooFewPoints => "Too few points",
            InvalidReason::RingSelfIntersection => "Ring self-intersection",
        };
        f.write_str(text)
    }
}

fn coords_finite(coords: &[Coord]) -> bool {
    coords.iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

fn explain_line(line: &LineString) -> Option<InvalidReason> {
    if line.0.is_empty() {
        return Some(InvalidReason::Empty);
    }
    if !coords_finite(&line.0) {
        return Some(InvalidReason::NonFiniteCoordinate);
    }
    let first = line.0[0];
    if line.0.iter().all(|c| *c == first) {
        return Some(InvalidReason::TooFewPoints);
    }
    None
}

fn explain_ring(ring: &LineString) -> Option<InvalidReason> {
    if ring.0.is_empty() {
        return Some(InvalidReason::Empty);
    }
    if !coords_finite(&ring.0) {
        return Some(InvalidReason::NonFiniteCoordinate);
    }
    let mut distinct = ring.0.clone();
    distinct.dedup();
    if distinct.len() < 4 {
        return Some(InvalidReason::TooFewPoints);
    }
    if has_self_intersection(ring) {
        return Some(InvalidReason::RingSelfIntersection);
    }
    None
}

fn explain_polygon(polygon: &Polygon) -> Option<InvalidReason> {
    if polygon.exterior().0.is_empty() {
        return Some(InvalidReason::Empty);
    }
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .find_map(explain_ring)
}

/// `None` when the geometry is valid. Kinds the pipeline does not admit are
/// reported as valid here; the type check rejects them afterwards.
pub fn explain_validity(geometry: &Geometry<f64>) -> Option<InvalidReason> {
    match geometry {
        Geometry::LineString(line) => explain_line(line),
        Geometry::MultiLineString(multi) if multi.0.is_empty() => Some(InvalidReason::Empty),
        Geometry::MultiLineString(multi) => multi.0.iter().find_map(explain_line),
        Geometry::Polygon(polygon) => explain_polygon(polygon),
        Geometry::MultiPolygon(multi) if multi.0.is_empty() => Some(InvalidReason::Empty),
        Geometry::MultiPolygon(multi) => multi.0.iter().find_map(explain_polygon),
        Geometry::GeometryCollection(collection) if collection.0.is_empty() => {
            Some(InvalidReason::Empty)
        }
        _ => None,
    }
}

fn clean_coords(coords: &[Coord]) -> Vec<Coord> {
    let mut cleaned: Vec<Coord> = coords
        .iter()
        .copied()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .collect();
    cleaned.dedup();
    cleaned
}

fn repair_line(line: &LineString) -> Option<LineString> {
    let cleaned = clean_coords(&line.0);
    (cleaned.len() >= 2).then(|| LineString::new(cleaned))
}

fn repair_ring(ring: &LineString) -> Option<LineString> {
    let mut cleaned = clean_coords(&ring.0);
    if let (Some(first), Some(last)) = (cleaned.first().copied(), cleaned.last().copied()) {
        if first != last {
            cleaned.push(first);
        }
    }
    (cleaned.len() >= 4).then(|| LineString::new(cleaned))
}

/// Closes and cleans rings, then lets the overlay engine resolve
/// self-intersections by unioning against nothing.
fn repair_polygons<'a>(polygons: impl IntoIterator<Item = &'a Polygon>) -> Option<Geometry<f64>> {
    let cleaned: Vec<Polygon> = polygons
        .into_iter()
        .filter_map(|polygon| {
            let exterior = repair_ring(polygon.exterior())?;
            let interiors = polygon.interiors().iter().filter_map(repair_ring).collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut resolved = MultiPolygon::new(cleaned).union(&MultiPolygon::<f64>::new(Vec::new()));
    match resolved.0.len() {
        0 => None,
        1 => resolved.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(resolved)),
    }
}

/// Attempts to turn an invalid geometry into a valid one of the same family.
/// `None` means the row cannot be saved.
pub fn make_valid(geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
    let repaired = match geometry {
        Geometry::LineString(line) => repair_line(line).map(Geometry::LineString),
        Geometry::MultiLineString(multi) => {
            let parts: Vec<LineString> = multi.0.iter().filter_map(repair_line).collect();
            (!parts.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(parts)))
        }
        Geometry::Polygon(polygon) => repair_polygons(std::iter::once(polygon)),
        Geometry::MultiPolygon(multi) => repair_polygons(multi.0.iter()),
        Geometry::GeometryCollection(collection) if collection.0.is_empty() => None,
        other => Some(other.clone()),
    }?;
    explain_validity(&repaired).is_none().then_some(repaired)
}
