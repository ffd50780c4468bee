// --- Planar measurement along polylines (working CRS units) ---
use geo::{
    Coord, Distance, Euclidean, Length, Line, LineInterpolatePoint, LineLocatePoint, LineString,
    Point,
};

pub fn distance(a: Coord, b: Coord) -> f64 {
    Euclidean.distance(a, b)
}

/// Calculate Euclidean length of a polyline.
pub fn polyline_length(line: &LineString) -> f64 {
    Euclidean.length(line)
}

/// Closest point on `segment` to `p`, with its fraction along the segment.
/// Endpoints are returned exactly when the projection clamps.
fn closest_on_segment(segment: Line, p: Point) -> (f64, Coord) {
    let t = segment.line_locate_point(&p).unwrap_or(0.0);
    let nearest = if t <= 0.0 {
        segment.start
    } else if t >= 1.0 {
        segment.end
    } else {
        segment
            .line_interpolate_point(t)
            .map_or(segment.start, |pt| pt.0)
    };
    (t, nearest)
}

/// Result of projecting a point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    /// Arc length from the first vertex to `nearest`.
    pub along: f64,
    pub nearest: Coord,
    /// Distance from the query point to `nearest`.
    pub distance: f64,
}

/// Project point to polyline. The first segment wins ties.
pub fn locate_point(line: &LineString, p: Coord) -> Option<Located> {
    match line.0.as_slice() {
        [] => None,
        [only] => Some(Located {
            along: 0.0,
            nearest: *only,
            distance: distance(p, *only),
        }),
        _ => {
            let query = Point::from(p);
            let mut best: Option<Located> = None;
            let mut walked = 0.0;
            for segment in line.lines() {
                let seg_len = Euclidean.length(&segment);
                let (t, nearest) = closest_on_segment(segment, query);
                let d = distance(p, nearest);
                if best.is_none_or(|b| d < b.distance) {
                    best = Some(Located {
                        along: walked + t * seg_len,
                        nearest,
                        distance: d,
                    });
                }
                walked += seg_len;
            }
            best
        }
    }
}

pub fn point_polyline_distance(p: Coord, line: &LineString) -> f64 {
    match line.0.as_slice() {
        [] => f64::INFINITY,
        [only] => distance(p, *only),
        _ => Euclidean.distance(&Point::from(p), line),
    }
}

/// Point at arc length `along` (clamped to the polyline).
pub fn interpolate(line: &LineString, along: f64) -> Option<Coord> {
    let first = *line.0.first()?;
    if along <= 0.0 {
        return Some(first);
    }
    let mut walked = 0.0;
    for segment in line.lines() {
        let seg_len = Euclidean.length(&segment);
        if walked + seg_len >= along && seg_len > 0.0 {
            return segment
                .line_interpolate_point((along - walked) / seg_len)
                .map(|pt| pt.0);
        }
        walked += seg_len;
    }
    line.0.last().copied()
}

pub fn midpoint(line: &LineString) -> Option<Coord> {
    interpolate(line, polyline_length(line) / 2.0)
}

/// Extract the sub-polyline between arc lengths `start` and `end` (`start <= end`).
/// Returns None when the requested part collapses to a single point.
pub fn substring(line: &LineString, start: f64, end: f64) -> Option<LineString> {
    let total = polyline_length(line);
    let start = start.clamp(0.0, total);
    let end = end.clamp(0.0, total);
    if start >= end {
        return None;
    }

    let mut result = vec![interpolate(line, start)?];
    let mut walked = 0.0;
    for segment in line.lines() {
        walked += Euclidean.length(&segment);
        if walked > start && walked < end {
            result.push(segment.end);
        }
    }
    result.push(interpolate(line, end)?);
    result.dedup();

    if result.len() < 2 {
        return None;
    }
    Some(LineString::new(result))
}

/// Vertices plus segment quarter points, used for sampled containment tests.
pub fn sample_points(line: &LineString) -> Vec<Coord> {
    let mut samples = Vec::with_capacity(line.0.len() * 4);
    for segment in line.lines() {
        samples.push(segment.start);
        samples.extend(
            [0.25, 0.5, 0.75]
                .into_iter()
                .filter_map(|t| segment.line_interpolate_point(t))
                .map(|pt| pt.0),
        );
    }
    samples.extend(line.0.last().copied());
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn square() -> LineString {
        line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
    }

    #[test]
    fn test_locate_on_square() {
        let located = locate_point(&square(), Coord { x: 0.0, y: 0.1 }).unwrap();
        assert!((located.along - 3.9).abs() < 1e-12);
        assert!(located.distance < 1e-12);

        // clamped projections return the vertex itself
        let corner = locate_point(&square(), Coord { x: 2.0, y: -1.0 }).unwrap();
        assert_eq!(corner.nearest, Coord { x: 1.0, y: 0.0 });
    }

    #[test]
    fn test_substring_keeps_interior_vertices() {
        let part = substring(&square(), 0.5, 2.5).unwrap();
        assert_eq!(
            part.0,
            vec![
                Coord { x: 0.5, y: 0.0 },
                Coord { x: 1.0, y: 0.0 },
                Coord { x: 1.0, y: 1.0 },
                Coord { x: 0.5, y: 1.0 },
            ]
        );
        assert!(substring(&square(), 1.0, 1.0).is_none());
    }

    #[test]
    fn test_interpolate_clamps() {
        let ring = square();
        assert_eq!(interpolate(&ring, -1.0), Some(Coord { x: 0.0, y: 0.0 }));
        assert_eq!(interpolate(&ring, 10.0), Some(Coord { x: 0.0, y: 0.0 }));
        let edge = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        assert_eq!(midpoint(&edge), Some(Coord { x: 0.5, y: 0.0 }));
    }

    #[test]
    fn test_distance_to_degenerate_lines() {
        let p = Coord { x: 3.0, y: 4.0 };
        assert_eq!(point_polyline_distance(p, &LineString::new(vec![])), f64::INFINITY);
        let single = LineString::new(vec![Coord { x: 0.0, y: 0.0 }]);
        assert!((point_polyline_distance(p, &single) - 5.0).abs() < 1e-12);
        assert!((point_polyline_distance(p, &square()) - (2.0f64).hypot(3.0)).abs() < 1e-12);
    }
}
