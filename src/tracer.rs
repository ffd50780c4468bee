use crate::kernel::GeometryKernel;
use geo::{Coord, LineString};

/// How far a point may sit from a ring and still count as lying on it.
pub const BOUNDARY_TOLERANCE: f64 = 1e-6;

/// Extracts the part of a closed boundary ring between two points on it.
///
/// The first ring holding both points within [`BOUNDARY_TOLERANCE`] is used. With
/// `prefer_shortest` the shorter of the two arcs is returned, otherwise the longer one;
/// on a tie the arc running forward from `start` wins. When the chosen arc runs
/// backwards it is returned in ring order, from `end` to `start`.
///
/// An arc that crosses the ring origin is stitched back into one curve there.
pub fn trace_boundary_part<K: GeometryKernel>(
    kernel: &K,
    rings: &[LineString],
    start: Coord,
    end: Coord,
    prefer_shortest: bool,
) -> Option<LineString> {
    let ring = rings.iter().find(|ring| {
        kernel.distance(start, ring) <= BOUNDARY_TOLERANCE
            && kernel.distance(end, ring) <= BOUNDARY_TOLERANCE
    })?;

    let length = kernel.length(ring);
    if length == 0.0 {
        return None;
    }
    let to_start = kernel.project(ring, start)?.along;
    let to_end = kernel.project(ring, end)?.along;

    let forward = (to_end - to_start).rem_euclid(length);
    let reverse = length - forward;
    let forward_is_shorter = forward <= reverse;

    let (from, to) = if prefer_shortest == forward_is_shorter {
        (to_start, to_end)
    } else {
        (to_end, to_start)
    };

    if from == to {
        return None;
    }
    ring_arc(kernel, ring, from, to)
}

/// Part of `ring` running forward from arc length `from` to `to`, passing through the
/// ring origin when `from >= to` (equal positions give the whole loop).
pub(crate) fn ring_arc<K: GeometryKernel>(
    kernel: &K,
    ring: &LineString,
    from: f64,
    to: f64,
) -> Option<LineString> {
    if from < to {
        return kernel.substring(ring, from, to);
    }

    let tail = kernel.substring(ring, from, kernel.length(ring));
    let head = kernel.substring(ring, 0.0, to);
    match (tail, head) {
        (Some(tail), Some(head)) => {
            let mut coords = tail.0;
            coords.extend(head.0);
            coords.dedup();
            Some(LineString::new(coords))
        }
        (Some(part), None) | (None, Some(part)) => Some(part),
        (None, None) => None,
    }
}
