use crate::kernel::{GeometryKernel, as_multi_polygon};
use crate::model::{Edge, TerminusRole};
use crate::termini::edge_termini;
use geo::{Coord, Geometry, LineString};
use log::{debug, info};

/// Boundary rings of each polygon, indexed like the polygon table.
fn polygon_rings<K: GeometryKernel>(kernel: &K, polygons: &[Geometry<f64>]) -> Vec<Vec<LineString>> {
    polygons
        .iter()
        .map(|geometry| {
            as_multi_polygon(geometry)
                .map(|multi| kernel.boundary(&multi))
                .unwrap_or_default()
        })
        .collect()
}

/// Extends dangling line ends onto the nearest other line (or polygon boundary)
/// within `tolerance`, stepping `overshoot` past the contact point so the next
/// splitting pass sees a real crossing.
///
/// The spatial index is built once from the input; each line's current endpoint
/// is read from the working copy, so a line extended at its start is seen
/// extended when its end is processed.
pub fn resolve_unconnected_line_ends<K: GeometryKernel>(
    kernel: &K,
    lines: &[Edge],
    tolerance: f64,
    overshoot: f64,
    polygons: Option<&[Geometry<f64>]>,
) -> Vec<Edge> {
    let line_index = kernel.segment_index(lines.iter().enumerate().map(|(i, l)| (i, &l.geometry)));

    let rings = polygons.map(|p| polygon_rings(kernel, p)).unwrap_or_default();
    let ring_index = kernel.segment_index(
        rings
            .iter()
            .enumerate()
            .flat_map(|(owner, rings)| rings.iter().map(move |ring| (owner, ring))),
    );

    let mut extended = lines.to_vec();
    let mut extension_count = 0;

    for terminus in edge_termini(lines) {
        let nearest_line = line_index
            .owners_within(terminus.point, tolerance)
            .into_iter()
            .find(|(owner, _)| *owner != terminus.line_index);

        let contact: Option<Coord> = match nearest_line {
            Some((_, distance)) if distance == 0.0 => continue,
            Some((owner, _)) => kernel
                .project(&lines[owner].geometry, terminus.point)
                .map(|located| located.nearest),
            None if ring_index.is_empty() => None,
            None => match ring_index.owners_within(terminus.point, tolerance).first() {
                Some((_, distance)) if *distance == 0.0 => continue,
                Some((polygon, _)) => rings[*polygon]
                    .iter()
                    .filter_map(|ring| kernel.project(ring, terminus.point))
                    .min_by(|a, b| a.distance.total_cmp(&b.distance))
                    .map(|located| located.nearest),
                None => None,
            },
        };

        let Some(contact) = contact else {
            continue;
        };

        let coords = &mut extended[terminus.line_index].geometry.0;
        let origin = match terminus.role {
            TerminusRole::Start => coords.first(),
            TerminusRole::End => coords.last(),
        };
        let Some(origin) = origin.copied() else {
            continue;
        };

        let dx = contact.x - origin.x;
        let dy = contact.y - origin.y;
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude == 0.0 {
            debug!(
                "Skipping zero-length extension of line {} at ({}, {})",
                terminus.line_index, origin.x, origin.y
            );
            continue;
        }

        let target = Coord {
            x: contact.x + dx / magnitude * overshoot,
            y: contact.y + dy / magnitude * overshoot,
        };
        match terminus.role {
            TerminusRole::Start => coords.insert(0, target),
            TerminusRole::End => coords.push(target),
        }
        extension_count += 1;
    }

    info!(
        "Extended {} line ends within tolerance {}",
        extension_count, tolerance
    );
    extended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::PlanarKernel;
    use crate::model::Attributes;
    use geo::{line_string, polygon};

    fn edge(geometry: LineString) -> Edge {
        Edge::new(0, geometry, Attributes::new())
    }

    #[test]
    fn test_end_snaps_to_nearest_line() {
        let lines = vec![
            edge(line_string![(x: -5.0, y: 0.0), (x: 0.0, y: 0.0)]),
            edge(line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ];
        let resolved = resolve_unconnected_line_ends(&PlanarKernel, &lines, 2.0, 0.0, None);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].geometry.0.last(), Some(&Coord { x: 1.0, y: 0.0 }));
        assert_eq!(resolved[0].geometry.0.len(), 3);
    }

    #[test]
    fn test_overshoot_steps_past_contact() {
        let lines = vec![
            edge(line_string![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0)]),
            edge(line_string![(x: 6.0, y: -10.0), (x: 6.0, y: 10.0)]),
        ];
        let resolved = resolve_unconnected_line_ends(&PlanarKernel, &lines, 2.0, 0.5, None);
        let end = *resolved[0].geometry.0.last().unwrap();
        assert!((end.x - 6.5).abs() < 1e-12 && end.y.abs() < 1e-12, "got {:?}", end);
        // the crossing line's ends are far from anything
        assert_eq!(resolved[1].geometry, lines[1].geometry);
    }

    #[test]
    fn test_connected_ends_are_untouched() {
        let lines = vec![
            edge(line_string![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0)]),
            edge(line_string![(x: 5.0, y: 0.0), (x: 5.0, y: 5.0)]),
        ];
        let resolved = resolve_unconnected_line_ends(&PlanarKernel, &lines, 2.0, 0.0, None);
        assert_eq!(resolved, lines);
    }

    #[test]
    fn test_polygon_boundary_is_a_fallback_target() {
        let lines = vec![edge(line_string![(x: 0.0, y: 5.0), (x: 9.0, y: 5.0)])];
        let polygons = vec![Geometry::Polygon(polygon![
            (x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0), (x: 10.0, y: 10.0)
        ])];
        let resolved =
            resolve_unconnected_line_ends(&PlanarKernel, &lines, 2.0, 0.0, Some(&polygons));
        assert_eq!(resolved[0].geometry.0.last(), Some(&Coord { x: 10.0, y: 5.0 }));
        assert_eq!(resolved[0].geometry.0.first(), Some(&Coord { x: 0.0, y: 5.0 }));
    }
}
