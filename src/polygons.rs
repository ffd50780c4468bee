use crate::kernel::measure::{distance, midpoint};
use crate::kernel::{GeometryKernel, as_multi_polygon, coord_key};
use crate::model::{
    Attributes, Edge, SKELETON_TABLE_NAME, SyntheticTag, Terminus, Way, filter_short_edges,
};
use crate::tracer::{BOUNDARY_TOLERANCE, ring_arc, trace_boundary_part};
use ahash::AHashSet;
use geo::{Coord, LineString, MultiPolygon};
use itertools::Itertools;
use log::info;

/// A polygon together with the edge termini lying on its boundary.
struct TouchedPolygon<'a> {
    area: MultiPolygon,
    rings: Vec<LineString>,
    attributes: &'a Attributes,
    touching: Vec<Coord>,
}

/// Distinct termini within [`BOUNDARY_TOLERANCE`] of each polygon's boundary,
/// in terminus order.
fn find_touching_termini<'a, K: GeometryKernel>(
    kernel: &K,
    termini: &[Terminus],
    polygons: &'a [Way],
) -> Vec<TouchedPolygon<'a>> {
    let mut touched: Vec<TouchedPolygon<'a>> = polygons
        .iter()
        .filter_map(|way| {
            let area = as_multi_polygon(&way.geometry)?;
            let rings = kernel.boundary(&area);
            Some(TouchedPolygon {
                area,
                rings,
                attributes: &way.attributes,
                touching: Vec::new(),
            })
        })
        .collect();

    let index = kernel.segment_index(
        touched
            .iter()
            .enumerate()
            .flat_map(|(owner, polygon)| polygon.rings.iter().map(move |ring| (owner, ring))),
    );

    let mut seen: Vec<AHashSet<_>> = vec![AHashSet::new(); touched.len()];
    for terminus in termini {
        for (owner, _) in index.owners_within(terminus.point, BOUNDARY_TOLERANCE) {
            if seen[owner].insert(coord_key(terminus.point)) {
                touched[owner].touching.push(terminus.point);
            }
        }
    }
    touched
}

/// Straight connector between two touching termini, with every stretch that leaves
/// the polygon replaced by the shorter boundary arc between its exit and re-entry.
fn skeleton_connector<K: GeometryKernel>(
    kernel: &K,
    polygon: &TouchedPolygon<'_>,
    a: Coord,
    b: Coord,
) -> Option<LineString> {
    let straight = LineString::new(vec![a, b]);
    let pieces = kernel.split_lines(&[straight], &polygon.rings);

    let mut coords: Vec<Coord> = Vec::new();
    for piece in pieces {
        let (Some(&from), Some(&to)) = (piece.geometry.0.first(), piece.geometry.0.last()) else {
            continue;
        };
        let inside = midpoint(&piece.geometry)
            .is_some_and(|mid| kernel.covers(&polygon.area, mid));

        if inside {
            coords.extend(piece.geometry.0);
        } else {
            let mut arc = trace_boundary_part(kernel, &polygon.rings, from, to, true)?;
            let (Some(&first), Some(&last)) = (arc.0.first(), arc.0.last()) else {
                return None;
            };
            if distance(first, from) > distance(last, from) {
                arc.0.reverse();
            }
            // tie the arc to the piece exactly so the connector stays continuous
            let n = arc.0.len();
            arc.0[0] = from;
            arc.0[n - 1] = to;
            coords.extend(arc.0);
        }
    }

    coords.dedup();
    (coords.len() >= 2).then(|| LineString::new(coords))
}

fn skeleton_edges<K: GeometryKernel>(
    kernel: &K,
    polygons: &[TouchedPolygon<'_>],
    min_edge_length: f64,
) -> Vec<Edge> {
    let mut skeletons = Vec::new();
    for polygon in polygons.iter().filter(|p| p.touching.len() >= 2) {
        for (a, b) in polygon.touching.iter().copied().tuple_combinations() {
            let Some(connector) = skeleton_connector(kernel, polygon, a, b) else {
                continue;
            };
            if kernel.length(&connector) < min_edge_length {
                continue;
            }
            let mut attributes = polygon.attributes.clone();
            attributes.insert(
                "table_name".to_string(),
                serde_json::Value::from(SKELETON_TABLE_NAME),
            );
            skeletons.push(Edge {
                id: 0,
                geometry: connector,
                attributes,
                synthetic: Some(SyntheticTag::Skeleton),
            });
        }
    }
    skeletons
}

/// Splits one ring at the touching points lying on it.
fn segment_ring<K: GeometryKernel>(
    kernel: &K,
    ring: &LineString,
    touching: &[Coord],
) -> Vec<LineString> {
    let mut cuts: Vec<(f64, Coord)> = touching
        .iter()
        .filter_map(|&point| {
            let located = kernel.project(ring, point)?;
            (located.distance <= BOUNDARY_TOLERANCE).then_some((located.along, point))
        })
        .collect();
    if cuts.is_empty() {
        return vec![ring.clone()];
    }
    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
    cuts.dedup_by(|a, b| a.0 == b.0);

    let mut pieces = Vec::with_capacity(cuts.len());
    for (i, &(from, from_point)) in cuts.iter().enumerate() {
        let (to, to_point) = cuts[(i + 1) % cuts.len()];
        let Some(mut piece) = ring_arc(kernel, ring, from, to) else {
            continue;
        };
        let n = piece.0.len();
        piece.0[0] = from_point;
        piece.0[n - 1] = to_point;
        pieces.push(piece);
    }
    pieces
}

fn outline_edges<K: GeometryKernel>(kernel: &K, polygons: &[TouchedPolygon<'_>]) -> Vec<Edge> {
    let mut outlines = Vec::new();
    for polygon in polygons.iter().filter(|p| !p.touching.is_empty()) {
        for ring in &polygon.rings {
            for piece in segment_ring(kernel, ring, &polygon.touching) {
                outlines.push(Edge {
                    id: 0,
                    geometry: piece,
                    attributes: polygon.attributes.clone(),
                    synthetic: Some(SyntheticTag::Outline),
                });
            }
        }
    }
    outlines
}

/// Folds polygon areas into the edge graph.
///
/// Skeleton connectors are drawn between every pair of termini touching a polygon,
/// and polygon rings are segmented at those termini. The combined set is noded once
/// more so that connectors and outlines meet existing edges only at endpoints;
/// overlapping linework keeps the earliest of edges, outlines, skeletons.
pub fn integrate_polygons<K: GeometryKernel>(
    kernel: &K,
    edges: Vec<Edge>,
    termini: &[Terminus],
    polygons: &[Way],
    min_edge_length: f64,
) -> Vec<Edge> {
    info!("[p1] Finding line termini touching polygon edges...");
    let touched = find_touching_termini(kernel, termini, polygons);

    info!("[p2] Creating edges between touching nodes along polygon edges...");
    let skeletons = skeleton_edges(kernel, &touched, min_edge_length);

    info!("[p3] Creating polygon outline edges segmented by touching line termini...");
    let outlines = outline_edges(kernel, &touched);

    info!(
        "[p4] Consolidating {} skeleton and {} outline edges with {} existing edges...",
        skeletons.len(),
        outlines.len(),
        edges.len()
    );
    let combined: Vec<Edge> = edges.into_iter().chain(outlines).chain(skeletons).collect();
    let geometries: Vec<LineString> = combined.iter().map(|e| e.geometry.clone()).collect();
    let noded: Vec<Edge> = kernel
        .union_lines(&geometries)
        .into_iter()
        .map(|piece| {
            let origin = &combined[piece.source];
            Edge {
                id: 0,
                geometry: piece.geometry,
                attributes: origin.attributes.clone(),
                synthetic: origin.synthetic,
            }
        })
        .collect();

    filter_short_edges(noded, min_edge_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::PlanarKernel;
    use crate::termini::edge_termini;
    use geo::{Geometry, line_string, polygon};
    use serde_json::json;

    fn square_plaza() -> Way {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), json!("plaza"));
        Way::with_attributes(
            Geometry::Polygon(polygon![
                (x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0), (x: 10.0, y: 10.0)
            ]),
            attributes,
        )
    }

    #[test]
    fn test_two_touching_lines_get_a_skeleton_and_outlines() {
        let kernel = PlanarKernel;
        let edges = vec![
            Edge::new(0, line_string![(x: 0.0, y: 5.0), (x: 10.0, y: 5.0)], Attributes::new()),
            Edge::new(1, line_string![(x: 20.0, y: 5.0), (x: 30.0, y: 5.0)], Attributes::new()),
        ];
        let termini = edge_termini(&edges);
        let result = integrate_polygons(&kernel, edges, &termini, &[square_plaza()], 1.6);

        let skeletons: Vec<&Edge> = result
            .iter()
            .filter(|e| e.synthetic == Some(SyntheticTag::Skeleton))
            .collect();
        assert_eq!(skeletons.len(), 1);
        assert!((skeletons[0].length() - 10.0).abs() < 1e-9);
        assert_eq!(skeletons[0].attributes["table_name"], json!(SKELETON_TABLE_NAME));
        assert_eq!(skeletons[0].attributes["name"], json!("plaza"));

        let outlines: Vec<&Edge> = result
            .iter()
            .filter(|e| e.synthetic == Some(SyntheticTag::Outline))
            .collect();
        assert_eq!(outlines.len(), 2);
        let perimeter: f64 = outlines.iter().map(|e| e.length()).sum();
        assert!((perimeter - 40.0).abs() < 1e-9, "got {}", perimeter);

        let ids: Vec<usize> = result.iter().map(|e| e.id).collect();
        assert_eq!(ids, (0..result.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_touching_line_gets_no_skeleton() {
        let kernel = PlanarKernel;
        let edges = vec![Edge::new(
            0,
            line_string![(x: 0.0, y: 5.0), (x: 10.0, y: 5.0)],
            Attributes::new(),
        )];
        let termini = edge_termini(&edges);
        let result = integrate_polygons(&kernel, edges, &termini, &[square_plaza()], 1.6);
        assert!(result.iter().all(|e| e.synthetic != Some(SyntheticTag::Skeleton)));
        // the whole ring, opened at the touching point
        let outlines: Vec<&Edge> = result
            .iter()
            .filter(|e| e.synthetic == Some(SyntheticTag::Outline))
            .collect();
        assert_eq!(outlines.len(), 1);
        assert_eq!(outlines[0].geometry.0.first(), Some(&Coord { x: 10.0, y: 5.0 }));
        assert_eq!(outlines[0].geometry.0.last(), Some(&Coord { x: 10.0, y: 5.0 }));
    }

    #[test]
    fn test_connector_leaving_a_concave_polygon_follows_the_boundary() {
        let kernel = PlanarKernel;
        // U shape: the straight line between the two arm tips crosses the notch
        let u_shape = Way::new(Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 30.0, y: 0.0), (x: 30.0, y: 30.0), (x: 20.0, y: 30.0),
            (x: 20.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 30.0), (x: 0.0, y: 30.0)
        ]));
        let touched = TouchedPolygon {
            area: as_multi_polygon(&u_shape.geometry).unwrap(),
            rings: kernel.boundary(&as_multi_polygon(&u_shape.geometry).unwrap()),
            attributes: &u_shape.attributes,
            touching: Vec::new(),
        };
        let a = Coord { x: 5.0, y: 30.0 };
        let b = Coord { x: 25.0, y: 30.0 };
        let connector = skeleton_connector(&kernel, &touched, a, b).unwrap();
        assert_eq!(connector.0.first(), Some(&a));
        assert_eq!(connector.0.last(), Some(&b));
        // 5 + 20 down and up the notch walls + 10 across its floor + 5
        assert!(
            (kernel.length(&connector) - 60.0).abs() < 1e-9,
            "got {:?}",
            connector
        );
    }
}
