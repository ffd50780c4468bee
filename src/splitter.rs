use crate::error::{ConvertError, Result};
use crate::kernel::{GeometryKernel, NodedPiece, as_multi_polygon};
use crate::model::{Attributes, Edge, Orphan, geometry_kind};
use crate::orphans::orphan_mask;
use geo::{BoundingRect, Geometry, LineString, MultiPolygon};
use log::{debug, warn};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

/// Edges produced by one splitting pass, and the orphaned linework left out of them.
#[derive(Debug, Clone, Default)]
pub struct LinesToEdges {
    pub edges: Vec<Edge>,
    pub orphans: Vec<Orphan>,
}

type SourceBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Bounding-box index over the source lines, expanded by the attribute buffer.
fn build_source_index(lines: &[Edge], buffer: f64) -> RTree<SourceBox> {
    let boxes = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let rect = line.geometry.bounding_rect()?;
            Some(GeomWithData::new(
                Rectangle::from_corners(
                    [rect.min().x - buffer, rect.min().y - buffer],
                    [rect.max().x + buffer, rect.max().y + buffer],
                ),
                i,
            ))
        })
        .collect();
    RTree::bulk_load(boxes)
}

/// Attributes of the lowest-index source line whose buffer contains `piece` entirely.
fn reattach_attributes<K: GeometryKernel>(
    kernel: &K,
    piece: &LineString,
    lines: &[Edge],
    sources: &RTree<SourceBox>,
    buffer: f64,
) -> Attributes {
    let Some(rect) = piece.bounding_rect() else {
        return Attributes::new();
    };
    let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

    let mut candidates: Vec<usize> = sources
        .locate_in_envelope_intersecting(&envelope)
        .map(|hit| hit.data)
        .collect();
    candidates.sort_unstable();

    candidates
        .into_iter()
        .find(|&i| kernel.within_buffer(piece, &lines[i].geometry, buffer))
        .map(|i| lines[i].attributes.clone())
        .unwrap_or_default()
}

/// Boundary rings of the unioned cutting polygons.
fn cutter_rings<K: GeometryKernel>(
    kernel: &K,
    polygons: &[Geometry<f64>],
) -> Result<Vec<LineString>> {
    let mut areal: Vec<MultiPolygon> = Vec::with_capacity(polygons.len());
    let mut offending: Vec<String> = Vec::new();
    for geometry in polygons {
        match as_multi_polygon(geometry) {
            Some(multi) => areal.push(multi),
            None => offending.push(geometry_kind(geometry).to_string()),
        }
    }
    if !offending.is_empty() {
        offending.sort();
        offending.dedup();
        return Err(ConvertError::InvalidGeometryType { found: offending });
    }

    let merged = kernel.union_polygons(&areal);
    Ok(kernel.boundary(&merged))
}

/// Splits `lines` at every mutual intersection (and, when given, wherever they cross
/// the boundary of `cutters`), returning single-part edges with the attributes of the
/// line they came from.
///
/// Lines whose endpoints touch nothing else in the union are orphans: with
/// `suppress_orphans` they abort the pass, otherwise they are reported separately and
/// left out of the edges.
pub fn lines_to_edges<K: GeometryKernel>(
    kernel: &K,
    lines: &[Edge],
    suppress_orphans: bool,
    cutters: Option<&[Geometry<f64>]>,
    attribute_buffer: f64,
) -> Result<LinesToEdges> {
    let geometries: Vec<LineString> = lines.iter().map(|l| l.geometry.clone()).collect();
    let union: Vec<NodedPiece> = kernel.union_lines(&geometries);
    debug!(
        "Union of {} lines produced {} pieces",
        lines.len(),
        union.len()
    );

    let union_lines: Vec<LineString> = union.into_iter().map(|p| p.geometry).collect();
    let orphaned = orphan_mask(&union_lines);
    let orphan_count = orphaned.iter().filter(|&&o| o).count();
    if orphan_count > 0 {
        if suppress_orphans {
            return Err(ConvertError::OrphanLinesFound(orphan_count));
        }
        warn!(
            "Found {} orphan lines. Orphan lines indicate connectivity issues in the input data.",
            orphan_count
        );
    }

    let pieces: Vec<NodedPiece> = match cutters {
        Some(polygons) => {
            let rings = cutter_rings(kernel, polygons)?;
            kernel.split_lines(&union_lines, &rings)
        }
        None => union_lines
            .iter()
            .enumerate()
            .map(|(source, geometry)| NodedPiece {
                geometry: geometry.clone(),
                source,
            })
            .collect(),
    };

    let sources = build_source_index(lines, attribute_buffer);

    let orphans: Vec<Orphan> = union_lines
        .iter()
        .zip(&orphaned)
        .filter(|(_, o)| **o)
        .map(|(geometry, _)| Orphan {
            attributes: reattach_attributes(kernel, geometry, lines, &sources, attribute_buffer),
            geometry: geometry.clone(),
        })
        .collect();

    let edges: Vec<Edge> = pieces
        .into_iter()
        .filter(|piece| !orphaned[piece.source])
        .enumerate()
        .map(|(id, piece)| {
            let attributes =
                reattach_attributes(kernel, &piece.geometry, lines, &sources, attribute_buffer);
            Edge::new(id, piece.geometry, attributes)
        })
        .collect();

    Ok(LinesToEdges { edges, orphans })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::PlanarKernel;
    use geo::{Coord, line_string, polygon};
    use serde_json::json;

    fn way(geometry: LineString, name: &str) -> Edge {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), json!(name));
        Edge::new(0, geometry, attributes)
    }

    #[test]
    fn test_crossing_lines_become_four_edges_with_attributes() {
        let lines = vec![
            way(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)], "horizontal"),
            way(line_string![(x: 5.0, y: -5.0), (x: 5.0, y: 5.0)], "vertical"),
        ];
        let result = lines_to_edges(&PlanarKernel, &lines, true, None, 0.01).unwrap();
        assert_eq!(result.edges.len(), 4);
        assert!(result.orphans.is_empty());

        let ids: Vec<usize> = result.edges.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let horizontal = result
            .edges
            .iter()
            .filter(|e| e.attributes["name"] == json!("horizontal"))
            .count();
        assert_eq!(horizontal, 2);
    }

    #[test]
    fn test_orphans_abort_when_suppressed() {
        let lines = vec![
            way(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)], "a"),
            way(line_string![(x: 10.0, y: 0.0), (x: 10.0, y: 10.0)], "b"),
            way(line_string![(x: 50.0, y: 50.0), (x: 60.0, y: 50.0)], "c"),
        ];
        match lines_to_edges(&PlanarKernel, &lines, true, None, 0.01) {
            Err(ConvertError::OrphanLinesFound(count)) => assert_eq!(count, 1),
            other => panic!("expected OrphanLinesFound, got {:?}", other),
        }

        let result = lines_to_edges(&PlanarKernel, &lines, false, None, 0.01).unwrap();
        assert_eq!(result.edges.len(), 2);
        assert_eq!(result.orphans.len(), 1);
        assert_eq!(result.orphans[0].attributes["name"], json!("c"));
    }

    #[test]
    fn test_polygon_boundary_cuts_lines() {
        let lines = vec![
            way(line_string![(x: 0.0, y: 5.0), (x: 20.0, y: 5.0)], "a"),
            way(line_string![(x: 20.0, y: 5.0), (x: 20.0, y: 20.0)], "b"),
        ];
        let cutters = vec![Geometry::Polygon(polygon![
            (x: 5.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 5.0, y: 10.0)
        ])];
        let result = lines_to_edges(&PlanarKernel, &lines, true, Some(&cutters), 0.01).unwrap();
        assert_eq!(result.edges.len(), 4, "{:?}", result.edges);
        let has_node_at = |c: Coord| {
            result
                .edges
                .iter()
                .any(|e| e.geometry.0.first() == Some(&c) || e.geometry.0.last() == Some(&c))
        };
        assert!(has_node_at(Coord { x: 5.0, y: 5.0 }));
        assert!(has_node_at(Coord { x: 10.0, y: 5.0 }));
        // cutter linework itself never becomes an edge
        assert!(result.edges.iter().all(|e| e.attributes.contains_key("name")));
    }

    #[test]
    fn test_non_areal_cutters_are_rejected() {
        let lines = vec![
            way(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)], "a"),
            way(line_string![(x: 10.0, y: 0.0), (x: 10.0, y: 10.0)], "b"),
        ];
        let cutters = vec![Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 2.0, y: 2.0)])];
        match lines_to_edges(&PlanarKernel, &lines, true, Some(&cutters), 0.01) {
            Err(ConvertError::InvalidGeometryType { found }) => {
                assert_eq!(found, vec!["LineString".to_string()])
            }
            other => panic!("expected InvalidGeometryType, got {:?}", other),
        }
    }
}
