use crate::config::ConversionConfig;
use crate::crs::{Crs, Transform, reproject, reproject_edges, reproject_lines, reproject_nodes};
use crate::error::{ConvertError, Result};
use crate::kernel::{GeometryKernel, PlanarKernel};
use crate::loader::read_ways;
use crate::model::{
    Attributes, Edge, Node, Way, WayTable, filter_short_edges, geometry_kind, is_areal, is_linear,
};
use crate::nodes::consolidate_nodes;
use crate::polygons::integrate_polygons;
use crate::resolver::resolve_unconnected_line_ends;
use crate::splitter::lines_to_edges;
use crate::termini::edge_termini;
use geo::{Geometry, LineString};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// What the ingestion repair step found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub invalid: usize,
    pub repaired: usize,
    pub dropped: usize,
    /// Invalid rows counted per reason.
    pub reasons: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub edges: Vec<Edge>,
    pub nodes: Vec<Node>,
    pub orphans: Vec<LineString>,
    /// CRS of every output geometry; the CRS the input came in.
    pub crs: Crs,
    pub repair: RepairReport,
}

fn repair_ways<K: GeometryKernel>(kernel: &K, ways: Vec<Way>) -> (Vec<Way>, RepairReport) {
    let mut report = RepairReport::default();
    let mut kept = Vec::with_capacity(ways.len());

    for mut way in ways {
        let Some(reason) = kernel.explain_validity(&way.geometry) else {
            kept.push(way);
            continue;
        };
        report.invalid += 1;
        *report.reasons.entry(reason.to_string()).or_default() += 1;

        match kernel.make_valid(&way.geometry) {
            Some(geometry) => {
                way.geometry = geometry;
                report.repaired += 1;
                kept.push(way);
            }
            None => report.dropped += 1,
        }
    }

    if report.invalid > 0 {
        warn!("  Found {} invalid or empty geometries.", report.invalid);
        for (reason, count) in &report.reasons {
            warn!("    {}: {}", reason, count);
        }
        warn!(
            "  Dropped {} geometries that could not be repaired.",
            report.dropped
        );
        info!("  {} geometries remain after cleaning.", kept.len());
    }
    (kept, report)
}

fn lowercase_columns(attributes: Attributes) -> Attributes {
    attributes
        .into_iter()
        .map(|(column, value)| (column.to_lowercase(), value))
        .collect()
}

/// Splits the ways into exploded single-part lines and polygons.
fn partition_ways(ways: Vec<Way>) -> Result<(Vec<Edge>, Vec<Way>)> {
    let mut offending: Vec<String> = ways
        .iter()
        .filter(|way| !is_linear(&way.geometry) && !is_areal(&way.geometry))
        .map(|way| geometry_kind(&way.geometry).to_string())
        .collect();
    if !offending.is_empty() {
        offending.sort();
        offending.dedup();
        return Err(ConvertError::InvalidGeometryType { found: offending });
    }
    if !ways.iter().any(|way| is_linear(&way.geometry)) {
        return Err(ConvertError::NoLinearGeometry);
    }

    let mut lines = Vec::new();
    let mut polygons = Vec::new();
    for way in ways {
        match way.geometry {
            Geometry::LineString(line) => lines.push(Edge::new(lines.len(), line, way.attributes)),
            Geometry::MultiLineString(multi) => {
                for line in multi.0 {
                    lines.push(Edge::new(lines.len(), line, way.attributes.clone()));
                }
            }
            _ => polygons.push(way),
        }
    }
    Ok((lines, polygons))
}

/// Converts `ways` into a planar edge graph using the default planar kernel.
pub fn convert_ways_to_edges(ways: WayTable, config: &ConversionConfig) -> Result<ConversionResult> {
    convert_ways_to_edges_with(&PlanarKernel, ways, config)
}

pub fn convert_ways_to_edges_with<K: GeometryKernel>(
    kernel: &K,
    ways: WayTable,
    config: &ConversionConfig,
) -> Result<ConversionResult> {
    let source_crs = ways.crs.clone().ok_or(ConvertError::MissingCrs)?;
    let intermediate_crs: Crs = config.intermediate_crs.parse()?;
    let back = Transform::between(&intermediate_crs, &source_crs)?;
    let ways = reproject(ways, &intermediate_crs)?;

    info!("Checking for invalid geometries...");
    let (ways, repair) = repair_ways(kernel, ways.ways);
    let ways: Vec<Way> = ways
        .into_iter()
        .map(|way| Way::with_attributes(way.geometry, lowercase_columns(way.attributes)))
        .collect();

    let (lines, polygons) = partition_ways(ways)?;
    info!(
        "Exploded input into {} lines and {} polygons",
        lines.len(),
        polygons.len()
    );
    let polygon_geometries: Vec<Geometry<f64>> =
        polygons.iter().map(|way| way.geometry.clone()).collect();
    let polygon_table = (!polygon_geometries.is_empty()).then_some(polygon_geometries.as_slice());

    info!("[e1] Splitting ways at intersections...");
    let initial = lines_to_edges(
        kernel,
        &lines,
        config.suppress_orphans,
        polygon_table,
        config.attribute_buffer,
    )?;

    info!(
        "[e2] Removing edges shorter than minimum edge length of {}...",
        config.min_edge_length
    );
    // orphans ride along so near misses can still be snapped
    let candidates: Vec<Edge> = initial
        .edges
        .into_iter()
        .chain(
            initial
                .orphans
                .into_iter()
                .map(|orphan| Edge::new(0, orphan.geometry, orphan.attributes)),
        )
        .collect();
    let candidate_count = candidates.len();
    let filtered = filter_short_edges(candidates, config.min_edge_length);
    info!(
        "Removed {} edges shorter than minimum edge length of {}.",
        candidate_count - filtered.len(),
        config.min_edge_length
    );

    info!(
        "[e3] Connecting unconnected line ends within tolerance of {}...",
        config.connection_tolerance
    );
    let connected = resolve_unconnected_line_ends(
        kernel,
        &filtered,
        config.connection_tolerance,
        config.overshoot,
        polygon_table,
    );

    info!("[e4] Splitting connected lines at intersections again...");
    let resplit = lines_to_edges(
        kernel,
        &connected,
        config.suppress_orphans,
        None,
        config.attribute_buffer,
    )?;

    info!(
        "[e5] Removing edges shorter than minimum edge length of {} again...",
        config.min_edge_length
    );
    let mut edges = filter_short_edges(resplit.edges, config.min_edge_length);
    let mut orphans: Vec<LineString> = resplit.orphans.into_iter().map(|o| o.geometry).collect();

    if !polygons.is_empty() {
        let termini = edge_termini(&edges);
        edges = integrate_polygons(kernel, edges, &termini, &polygons, config.min_edge_length);
    }

    info!("Consolidating nodes to remove duplicates...");
    let mut nodes = consolidate_nodes(&edges);

    reproject_edges(&mut edges, back);
    reproject_nodes(&mut nodes, back);
    reproject_lines(&mut orphans, back);

    info!(
        "Built {} edges, {} nodes, {} orphans",
        edges.len(),
        nodes.len(),
        orphans.len()
    );
    Ok(ConversionResult {
        edges,
        nodes,
        orphans,
        crs: source_crs,
        repair,
    })
}

/// Reads a GeoJSON ways file and converts it. `crs_override` wins over any CRS
/// declared in the file.
pub fn convert_ways_file(
    path: &Path,
    crs_override: Option<&Crs>,
    config: &ConversionConfig,
) -> Result<ConversionResult> {
    let ways = read_ways(path, crs_override)?;
    convert_ways_to_edges(ways, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point};
    use serde_json::json;

    #[test]
    fn test_points_are_rejected_with_their_kind() {
        let table = WayTable::new(
            Crs::web_mercator(),
            vec![
                Way::new(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)])),
                Way::new(Geometry::Point(point!(x: 1.0, y: 1.0))),
            ],
        );
        match convert_ways_to_edges(table, &ConversionConfig::default()) {
            Err(ConvertError::InvalidGeometryType { found }) => {
                assert_eq!(found, vec!["Point".to_string()])
            }
            other => panic!("expected InvalidGeometryType, got {:?}", other.map(|r| r.edges)),
        }
    }

    #[test]
    fn test_missing_crs() {
        let table = WayTable {
            crs: None,
            ways: vec![Way::new(Geometry::LineString(
                line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
            ))],
        };
        assert!(matches!(
            convert_ways_to_edges(table, &ConversionConfig::default()),
            Err(ConvertError::MissingCrs)
        ));
    }

    #[test]
    fn test_repair_counts_and_lowercases_columns() {
        let mut attributes = Attributes::new();
        attributes.insert("Name".to_string(), json!("A"));
        let ways = vec![
            Way::with_attributes(
                Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
                attributes,
            ),
            Way::new(Geometry::LineString(line_string![(x: 5.0, y: 5.0), (x: 5.0, y: 5.0)])),
        ];
        let (kept, report) = repair_ways(&PlanarKernel, ways);
        assert_eq!(kept.len(), 1, "duplicate vertices alone do not invalidate a line");
        assert_eq!(report.invalid, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.reasons.get("Too few points"), Some(&1));

        let lowered = lowercase_columns(kept[0].attributes.clone());
        assert_eq!(lowered.get("name"), Some(&json!("A")));
    }
}
