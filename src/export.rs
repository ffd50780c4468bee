use crate::crs::Crs;
use crate::error::{Result, io_err};
use crate::model::Attributes;
use crate::pipeline::ConversionResult;
use geo::{LineString, Point};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use log::info;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub write_nodes: bool,
    pub write_orphans: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            write_nodes: true,
            write_orphans: true,
        }
    }
}

/// Files written by [`write_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub edges: PathBuf,
    pub nodes: Option<PathBuf>,
    pub orphans: Option<PathBuf>,
}

/// `roads.geojson` -> `roads_vertices.geojson`
pub fn sibling_path(edges_path: &Path, suffix: &str) -> PathBuf {
    let stem = edges_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match edges_path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    edges_path.with_file_name(file_name)
}

/// `fid`, `fid1`, `fid23`, ... are row ids of the source table, meaningless after splitting.
fn is_fid_column(column: &str) -> bool {
    column
        .strip_prefix("fid")
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

fn crs_member(crs: &Crs) -> JsonObject {
    let mut members = JsonObject::new();
    members.insert(
        "crs".to_string(),
        json!({"type": "name", "properties": {"name": crs.as_str()}}),
    );
    members
}

fn feature(geometry: geojson::Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>, crs: &Crs) -> GeoJson {
    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(crs_member(crs)),
    })
}

pub fn edges_to_geojson(result: &ConversionResult) -> GeoJson {
    let features = result
        .edges
        .iter()
        .map(|edge| {
            let mut properties: Attributes = edge
                .attributes
                .iter()
                .filter(|(column, _)| !is_fid_column(column))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect();
            properties.insert("edge_id".to_string(), JsonValue::from(edge.id));
            feature(geojson::Value::from(&edge.geometry), properties)
        })
        .collect();
    collection(features, &result.crs)
}

pub fn nodes_to_geojson(result: &ConversionResult) -> GeoJson {
    let features = result
        .nodes
        .iter()
        .map(|node| {
            let mut properties = node.attributes.clone();
            properties.insert("edges".to_string(), json!(node.incident_edges));
            properties.insert("node_id".to_string(), JsonValue::from(node.id));
            feature(
                geojson::Value::from(&Point::from(node.geometry)),
                properties,
            )
        })
        .collect();
    collection(features, &result.crs)
}

pub fn orphans_to_geojson(orphans: &[LineString], crs: &Crs) -> GeoJson {
    let features = orphans
        .iter()
        .map(|orphan| feature(geojson::Value::from(orphan), JsonObject::new()))
        .collect();
    collection(features, crs)
}

fn write_geojson(path: &Path, geojson: &GeoJson) -> Result<()> {
    let file = File::create(path).map_err(|e| io_err!(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, geojson)?;
    writer.flush().map_err(|e| io_err!(path, e))?;
    Ok(())
}

/// Writes edges to `edges_path`, and nodes and orphans next to it as
/// `<stem>_vertices.<ext>` and `<stem>_orphans.<ext>`.
pub fn write_result(
    result: &ConversionResult,
    edges_path: &Path,
    options: ExportOptions,
) -> Result<WrittenFiles> {
    write_geojson(edges_path, &edges_to_geojson(result))?;
    info!("Wrote {} edges to {}", result.edges.len(), edges_path.display());

    let nodes = if options.write_nodes {
        let path = sibling_path(edges_path, "_vertices");
        write_geojson(&path, &nodes_to_geojson(result))?;
        info!("Wrote {} nodes to {}", result.nodes.len(), path.display());
        Some(path)
    } else {
        None
    };

    let orphans = if options.write_orphans {
        let path = sibling_path(edges_path, "_orphans");
        write_geojson(&path, &orphans_to_geojson(&result.orphans, &result.crs))?;
        info!("Wrote {} orphans to {}", result.orphans.len(), path.display());
        Some(path)
    } else {
        None
    };

    Ok(WrittenFiles {
        edges: edges_path.to_path_buf(),
        nodes,
        orphans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};
    use crate::pipeline::RepairReport;
    use geo::{Coord, line_string};

    fn sample_result() -> ConversionResult {
        let mut attributes = Attributes::new();
        attributes.insert("fid".to_string(), json!(7));
        attributes.insert("fid2".to_string(), json!(8));
        attributes.insert("fid_2".to_string(), json!(9));
        attributes.insert("fid_".to_string(), json!(10));
        attributes.insert("fidelity".to_string(), json!("high"));
        ConversionResult {
            edges: vec![Edge::new(
                0,
                line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
                attributes,
            )],
            nodes: vec![Node {
                id: 0,
                geometry: Coord { x: 0.0, y: 0.0 },
                incident_edges: vec![0],
                attributes: Attributes::new(),
            }],
            orphans: Vec::new(),
            crs: Crs::web_mercator(),
            repair: RepairReport::default(),
        }
    }

    #[test]
    fn test_sibling_paths() {
        assert_eq!(
            sibling_path(Path::new("/out/roads.geojson"), "_vertices"),
            PathBuf::from("/out/roads_vertices.geojson")
        );
        assert_eq!(
            sibling_path(Path::new("roads"), "_orphans"),
            PathBuf::from("roads_orphans")
        );
    }

    #[test]
    fn test_edges_drop_fid_columns() {
        let GeoJson::FeatureCollection(collection) = edges_to_geojson(&sample_result()) else {
            panic!("expected a feature collection");
        };
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert!(!properties.contains_key("fid"));
        assert!(!properties.contains_key("fid2"));
        assert_eq!(properties["fid_2"], json!(9));
        assert_eq!(properties["fid_"], json!(10));
        assert_eq!(properties["fidelity"], json!("high"));
        assert_eq!(properties["edge_id"], json!(0));
        assert_eq!(
            collection.foreign_members.unwrap()["crs"]["properties"]["name"],
            json!("EPSG:3857")
        );
    }

    #[test]
    fn test_nodes_list_their_edges() {
        let GeoJson::FeatureCollection(collection) = nodes_to_geojson(&sample_result()) else {
            panic!("expected a feature collection");
        };
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["edges"], json!([0]));
        assert_eq!(properties["node_id"], json!(0));
    }
}
