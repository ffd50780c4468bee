use crate::kernel::{CoordKey, coord_key};
use crate::model::{Attributes, Edge, Node};
use crate::termini::edge_termini;
use ahash::AHashMap;
use serde_json::Value;

/// Collapses the termini of `edges` into one node per distinct location (exact match),
/// in first-seen order.
///
/// Each node lists the ids of its incident edges and, for every column present on any
/// of them, one value per incident edge (null where an edge lacks that column).
pub fn consolidate_nodes(edges: &[Edge]) -> Vec<Node> {
    let mut slots: AHashMap<CoordKey, usize> = AHashMap::new();
    let mut nodes: Vec<Node> = Vec::new();

    for terminus in edge_termini(edges) {
        let slot = *slots.entry(coord_key(terminus.point)).or_insert_with(|| {
            nodes.push(Node {
                id: nodes.len(),
                geometry: terminus.point,
                incident_edges: Vec::new(),
                attributes: Attributes::new(),
            });
            nodes.len() - 1
        });
        nodes[slot].incident_edges.push(edges[terminus.line_index].id);
    }

    let position: AHashMap<usize, usize> = edges
        .iter()
        .enumerate()
        .map(|(position, edge)| (edge.id, position))
        .collect();

    for node in &mut nodes {
        let incident: Vec<&Edge> = node
            .incident_edges
            .iter()
            .filter_map(|id| position.get(id).map(|&p| &edges[p]))
            .collect();

        for edge in &incident {
            for column in edge.attributes.keys() {
                if node.attributes.contains_key(column) {
                    continue;
                }
                let values = incident
                    .iter()
                    .map(|e| e.attributes.get(column).cloned().unwrap_or(Value::Null))
                    .collect();
                node.attributes.insert(column.clone(), Value::Array(values));
            }
        }
    }

    nodes
}
