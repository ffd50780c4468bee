use crate::error::{ConvertError, Result};
use crate::model::{Edge, Terminus, TerminusRole, geometry_kind};
use geo::{Coord, Geometry};

fn first_last(coords: &[Coord]) -> Option<(Coord, Coord)> {
    Some((*coords.first()?, *coords.last()?))
}

fn push_pair(termini: &mut Vec<Terminus>, line_index: usize, (start, end): (Coord, Coord)) {
    termini.push(Terminus {
        point: start,
        line_index,
        role: TerminusRole::Start,
    });
    termini.push(Terminus {
        point: end,
        line_index,
        role: TerminusRole::End,
    });
}

/// Given a table of line geometries, return their terminal points (start and end),
/// tagged with the index of the line to which each belongs.
///
/// MultiLineStrings contribute the termini of their first part.
pub fn get_line_termini(lines: &[Geometry<f64>]) -> Result<Vec<Terminus>> {
    let mut termini = Vec::with_capacity(lines.len() * 2);
    for (line_index, geometry) in lines.iter().enumerate() {
        let coords = match geometry {
            Geometry::LineString(line) => &line.0[..],
            Geometry::MultiLineString(multi) => multi.0.first().map_or(&[][..], |l| &l.0[..]),
            other => {
                return Err(ConvertError::UnsupportedGeometry {
                    index: line_index,
                    kind: geometry_kind(other).to_string(),
                });
            }
        };
        if let Some(pair) = first_last(coords) {
            push_pair(&mut termini, line_index, pair);
        }
    }
    Ok(termini)
}

/// Termini of an edge table, indexed by position in `edges`.
pub fn edge_termini(edges: &[Edge]) -> Vec<Terminus> {
    let mut termini = Vec::with_capacity(edges.len() * 2);
    for (line_index, edge) in edges.iter().enumerate() {
        if let Some(pair) = first_last(&edge.geometry.0) {
            push_pair(&mut termini, line_index, pair);
        }
    }
    termini
}
