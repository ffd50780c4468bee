#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Turns raw linear ways (and optional area polygons) into a planar edge graph:
//! edges that meet only at shared endpoints, plus a deduplicated node table.

pub mod error;

pub mod config;
pub mod crs;
pub mod export;
pub mod kernel;
pub mod loader;
pub mod model;
pub mod nodes;
pub mod orphans;
pub mod pipeline;
pub mod polygons;
pub mod resolver;
pub mod splitter;
pub mod termini;
pub mod tracer;

pub use config::ConversionConfig;
pub use crs::Crs;
pub use error::{ConvertError, Result};
pub use export::{ExportOptions, write_result};
pub use kernel::{GeometryKernel, PlanarKernel};
pub use model::{Attributes, Edge, Node, Orphan, SyntheticTag, Terminus, TerminusRole, Way, WayTable};
pub use nodes::consolidate_nodes;
pub use orphans::find_orphan_lines;
pub use pipeline::{
    ConversionResult, RepairReport, convert_ways_file, convert_ways_to_edges,
    convert_ways_to_edges_with,
};
pub use resolver::resolve_unconnected_line_ends;
pub use splitter::{LinesToEdges, lines_to_edges};
pub use termini::{edge_termini, get_line_termini};
pub use tracer::trace_boundary_part;
