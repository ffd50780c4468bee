use serde::{Deserialize, Serialize};

pub const DEFAULT_CONNECTION_TOLERANCE: f64 = 3.2;
pub const DEFAULT_MIN_EDGE_LENGTH: f64 = 1.6;
pub const DEFAULT_INTERMEDIATE_CRS: &str = "EPSG:3857";
pub const DEFAULT_OVERSHOOT: f64 = 0.000001;
pub const DEFAULT_ATTRIBUTE_BUFFER: f64 = 0.01;

/// Tunables of a conversion run. Distances are in units of `intermediate_crs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Maximum gap a dangling line end is extended across.
    pub connection_tolerance: f64,
    /// Edges shorter than this are dropped after each splitting pass.
    pub min_edge_length: f64,
    /// Abort with an error instead of warning when orphan lines are found.
    pub suppress_orphans: bool,
    pub intermediate_crs: String,
    /// Distance an extension is pushed past its contact point.
    pub overshoot: f64,
    /// Buffer used when matching split edges back to their source lines.
    pub attribute_buffer: f64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            connection_tolerance: DEFAULT_CONNECTION_TOLERANCE,
            min_edge_length: DEFAULT_MIN_EDGE_LENGTH,
            suppress_orphans: true,
            intermediate_crs: DEFAULT_INTERMEDIATE_CRS.to_string(),
            overshoot: DEFAULT_OVERSHOOT,
            attribute_buffer: DEFAULT_ATTRIBUTE_BUFFER,
        }
    }
}
