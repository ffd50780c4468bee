use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures of a conversion run. Per-row anomalies (irreparable geometry,
/// degenerate extension vectors, unresolved termini) never surface here.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Ways file not found: {0}")]
    InputNotFound(PathBuf),
    #[error("Input ways table has no CRS defined")]
    MissingCrs,
    #[error(
        "All geometries must be LineString, MultiLineString, Polygon, or MultiPolygon types. Found geometry types: {found:?}"
    )]
    InvalidGeometryType { found: Vec<String> },
    #[error("No LineString or MultiLineString geometries found in the input ways table")]
    NoLinearGeometry,
    #[error("Found {0} orphan lines. Cannot proceed with splitting at intersections.")]
    OrphanLinesFound(usize),
    #[error("Entry {index} is a {kind}, expected LineString or MultiLineString")]
    UnsupportedGeometry { index: usize, kind: String },
    #[error("Unsupported coordinate reference system '{0}'")]
    UnsupportedCrs(String),
    #[error("No transform available from {from} to {to}")]
    UnsupportedReprojection { from: String, to: String },
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

macro_rules! io_err {
    ($path:expr, $err:expr) => {
        $crate::error::ConvertError::Io {
            path: $path.to_path_buf(),
            source: $err,
        }
    };
}

pub(crate) use io_err;
