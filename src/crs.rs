// ===========================================================================
// Coordinate reference systems and the reprojection applied at pipeline entry/exit
// ===========================================================================
use crate::error::{ConvertError, Result};
use crate::model::{Edge, Node, WayTable};
use geo::{Coord, LineString, MapCoordsInPlace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude beyond which spherical mercator diverges.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A normalised `AUTHORITY:CODE` identifier, e.g. `EPSG:3857`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(String);

impl Crs {
    pub fn wgs84() -> Self {
        Crs("EPSG:4326".to_string())
    }

    pub fn web_mercator() -> Self {
        Crs("EPSG:3857".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Crs {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let upper = raw.to_ascii_uppercase();

        // urn:ogc:def:crs:EPSG::3857, urn:ogc:def:crs:OGC:1.3:CRS84
        let compact = match upper.strip_prefix("URN:OGC:DEF:CRS:") {
            Some(rest) => {
                let mut parts = rest.split(':').filter(|p| !p.is_empty());
                let authority = parts.next().unwrap_or_default();
                let code = parts.last().unwrap_or_default();
                format!("{}:{}", authority, code)
            }
            None => upper,
        };

        let normalised = match compact.as_str() {
            "OGC:CRS84" | "CRS84" | "WGS84" => "EPSG:4326".to_string(),
            "EPSG:900913" | "EPSG:3785" | "EPSG:102100" | "ESRI:102100" => "EPSG:3857".to_string(),
            other => other.to_string(),
        };

        match normalised.split_once(':') {
            Some((authority, code)) if !authority.is_empty() && !code.is_empty() => {
                Ok(Crs(normalised))
            }
            _ => Err(ConvertError::UnsupportedCrs(raw.to_string())),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert lat/lng (EPSG:4326) to Web Mercator (EPSG:3857)
/// Input: (longitude, latitude) in degrees
/// Output: (x, y) in meters
pub fn lat_lng_to_web_merc(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln();
    (x, y)
}

/// Convert Web Mercator (EPSG:3857) to lat/lng (EPSG:4326)
/// Input: (x, y) in meters
/// Output: (longitude, latitude) in degrees
pub fn web_merc_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    ToWebMercator,
    ToWgs84,
}

impl Transform {
    pub fn between(from: &Crs, to: &Crs) -> Result<Self> {
        if from == to {
            return Ok(Transform::Identity);
        }
        match (from.as_str(), to.as_str()) {
            ("EPSG:4326", "EPSG:3857") => Ok(Transform::ToWebMercator),
            ("EPSG:3857", "EPSG:4326") => Ok(Transform::ToWgs84),
            _ => Err(ConvertError::UnsupportedReprojection {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn apply(self, coord: Coord) -> Coord {
        let (x, y) = match self {
            Transform::Identity => return coord,
            Transform::ToWebMercator => lat_lng_to_web_merc(coord.x, coord.y),
            Transform::ToWgs84 => web_merc_to_lat_lng(coord.x, coord.y),
        };
        Coord { x, y }
    }

    fn apply_line(self, line: &mut LineString) {
        if self != Transform::Identity {
            line.map_coords_in_place(|c| self.apply(c));
        }
    }
}

/// Reprojects every way into `target`. The table must carry a CRS.
pub fn reproject(mut table: WayTable, target: &Crs) -> Result<WayTable> {
    let source = table.crs.clone().ok_or(ConvertError::MissingCrs)?;
    let transform = Transform::between(&source, target)?;
    if transform != Transform::Identity {
        for way in &mut table.ways {
            way.geometry.map_coords_in_place(|c| transform.apply(c));
        }
    }
    table.crs = Some(target.clone());
    Ok(table)
}

pub fn reproject_edges(edges: &mut [Edge], transform: Transform) {
    for edge in edges {
        transform.apply_line(&mut edge.geometry);
    }
}

pub fn reproject_nodes(nodes: &mut [Node], transform: Transform) {
    for node in nodes {
        node.geometry = transform.apply(node.geometry);
    }
}

pub fn reproject_lines(lines: &mut [LineString], transform: Transform) {
    for line in lines {
        transform.apply_line(line);
    }
}
