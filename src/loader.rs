use crate::crs::Crs;
use crate::error::{ConvertError, Result, io_err};
use crate::model::{Attributes, Way, WayTable};
use geo::{Geometry, GeometryCollection};
use geojson::{Feature, GeoJson, JsonObject, JsonValue};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// CRS named by the legacy `crs` member, `{"type": "name", "properties": {"name": ...}}`.
pub fn declared_crs(foreign_members: Option<&JsonObject>) -> Result<Option<Crs>> {
    let name = foreign_members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|properties| properties.get("name"))
        .and_then(JsonValue::as_str);
    name.map(|name| name.parse::<Crs>()).transpose()
}

fn feature_to_way(feature: Feature) -> Result<Way> {
    let geometry = match feature.geometry {
        Some(geometry) => Geometry::<f64>::try_from(geometry)?,
        // repaired away (and counted) downstream
        None => Geometry::GeometryCollection(GeometryCollection(Vec::new())),
    };
    Ok(Way::with_attributes(
        geometry,
        feature.properties.unwrap_or_else(Attributes::new),
    ))
}

/// Parses GeoJSON text into a way table. A bare Feature or Geometry is accepted
/// as a one-row table.
pub fn parse_ways(text: &str, crs_override: Option<&Crs>) -> Result<WayTable> {
    let (ways, declared) = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => {
            let declared = declared_crs(collection.foreign_members.as_ref())?;
            let ways = collection
                .features
                .into_iter()
                .map(feature_to_way)
                .collect::<Result<Vec<Way>>>()?;
            (ways, declared)
        }
        GeoJson::Feature(feature) => {
            let declared = declared_crs(feature.foreign_members.as_ref())?;
            (vec![feature_to_way(feature)?], declared)
        }
        GeoJson::Geometry(geometry) => (vec![Way::new(Geometry::<f64>::try_from(geometry)?)], None),
    };

    let crs = match (crs_override, declared) {
        (Some(explicit), Some(declared)) if *explicit != declared => {
            warn!(
                "Input declares {} but {} was requested; using {}",
                declared, explicit, explicit
            );
            Some(explicit.clone())
        }
        (Some(explicit), _) => Some(explicit.clone()),
        (None, declared) => declared,
    };
    Ok(WayTable { crs, ways })
}

/// Reads a GeoJSON ways file.
pub fn read_ways(path: &Path, crs_override: Option<&Crs>) -> Result<WayTable> {
    if !path.is_file() {
        return Err(ConvertError::InputNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| io_err!(path, e))?;
    let table = parse_ways(&text, crs_override)?;
    info!(
        "Loaded {} ways from {}",
        table.ways.len(),
        path.display()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAYS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
        "features": [
            {"type": "Feature", "properties": {"Name": "a"},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]}},
            {"type": "Feature", "properties": null, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_declared_crs_and_null_geometry() {
        let table = parse_ways(WAYS, None).unwrap();
        assert_eq!(table.crs, Some(Crs::web_mercator()));
        assert_eq!(table.ways.len(), 2);
        assert_eq!(table.ways[0].attributes["Name"], "a");
        assert!(matches!(
            table.ways[1].geometry,
            Geometry::GeometryCollection(ref c) if c.0.is_empty()
        ));
    }

    #[test]
    fn test_override_wins() {
        let table = parse_ways(WAYS, Some(&Crs::wgs84())).unwrap();
        assert_eq!(table.crs, Some(Crs::wgs84()));
    }

    #[test]
    fn test_missing_file() {
        let missing = Path::new("/nonexistent/ways.geojson");
        assert!(matches!(
            read_ways(missing, None),
            Err(ConvertError::InputNotFound(_))
        ));
    }
}
