//! Minimal GeoJSON reader for AOI and geology uploads.
//!
//! Accepts `Polygon`, `MultiPolygon` (each part becomes a polygon), `Feature`
//! and `FeatureCollection`. Property values are flattened to strings so the
//! geology keyword filter can search them.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{LonLat, Polygon};
use crate::error::{PipelineError, Result};

/// A polygon with its flattened feature properties.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub polygon: Polygon,
    pub properties: BTreeMap<String, String>,
}

/// Parse every polygon in a GeoJSON document.
pub fn parse_polygon_features(doc: &Value) -> Result<Vec<PolygonFeature>> {
    let mut out = Vec::new();
    collect(doc, &BTreeMap::new(), &mut out)?;
    Ok(out)
}

/// Parse the first polygon of a GeoJSON document (AOI upload).
pub fn parse_first_polygon(doc: &Value) -> Result<Polygon> {
    parse_polygon_features(doc)?
        .into_iter()
        .next()
        .map(|f| f.polygon)
        .ok_or_else(|| PipelineError::invalid("aoi", "GeoJSON contains no polygon"))
}

/// GeoJSON `Polygon` geometry with closed rings.
pub fn polygon_to_geojson(poly: &Polygon) -> Value {
    let ring = |pts: &[LonLat]| -> Value {
        let mut coords: Vec<Value> = pts.iter().map(|p| json!([p.lon, p.lat])).collect();
        if let Some(first) = coords.first().cloned() {
            coords.push(first);
        }
        Value::Array(coords)
    };
    let mut rings = vec![ring(&poly.exterior)];
    rings.extend(poly.holes.iter().map(|h| ring(h)));
    json!({ "type": "Polygon", "coordinates": rings })
}

fn collect(
    node: &Value,
    props: &BTreeMap<String, String>,
    out: &mut Vec<PolygonFeature>,
) -> Result<()> {
    match node.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = node
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| bad("FeatureCollection without `features` array"))?;
            for f in features {
                collect(f, props, out)?;
            }
        }
        Some("Feature") => {
            let props = flatten_properties(node.get("properties"));
            match node.get("geometry") {
                Some(g) if !g.is_null() => collect(g, &props, out)?,
                _ => return Err(bad("Feature without geometry")),
            }
        }
        Some("Polygon") => {
            let coords = node.get("coordinates").ok_or_else(|| bad("Polygon without coordinates"))?;
            out.push(PolygonFeature { polygon: polygon_from_coords(coords)?, properties: props.clone() });
        }
        Some("MultiPolygon") => {
            let parts = node
                .get("coordinates")
                .and_then(Value::as_array)
                .ok_or_else(|| bad("MultiPolygon without coordinates"))?;
            for part in parts {
                out.push(PolygonFeature { polygon: polygon_from_coords(part)?, properties: props.clone() });
            }
        }
        // Points and lines carry no area; skip them.
        Some(_) => {}
        None => return Err(bad("object without `type`")),
    }
    Ok(())
}

fn polygon_from_coords(coords: &Value) -> Result<Polygon> {
    let rings = coords.as_array().ok_or_else(|| bad("polygon coordinates must be an array"))?;
    let mut parsed = rings.iter().map(ring_from_coords);
    let exterior = parsed.next().ok_or_else(|| bad("polygon without rings"))??;
    let holes = parsed.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn ring_from_coords(ring: &Value) -> Result<Vec<LonLat>> {
    ring.as_array()
        .ok_or_else(|| bad("ring must be an array"))?
        .iter()
        .map(|pos| {
            let xy = pos.as_array().ok_or_else(|| bad("position must be an array"))?;
            match (xy.first().and_then(Value::as_f64), xy.get(1).and_then(Value::as_f64)) {
                (Some(lon), Some(lat)) => Ok(LonLat::new(lon, lat)),
                _ => Err(bad("position needs numeric lon, lat")),
            }
        })
        .collect()
}

fn flatten_properties(props: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(map)) = props {
        for (k, v) in map {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            out.insert(k.clone(), s);
        }
    }
    out
}

fn bad(reason: &str) -> PipelineError {
    PipelineError::invalid("geojson", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_collection_with_properties() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"lithology": "Carbonatite", "age_ma": 120},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            }]
        });
        let features = parse_polygon_features(&doc).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].polygon.exterior.len(), 4);
        assert_eq!(features[0].properties["lithology"], "Carbonatite");
        assert_eq!(features[0].properties["age_ma"], "120");
    }

    #[test]
    fn first_polygon_from_bare_geometry() {
        let doc = json!({
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]],
                [[0.5, 0.5], [0.5, 1.0], [1.0, 1.0], [0.5, 0.5]]
            ]
        });
        let p = parse_first_polygon(&doc).unwrap();
        assert_eq!(p.holes.len(), 1);
    }

    #[test]
    fn malformed_positions_are_rejected() {
        let doc = json!({"type": "Polygon", "coordinates": [[[0.0], [1.0, 0.0]]]});
        assert!(parse_first_polygon(&doc).is_err());
        assert!(parse_first_polygon(&json!({"type": "Point", "coordinates": [0.0, 0.0]})).is_err());
    }

    #[test]
    fn written_rings_are_closed() {
        let poly = Polygon::rectangle(crate::geo::Bounds::new(0.0, 0.0, 1.0, 1.0));
        let g = polygon_to_geojson(&poly);
        let ring = g["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(parse_first_polygon(&g).unwrap(), poly);
    }
}
