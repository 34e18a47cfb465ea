//! Geology mask from uploaded lithology polygons.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{PipelineError, Result};
use crate::geo::geojson::{parse_polygon_features, polygon_to_geojson, PolygonFeature};
use crate::raster::{GridSpec, Raster};

/// Lithology terms associated with rare-earth mineralization.
pub const FAVORABLE_LITHOLOGY: [&str; 9] = [
    "carbonatite",
    "alkaline",
    "syenite",
    "ijolite",
    "nepheline",
    "granite pegmatite",
    "ree",
    "monazite",
    "bastnaesite",
];

/// Uploaded geology polygons, carried in run parameters as GeoJSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct GeologyLayer {
    pub features: Vec<PolygonFeature>,
}

impl GeologyLayer {
    pub fn from_geojson(doc: &Value) -> Result<Self> {
        Ok(Self { features: parse_polygon_features(doc)? })
    }

    /// Features whose property text mentions a favorable lithology.
    pub fn favorable(&self) -> impl Iterator<Item = &PolygonFeature> + '_ {
        self.features.iter().filter(|f| is_favorable(f))
    }
}

impl TryFrom<Value> for GeologyLayer {
    type Error = PipelineError;

    fn try_from(v: Value) -> Result<Self> {
        Self::from_geojson(&v)
    }
}

impl From<GeologyLayer> for Value {
    fn from(layer: GeologyLayer) -> Value {
        let features: Vec<Value> = layer
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "properties": f.properties,
                    "geometry": polygon_to_geojson(&f.polygon),
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

fn is_favorable(f: &PolygonFeature) -> bool {
    let text = f.properties.values().map(|v| v.to_lowercase()).collect::<Vec<_>>().join(" ");
    FAVORABLE_LITHOLOGY.iter().any(|k| text.contains(k))
}

/// Rasterize favorable polygons by cell-centre containment: 1 inside, 0
/// outside. `None` when no feature matches.
pub fn geology_mask(layer: &GeologyLayer, grid: &GridSpec) -> Option<Raster> {
    let polys: Vec<_> = layer.favorable().map(|f| &f.polygon).collect();
    if polys.is_empty() {
        return None;
    }
    let mut mask = Raster::new(grid.clone(), 0.0);
    for r in 0..grid.height {
        for c in 0..grid.width {
            let p = grid.center_lonlat(r, c);
            if polys.iter().any(|poly| poly.contains(p)) {
                mask.set(r, c, 1.0);
            }
        }
    }
    Some(mask)
}
