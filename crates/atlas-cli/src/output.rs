//! Artifact writer: score raster and metadata as JSON, targets as GeoJSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use atlas_core::geo::geojson::polygon_to_geojson;
use atlas_core::sources::{OutputSink, SourceError};
use atlas_core::{RunResult, ScoreMeta, ScoreRaster, Target};

pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    fn write(&self, name: &str, value: &Value) -> Result<(), SourceError> {
        let path = self.dir.join(name);
        let text = serde_json::to_string_pretty(value).map_err(|e| SourceError::Failed(e.to_string()))?;
        fs::write(&path, text).map_err(|e| SourceError::Failed(format!("{}: {e}", path.display())))
    }
}

impl OutputSink for DirectorySink {
    fn publish(
        &self,
        run_id: &str,
        score: &ScoreRaster,
        targets: &[Target],
        meta: &ScoreMeta,
    ) -> Result<(), SourceError> {
        self.write("score.json", &to_json(score)?)?;
        self.write("meta.json", &to_json(meta)?)?;
        self.write("targets.geojson", &targets_geojson(run_id, targets))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, SourceError> {
    serde_json::to_value(value).map_err(|e| SourceError::Failed(e.to_string()))
}

/// One GeoJSON feature per target, in rank order.
pub fn targets_geojson(run_id: &str, targets: &[Target]) -> Value {
    let features: Vec<Value> = targets
        .iter()
        .map(|t| {
            let chips: Vec<&str> = t.evidence_summary.iter().map(|c| c.label.as_str()).collect();
            json!({
                "type": "Feature",
                "id": t.id,
                "geometry": polygon_to_geojson(&t.geometry),
                "properties": {
                    "run_id": run_id,
                    "centroid": [t.centroid.lon, t.centroid.lat],
                    "area_km2": t.area_km2,
                    "pixel_count": t.pixel_count,
                    "mean_score": t.mean_score,
                    "max_score": t.max_score,
                    "distance_to_road_m": t.distance_to_road_m,
                    "distance_to_river_m": t.distance_to_river_m,
                    "evidence": t.evidence,
                    "reasons": chips,
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Run result without the bulky score raster, which lives in `score.json`.
pub fn summary(result: &RunResult) -> Value {
    let mut out = json!({ "run_id": result.run_id, "steps": result.steps });
    match (result.artifacts(), result.failure()) {
        (Some(a), _) => {
            out["status"] = json!("completed");
            out["targets"] = json!(a.targets.iter().map(|t| &t.id).collect::<Vec<_>>());
            out["meta"] = serde_json::to_value(&a.meta).unwrap_or(Value::Null);
        }
        (None, Some(f)) => {
            out["status"] = json!("failed");
            out["failure"] = serde_json::to_value(f).unwrap_or(Value::Null);
        }
        (None, None) => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_targets_is_an_empty_collection() {
        let doc = targets_geojson("r", &[]);
        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["features"].as_array().map(Vec::len), Some(0));
    }
}
