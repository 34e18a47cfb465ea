//! Process-wide settings, read once at startup.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_STAC_API_URL: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";
pub const DEFAULT_S2_COLLECTION: &str = "sentinel-2-l2a";
pub const DEFAULT_DEM_COLLECTION: &str = "cop-dem-glo-30";
pub const DEFAULT_MAX_AOI_KM2: f64 = 2500.0;

/// Read-only configuration shared by every run in the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub stac_api_url: String,
    pub imagery_collection: String,
    /// DEM collections tried in order.
    pub dem_collections: Vec<String>,
    pub max_aoi_km2: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stac_api_url: DEFAULT_STAC_API_URL.to_string(),
            imagery_collection: DEFAULT_S2_COLLECTION.to_string(),
            dem_collections: vec![DEFAULT_DEM_COLLECTION.to_string()],
            max_aoi_km2: DEFAULT_MAX_AOI_KM2,
        }
    }
}

impl Settings {
    /// Load from `STAC_API_URL`, `STAC_COLLECTION_S2`, `STAC_COLLECTION_DEM`
    /// (comma-separated) and `MAX_AOI_KM2`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`Settings::from_env`] with an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut s = Settings::default();
        if let Some(url) = get("STAC_API_URL").filter(|v| !v.trim().is_empty()) {
            s.stac_api_url = url.trim().to_string();
        }
        if let Some(c) = get("STAC_COLLECTION_S2").filter(|v| !v.trim().is_empty()) {
            s.imagery_collection = c.trim().to_string();
        }
        if let Some(list) = get("STAC_COLLECTION_DEM") {
            let dem: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if !dem.is_empty() {
                s.dem_collections = dem;
            }
        }
        if let Some(raw) = get("MAX_AOI_KM2") {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => s.max_aoi_km2 = v,
                _ => warn!(value = %raw, "ignoring invalid MAX_AOI_KM2"),
            }
        }
        s
    }
}
