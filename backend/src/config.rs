/// Tunables for the collection and playback engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Radius for `in_range` proximity queries.
    pub collection_radius_m: f64,
    /// Two points of the same category closer than this are the same place.
    pub dedup_radius_m: f64,
    /// Target spacing of the resampled playback path.
    pub step_spacing_m: f64,
    pub poi_search_radius_m: f64,
    pub poi_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collection_radius_m: 100.0,
            dedup_radius_m: 50.0,
            step_spacing_m: 20.0,
            poi_search_radius_m: 200.0,
            poi_cache_capacity: 128,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `COLLECTION_RADIUS_M`, `STEP_SPACING_M` and
    /// `POI_SEARCH_RADIUS_M` when they hold positive numbers.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            collection_radius_m: env_meters("COLLECTION_RADIUS_M")
                .unwrap_or(defaults.collection_radius_m),
            step_spacing_m: env_meters("STEP_SPACING_M").unwrap_or(defaults.step_spacing_m),
            poi_search_radius_m: env_meters("POI_SEARCH_RADIUS_M")
                .unwrap_or(defaults.poi_search_radius_m),
            ..defaults
        }
    }
}

fn env_meters(key: &str) -> Option<f64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Some(value),
        _ => {
            tracing::warn!("ignoring {key}={raw:?}: expected a positive number of meters");
            None
        }
    }
}
