//! Engine configuration.

use std::path::Path;

use bytefarm_runtime::{ActionKind, DEFAULT_OUTPUT_CAPACITY};
use bytefarm_world::map::INITIAL_MAP_SIZE;
use bytefarm_world::state::NEARBY_RADIUS;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Base durations in ticks (1 tick = 1 simulated millisecond).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDurations {
    /// Scaled by the avatar's move speed.
    pub move_ticks: u64,
    /// Scaled by the avatar's collect speed.
    pub collect_ticks: u64,
    pub till_ticks: u64,
    pub plant_ticks: u64,
}

impl ActionDurations {
    pub fn base(&self, action: ActionKind) -> u64 {
        match action {
            ActionKind::Move => self.move_ticks,
            ActionKind::Collect => self.collect_ticks,
            ActionKind::Till => self.till_ticks,
            ActionKind::Plant => self.plant_ticks,
        }
    }
}

impl Default for ActionDurations {
    fn default() -> Self {
        Self {
            move_ticks: 500,
            collect_ticks: 500,
            till_ticks: 200,
            plant_ticks: 100,
        }
    }
}

/// Settings for a [`FarmEngine`](crate::farm::FarmEngine).
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```
/// use bytefarm_engine::config::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{"durations": {"till_ticks": 50}}"#).unwrap();
/// assert_eq!(config.durations.till_ticks, 50);
/// assert_eq!(config.durations.move_ticks, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub durations: ActionDurations,
    /// Lines kept by the output buffer before the oldest are dropped.
    pub output_capacity: usize,
    /// Chebyshev radius used by `get_nearby()`.
    pub nearby_radius: i32,
    /// Side of a fresh map.
    pub initial_map_size: u32,
    /// Fuel granted to WASM programs; `None` runs them unmetered.
    pub wasm_fuel: Option<u64>,
    /// Frame step of the headless runner, in ticks.
    pub frame_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            durations: ActionDurations::default(),
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            nearby_radius: NEARBY_RADIUS,
            initial_map_size: INITIAL_MAP_SIZE,
            wasm_fuel: None,
            frame_ms: 16,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let config_error = |message: String| EngineError::Config {
            path: path.to_path_buf(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let config = Self::from_json_str(&text).map_err(|e| config_error(e.to_string()))?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_base_rules() {
        let config = EngineConfig::default();
        assert_eq!(config.durations.base(ActionKind::Move), 500);
        assert_eq!(config.durations.base(ActionKind::Collect), 500);
        assert_eq!(config.durations.base(ActionKind::Till), 200);
        assert_eq!(config.durations.base(ActionKind::Plant), 100);
        assert_eq!(config.output_capacity, 500);
        assert_eq!(config.nearby_radius, 2);
        assert_eq!(config.initial_map_size, 5);
        assert_eq!(config.wasm_fuel, None);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(
            EngineConfig::from_json_str("{}").unwrap(),
            EngineConfig::default()
        );
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let missing = std::env::temp_dir().join("bytefarm-config-does-not-exist.json");
        let err = EngineConfig::from_json_file(&missing).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn file_overrides_selected_keys() {
        let path = std::env::temp_dir().join(format!(
            "bytefarm-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"wasm_fuel": 5000, "initial_map_size": 8}"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.wasm_fuel, Some(5000));
        assert_eq!(config.initial_map_size, 8);
        assert_eq!(config.frame_ms, 16);
        std::fs::remove_file(&path).ok();
    }
}
