use egui::Pos2;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    SlipstreamError,
    openf1::client::DEFAULT_API_BASE_URL,
    replay::{
        camera::{MAX_ZOOM, MIN_ZOOM},
        clock::{DEFAULT_SPEED, MAX_SPEED, MIN_SPEED},
    },
};

const CONFIG_DIR_NAME: &str = "slipstream";
const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_YEAR: i32 = 2024;
const DEFAULT_ZOOM_STEP: f32 = 1.1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowPosition {
    pub x: f32,
    pub y: f32,
}

impl Default for WindowPosition {
    fn default() -> Self {
        Self { x: 0., y: 0. }
    }
}

impl From<WindowPosition> for Pos2 {
    fn from(value: WindowPosition) -> Self {
        Pos2::new(value.x, value.y)
    }
}

impl From<Pos2> for WindowPosition {
    fn from(value: Pos2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub default_year: i32,
    pub default_speed: f64,
    /// Zoom factor applied per wheel notch
    pub zoom_step: f32,
    pub show_diagnostics: bool,
    pub window_position: WindowPosition,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_year: DEFAULT_YEAR,
            default_speed: DEFAULT_SPEED,
            zoom_step: DEFAULT_ZOOM_STEP,
            show_diagnostics: false,
            window_position: WindowPosition::default(),
        }
    }
}

impl AppConfig {
    pub fn from_local_file() -> Option<Self> {
        let config_path = dirs::config_dir()?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return None;
        }

        let file = std::fs::File::open(&config_path)
            .map_err(|e| warn!("Could not open config file {}: {}", config_path.display(), e))
            .ok()?;
        serde_json::from_reader::<_, AppConfig>(file)
            .map_err(|e| warn!("Could not parse config file {}: {}", config_path.display(), e))
            .ok()
            .map(AppConfig::sanitized)
    }

    /// Pulls hand-edited values back into the ranges the dashboard supports
    pub fn sanitized(mut self) -> Self {
        self.default_speed = if self.default_speed.is_finite() {
            self.default_speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            DEFAULT_SPEED
        };
        if !(self.zoom_step.is_finite() && self.zoom_step > 1. && self.zoom_step <= MAX_ZOOM / MIN_ZOOM)
        {
            self.zoom_step = DEFAULT_ZOOM_STEP;
        }
        if self.api_base_url.trim().is_empty() {
            self.api_base_url = DEFAULT_API_BASE_URL.to_string();
        }
        self
    }

    pub fn save(&self) -> Result<(), SlipstreamError> {
        let config_dir = dirs::config_dir()
            .ok_or(SlipstreamError::NoConfigDir)?
            .join(CONFIG_DIR_NAME);

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)
                .map_err(|e| SlipstreamError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_dir.join(CONFIG_FILE_NAME))
            .map_err(|e| SlipstreamError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| SlipstreamError::ConfigSerializeError { source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"default_year": 2023}"#).unwrap();
        assert_eq!(config.default_year, 2023);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.zoom_step, DEFAULT_ZOOM_STEP);
    }

    #[test]
    fn test_sanitized() {
        let config = AppConfig {
            default_speed: 50.,
            zoom_step: 0.5,
            api_base_url: "  ".to_string(),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.default_speed, MAX_SPEED);
        assert_eq!(config.zoom_step, DEFAULT_ZOOM_STEP);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);

        let config = AppConfig {
            default_speed: f64::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.default_speed, DEFAULT_SPEED);
    }
}
