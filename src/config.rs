use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Helper function for default script rate
fn default_fps() -> u32 {
    50
}

/// Helper function for default actuation speed
fn default_speed() -> f64 {
    10.0
}

/// Helper function for default stop timeout
fn default_stop_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Camera device to attach at startup, if any
    #[serde(default)]
    pub camera_id: Option<u32>,

    /// Serial port / device ID of the robot arm, if any
    #[serde(default)]
    pub robot_id: Option<String>,

    /// Rate at which events are checked, in ticks per second
    #[serde(default = "default_fps")]
    pub script_fps: u32,

    /// Actuation speed applied to the robot when a run starts
    #[serde(default = "default_speed")]
    pub default_speed: f64,

    /// How long stop() waits for the worker thread before reporting it stuck
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_id: None,
            robot_id: None,
            script_fps: default_fps(),
            default_speed: default_speed(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Err("Settings file not found".into());
        }

        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }
}
