// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor configuration.
//!
//! Tunables for the view transform, hit testing, interaction timing and
//! node layout. Stored as RON next to the user's settings.

use crate::registry::STATE_TYPE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Format version
    pub version: u32,
    /// Minimum zoom
    pub min_zoom: f32,
    /// Maximum zoom
    pub max_zoom: f32,
    /// Zoom change per scroll step
    pub zoom_step: f32,
    /// Snap dragged nodes to the grid
    pub snap_to_grid: bool,
    /// Grid cell size in grid units
    pub grid_cell: f32,
    /// Screen-space tolerance around small interactive targets
    pub hit_epsilon: f32,
    /// Below this zoom virtual points are not hit-tested
    pub point_zoom_threshold: f32,
    /// Maximum delay between clicks of a double click, in seconds
    pub double_click_window: f64,
    /// Pointer travel in pixels before a press counts as a drag
    pub drag_threshold: f32,
    /// Node type spawned by the dedicated key
    pub default_node_type: String,
    /// Maximum undo depth
    pub undo_depth: usize,
    /// Header height in grid units
    pub header_height: f32,
    /// Socket row height in grid units
    pub socket_row_height: f32,
    /// Base factor applied to connection tangent length
    pub tangent_factor: f32,
    /// Minimum connection tangent length in screen units
    pub min_tangent: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            min_zoom: 0.1,
            max_zoom: 4.0,
            zoom_step: 0.1,
            snap_to_grid: true,
            grid_cell: 10.0,
            hit_epsilon: 4.0,
            point_zoom_threshold: 0.4,
            double_click_window: 0.2,
            drag_threshold: 3.0,
            default_node_type: STATE_TYPE.to_string(),
            undo_depth: 100,
            header_height: 24.0,
            socket_row_height: 22.0,
            tangent_factor: 0.5,
            min_tangent: 20.0,
        }
    }
}

impl EditorConfig {
    /// Load configuration from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: EditorConfig = ron::from_str(&content)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        Ok(config.sanitized())
    }

    /// Save configuration to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fix values that would break the view transform
    pub fn sanitized(mut self) -> Self {
        if self.min_zoom <= 0.0 {
            self.min_zoom = 0.1;
        }
        if self.max_zoom < self.min_zoom {
            self.max_zoom = self.min_zoom;
        }
        if self.grid_cell <= 0.0 {
            self.snap_to_grid = false;
            self.grid_cell = 1.0;
        }
        self.undo_depth = self.undo_depth.max(1);
        self
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Config written by a newer editor
    #[error("Config version {0} is newer than supported version {CONFIG_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EditorConfig::default();
        assert!(config.min_zoom < config.max_zoom);
        assert_eq!(config.double_click_window, 0.2);
        assert_eq!(config.default_node_type, STATE_TYPE);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EditorConfig = ron::from_str("(grid_cell: 5.0)").unwrap();
        assert_eq!(config.grid_cell, 5.0);
        assert_eq!(config.max_zoom, 4.0);
    }

    #[test]
    fn test_sanitize_repairs_bad_values() {
        let config = EditorConfig {
            min_zoom: -1.0,
            max_zoom: 0.0,
            grid_cell: 0.0,
            ..EditorConfig::default()
        }
        .sanitized();
        assert!(config.min_zoom > 0.0);
        assert!(config.max_zoom >= config.min_zoom);
        assert!(!config.snap_to_grid);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("flowgraph-config-{}.ron", uuid::Uuid::new_v4()));
        let config = EditorConfig {
            grid_cell: 8.0,
            ..EditorConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = EditorConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
