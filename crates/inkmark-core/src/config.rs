//! Editor configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! overrides:
//!
//! ```json
//! { "tools": { "color": "#c0392b" }, "api": { "base_url": "https://lms.example/api" } }
//! ```

use crate::color::HIGHLIGHTER_ALPHA;
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid config: {0}")]
    Parse(String),
}

/// Initial tool state for a new editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    pub tool: ToolKind,
    pub color: String,
    pub brush_size: u32,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            tool: ToolKind::Pen,
            color: "#000000".to_string(),
            brush_size: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlighterConfig {
    /// Highlighter width as a multiple of the brush size.
    pub width_factor: f64,
    /// Alpha of highlighter strokes.
    pub alpha: f64,
}

impl Default for HighlighterConfig {
    fn default() -> Self {
        Self {
            width_factor: 3.0,
            alpha: HIGHLIGHTER_ALPHA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub font_size: f64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_size: crate::shapes::Text::DEFAULT_FONT_SIZE,
        }
    }
}

/// Remote marking API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Top-level editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub tools: ToolDefaults,
    pub highlighter: HighlighterConfig,
    pub text: TextConfig,
    /// Pointer hit-test tolerance in pixels.
    pub hit_tolerance: f64,
    /// Stroke simplification tolerance in pixels (0 disables it).
    pub simplify_tolerance: f64,
    pub api: ApiConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            tools: ToolDefaults::default(),
            highlighter: HighlighterConfig::default(),
            text: TextConfig::default(),
            hit_tolerance: 4.0,
            simplify_tolerance: 0.0,
            api: ApiConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Default config location.
    ///
    /// On Unix: `~/.config/inkmark/config.json`
    /// On Windows: `%APPDATA%\inkmark\config.json`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .map(|base| base.join("inkmark").join("config.json"))
    }

    #[cfg(target_arch = "wasm32")]
    pub fn default_path() -> Option<PathBuf> {
        None
    }

    /// Load from `path`, or the default location, falling back to defaults
    /// when no file exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }
}
