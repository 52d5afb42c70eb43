//! Plugin configuration
//!
//! Loaded from TOML; every field has a default so an empty file (or no file)
//! yields the stock plugin behaviour.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::backend::{PlaneFindingMode, SessionConfig, UpdateMode};
use crate::render::Argb;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub channel: ChannelConfig,
    pub session: SessionSettings,
    pub shapes: ShapeDefaults,
    pub measurement: MeasurementStyle,
    pub reticle: ReticleStyle,
    pub screenshot: ScreenshotConfig,
}

/// Bridge naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_view_type")]
    pub view_type: String,
    #[serde(default = "default_method_channel")]
    pub method_channel: String,
}

fn default_view_type() -> String {
    "ar_plus_view".to_string()
}

fn default_method_channel() -> String {
    "ar_plus_view_channel".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            view_type: default_view_type(),
            method_channel: default_method_channel(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_plane_finding")]
    pub plane_finding: PlaneFindingMode,
    #[serde(default = "default_update_mode")]
    pub update_mode: UpdateMode,
    /// Text shown until the first plane is detected
    #[serde(default = "default_guidance")]
    pub guidance_text: String,
}

fn default_plane_finding() -> PlaneFindingMode {
    PlaneFindingMode::HorizontalAndVertical
}

fn default_update_mode() -> UpdateMode {
    UpdateMode::LatestCameraImage
}

fn default_guidance() -> String {
    "Move your phone slowly to detect surfaces".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            plane_finding: default_plane_finding(),
            update_mode: default_update_mode(),
            guidance_text: default_guidance(),
        }
    }
}

impl SessionSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            plane_finding: self.plane_finding,
            update_mode: self.update_mode,
        }
    }
}

/// Defaults for optional `makeShape` arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDefaults {
    #[serde(default = "default_dimension")]
    pub radius: f32,
    #[serde(default = "default_dimension")]
    pub height: f32,
    #[serde(default = "default_dimension")]
    pub width: f32,
    #[serde(default = "default_dimension")]
    pub depth: f32,
    #[serde(default = "default_shape_color")]
    pub color: Argb,
}

fn default_dimension() -> f32 {
    0.01
}

fn default_shape_color() -> Argb {
    Argb::YELLOW
}

impl Default for ShapeDefaults {
    fn default() -> Self {
        Self {
            radius: default_dimension(),
            height: default_dimension(),
            width: default_dimension(),
            depth: default_dimension(),
            color: default_shape_color(),
        }
    }
}

/// Look of measurement dots, segments and labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementStyle {
    #[serde(default = "default_dot_radius")]
    pub dot_radius: f32,
    #[serde(default = "default_flat_height")]
    pub dot_height: f32,
    #[serde(default = "default_dot_color")]
    pub dot_color: Argb,
    #[serde(default = "default_line_thickness")]
    pub line_thickness: f32,
    #[serde(default = "default_line_color")]
    pub line_color: Argb,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_dot_radius() -> f32 {
    0.01
}

fn default_flat_height() -> f32 {
    0.0003
}

fn default_dot_color() -> Argb {
    Argb::RED
}

fn default_line_thickness() -> f32 {
    0.002
}

fn default_line_color() -> Argb {
    Argb::GREEN
}

fn default_unit() -> String {
    "m".to_string()
}

fn default_precision() -> usize {
    2
}

impl Default for MeasurementStyle {
    fn default() -> Self {
        Self {
            dot_radius: default_dot_radius(),
            dot_height: default_flat_height(),
            dot_color: default_dot_color(),
            line_thickness: default_line_thickness(),
            line_color: default_line_color(),
            unit: default_unit(),
            precision: default_precision(),
        }
    }
}

impl MeasurementStyle {
    /// Label text for a distance, e.g. `"1.25 m"`
    pub fn format_distance(&self, distance: f32) -> String {
        format!("{:.*} {}", self.precision, distance, self.unit)
    }
}

/// Focus reticle geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReticleStyle {
    #[serde(default = "default_reticle_radius")]
    pub radius: f32,
    #[serde(default = "default_arm_length")]
    pub arm_length: f32,
    #[serde(default = "default_arm_width")]
    pub arm_width: f32,
    #[serde(default = "default_reticle_color")]
    pub color: Argb,
}

fn default_reticle_radius() -> f32 {
    0.02
}

fn default_arm_length() -> f32 {
    0.04
}

fn default_arm_width() -> f32 {
    0.003
}

fn default_reticle_color() -> Argb {
    Argb::WHITE
}

impl Default for ReticleStyle {
    fn default() -> Self {
        Self {
            radius: default_reticle_radius(),
            arm_length: default_arm_length(),
            arm_width: default_arm_width(),
            color: default_reticle_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Output directory; the system temporary directory when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_file_prefix() -> String {
    "screenshot".to_string()
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

impl ScreenshotConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl PluginConfig {
    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse plugin configuration")
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Per-user config location, e.g. `~/.config/ar-plus/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "example", "ar-plus")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load `path` (or the default location) when present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        Self::load(&path)
    }
}
