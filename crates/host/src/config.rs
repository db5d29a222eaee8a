//! Configuration management for vcanvas sessions.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. The platform config directory (`ProjectDirs("com", "vcanvas", "vcanvas")`)
//! 2. `~/.config/vcanvas/config.toml`
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use vcanvas_core::{AxisExtent, CanvasConfig, InteractionConfig, LayoutDescriptor, Size};

/// Main configuration structure for vcanvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scrollbar and extent configuration.
    pub scrolling: ScrollingConfig,
    /// Grid cell geometry.
    pub layout: LayoutConfig,
    /// Pointer gesture thresholds.
    pub interaction: InteractionSettings,
    /// Host behavior.
    pub behavior: BehaviorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollingConfig {
    /// Scrollbar strip thickness in physical pixels.
    #[serde(default = "default_scrollbar_thickness")]
    pub scrollbar_thickness: i32,

    /// Pixels scrolled per line step and per wheel notch.
    #[serde(default = "default_small_step")]
    pub small_step: i32,

    #[serde(default)]
    pub horizontal: AxisExtent,

    #[serde(default)]
    pub vertical: AxisExtent,
}

impl Default for ScrollingConfig {
    fn default() -> Self {
        Self {
            scrollbar_thickness: default_scrollbar_thickness(),
            small_step: default_small_step(),
            horizontal: AxisExtent::Content,
            vertical: AxisExtent::Content,
        }
    }
}

/// Grid layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    #[serde(default = "default_cell_width")]
    pub cell_width: i32,

    #[serde(default = "default_cell_height")]
    pub cell_height: i32,

    /// Gap between neighbouring cells, both axes.
    #[serde(default = "default_spacing")]
    pub spacing: i32,

    /// Margin around the grid.
    #[serde(default = "default_padding")]
    pub padding: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
            spacing: default_spacing(),
            padding: default_padding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Pointer travel in pixels before a press becomes a drag.
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold: i32,

    /// Maximum delay between the two presses of a double-click.
    #[serde(default = "default_double_click_ms")]
    pub double_click_ms: u64,

    #[serde(default = "default_double_click_distance")]
    pub double_click_distance: i32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            drag_threshold: default_drag_threshold(),
            double_click_ms: default_double_click_ms(),
            double_click_distance: default_double_click_distance(),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Quiet period after the last item change before layout runs.
    #[serde(default = "default_layout_debounce_ms")]
    pub layout_debounce_ms: u64,

    /// Items per batch delivered by the background loader.
    #[serde(default = "default_loader_batch_size")]
    pub loader_batch_size: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            layout_debounce_ms: default_layout_debounce_ms(),
            loader_batch_size: default_loader_batch_size(),
        }
    }
}

fn default_scrollbar_thickness() -> i32 {
    17
}

fn default_small_step() -> i32 {
    16
}

fn default_cell_width() -> i32 {
    96
}

fn default_cell_height() -> i32 {
    64
}

fn default_spacing() -> i32 {
    8
}

fn default_padding() -> i32 {
    8
}

fn default_drag_threshold() -> i32 {
    4
}

fn default_double_click_ms() -> u64 {
    500
}

fn default_double_click_distance() -> i32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_layout_debounce_ms() -> u64 {
    250
}

fn default_loader_batch_size() -> usize {
    64
}

const MAX_SCROLLBAR_THICKNESS: i32 = 200;
const MAX_DEBOUNCE_MS: u64 = 10_000;
const MAX_DOUBLE_CLICK_MS: u64 = 5_000;
const MAX_LOADER_BATCH: usize = 10_000;

/// A configuration value that was out of range and has been clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

fn clamp_i32(
    warnings: &mut Vec<ConfigWarning>,
    field: &'static str,
    value: &mut i32,
    min: i32,
    max: i32,
) {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        warnings.push(ConfigWarning {
            field,
            message: format!("{} is out of range [{}, {}], using {}", value, min, max, clamped),
        });
        *value = clamped;
    }
}

fn clamp_u64(
    warnings: &mut Vec<ConfigWarning>,
    field: &'static str,
    value: &mut u64,
    min: u64,
    max: u64,
) {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        warnings.push(ConfigWarning {
            field,
            message: format!("{} is out of range [{}, {}], using {}", value, min, max, clamped),
        });
        *value = clamped;
    }
}

fn clamp_extent(warnings: &mut Vec<ConfigWarning>, field: &'static str, extent: &mut AxisExtent) {
    if let AxisExtent::Fixed(n) = extent {
        if *n < 0 {
            warnings.push(ConfigWarning {
                field,
                message: format!("negative fixed extent {}, using 0", n),
            });
            *n = 0;
        }
    }
}

/// Parse a log level name. Unknown names yield `None`.
pub fn parse_log_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values in place and report each adjustment.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let s = &mut self.scrolling;
        clamp_i32(
            &mut warnings,
            "scrolling.scrollbar_thickness",
            &mut s.scrollbar_thickness,
            0,
            MAX_SCROLLBAR_THICKNESS,
        );
        clamp_i32(&mut warnings, "scrolling.small_step", &mut s.small_step, 1, i32::MAX);
        clamp_extent(&mut warnings, "scrolling.horizontal", &mut s.horizontal);
        clamp_extent(&mut warnings, "scrolling.vertical", &mut s.vertical);

        let l = &mut self.layout;
        clamp_i32(&mut warnings, "layout.cell_width", &mut l.cell_width, 1, i32::MAX);
        clamp_i32(&mut warnings, "layout.cell_height", &mut l.cell_height, 1, i32::MAX);
        clamp_i32(&mut warnings, "layout.spacing", &mut l.spacing, 0, i32::MAX);
        clamp_i32(&mut warnings, "layout.padding", &mut l.padding, 0, i32::MAX);

        let i = &mut self.interaction;
        clamp_i32(&mut warnings, "interaction.drag_threshold", &mut i.drag_threshold, 0, i32::MAX);
        clamp_u64(
            &mut warnings,
            "interaction.double_click_ms",
            &mut i.double_click_ms,
            0,
            MAX_DOUBLE_CLICK_MS,
        );
        clamp_i32(
            &mut warnings,
            "interaction.double_click_distance",
            &mut i.double_click_distance,
            0,
            i32::MAX,
        );

        let b = &mut self.behavior;
        if parse_log_level(&b.log_level).is_none() {
            warnings.push(ConfigWarning {
                field: "behavior.log_level",
                message: format!("unknown level '{}', using 'info'", b.log_level),
            });
            b.log_level = default_log_level();
        }
        clamp_u64(
            &mut warnings,
            "behavior.layout_debounce_ms",
            &mut b.layout_debounce_ms,
            0,
            MAX_DEBOUNCE_MS,
        );
        if b.loader_batch_size == 0 || b.loader_batch_size > MAX_LOADER_BATCH {
            let clamped = b.loader_batch_size.clamp(1, MAX_LOADER_BATCH);
            warnings.push(ConfigWarning {
                field: "behavior.loader_batch_size",
                message: format!(
                    "{} is out of range [1, {}], using {}",
                    b.loader_batch_size, MAX_LOADER_BATCH, clamped
                ),
            });
            b.loader_batch_size = clamped;
        }

        warnings
    }

    /// Configured log level, `INFO` if the name is unknown.
    pub fn log_level(&self) -> Level {
        parse_log_level(&self.behavior.log_level).unwrap_or(Level::INFO)
    }

    pub fn layout_debounce(&self) -> Duration {
        Duration::from_millis(self.behavior.layout_debounce_ms)
    }

    /// Engine construction parameters.
    pub fn canvas_config(&self) -> CanvasConfig {
        CanvasConfig {
            scrollbar_thickness: self.scrolling.scrollbar_thickness,
            small_step: self.scrolling.small_step,
            horizontal: self.scrolling.horizontal,
            vertical: self.scrolling.vertical,
            layout: LayoutDescriptor {
                cell: Size::new(self.layout.cell_width, self.layout.cell_height),
                spacing: Size::new(self.layout.spacing, self.layout.spacing),
                padding: self.layout.padding,
            },
            interaction: InteractionConfig {
                drag_threshold: self.interaction.drag_threshold,
                double_click_time: Duration::from_millis(self.interaction.double_click_ms),
                double_click_distance: self.interaction.double_click_distance,
            },
            ..CanvasConfig::default()
        }
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = ProjectDirs::from("com", "vcanvas", "vcanvas") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("vcanvas").join("config.toml"));
    }

    paths.push(PathBuf::from("config.toml"));

    paths
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
