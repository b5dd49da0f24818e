//! Session configuration
//!
//! Every setting has a default, so a missing or partial config file is fine.
//! The file is JSON, read from `$PWM_CONFIG` or
//! `$XDG_CONFIG_HOME/pwm/config.json` (falling back to `~/.config`).
//! Environment variables take precedence over the file:
//!
//! - `PWM_SOCKET`: name of the display socket
//! - `XKB_DEFAULT_RULES`, `XKB_DEFAULT_MODEL`, `XKB_DEFAULT_LAYOUT`,
//!   `XKB_DEFAULT_VARIANT`, `XKB_DEFAULT_OPTIONS`: keymap names

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use smithay::utils::Transform;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cursor_size: u32,
    pub cursor_theme: Option<String>,
    /// Display socket name, chosen by the backend when unset
    pub socket: Option<String>,
    pub keyboard: KeyboardConfig,
    /// Per-output settings keyed by output name
    pub outputs: HashMap<String, OutputConfig>,
    /// Virtual outputs created when running headless
    pub headless_outputs: Vec<HeadlessOutputConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cursor_size: 24,
            cursor_theme: None,
            socket: None,
            keyboard: KeyboardConfig::default(),
            outputs: HashMap::new(),
            headless_outputs: vec![HeadlessOutputConfig::default()],
        }
    }
}

/// xkb keymap names and key repeat settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
    /// Repeats per second
    pub repeat_rate: i32,
    /// Milliseconds before repeating starts
    pub repeat_delay: i32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            rules: String::new(),
            model: String::new(),
            layout: String::new(),
            variant: String::new(),
            options: None,
            repeat_rate: 25,
            repeat_delay: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Layout position; automatic left-to-right placement when unset
    pub position: Option<(i32, i32)>,
    pub scale: Option<f64>,
    pub transform: Option<OutputTransform>,
    pub enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            position: None,
            scale: None,
            transform: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OutputTransform {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "90")]
    Rotate90,
    #[serde(rename = "180")]
    Rotate180,
    #[serde(rename = "270")]
    Rotate270,
    #[serde(rename = "flipped")]
    Flipped,
    #[serde(rename = "flipped-90")]
    Flipped90,
    #[serde(rename = "flipped-180")]
    Flipped180,
    #[serde(rename = "flipped-270")]
    Flipped270,
}

impl From<OutputTransform> for Transform {
    fn from(transform: OutputTransform) -> Self {
        match transform {
            OutputTransform::Normal => Transform::Normal,
            OutputTransform::Rotate90 => Transform::_90,
            OutputTransform::Rotate180 => Transform::_180,
            OutputTransform::Rotate270 => Transform::_270,
            OutputTransform::Flipped => Transform::Flipped,
            OutputTransform::Flipped90 => Transform::Flipped90,
            OutputTransform::Flipped180 => Transform::Flipped180,
            OutputTransform::Flipped270 => Transform::Flipped270,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeadlessOutputConfig {
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// Refresh rate in mHz
    pub refresh: i32,
}

impl Default for HeadlessOutputConfig {
    fn default() -> Self {
        Self {
            name: "HEADLESS-1".to_string(),
            width: 1920,
            height: 1080,
            refresh: 60_000,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override settings from environment variables looked up with `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(socket) = var("PWM_SOCKET").filter(|s| !s.is_empty()) {
            self.socket = Some(socket);
        }
        let keyboard = &mut self.keyboard;
        for (key, field) in [
            ("XKB_DEFAULT_RULES", &mut keyboard.rules),
            ("XKB_DEFAULT_MODEL", &mut keyboard.model),
            ("XKB_DEFAULT_LAYOUT", &mut keyboard.layout),
            ("XKB_DEFAULT_VARIANT", &mut keyboard.variant),
        ] {
            if let Some(value) = var(key) {
                *field = value;
            }
        }
        if let Some(options) = var("XKB_DEFAULT_OPTIONS") {
            keyboard.options = Some(options);
        }
    }

    /// Settings for the output called `name`, defaults when not configured
    pub fn output(&self, name: &str) -> OutputConfig {
        self.outputs.get(name).cloned().unwrap_or_default()
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("PWM_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("pwm").join("config.json"))
}
