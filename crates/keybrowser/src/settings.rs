//! Configuration and settings management

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::browser::types::{RenderStyle, SortMode};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default)]
    pub show_folders_on_filter: bool,
    /// Children are drawn inside their folder rather than as following rows
    #[serde(default)]
    pub nest_children: bool,
    #[serde(default = "default_true")]
    pub multiple_selection: bool,
    #[serde(default = "default_true")]
    pub can_filter: bool,
    #[serde(default = "default_render_style")]
    pub render_style: RenderStyle,
    #[serde(default = "default_no_files_message")]
    pub no_files_message: String,
    /// Search results shown per "show more" step
    #[serde(default = "default_results_per_page")]
    pub results_per_page: usize,
    #[serde(default = "default_sort")]
    pub sort: SortMode,
    /// Key open folders are persisted under; `None` disables persistence
    #[serde(default)]
    pub storage_key: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            show_folders_on_filter: false,
            nest_children: false,
            multiple_selection: default_true(),
            can_filter: default_true(),
            render_style: default_render_style(),
            no_files_message: default_no_files_message(),
            results_per_page: default_results_per_page(),
            sort: default_sort(),
            storage_key: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_render_style() -> RenderStyle {
    RenderStyle::Table
}

fn default_no_files_message() -> String {
    "No files.".to_string()
}

fn default_results_per_page() -> usize {
    20
}

fn default_sort() -> SortMode {
    SortMode::ByName
}

impl BrowserSettings {
    /// Reject combinations the browser cannot render
    pub fn validate(&self) -> Result<()> {
        if self.render_style == RenderStyle::Table && self.nest_children {
            bail!("table rendering does not support nested children");
        }
        if self.results_per_page == 0 {
            bail!("results_per_page must be at least 1");
        }
        Ok(())
    }
}

impl Settings {
    /// Load settings from a file, or return defaults if file doesn't exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Settings file inside the user config directory
    pub fn default_path() -> PathBuf {
        config_dir().join("settings.toml")
    }
}

/// `keybrowser` directory under the platform config directory
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keybrowser")
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("APPDATA").map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
