//! CLI settings
//!
//! Optional `~/.config/dsconverge/config.toml`:
//!
//! ```toml
//! prefix = "~/ds"     # installation prefix holding etc/dirsrv
//! format = "yaml"     # yaml, json or toml
//! confirm = true      # ask before applying
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("dsconverge"))
}

/// Format used when printing facts, outcomes and diffs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub prefix: Option<String>,
    pub format: OutputFormat,
    pub confirm: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: None,
            format: OutputFormat::default(),
            confirm: true,
        }
    }
}

impl Settings {
    /// Load config.toml, falling back to defaults when there is none
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join("config.toml");
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Pick the installation prefix: command line, then the desired-state
    /// document, then these settings, then `/`.
    pub fn resolve_prefix(&self, flag: Option<&Path>, desired: Option<&str>) -> PathBuf {
        if let Some(flag) = flag {
            return flag.to_path_buf();
        }
        desired
            .or(self.prefix.as_deref())
            .filter(|p| !p.is_empty())
            .map_or_else(|| PathBuf::from("/"), expand_path)
    }
}

/// Expand `~` and environment variables in a path
fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or_else(|_| shellexpand::tilde(path));
    PathBuf::from(expanded.as_ref())
}
