use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::clients::DEFAULT_BASE_URL;
use crate::contexts::DEFAULT_MODEL;

pub const DEFAULT_CONFIG_FILE: &str = "promptcraft.yml";
pub const DEFAULT_STORE_DIR: &str = ".promptcraft";

/// Settings read from `promptcraft.yml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub api_base_url: String,
    pub store_dir: PathBuf,
    /// Replaces the built-in generation contract when set.
    pub system_contract: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            system_contract: None,
        }
    }
}

impl Settings {
    /// Loads `path`, or `promptcraft.yml` if present. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Backend key from `GEMINI_API_KEY`.
pub fn api_key() -> Result<String> {
    std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .context("GEMINI_API_KEY is not set (add it to the environment or a .env file)")
}

/// Username for local sign-in: `PROMPTCRAFT_USER`, then `USER`, then `developer`.
pub fn local_username() -> String {
    ["PROMPTCRAFT_USER", "USER"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "developer".to_string())
}
