//! CLI configuration

use anyhow::{Context, Result};
use prism_metadata::{ModuleDescriptor, StaticDiscovery};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub proxy: ProxySettings,
    pub modules: ModuleSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    pub output: OutputSettings,
}

#[derive(Debug, Deserialize)]
pub struct ProxySettings {
    /// Public base URL all frontend endpoints are served under
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ModuleSettings {
    /// JSON file listing the frontend and backend modules
    #[serde(default = "default_modules_path")]
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverySettings {
    /// JSON file with static peers and descriptions, none if unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct OutputSettings {
    /// Where the generation report is written, stdout if unset
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

/// Module lists as stored in the modules file
#[derive(Debug, Default, Deserialize)]
pub struct ModulesFile {
    #[serde(default)]
    pub frontends: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub backends: Vec<ModuleDescriptor>,
}

fn default_modules_path() -> PathBuf {
    PathBuf::from("config/modules.json")
}

fn default_pretty() -> bool {
    true
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .set_default("modules.path", "config/modules.json")?
            .set_default("output.pretty", true)?
            // Load from config file if present
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Load from environment variables with PRISM_ prefix
            .add_source(
                config::Environment::with_prefix("PRISM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl ModulesFile {
    /// Module configuration is kept in JSON: binding URNs contain dots, which
    /// the layered settings would read as nesting.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read modules file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid modules file {}", path.display()))
    }
}

/// Load static discovery results, or none when no file is configured
pub fn load_discovery(path: Option<&Path>) -> Result<StaticDiscovery> {
    let Some(path) = path else {
        return Ok(StaticDiscovery::new());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read discovery file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid discovery file {}", path.display()))
}
