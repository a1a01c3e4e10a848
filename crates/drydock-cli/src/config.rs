use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/drydock/config.toml";

/// Engine configuration. Every field has a default mirroring the engine's
/// behavior table, so a missing or partial config file always yields a
/// working setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub ports_paths: Vec<PathBuf>,
    pub cache_path: PathBuf,
    pub state_dir: PathBuf,
    pub hooks_dir: PathBuf,
    pub resolve_optional: bool,
    pub cache_graph: bool,
    pub prefer_cached_graph: bool,
    pub log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            ports_paths: vec![PathBuf::from("/usr/ports")],
            cache_path: PathBuf::from("/var/lib/drydock/depgraph.json"),
            state_dir: PathBuf::from("/var/lib/drydock/state"),
            hooks_dir: PathBuf::from("/etc/drydock/hooks"),
            resolve_optional: false,
            cache_graph: true,
            prefer_cached_graph: true,
            log_filter: "info".to_string(),
        }
    }
}

/// How the config file load went; reported after the tracing subscriber is
/// up, since loading happens first.
#[derive(Debug)]
pub enum ConfigStatus {
    Loaded(PathBuf),
    Missing(PathBuf),
    Malformed(PathBuf, String),
}

impl CliConfig {
    /// Reads the config file, falling back to defaults when it is missing
    /// or malformed. Malformed files are reported, never fatal.
    pub fn load(path: Option<&Path>) -> (Self, ConfigStatus) {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return (Self::default(), ConfigStatus::Missing(path)),
        };

        match toml::from_str::<CliConfig>(&raw) {
            Ok(config) => (config, ConfigStatus::Loaded(path)),
            Err(err) => (
                Self::default(),
                ConfigStatus::Malformed(path, err.to_string()),
            ),
        }
    }
}
