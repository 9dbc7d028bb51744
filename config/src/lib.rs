//! Configuration for the lexicon service.
//!
//! Settings come from up to two TOML files in a config directory, applied in
//! order so later files win key by key:
//!
//! ```text
//! <dir>/globals.toml
//! <dir>/config.<environment>.toml    (environment: $LEXICON_ENVIRONMENT or "local")
//! ```
//!
//! String values may reference environment variables as `${NAME}`. Finally
//! `$PORT` and `$LEXICON_DB` override the listen port and database path.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_DIR_ENV: &str = "LEXICON_CONFIG_DIR";
pub const ENVIRONMENT_ENV: &str = "LEXICON_ENVIRONMENT";
pub const PORT_ENV: &str = "PORT";
pub const DB_PATH_ENV: &str = "LEXICON_DB";

const DEFAULT_CONFIG_DIR: &str = "config";
const DEFAULT_ENVIRONMENT: &str = "local";
const GLOBALS_FILE: &str = "globals.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {source}")]
    Invalid { source: toml::de::Error },
}

impl ConfigError {
    /// The file at fault, when there is a single one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path.as_path()),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("BabbleLexicon.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file, appended to alongside stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// A loaded configuration plus the problems noticed while loading it.
///
/// Loading happens before logging is set up, so warnings are handed back for
/// the caller to emit once a subscriber exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: LexiconConfig,
    pub warnings: Vec<String>,
}

impl LexiconConfig {
    /// Load configuration using the process environment.
    pub fn load() -> Result<LoadedConfig, ConfigError> {
        let lookup = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        let dir = lookup(CONFIG_DIR_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR), PathBuf::from);
        let environment =
            lookup(ENVIRONMENT_ENV).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        Self::load_with(&dir, &environment, lookup)
    }

    /// Load configuration from `dir` for `environment`, resolving variables
    /// through `lookup` instead of the process environment.
    pub fn load_with(
        dir: &Path,
        environment: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut merged = toml::Table::new();
        for path in layer_paths(dir, environment) {
            if let Some(layer) = read_layer(&path)? {
                merge_tables(&mut merged, layer);
            }
        }

        let mut value = toml::Value::Table(merged);
        let mut unset = Vec::new();
        expand_strings(&mut value, &lookup, &mut unset);
        unset.sort();
        unset.dedup();
        let mut warnings: Vec<String> = unset
            .into_iter()
            .map(|var| format!("Config references unset ${{{var}}}; expanded to empty"))
            .collect();

        let mut config: Self = value
            .try_into()
            .map_err(|source| ConfigError::Invalid { source })?;
        warnings.extend(config.apply_env_overrides(&lookup));
        Ok(LoadedConfig { config, warnings })
    }

    /// Apply `$PORT` and `$LEXICON_DB`. An unparsable port is left unapplied
    /// and reported in the returned warnings.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(port) = lookup(PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => warnings.push(format!(
                    "Ignoring unparsable {PORT_ENV}={port:?} ({e}); using port {}",
                    self.server.port
                )),
            }
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        warnings
    }
}

fn layer_paths(dir: &Path, environment: &str) -> [PathBuf; 2] {
    [
        dir.join(GLOBALS_FILE),
        dir.join(format!("config.{environment}.toml")),
    ]
}

fn read_layer(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Overlay `overlay` onto `base`, descending into tables present in both.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, incoming) in overlay {
        if let toml::Value::Table(incoming) = incoming {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, incoming);
        }
    }
}

fn expand_strings(
    value: &mut toml::Value,
    lookup: &dyn Fn(&str) -> Option<String>,
    unset: &mut Vec<String>,
) {
    match value {
        toml::Value::String(s) => *s = expand_env_vars(s, lookup, unset),
        toml::Value::Array(items) => {
            for item in items {
                expand_strings(item, lookup, unset);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_strings(item, lookup, unset);
            }
        }
        _ => {}
    }
}

/// Replace `${NAME}` with the variable's value. Unset names expand to empty
/// and are pushed onto `unset`. An unterminated `${` is kept literally.
fn expand_env_vars(
    value: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    unset: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            match lookup(var) {
                Some(replacement) => out.push_str(&replacement),
                None => unset.push(var.to_string()),
            }
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
