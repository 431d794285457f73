//! TOML-based engine configuration with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! per_page = 25
//! max_per_page = 200
//! path = "/api/grid"
//! dialect = "mysql"
//! ```
//!
//! String values support `${VAR}` and `$VAR` expansion, so deployment
//! environments can inject the response path.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Page size when the request doesn't specify one.
    pub per_page: u64,

    /// Hard ceiling on requested page sizes.
    pub max_per_page: u64,

    /// Base path used in pagination URLs.
    pub path: String,

    /// SQL dialect the datastore renders queries with.
    pub dialect: Dialect,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            per_page: 10,
            max_per_page: 100,
            path: "/api/grid".into(),
            dialect: Dialect::Postgres,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, expanding environment variables in
    /// string values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let expanded = expand_env_vars(&raw)?;
        Ok(toml::from_str(&expanded)?)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(input: &str) -> Result<String, SettingsError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            output.push(c);
            continue;
        }

        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    name.push(inner);
                }
                let value =
                    env::var(&name).map_err(|_| SettingsError::MissingEnvVar(name.clone()))?;
                output.push_str(&value);
            }
            Some(next) if next.is_ascii_alphabetic() || *next == '_' => {
                let mut name = String::new();
                while let Some(next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || *next == '_' {
                        name.push(*next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value =
                    env::var(&name).map_err(|_| SettingsError::MissingEnvVar(name.clone()))?;
                output.push_str(&value);
            }
            _ => output.push('$'),
        }
    }

    Ok(output)
}
