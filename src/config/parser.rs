//! File parsing helpers shared by the configuration loaders.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::core::ChartGraphError;

/// Serialization format of a configuration file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.toml`
    Toml,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl FileFormat {
    /// Detect the format from the file extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn read(path: &Path, operation: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        anyhow::Error::from(ChartGraphError::FileSystemError {
            operation: operation.to_string(),
            path: path.display().to_string(),
        })
        .context(e.to_string())
    })
}

/// Parse `content` as `format` into `T`, reporting failures as [`ChartGraphError::ConfigError`].
pub fn parse_str<T>(content: &str, format: FileFormat, origin: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let parsed: Result<T, String> = match format {
        FileFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| {
        ChartGraphError::ConfigError {
            message: format!("{}: {}", origin.display(), reason.trim()),
        }
        .into()
    })
}

/// Read and parse a TOML configuration file.
///
/// # Errors
///
/// - [`ChartGraphError::FileSystemError`] if the file cannot be read
/// - [`ChartGraphError::ConfigError`] if it is not valid TOML for `T`
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read(path, "read config file")?;
    parse_str(&content, FileFormat::Toml, path)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Read and parse a file whose format is chosen by its extension.
///
/// # Errors
///
/// - [`ChartGraphError::ConfigError`] for an unsupported extension or invalid content
/// - [`ChartGraphError::FileSystemError`] if the file cannot be read
pub fn parse_any<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let format = FileFormat::from_path(path).ok_or_else(|| ChartGraphError::ConfigError {
        message: format!(
            "unsupported file extension for '{}' (expected .yaml, .yml, .json or .toml)",
            path.display()
        ),
    })?;
    let content = read(path, "read file")?;
    parse_str(&content, format, path)
}
