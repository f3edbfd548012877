//! Run configuration.
//!
//! A transformation is configured by a [`TransformConfig`], usually loaded from
//! a TOML file:
//!
//! ```toml
//! strategy = "fast"          # or "sentinel" (default)
//! prune_schema = true
//! exclude_kinds = ["NetworkPolicy"]
//! exclude_subcharts = ["charts/redis"]
//! tie_break = "most-specific" # or "lexicographic" (default)
//!
//! [concurrency]
//! enabled = true
//! workers = 8
//! threshold = 4
//!
//! [id_overrides]
//! "Deployment/my-app-web" = "frontend"
//! ```
//!
//! ID overrides may also come from a standalone file (YAML, JSON or TOML, by
//! extension) mapping `"Kind/name"` to the desired identifier; see
//! [`load_overrides`]. Every configuration problem surfaces as
//! [`ChartGraphError::ConfigError`] or [`ChartGraphError::FileSystemError`]
//! before any inference runs.

pub mod parser;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::{PARALLEL_DIFF_THRESHOLD, default_worker_count};
use crate::core::ChartGraphError;

pub use parser::{FileFormat, parse_any, parse_config};

/// Which inference strategy a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Render twice and diff against sentinel markers
    #[default]
    Sentinel,
    /// Analyze template references and match values against the baseline render
    Fast,
}

/// How the value matcher picks one values path among several equal candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Lexicographically smallest path
    #[default]
    Lexicographic,
    /// Deepest path, then lexicographically smallest
    MostSpecific,
}

/// Worker pool settings of the sentinel diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Use the concurrent diff path at all
    pub enabled: bool,
    /// Worker count; host parallelism when unset
    pub workers: Option<usize>,
    /// Minimum number of resource pairs before going concurrent
    pub threshold: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: None,
            threshold: PARALLEL_DIFF_THRESHOLD,
        }
    }
}

impl ConcurrencyConfig {
    /// Sequential-only settings.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Effective worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count).max(1)
    }

    /// Whether `units` pairs should be diffed concurrently.
    #[must_use]
    pub fn use_concurrency(&self, units: usize) -> bool {
        self.enabled && units >= self.threshold.max(1)
    }
}

/// Configuration of one transformation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Inference strategy
    pub strategy: StrategyKind,
    /// Drop mappings whose values path is not an extracted schema field
    pub prune_schema: bool,
    /// Resource kinds removed before IDs are assigned (case-insensitive)
    pub exclude_kinds: Vec<String>,
    /// Sub-package origins whose resources are removed (prefix match)
    pub exclude_subcharts: Vec<String>,
    /// Diff engine worker pool
    pub concurrency: ConcurrencyConfig,
    /// Value matcher tie-break
    pub tie_break: TieBreak,
    /// `"Kind/name"` → ID
    pub id_overrides: BTreeMap<String, String>,
}

impl TransformConfig {
    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, has
    /// unknown keys, or fails [`TransformConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = parse_config(path)?;
        config.validate()?;
        tracing::debug!("Loaded transform config from {}", path.display());
        Ok(config)
    }

    /// Check values serde cannot check.
    ///
    /// # Errors
    ///
    /// [`ChartGraphError::ConfigError`] for a zero worker count or a malformed override key.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency.workers == Some(0) {
            return Err(ChartGraphError::ConfigError {
                message: "concurrency.workers must be at least 1".to_string(),
            }
            .into());
        }
        validate_override_keys(&self.id_overrides)
    }

    /// Merge overrides on top of the configured ones; later values win.
    pub fn merge_overrides(&mut self, overrides: BTreeMap<String, String>) {
        self.id_overrides.extend(overrides);
    }

    /// Whether a resource of `kind` from `origin` is excluded from the run.
    #[must_use]
    pub fn excludes(&self, kind: &str, origin: &str) -> bool {
        self.exclude_kinds.iter().any(|k| k.eq_ignore_ascii_case(kind))
            || (!origin.is_empty()
                && self.exclude_subcharts.iter().any(|prefix| {
                    let prefix = prefix.trim_end_matches('/');
                    origin == prefix || origin.starts_with(&format!("{prefix}/"))
                }))
    }
}

fn validate_override_keys(overrides: &BTreeMap<String, String>) -> Result<()> {
    for key in overrides.keys() {
        let valid = key
            .split_once('/')
            .is_some_and(|(kind, name)| !kind.is_empty() && !name.is_empty());
        if !valid {
            return Err(ChartGraphError::ConfigError {
                message: format!("ID override key '{key}' must have the form Kind/name"),
            }
            .into());
        }
    }
    Ok(())
}

/// Load an ID override map (`"Kind/name"` → ID) from YAML, JSON or TOML.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a key is not `Kind/name`.
pub fn load_overrides(path: &Path) -> Result<BTreeMap<String, String>> {
    let overrides: BTreeMap<String, String> = parse_any(path)?;
    validate_override_keys(&overrides)?;
    tracing::debug!("Loaded {} ID overrides from {}", overrides.len(), path.display());
    Ok(overrides)
}
