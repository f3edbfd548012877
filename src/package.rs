//! Package loading seam.
//!
//! Fetching, unpacking and rendering a chart are external concerns. The
//! pipeline only needs the baseline render, the values that produced it, the
//! raw template sources (for reference analysis) and the ability to render
//! again with a different values tree (for sentinel diffing).

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::Resource;

/// Everything the pipeline consumes from one package.
#[derive(Debug, Clone, Default)]
pub struct LoadedPackage {
    /// Baseline render, in manifest order
    pub resources: Vec<Resource>,
    /// Values tree the baseline was rendered with
    pub values: Value,
    /// Template name → template source
    pub templates: BTreeMap<String, String>,
}

/// Loads and renders a package.
pub trait PackageLoader: Send + Sync {
    /// Load the baseline render, values and templates.
    ///
    /// # Errors
    ///
    /// Implementations report unreadable or unrenderable packages here.
    fn load(&self) -> Result<LoadedPackage>;

    /// Render the same package again with `values` in place of its own.
    ///
    /// # Errors
    ///
    /// Implementations report rendering failures here.
    fn render_with_values(&self, values: &Value) -> Result<Vec<Resource>>;
}
