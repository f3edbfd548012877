//! Parameterization inference.
//!
//! Inference answers one question: which values-tree path produced which field
//! of which rendered resource. Two strategies answer it with different costs:
//!
//! - [`SentinelStrategy`] renders the package a second time with every values
//!   leaf replaced by a [`sentinel`] marker and diffs both renders
//!   ([`diff::DiffEngine`]). Precise, but needs the loader to render again.
//! - [`FastStrategy`] parses the templates for `.Values` references
//!   ([`crate::templating`]) and looks for the referenced values inside the
//!   baseline render ([`matcher::ValueMatcher`]). No second render, but
//!   coincidental equal values can be misattributed.
//!
//! Both produce [`FieldMapping`]s and sit behind [`InferenceStrategy`], so the
//! pipeline picks one from configuration.

pub mod diff;
pub mod matcher;
pub mod sentinel;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;

use crate::config::{ConcurrencyConfig, StrategyKind, TieBreak, TransformConfig};
use crate::core::{ChartGraphError, Resource};
use crate::ids::ResourceIds;
use crate::package::PackageLoader;

pub use diff::{DiffEngine, DiffReport, UnitFault};
pub use matcher::ValueMatcher;

/// How a value ended up in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The whole field is the value
    Exact,
    /// The value is embedded in a larger string
    Substring,
}

/// One provenance fact: `values_path` flowed into `field_path` of `resource_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Path in the values tree
    pub values_path: String,
    /// ID of the resource holding the field
    pub resource_id: String,
    /// Path of the field inside the resource manifest
    pub field_path: String,
    /// Exact or substring
    pub kind: MatchKind,
    /// Sentinel-tagged reconstruction of the field, substring mappings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel_string: Option<String>,
}

impl FieldMapping {
    /// An exact mapping.
    #[must_use]
    pub fn exact(
        values_path: impl Into<String>,
        resource_id: impl Into<String>,
        field_path: impl Into<String>,
    ) -> Self {
        Self {
            values_path: values_path.into(),
            resource_id: resource_id.into(),
            field_path: field_path.into(),
            kind: MatchKind::Exact,
            sentinel_string: None,
        }
    }

    /// A substring mapping carrying the tagged reconstruction of the field.
    #[must_use]
    pub fn substring(
        values_path: impl Into<String>,
        resource_id: impl Into<String>,
        field_path: impl Into<String>,
        sentinel_string: impl Into<String>,
    ) -> Self {
        Self {
            values_path: values_path.into(),
            resource_id: resource_id.into(),
            field_path: field_path.into(),
            kind: MatchKind::Substring,
            sentinel_string: Some(sentinel_string.into()),
        }
    }
}

/// Sort mappings by resource ID, field path, then values path.
pub fn sort_mappings(mappings: &mut [FieldMapping]) {
    mappings.sort_by(|a, b| {
        a.resource_id
            .cmp(&b.resource_id)
            .then_with(|| a.field_path.cmp(&b.field_path))
            .then_with(|| a.values_path.cmp(&b.values_path))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

/// Inputs of one inference run.
pub struct InferenceContext<'a> {
    /// Baseline resources (after filtering)
    pub resources: &'a [Resource],
    /// IDs of `resources`
    pub ids: &'a ResourceIds,
    /// Values tree of the baseline render
    pub values: &'a Value,
    /// Template name → source
    pub templates: &'a BTreeMap<String, String>,
    /// Loader, for strategies that render again
    pub loader: &'a dyn PackageLoader,
}

/// What a strategy found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceOutcome {
    /// Discovered mappings, unordered
    pub mappings: Vec<FieldMapping>,
    /// Values paths the templates reference, when the strategy computed them
    pub referenced_paths: Option<BTreeSet<String>>,
    /// Recovered problems (skipped templates, failed units)
    pub warnings: Vec<String>,
}

/// A parameterization inference technique.
pub trait InferenceStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Infer mappings for the resources in `ctx`.
    fn infer<'a>(
        &'a self,
        ctx: &'a InferenceContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<InferenceOutcome>> + Send + 'a>>;
}

/// Second render with sentinel values, then diff.
#[derive(Debug, Clone, Default)]
pub struct SentinelStrategy {
    engine: DiffEngine,
}

impl SentinelStrategy {
    /// Create the strategy with the diff engine's pool settings.
    #[must_use]
    pub const fn new(concurrency: ConcurrencyConfig) -> Self {
        Self {
            engine: DiffEngine::new(concurrency),
        }
    }
}

impl InferenceStrategy for SentinelStrategy {
    fn name(&self) -> &str {
        "sentinel"
    }

    fn infer<'a>(
        &'a self,
        ctx: &'a InferenceContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<InferenceOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let tagged_values = sentinel::sentinelize(ctx.values);
            let tagged = ctx
                .loader
                .render_with_values(&tagged_values)
                .context("Failed to render package with sentinel values")?;
            tracing::debug!("Sentinel render produced {} resources", tagged.len());

            let report = self.engine.run(ctx.resources, &tagged, ctx.ids).await;
            let warnings = report
                .faults
                .iter()
                .map(|f| {
                    ChartGraphError::InferenceUnitFailed {
                        unit: f.unit.clone(),
                        reason: f.reason.clone(),
                    }
                    .to_string()
                })
                .collect();

            Ok(InferenceOutcome {
                mappings: report.mappings,
                referenced_paths: None,
                warnings,
            })
        })
    }
}

/// Template reference analysis plus value matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastStrategy {
    matcher: ValueMatcher,
}

impl FastStrategy {
    /// Create the strategy with the matcher's tie-break.
    #[must_use]
    pub const fn new(tie_break: TieBreak) -> Self {
        Self {
            matcher: ValueMatcher::new(tie_break),
        }
    }
}

impl InferenceStrategy for FastStrategy {
    fn name(&self) -> &str {
        "fast"
    }

    fn infer<'a>(
        &'a self,
        ctx: &'a InferenceContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<InferenceOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let analysis = crate::templating::analyze_references(ctx.templates);
            let warnings = analysis
                .skipped
                .iter()
                .map(|s| {
                    ChartGraphError::TemplateParseError {
                        template: s.name.clone(),
                        reason: s.reason.clone(),
                    }
                    .to_string()
                })
                .collect();

            let mappings =
                self.matcher.match_resources(ctx.resources, ctx.ids, ctx.values, &analysis.paths);

            Ok(InferenceOutcome {
                mappings,
                referenced_paths: Some(analysis.paths),
                warnings,
            })
        })
    }
}

/// Build the strategy a configuration selects.
#[must_use]
pub fn strategy_for(config: &TransformConfig) -> Box<dyn InferenceStrategy> {
    match config.strategy {
        StrategyKind::Sentinel => Box::new(SentinelStrategy::new(config.concurrency.clone())),
        StrategyKind::Fast => Box::new(FastStrategy::new(config.tie_break)),
    }
}
