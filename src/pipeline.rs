//! Transformation pipeline.
//!
//! [`Pipeline::run`] turns one loaded package into a [`TransformResult`]:
//!
//! 1. load and validate the input (an empty resource set is an error)
//! 2. drop excluded kinds and sub-packages
//! 3. assign resource IDs
//! 4. infer field mappings with the configured [`InferenceStrategy`]
//! 5. sort mappings by resource ID, field path, values path
//! 6. extract the schema
//! 7. optionally prune mappings not covered by a schema field, turning their
//!    markers in surviving interpolations back into literal text
//! 8. rewrite mapped fields into reference expressions
//! 9. build the dependency graph from the resources as rendered, before
//!    rewriting, so detection still sees literal names and labels
//! 10. fail on cycles, listing every cycle found
//! 11. order resources topologically
//! 12. compute per-resource status, checking for cancellation before each
//!     resource
//!
//! Recoverable problems (skipped templates, failed diff units, unused ID
//! overrides) do not stop the run. They are logged where they occur and
//! returned in [`TransformResult::warnings`].

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::config::TransformConfig;
use crate::core::{ChartGraphError, Resource};
use crate::expression::apply_mappings;
use crate::graph::{DependencyGraph, detect_dependencies};
use crate::ids::{ResourceIds, assign_resource_ids};
use crate::inference::{
    FieldMapping, InferenceContext, InferenceStrategy, sort_mappings, strategy_for,
};
use crate::package::PackageLoader;
use crate::schema::{InferredSchemaExtractor, SchemaExtractor, SchemaField, prune_mappings};
use crate::status::{StatusFields, TransformerRegistry, default_status};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Resources with mapped fields rewritten into expressions
    pub resources: Vec<Resource>,
    /// Resource IDs
    pub ids: ResourceIds,
    /// Schema fields
    pub schema_fields: Vec<SchemaField>,
    /// Resource ID → status expressions
    pub status: BTreeMap<String, StatusFields>,
    /// Dependency graph over resource IDs
    pub graph: DependencyGraph,
    /// Resource IDs, dependencies first
    pub order: Vec<String>,
    /// Applied mappings, sorted
    pub mappings: Vec<FieldMapping>,
    /// Recovered problems
    pub warnings: Vec<String>,
}

/// A configured transformation.
pub struct Pipeline {
    config: TransformConfig,
    strategy: Box<dyn InferenceStrategy>,
    schema: Box<dyn SchemaExtractor>,
    registry: Option<Box<dyn TransformerRegistry>>,
}

impl Pipeline {
    /// A pipeline using the strategy `config` selects and the inferred schema.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        let strategy = strategy_for(&config);
        Self {
            config,
            strategy,
            schema: Box::new(InferredSchemaExtractor),
            registry: None,
        }
    }

    /// Replace the inference strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn InferenceStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the schema extractor.
    #[must_use]
    pub fn with_schema_extractor(mut self, schema: Box<dyn SchemaExtractor>) -> Self {
        self.schema = schema;
        self
    }

    /// Consult `registry` before the built-in status defaults.
    #[must_use]
    pub fn with_registry(mut self, registry: Box<dyn TransformerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Run the transformation for the package `loader` provides.
    ///
    /// # Errors
    ///
    /// - [`ChartGraphError::LoaderError`] if loading fails
    /// - [`ChartGraphError::EmptyResourceSet`] if nothing is left to transform
    /// - [`ChartGraphError::DuplicateResource`] / [`ChartGraphError::IdCollision`]
    /// - [`ChartGraphError::CircularDependency`] if the graph has cycles
    /// - [`ChartGraphError::Cancelled`] if `cancel` fires before status computation ends
    /// - inference, schema, mapping and transformer failures
    pub async fn run(
        &self,
        loader: &dyn PackageLoader,
        cancel: &CancellationToken,
    ) -> Result<TransformResult> {
        let package = loader.load().map_err(|e| ChartGraphError::LoaderError {
            message: format!("{e:#}"),
        })?;
        if package.resources.is_empty() {
            return Err(ChartGraphError::EmptyResourceSet.into());
        }
        tracing::info!(
            "Transforming {} resources with the {} strategy",
            package.resources.len(),
            self.strategy.name()
        );

        let mut resources = package.resources;
        let before = resources.len();
        resources.retain(|r| !self.config.excludes(r.kind(), &r.origin));
        if resources.len() < before {
            tracing::debug!("Excluded {} resources by configuration", before - resources.len());
        }
        if resources.is_empty() {
            return Err(ChartGraphError::EmptyResourceSet.into());
        }

        let ids = assign_resource_ids(&resources, &self.config.id_overrides)?;
        let mut warnings: Vec<String> = ids
            .unused_overrides()
            .iter()
            .map(|key| format!("ID override '{key}' does not match any resource"))
            .collect();

        if cancel.is_cancelled() {
            return Err(ChartGraphError::Cancelled.into());
        }

        let ctx = InferenceContext {
            resources: &resources,
            ids: &ids,
            values: &package.values,
            templates: &package.templates,
            loader,
        };
        let outcome = self.strategy.infer(&ctx).await.context("Parameter inference failed")?;
        warnings.extend(outcome.warnings);
        let mut mappings = outcome.mappings;
        sort_mappings(&mut mappings);
        tracing::debug!("Inferred {} field mappings", mappings.len());

        let schema_fields = self
            .schema
            .extract(&package.values, outcome.referenced_paths.as_ref())
            .context("Schema extraction failed")?;

        if self.config.prune_schema {
            let pruned = prune_mappings(&mut mappings, &schema_fields, &package.values);
            tracing::debug!("Pruned {} mappings outside the schema", pruned);
        }

        let rendered = resources.clone();
        apply_mappings(&mut resources, &ids, &mappings)?;

        let graph = build_graph(&rendered, &ids);
        let cycles = graph.detect_cycles();
        if !cycles.is_empty() {
            return Err(ChartGraphError::CircularDependency { cycles }.into());
        }
        let order = graph.topological_sort()?;

        let mut status = BTreeMap::new();
        for resource in &rendered {
            if cancel.is_cancelled() {
                return Err(ChartGraphError::Cancelled.into());
            }
            let Some(id) = ids.get(resource) else {
                continue;
            };
            let own: Vec<FieldMapping> =
                mappings.iter().filter(|m| m.resource_id == id).cloned().collect();
            let custom = self
                .registry
                .as_ref()
                .and_then(|r| r.transform(resource, id, &own, cancel));
            let fields = match custom {
                Some(result) => result.with_context(|| {
                    format!("Status transformer failed for {}", resource.qualified_name())
                })?,
                None => default_status(resource, &own),
            };
            status.insert(id.to_string(), fields);
        }

        tracing::info!(
            "Transformed {} resources: {} mappings, {} dependencies, {} warnings",
            resources.len(),
            mappings.len(),
            graph.edge_count(),
            warnings.len()
        );

        Ok(TransformResult {
            resources,
            ids,
            schema_fields,
            status,
            graph,
            order,
            mappings,
            warnings,
        })
    }
}

/// Register every resource and detect the edges between them.
#[must_use]
pub fn build_graph(resources: &[Resource], ids: &ResourceIds) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for resource in resources {
        if let Some(id) = ids.get(resource) {
            graph.add_node(id, resource);
        }
    }
    let edges = detect_dependencies(&mut graph, resources, ids);
    tracing::debug!("Detected {} dependencies between {} resources", edges, graph.node_count());
    graph
}
