//! chartgraph - turn a rendered chart into a parameterized resource graph
//!
//! A Helm-style package is a set of templates plus a values tree. Rendering
//! it yields plain manifests in which every trace of the values is lost.
//! chartgraph recovers that link: it finds which manifest fields came from
//! which values, rewrites those fields into `${schema.spec.<path>}`
//! references, exposes the values as a schema, and orders the resources by
//! the dependencies between them (a Deployment needs its ConfigMap, a Service
//! selects its Deployment).
//!
//! # Architecture Overview
//!
//! Fetching and rendering a package is a caller concern behind
//! [`package::PackageLoader`]. Everything after that is one
//! [`pipeline::Pipeline`] run:
//!
//! ```text
//! load ─▶ filter ─▶ IDs ─▶ infer ─▶ schema ─▶ rewrite ─▶ graph ─▶ order ─▶ status
//! ```
//!
//! Two inference strategies find the field mappings:
//!
//! - **sentinel** (default): render once more with every value replaced by a
//!   unique marker, then diff the two renders. Precise, but needs a second
//!   render.
//! - **fast**: statically read which values the templates reference, then
//!   match those values against the baseline render.
//!
//! # Core Modules
//!
//! ## Pipeline
//! - [`pipeline`] - the staged transformation and its [`pipeline::TransformResult`]
//! - [`package`] - the package loading seam
//! - [`config`] - [`config::TransformConfig`] and TOML/YAML/JSON loading
//!
//! ## Inference
//! - [`inference`] - strategies, field mappings and the diff and match engines
//! - [`templating`] - Go-template lexer, parser and reference analysis
//!
//! ## Output
//! - [`ids`] - stable resource IDs
//! - [`expression`] - reference expressions and mapping application
//! - [`graph`] - dependency detection, cycle reporting and ordering
//! - [`schema`] - schema field extraction
//! - [`status`] - readiness conditions and status projections
//!
//! ## Supporting Modules
//! - [`core`] - [`core::Resource`] and [`core::ChartGraphError`]
//! - [`utils`] - field path parsing and nested value access
//! - [`constants`] - shared limits and defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use chartgraph::config::TransformConfig;
//! use chartgraph::package::PackageLoader;
//! use chartgraph::pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn transform(loader: &dyn PackageLoader) -> anyhow::Result<()> {
//!     let config = TransformConfig::load("chartgraph.toml".as_ref())?;
//!     let result = Pipeline::new(config).run(loader, &CancellationToken::new()).await?;
//!     for id in &result.order {
//!         println!("{id}");
//!     }
//!     Ok(())
//! }
//! ```

// Pipeline
pub mod config;
pub mod package;
pub mod pipeline;

// Inference
pub mod inference;
pub mod templating;

// Output
pub mod expression;
pub mod graph;
pub mod ids;
pub mod schema;
pub mod status;

// Supporting modules
pub mod constants;
pub mod core;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
