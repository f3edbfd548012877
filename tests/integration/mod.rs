//! Integration test suite for chartgraph
//!
//! End-to-end pipeline runs over in-memory charts. Every test goes through
//! [`chartgraph::pipeline::Pipeline::run`] with a fake package loader, so no
//! chart tooling is needed.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pipeline**: Full runs: IDs, rewritten fields, schema, graph, order, status
//! - **strategies**: Sentinel vs fast inference, concurrency, pruning, warnings
//! - **config_files**: Configuration and ID override files on disk
//! - **errors**: Cycles, collisions, loader failures and cancellation

#[path = "../common/mod.rs"]
mod common;

mod config_files;
mod errors;
mod pipeline;
mod strategies;
