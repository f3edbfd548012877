//! Unit test suite for chartgraph
//!
//! Public-API tests of the building blocks the pipeline is assembled from.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod ids;
mod sentinel_values;
mod template_references;
