//! Test utilities for chartgraph
//!
//! Fixtures for building resources and in-memory packages, plus logging setup
//! that works under the test harness. Available to the crate's own tests and,
//! through the `test-utils` feature, to the `tests/` suites.
//!
//! # Example
//!
//! ```rust,no_run
//! use chartgraph::test_utils::fixtures::{FakeLoader, resource};
//! use serde_json::json;
//!
//! let loader = FakeLoader::new(vec![resource("ConfigMap", "settings")], json!({}));
//! ```

pub mod fixtures;

pub use fixtures::{FakeLoader, manifest, resource};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG` if set; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=chartgraph=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
