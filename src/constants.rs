//! Global constants used throughout the chartgraph codebase.
//!
//! Marker formats, matching thresholds and concurrency defaults live here so
//! that the inference engines, the expression synthesizer and the tests agree
//! on them.

/// Prefix of a sentinel marker.
pub const SENTINEL_PREFIX: &str = "__CG_SENTINEL__";

/// Suffix of a sentinel marker.
pub const SENTINEL_SUFFIX: &str = "__CG_END__";

/// Root identifier under which templates reach the values tree (`.Values`).
pub const VALUES_ROOT: &str = "Values";

/// Minimum length of a value's string form for substring matching.
///
/// Single characters ("1", "a") appear everywhere in manifests and would
/// produce noise mappings.
pub const MIN_SUBSTRING_MATCH_LEN: usize = 2;

/// Below this many resource pairs the diff engine stays sequential.
pub const PARALLEL_DIFF_THRESHOLD: usize = 4;

/// Maximum nesting depth walked in a single manifest.
pub const MAX_WALK_DEPTH: usize = 128;

/// Default CPU core count when detection fails.
///
/// Used as a fallback when `std::thread::available_parallelism()` returns an error.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Prefix of every schema reference expression.
pub const SCHEMA_REF_ROOT: &str = "schema.spec";

/// Default number of diff workers: the available parallelism of the host.
#[must_use]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(FALLBACK_CORE_COUNT)
}
