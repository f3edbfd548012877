//! Shared utilities.
//!
//! - [`field_path`] - parse dotted/indexed paths and read/write nested values

pub mod field_path;

pub use field_path::{FieldPath, Segment};
