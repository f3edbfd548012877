//! Resource dependency graph and the heuristics that populate it.
//!
//! - [`dependency_graph`] - [`DependencyGraph`]: edges, deterministic
//!   topological order, cycle enumeration
//! - [`detector`] - content-based dependency detection between resources

pub mod dependency_graph;
pub mod detector;

pub use dependency_graph::{DependencyGraph, DependencyNode};
pub use detector::{TargetRef, detect_dependencies};
