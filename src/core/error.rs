//! Error handling for chartgraph
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`ChartGraphError`]) so callers can react to a
//!    specific failure (an ID collision wants an override, a cycle wants a fix in
//!    the chart).
//! 2. **User-friendly reporting** ([`ErrorContext`]) with details and an actionable
//!    suggestion, rendered in color for terminals.
//!
//! # Error Categories
//!
//! - **Input/configuration**: [`ChartGraphError::EmptyResourceSet`],
//!   [`ChartGraphError::ConfigError`], [`ChartGraphError::FileSystemError`],
//!   [`ChartGraphError::DuplicateResource`]. Raised before any inference runs.
//! - **Identity**: [`ChartGraphError::IdCollision`]. Always fatal.
//! - **Graph**: [`ChartGraphError::CircularDependency`],
//!   [`ChartGraphError::TopologicalSortFailed`]. Always fatal.
//! - **Inference**: [`ChartGraphError::TemplateParseError`],
//!   [`ChartGraphError::InferenceUnitFailed`]. Recovered per file / per unit and
//!   surfaced as warnings by the pipeline.
//!
//! Internal plumbing returns [`anyhow::Result`]; typed errors travel inside the
//! anyhow error and are recovered with [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use chartgraph::core::{ChartGraphError, user_friendly_error};
//!
//! let err = anyhow::Error::from(ChartGraphError::IdCollision {
//!     id: "deployment".to_string(),
//!     first: "Deployment/web".to_string(),
//!     second: "Deployment/api".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for chartgraph operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartGraphError {
    /// The package produced no resources, so there is nothing to transform.
    #[error("No resources to transform: the package rendered an empty resource set")]
    EmptyResourceSet,

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// A file could not be read or written
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// The operation that failed (e.g. "read override file")
        operation: String,
        /// The path involved
        path: String,
    },

    /// Two input resources share the same kind, namespace and name
    #[error("Duplicate resource '{key}' in input")]
    DuplicateResource {
        /// The shared match key
        key: String,
    },

    /// Two different resources resolved to the same sanitized identifier
    ///
    /// Never resolved silently: the operator has to add an override for one of
    /// the two resources.
    #[error("Resource ID collision: '{first}' and '{second}' both resolve to ID '{id}'")]
    IdCollision {
        /// The shared identifier
        id: String,
        /// Qualified name (`Kind/name`) of the resource that claimed the ID first
        first: String,
        /// Qualified name of the resource that collided with it
        second: String,
    },

    /// The dependency graph contains one or more cycles
    ///
    /// Each cycle is listed with its smallest node first.
    #[error("Circular dependency detected: {}", format_cycle(.cycles.first()))]
    CircularDependency {
        /// Deduplicated cycles, each a sequence of resource IDs
        cycles: Vec<Vec<String>>,
    },

    /// Kahn's algorithm could not emit every node
    #[error("Failed to order resources: {ordered} of {total} resources could be ordered")]
    TopologicalSortFailed {
        /// Number of nodes emitted before the sort stalled
        ordered: usize,
        /// Total number of nodes in the graph
        total: usize,
    },

    /// A dotted/indexed field path is malformed or cannot be written
    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// A template could not be parsed during reference analysis
    #[error("Failed to parse template '{template}': {reason}")]
    TemplateParseError {
        /// Template name
        template: String,
        /// Parser message
        reason: String,
    },

    /// One unit of inference work failed
    #[error("Inference failed for '{unit}': {reason}")]
    InferenceUnitFailed {
        /// The resource ID (or other unit label) that failed
        unit: String,
        /// Failure description, including panic payloads
        reason: String,
    },

    /// The package loader failed
    #[error("Package loader failed: {message}")]
    LoaderError {
        /// Loader message
        message: String,
    },

    /// The run was cancelled through its cancellation token
    #[error("Transformation cancelled")]
    Cancelled,

    /// Any other error
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

fn format_cycle(cycle: Option<&Vec<String>>) -> String {
    match cycle {
        Some(nodes) if !nodes.is_empty() => {
            let mut chain = nodes.clone();
            chain.push(nodes[0].clone());
            chain.join(" → ")
        }
        _ => "<unknown cycle>".to_string(),
    }
}

/// Error wrapper carrying user-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ChartGraphError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no details or suggestion.
    #[must_use]
    pub const fn new(error: ChartGraphError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with an actionable suggestion.
///
/// Recognizes [`ChartGraphError`] (directly or wrapped in an [`ErrorContext`]),
/// [`std::io::Error`] and YAML/JSON/TOML parse errors. Everything else is kept
/// as [`ChartGraphError::Other`] with the full context chain as the message.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(ctx) = error.downcast_ref::<ErrorContext>() {
        return ErrorContext {
            error: ctx.error.clone(),
            suggestion: ctx.suggestion.clone(),
            details: ctx.details.clone(),
        };
    }

    if let Some(cg_error) = error.downcast_ref::<ChartGraphError>() {
        return create_error_context(cg_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return ErrorContext::new(ChartGraphError::FileSystemError {
            operation: "file access".to_string(),
            path: "unknown".to_string(),
        })
        .with_details(io_error.to_string())
        .with_suggestion("Check that the file exists and is readable");
    }

    if error.downcast_ref::<serde_yaml::Error>().is_some()
        || error.downcast_ref::<serde_json::Error>().is_some()
        || error.downcast_ref::<toml::de::Error>().is_some()
    {
        return ErrorContext::new(ChartGraphError::ConfigError {
            message: format!("{error:#}"),
        })
        .with_suggestion("Fix the syntax of the configuration or override file");
    }

    ErrorContext::new(ChartGraphError::Other {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: ChartGraphError) -> ErrorContext {
    match &error {
        ChartGraphError::EmptyResourceSet => ErrorContext::new(error)
            .with_suggestion("Check that the chart renders at least one manifest")
            .with_details("Resources may be disabled by values or excluded by filters"),
        ChartGraphError::IdCollision { first, .. } => {
            let suggestion = format!(
                "Add an ID override for '{first}' (or the other resource) in the override file"
            );
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("IDs come from the kind and name suffix and must be unique")
        }
        ChartGraphError::DuplicateResource { .. } => ErrorContext::new(error)
            .with_suggestion("Remove the duplicate manifest or give it a distinct name"),
        ChartGraphError::CircularDependency { cycles } => {
            let details = format!(
                "{} cycle(s) found; every listed resource waits on the next one",
                cycles.len()
            );
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Remove one of the references between these resources")
        }
        ChartGraphError::TopologicalSortFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Run cycle detection on the graph to find the offending resources"),
        ChartGraphError::ConfigError { .. } | ChartGraphError::FileSystemError { .. } => {
            ErrorContext::new(error).with_suggestion("Check the configuration and override files")
        }
        ChartGraphError::InvalidFieldPath { .. } => ErrorContext::new(error)
            .with_details("Field paths use dotted keys, [n] indices and [\"quoted.keys\"]"),
        ChartGraphError::TemplateParseError { .. } => ErrorContext::new(error)
            .with_details("Reference analysis skips templates it cannot parse"),
        ChartGraphError::InferenceUnitFailed { .. } => ErrorContext::new(error)
            .with_details("Mappings from other resources are unaffected"),
        ChartGraphError::LoaderError { .. } => ErrorContext::new(error)
            .with_suggestion("Check that the chart can be rendered with the supplied values"),
        ChartGraphError::Cancelled | ChartGraphError::Other { .. } => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_message_names_both_resources() {
        let err = ChartGraphError::IdCollision {
            id: "web".to_string(),
            first: "Deployment/web".to_string(),
            second: "Service/web".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Deployment/web"));
        assert!(msg.contains("Service/web"));
        assert!(msg.contains("'web'"));
    }

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = ChartGraphError::CircularDependency {
            cycles: vec![vec!["a".to_string(), "b".to_string()]],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a → b → a");
    }

    #[test]
    fn test_user_friendly_error_recovers_typed_error() {
        let err = anyhow::Error::from(ChartGraphError::EmptyResourceSet);
        let ctx = user_friendly_error(err.context("loading chart"));
        assert_eq!(ctx.error, ChartGraphError::EmptyResourceSet);
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_generic() {
        let ctx = user_friendly_error(anyhow::anyhow!("boom"));
        assert!(matches!(ctx.error, ChartGraphError::Other { .. }));
        assert_eq!(ctx.to_string(), "boom");
    }

    #[test]
    fn test_error_context_display_includes_suggestion() {
        let ctx = ErrorContext::new(ChartGraphError::Cancelled)
            .with_details("stopped")
            .with_suggestion("retry");
        let rendered = ctx.to_string();
        assert!(rendered.contains("Details: stopped"));
        assert!(rendered.contains("Suggestion: retry"));
    }
}
