//! Template-reference analysis.
//!
//! Helm-style packages are Go `text/template` sources. The fast inference
//! strategy needs to know which values paths those templates read, without
//! rendering anything. This module tokenizes ([`lexer`]), parses ([`parser`])
//! and walks ([`references`]) each template and reports every `.Values` path
//! it can resolve statically.
//!
//! Only syntax is interpreted; functions are opaque. A template that fails to
//! parse does not fail the analysis: it is logged, reported in
//! [`ReferenceAnalysis::skipped`] and contributes no paths.
//!
//! # Example
//!
//! ```rust,no_run
//! use chartgraph::templating::analyze_references;
//! use std::collections::BTreeMap;
//!
//! let templates = BTreeMap::from([(
//!     "deployment.yaml".to_string(),
//!     "image: {{ .Values.image.repo }}:{{ .Values.image.tag }}".to_string(),
//! )]);
//! let analysis = analyze_references(&templates);
//! assert!(analysis.paths.contains("image.tag"));
//! ```

pub mod lexer;
pub mod parser;
pub mod references;

pub use parser::{Node, ParseError, parse};
pub use references::{ReferenceAnalysis, SkippedTemplate, analyze_references, template_references};
