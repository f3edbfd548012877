//! Core types and error handling.
//!
//! - [`error`] - [`ChartGraphError`], [`ErrorContext`] and [`user_friendly_error`]
//! - [`resource`] - [`Resource`], [`Gvk`] and the closed [`KindClass`] classification

pub mod error;
mod resource;

pub use error::{ChartGraphError, ErrorContext, user_friendly_error};
pub use resource::{Gvk, KindClass, PodTemplateLocation, Resource};
