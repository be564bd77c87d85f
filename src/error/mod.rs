//! Failure capture data and classification.
//!
//! This module holds everything the reporter knows about a failure before it
//! is rendered: the raw inputs from each capture path, the severity table
//! with its fatal rules, and the canonical [`FailureRecord`].

pub mod classification;
pub mod failure;
pub mod record;

// Re-export main types for convenient access
pub use classification::{Classification, Classifier, Severity, UnknownSeverity};
pub use failure::{ReportableError, RuntimeFailure, SelfReport};
pub use record::{display_path, FailureRecord, Frame};
