//! # drupalcheck_core
//!
//! Runs the external `drupal-check` analyzer against a document and turns its
//! JSON report into positioned diagnostics.
//!
//! This crate provides:
//! - The `Invoker`, which runs the analyzer with a hard timeout
//! - The report model and the line-to-range mapper
//! - The `Checker` orchestrator and its configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use drupalcheck_core::{CheckRequest, Checker, CheckerConfig};
//!
//! let config = CheckerConfig::new();
//! let checker = Checker::new(&config, Some(root.as_path()))?;
//!
//! let request = CheckRequest::new(text, uri, Some(root));
//! for diag in checker.check(&request)? {
//!     println!("{}:{} {}", diag.range.start.line, diag.range.start.character, diag.message);
//! }
//! ```

mod checker;
mod config;
mod diagnostic;
mod error;
pub mod invoker;
pub mod mapper;
pub mod report;

pub use checker::{CheckRequest, Checker, diagnostics_from_output};
pub use config::{CheckerConfig, RunTrigger, SeverityConfig};
pub use diagnostic::{Diagnostic, Position, Range, SOURCE, Severity, SeverityMap};
pub use error::CheckerError;
pub use invoker::{DEFAULT_TIMEOUT, InvocationResult, Invoker};
pub use report::{AnalysisReport, FileReport, RawMessage};
