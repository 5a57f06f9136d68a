//! vcsgrip core - domain types for multi-repository command dispatch
//!
//! This crate holds the job model, the structured results jobs produce, the
//! port every VCS client adapter implements and the dependency rules used
//! when jobs must run in order. Running subprocesses, crawling the
//! filesystem and printing are handled by the application crate.

pub mod domain;
pub mod ports;
pub mod app;
pub mod error;

// Re-exports for ergonomics
pub use domain::*;
pub use error::*;
