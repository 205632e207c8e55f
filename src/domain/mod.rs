//! Domain layer for pkgcheck-report
//!
//! CDD Principle: Domain Model - Pure logic for classifying and locating QA results
//! - Contains the result record, its locator key and the severity vocabulary
//! - Independent of XML parsing, metadata lookups and output rendering
//! - Expresses the ubiquitous language of categories, packages and check classes

pub mod results;

// Re-export main domain types for convenience
pub use results::*;
