//! Core domain models for pkgcheck results and their classification
//!
//! Architecture: Rich Domain Models - Results know their locator and how to be classified
//! - CheckResult is a fixed-schema view built once at ingestion
//! - GroupKey expresses the category/package/version hierarchy as a truncatable tuple
//! - Severity is never stored on a result, it is derived through ClassRules

use crate::config::ClassRules;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity tags a check class can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, Default)]
pub enum Severity {
    /// Not classified, rendered without emphasis
    #[default]
    #[serde(rename = "")]
    Unclassified,
    /// Only surfaced when verbose output is requested
    #[serde(rename = "verbose")]
    Verbose,
    /// Warnings that only matter in staging
    #[serde(rename = "staging")]
    Staging,
    /// Warnings that should be addressed
    #[serde(rename = "warn")]
    Warning,
    /// Errors that mark a package as broken
    #[serde(rename = "err")]
    Error,
}

impl Severity {
    /// Severities that get their own class index in a digest
    pub const INDEXED: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Staging];

    /// Parse a configuration tag, `None` for unknown tags
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "" => Some(Self::Unclassified),
            "verbose" => Some(Self::Verbose),
            "staging" => Some(Self::Staging),
            "warn" => Some(Self::Warning),
            "err" => Some(Self::Error),
            _ => None,
        }
    }

    /// Tag used in configuration files and as the CSS class in HTML output
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Unclassified => "",
            Self::Verbose => "verbose",
            Self::Staging => "staging",
            Self::Warning => "warn",
            Self::Error => "err",
        }
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Verbose => "verbose",
            Self::Staging => "staging",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Truncated locator prefix identifying one node of the grouping tree
///
/// Components are only present up to the first empty locator field, so a
/// result without a category has the root key `()` and a result without a
/// version has a two-component key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    /// Maximum number of locator components
    pub const MAX_DEPTH: usize = 3;

    /// The empty key shared by results without a category
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a key from explicit components, stopping at the first empty one
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts = components
            .into_iter()
            .map(Into::into)
            .take_while(|c: &String| !c.is_empty())
            .take(Self::MAX_DEPTH)
            .collect();
        Self(parts)
    }

    /// Key limited to the first `level` components
    pub fn truncated(&self, level: usize) -> Self {
        Self(self.0.iter().take(level).cloned().collect())
    }

    /// Number of present components
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn category(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn package(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.0.get(2).map(String::as_str)
    }

    /// `category/package` when the key reaches package depth
    pub fn package_atom(&self) -> Option<String> {
        match (self.category(), self.package()) {
            (Some(cat), Some(pkg)) => Some(format!("{cat}/{pkg}")),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("global")
        } else {
            f.write_str(&self.0.join("/"))
        }
    }
}

/// One pkgcheck result with a fixed locator schema
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckResult {
    /// Package category, empty for repository-wide results
    pub category: String,
    /// Package name, empty for category-wide results
    pub package: String,
    /// Package version, empty for package-wide results
    pub version: String,
    /// Check class (keyword) that produced the result
    pub class: String,
    /// Every other field of the result, such as `msg`
    pub extra: BTreeMap<String, String>,
}

impl CheckResult {
    /// Create a repository-wide result of the given class
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into(), ..Default::default() }
    }

    /// Set the locator triple
    pub fn with_locator(
        mut self,
        category: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.category = category.into();
        self.package = package.into();
        self.version = version.into();
        self
    }

    /// Add a free-form field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up any field by name, empty when absent
    pub fn field(&self, key: &str) -> &str {
        match key {
            "category" => &self.category,
            "package" => &self.package,
            "version" => &self.version,
            "class" => &self.class,
            other => self.extra.get(other).map(String::as_str).unwrap_or(""),
        }
    }

    /// The result message
    pub fn message(&self) -> &str {
        self.field("msg")
    }

    /// Full grouping key of this result
    pub fn group_key(&self) -> GroupKey {
        GroupKey::from_components([
            self.category.as_str(),
            self.package.as_str(),
            self.version.as_str(),
        ])
    }

    /// `category/package`, `None` when either part is missing
    pub fn package_atom(&self) -> Option<String> {
        if self.category.is_empty() || self.package.is_empty() {
            None
        } else {
            Some(format!("{}/{}", self.category, self.package))
        }
    }

    /// Severity of this result under the given rules
    pub fn severity(&self, rules: &ClassRules) -> Severity {
        rules.resolve(&self.class, &self.category, &self.package, &self.version)
    }

    /// Sort key used before grouping
    pub fn sort_key(&self) -> (&str, &str, &str, &str) {
        (&self.category, &self.package, &self.version, &self.class)
    }
}

/// Count of results by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub staging: usize,
    pub verbose: usize,
    pub unclassified: usize,
}

impl SeverityCounts {
    /// Total number of results across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.staging + self.verbose + self.unclassified
    }

    /// Add a result to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Staging => self.staging += 1,
            Severity::Verbose => self.verbose += 1,
            Severity::Unclassified => self.unclassified += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Staging => self.staging,
            Severity::Verbose => self.verbose,
            Severity::Unclassified => self.unclassified,
        }
    }
}

/// Error types that can occur while building a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Class mapping or excludes could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or written
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// An input results file is unreadable or malformed
    #[error("Input error in {source_name}: {message}")]
    Input { source_name: String, message: String },

    /// XML document could not be parsed or written
    #[error("XML error: {message}")]
    Xml { message: String },

    /// Report could not be rendered or written
    #[error("Output error: {message}")]
    Output { message: String },
}

impl ReportError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an input error
    pub fn input(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Input { source_name: source_name.into(), message: message.into() }
    }

    /// Create an XML error
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml { message: message.into() }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output { message: message.into() }
    }
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;
