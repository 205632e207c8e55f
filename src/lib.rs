//! pkgcheck-report - Classification and aggregation of pkgcheck results
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic separated from file and terminal concerns
//! - ClassRules is an explicit value passed to every stage that classifies
//! - ReportPipeline drives filter, sort and aggregation for every front end

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod filter;
pub mod input;
pub mod maintainers;
pub mod report;
pub mod xml;

// Re-export main types for convenient access
pub use domain::results::{
    CheckResult, GroupKey, ReportError, ReportResult, Severity, SeverityCounts,
};

pub use config::{ClassRules, ConfigFormat, Excludes};

pub use aggregate::{ClassIndexEntry, GroupNode, Summary};

pub use filter::{MaintainerTarget, PackageFilter, ResultFilter};

pub use maintainers::{MaintainerIndex, MembershipGraph};

pub use report::{Digest, OutputFormat, ReportFormatter, ReportOptions};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Options for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Whether results classified as verbose are kept
    pub verbose: bool,
    /// Documentation URI used for class links
    pub doc_uri: String,
    /// Repository revision shown in the report header
    pub revision: Option<String>,
    /// Time the results were produced, now when unset
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            doc_uri: report::DEFAULT_DOC_URI.to_string(),
            revision: None,
            timestamp: None,
        }
    }
}

/// Main pipeline turning raw results into a digest
#[derive(Debug, Clone)]
pub struct ReportPipeline {
    rules: ClassRules,
    options: PipelineOptions,
}

impl ReportPipeline {
    /// Create a pipeline with the given rules and options
    pub fn new(rules: ClassRules, options: PipelineOptions) -> Self {
        Self { rules, options }
    }

    pub fn rules(&self) -> &ClassRules {
        &self.rules
    }

    /// Drop verbose and filtered-out results, then sort for grouping
    pub fn collect(&self, results: Vec<CheckResult>, filter: &ResultFilter<'_>) -> Vec<CheckResult> {
        let total = results.len();
        let mut kept: Vec<CheckResult> = results
            .into_iter()
            .filter(|r| self.options.verbose || r.severity(&self.rules) != Severity::Verbose)
            .filter(|r| filter.matches(r))
            .collect();
        aggregate::sort_results(&mut kept);

        tracing::debug!("Kept {} of {} results", kept.len(), total);
        kept
    }

    /// Build the digest of already collected results
    ///
    /// With a maintainer index every package group in the tree gets its
    /// maintainer list.
    pub fn digest<'a>(
        &'a self,
        results: &'a [CheckResult],
        index: Option<&MaintainerIndex>,
    ) -> Digest<'a> {
        let mut maintainers = BTreeMap::new();
        if let Some(index) = index {
            for (key, _) in aggregate::group_runs(results, 2) {
                if let (Some(atom), Some(category), Some(package)) =
                    (key.package_atom(), key.category(), key.package())
                {
                    maintainers.insert(atom, index.lookup(category, package));
                }
            }
        }

        Digest {
            groups: aggregate::deep_group(results),
            errors: aggregate::find_of_class(results, &self.rules, Severity::Error),
            warnings: aggregate::find_of_class(results, &self.rules, Severity::Warning),
            staging: aggregate::find_of_class(results, &self.rules, Severity::Staging),
            summary: aggregate::summarize(results, &self.rules),
            maintainers,
            timestamp: self.options.timestamp.unwrap_or_else(Utc::now),
            revision: self.options.revision.clone(),
            doc_uri: self.options.doc_uri.clone(),
            rules: &self.rules,
        }
    }

    /// Package groups containing results of any of the given severities
    pub fn borked(&self, results: &[CheckResult], severities: &[Severity]) -> Vec<GroupKey> {
        aggregate::borked_groups(results, &self.rules, severities)
    }
}

/// Record every occurrence of the given classes in `excludes`
///
/// Returns the number of newly added entries.
pub fn collect_excludes(results: &[CheckResult], classes: &[String], excludes: &mut Excludes) -> usize {
    results
        .iter()
        .filter(|r| classes.iter().any(|c| c == &r.class))
        .filter(|r| excludes.record(r))
        .count()
}
