//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate a Digest to external formats
//! - Digest (domain) is converted to HTML, JSON or terminal text
//! - Each formatter only walks the tree and indexes in the order they were built
//! - Domain logic remains pure while supporting multiple presentation needs

use crate::aggregate::{ClassIndexEntry, GroupNode, Summary};
use crate::config::ClassRules;
use crate::domain::results::{CheckResult, GroupKey, ReportError, ReportResult, Severity};
use chrono::{DateTime, Utc};
use colored::{Color, Colorize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Default documentation target for class help links
pub const DEFAULT_DOC_URI: &str = "https://pkgcheck.readthedocs.io/en/latest/man/pkgcheck.html";

/// Everything a formatter needs to render one run
#[derive(Debug)]
pub struct Digest<'a> {
    /// Grouping tree over the filtered, sorted results
    pub groups: Vec<GroupNode<'a>>,
    /// Class index of error results
    pub errors: Vec<ClassIndexEntry>,
    /// Class index of warning results
    pub warnings: Vec<ClassIndexEntry>,
    /// Class index of staging results
    pub staging: Vec<ClassIndexEntry>,
    /// Counts by severity and class
    pub summary: Summary,
    /// Maintainers per `category/package` present in the tree
    pub maintainers: BTreeMap<String, Vec<String>>,
    /// When the results were produced
    pub timestamp: DateTime<Utc>,
    /// Repository revision the results belong to
    pub revision: Option<String>,
    /// Documentation URI used for class links
    pub doc_uri: String,
    /// Rules the results were classified with
    pub rules: &'a ClassRules,
}

impl<'a> Digest<'a> {
    /// Class index for one of the indexed severities
    pub fn index(&self, severity: Severity) -> &[ClassIndexEntry] {
        match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
            Severity::Staging => &self.staging,
            Severity::Verbose | Severity::Unclassified => &[],
        }
    }

    fn class_link(&self, class: &str) -> String {
        format!("{}#{}", self.doc_uri, class.to_lowercase())
    }
}

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Standalone HTML page
    Html,
    /// JSON format for programmatic consumption
    Json,
    /// Human-readable terminal format
    Human,
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a digest in the specified format
    pub fn format_report(&self, digest: &Digest<'_>, format: OutputFormat) -> ReportResult<String> {
        match format {
            OutputFormat::Html => Ok(self.format_html(digest)),
            OutputFormat::Json => self.format_json(digest),
            OutputFormat::Human => Ok(self.format_human(digest)),
        }
    }

    /// Format digest as a standalone HTML page
    fn format_html(&self, digest: &Digest<'_>) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\"/>\n<title>pkgcheck results</title>\n");
        html.push_str(HTML_STYLE);
        html.push_str("</head>\n<body>\n<h1>pkgcheck results</h1>\n");

        html.push_str(&format!(
            "<p class=\"meta\">Results as of <time>{}</time>",
            digest.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(revision) = &digest.revision {
            html.push_str(&format!(" for revision <code>{}</code>", escape_html(revision)));
        }
        html.push_str(&format!(" &middot; {} results</p>\n", digest.summary.total()));

        for severity in Severity::INDEXED {
            let title = match severity {
                Severity::Error => "Errors",
                Severity::Warning => "Warnings",
                _ => "Staging",
            };
            let index = digest.index(severity);
            if index.is_empty() {
                continue;
            }
            html.push_str(&format!(
                "<h2 class=\"{}\">{}</h2>\n<table class=\"index\">\n",
                severity.as_tag(),
                title
            ));
            for entry in index {
                let links: Vec<String> = entry
                    .groups
                    .iter()
                    .map(|g| {
                        let anchor = escape_html(&g.to_string());
                        format!("<a href=\"#{anchor}\">{anchor}</a>")
                    })
                    .collect();
                html.push_str(&format!(
                    "<tr><th><a href=\"{}\">{}</a></th><td>{}</td></tr>\n",
                    escape_html(&digest.class_link(&entry.class)),
                    escape_html(&entry.class),
                    links.join(" ")
                ));
            }
            html.push_str("</table>\n");
        }

        html.push_str("<h2>Results</h2>\n");
        for node in &digest.groups {
            self.html_node(digest, node, None, &mut html);
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    fn html_node(
        &self,
        digest: &Digest<'_>,
        node: &GroupNode<'_>,
        parent: Option<&GroupKey>,
        html: &mut String,
    ) {
        // the root leaf of an empty run gets no heading
        if matches!(node, GroupNode::Leaf { results, .. } if results.is_empty()) {
            return;
        }

        let key = node.key();
        if parent != Some(key) {
            let level = (key.depth() + 2).clamp(3, 5);
            let anchor = escape_html(&key.to_string());
            html.push_str(&format!("<h{level} id=\"{anchor}\">{anchor}</h{level}>\n"));

            if key.depth() == 2 {
                if let Some(maintainers) = key.package_atom().and_then(|a| digest.maintainers.get(&a)) {
                    html.push_str(&format!(
                        "<p class=\"maintainers\">{}</p>\n",
                        escape_html(&maintainers.join(", "))
                    ));
                }
            }
        }

        match node {
            GroupNode::Branch { children, .. } => {
                for child in children {
                    self.html_node(digest, child, Some(key), html);
                }
            }
            GroupNode::Leaf { results, .. } => {
                html.push_str("<table class=\"results\">\n");
                for result in results.iter() {
                    html.push_str(&format!(
                        "<tr class=\"{}\"><td><a href=\"{}\">{}</a></td><td>{}</td></tr>\n",
                        result.severity(digest.rules).as_tag(),
                        escape_html(&digest.class_link(&result.class)),
                        escape_html(&result.class),
                        escape_html(result.message())
                    ));
                }
                html.push_str("</table>\n");
            }
        }
    }

    /// Format digest in JSON format
    fn format_json(&self, digest: &Digest<'_>) -> ReportResult<String> {
        let index_json = |entries: &[ClassIndexEntry]| -> JsonValue {
            entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "class": e.class,
                        "groups": e.groups.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    })
                })
                .collect()
        };

        let json_report = serde_json::json!({
            "groups": digest.groups.iter().map(|n| node_json(digest.rules, n)).collect::<Vec<_>>(),
            "errors": index_json(&digest.errors),
            "warnings": index_json(&digest.warnings),
            "staging": index_json(&digest.staging),
            "summary": {
                "total": digest.summary.total(),
                "by_severity": digest.summary.by_severity,
                "by_class": digest.summary.by_class.iter().cloned().collect::<BTreeMap<_, _>>(),
            },
            "maintainers": digest.maintainers,
            "timestamp": digest.timestamp.to_rfc3339(),
            "revision": digest.revision,
            "doc_uri": digest.doc_uri,
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| ReportError::output(format!("JSON serialization failed: {}", e)))
    }

    /// Format digest as indented terminal text
    fn format_human(&self, digest: &Digest<'_>) -> String {
        let mut output = String::new();

        if digest.summary.total() == 0 {
            output.push_str(&self.paint("No results found", Color::Green));
            output.push('\n');
        } else {
            for node in &digest.groups {
                self.human_node(digest, node, None, 0, &mut output);
            }
            output.push('\n');
        }

        output.push_str(&self.format_summary(digest));
        output
    }

    fn human_node(
        &self,
        digest: &Digest<'_>,
        node: &GroupNode<'_>,
        parent: Option<&GroupKey>,
        indent: usize,
        output: &mut String,
    ) {
        let key = node.key();
        let mut indent = indent;
        if parent != Some(key) {
            let mut line = format!("{}{}", "  ".repeat(indent), self.paint(&key.to_string(), Color::White));
            if key.depth() == 2 {
                if let Some(maintainers) = key.package_atom().and_then(|a| digest.maintainers.get(&a)) {
                    line.push_str(&format!(" ({})", maintainers.join(", ")));
                }
            }
            output.push_str(&line);
            output.push('\n');
            indent += 1;
        }

        match node {
            GroupNode::Branch { children, .. } => {
                for child in children {
                    self.human_node(digest, child, Some(key), indent, output);
                }
            }
            GroupNode::Leaf { results, .. } => {
                for result in results.iter() {
                    output.push_str(&format!("{}{}\n", "  ".repeat(indent), self.result_line(digest, result)));
                }
            }
        }
    }

    fn result_line(&self, digest: &Digest<'_>, result: &CheckResult) -> String {
        let severity = result.severity(digest.rules);
        let label = format!("[{}]", severity.as_str());
        let label = match severity_color(severity) {
            Some(color) => self.paint(&label, color),
            None => label,
        };

        if result.message().is_empty() {
            format!("{} {}", label, result.class)
        } else {
            format!("{} {}: {}", label, result.class, result.message())
        }
    }

    /// Format the summary section
    fn format_summary(&self, digest: &Digest<'_>) -> String {
        let counts = &digest.summary.by_severity;
        let mut parts = Vec::new();

        for severity in Severity::INDEXED {
            let count = counts.get(severity);
            if count == 0 {
                continue;
            }
            let text = format!("{} {}{}", count, severity.as_str(), if count == 1 { "" } else { "s" });
            parts.push(match severity_color(severity) {
                Some(color) => self.paint(&text, color),
                None => text,
            });
        }
        let other = counts.verbose + counts.unclassified;
        if other > 0 {
            parts.push(format!("{other} other"));
        }
        if parts.is_empty() {
            parts.push("0 results".to_string());
        }

        format!(
            "Summary: {} in {} classes ({})\n",
            parts.join(", "),
            digest.summary.by_class.len(),
            digest.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.options.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

/// One line per group: `category/package`, `category` or `global`
pub fn format_borked(groups: &[GroupKey]) -> String {
    groups.iter().map(|g| format!("{g}\n")).collect()
}

fn node_json(rules: &ClassRules, node: &GroupNode<'_>) -> JsonValue {
    match node {
        GroupNode::Branch { key, children } => serde_json::json!({
            "key": key,
            "children": children.iter().map(|c| node_json(rules, c)).collect::<Vec<_>>(),
        }),
        GroupNode::Leaf { key, results } => serde_json::json!({
            "key": key,
            "results": results.iter().map(|r| serde_json::json!({
                "category": r.category,
                "package": r.package,
                "version": r.version,
                "class": r.class,
                "severity": r.severity(rules).as_tag(),
                "fields": r.extra,
            })).collect::<Vec<_>>(),
        }),
    }
}

fn severity_color(severity: Severity) -> Option<Color> {
    match severity {
        Severity::Error => Some(Color::Red),
        Severity::Warning => Some(Color::Yellow),
        Severity::Staging => Some(Color::Cyan),
        Severity::Verbose | Severity::Unclassified => None,
    }
}

/// Escape HTML special characters
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const HTML_STYLE: &str = "<style>
body { font-family: sans-serif; margin: 1em 2em; }
table { border-collapse: collapse; margin-bottom: 1em; }
td, th { padding: 0.1em 0.6em; text-align: left; vertical-align: top; }
.err { background: #fcc; }
.warn { background: #ffc; }
.staging { background: #cef; }
.verbose { color: #777; }
.maintainers, .meta { color: #555; font-size: 90%; }
</style>
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{deep_group, find_of_class, sort_results, summarize};
    use chrono::TimeZone;

    fn create_results() -> Vec<CheckResult> {
        let mut results = vec![
            CheckResult::new("X")
                .with_locator("dev-libs", "foo", "1.0")
                .with_field("msg", "broken <dep>"),
            CheckResult::new("Y").with_locator("dev-libs", "foo", "2.0"),
            CheckResult::new("X").with_locator("dev-libs", "bar", "1.0"),
            CheckResult::new("Z"),
        ];
        sort_results(&mut results);
        results
    }

    fn create_digest<'a>(results: &'a [CheckResult], rules: &'a ClassRules) -> Digest<'a> {
        Digest {
            groups: deep_group(results),
            errors: find_of_class(results, rules, Severity::Error),
            warnings: find_of_class(results, rules, Severity::Warning),
            staging: find_of_class(results, rules, Severity::Staging),
            summary: summarize(results, rules),
            maintainers: BTreeMap::from([("dev-libs/foo".to_string(), vec!["dev@g.o".to_string()])]),
            timestamp: Utc.with_ymd_and_hms(2019, 5, 1, 12, 0, 0).unwrap(),
            revision: Some("abc123".to_string()),
            doc_uri: DEFAULT_DOC_URI.to_string(),
            rules,
        }
    }

    fn rules() -> ClassRules {
        ClassRules::from_tags([("X", "err"), ("Y", "warn")])
    }

    #[test]
    fn test_html_format() {
        let results = create_results();
        let rules = rules();
        let digest = create_digest(&results, &rules);
        let formatter = ReportFormatter::default();
        let output = formatter.format_report(&digest, OutputFormat::Html).unwrap();

        assert!(output.starts_with("<!DOCTYPE html>"));
        assert!(output.contains("2019-05-01 12:00:00 UTC"));
        assert!(output.contains("<code>abc123</code>"));
        assert!(output.contains("<a href=\"#dev-libs/bar\">dev-libs/bar</a> <a href=\"#dev-libs/foo\">dev-libs/foo</a>"));
        assert!(output.contains("id=\"dev-libs/foo\""));
        assert!(output.contains("id=\"global\""));
        assert!(output.contains("broken &lt;dep&gt;"));
        assert!(output.contains("<tr class=\"err\">"));
        assert!(output.contains("<p class=\"maintainers\">dev@g.o</p>"));
        assert!(output.contains(&format!("{DEFAULT_DOC_URI}#x")));
        assert!(!output.contains("<h2 class=\"staging\">"));
    }

    #[test]
    fn test_json_format() {
        let results = create_results();
        let rules = rules();
        let digest = create_digest(&results, &rules);
        let output = ReportFormatter::default().format_report(&digest, OutputFormat::Json).unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json["errors"][0]["class"], "X");
        assert_eq!(json["errors"][0]["groups"][0], "dev-libs/bar");
        assert_eq!(json["summary"]["total"], 4);
        assert_eq!(json["summary"]["by_class"]["X"], 2);
        assert_eq!(json["groups"][0]["key"].as_array().unwrap().len(), 0);
        assert_eq!(json["groups"][1]["key"][0], "dev-libs");
        assert_eq!(json["groups"][1]["children"][1]["children"][0]["results"][0]["severity"], "err");
        assert_eq!(json["revision"], "abc123");
    }

    #[test]
    fn test_human_format() {
        let results = create_results();
        let rules = rules();
        let digest = create_digest(&results, &rules);
        let formatter = ReportFormatter::new(ReportOptions { use_colors: false });
        let output = formatter.format_report(&digest, OutputFormat::Human).unwrap();

        assert!(output.contains("global\n  [unclassified] Z\n"));
        assert!(output.contains("  dev-libs/foo (dev@g.o)\n"));
        assert!(output.contains("[error] X: broken <dep>"));
        assert!(output.contains("Summary: 2 errors, 1 warning, 1 other in 3 classes"));
    }

    #[test]
    fn test_empty_digest() {
        let rules = rules();
        let digest = create_digest(&[], &rules);
        let formatter = ReportFormatter::new(ReportOptions { use_colors: false });

        let human = formatter.format_report(&digest, OutputFormat::Human).unwrap();
        assert!(human.contains("No results found"));
        assert!(human.contains("0 results"));

        let html = formatter.format_report(&digest, OutputFormat::Html).unwrap();
        assert!(!html.contains("<table class=\"results\">"));
        assert!(!html.contains("id=\"global\""));
        assert!(html.contains("<h2>Results</h2>"));
    }

    #[test]
    fn test_identical_runs_render_identically() {
        let results = create_results();
        let rules = rules();
        let formatter = ReportFormatter::default();

        for format in [OutputFormat::Html, OutputFormat::Json, OutputFormat::Human] {
            let first = formatter.format_report(&create_digest(&results, &rules), format).unwrap();
            let second = formatter.format_report(&create_digest(&results, &rules), format).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_format_borked() {
        let groups = vec![
            GroupKey::root(),
            GroupKey::from_components(["dev-libs"]),
            GroupKey::from_components(["dev-libs", "foo"]),
        ];
        assert_eq!(format_borked(&groups), "global\ndev-libs\ndev-libs/foo\n");
        assert_eq!(format_borked(&[]), "");
    }
}
