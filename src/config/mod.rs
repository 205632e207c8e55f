//! Class mapping and excludes configuration for pkgcheck-report
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external JSON/YAML formats
//! - Raw class-to-tag mappings are converted into a typed ClassRules value
//! - Default mappings are embedded in the domain, not infrastructure
//! - Excludes act as a repository of accepted violations that override the mapping

use crate::domain::results::{CheckResult, ReportError, ReportResult, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Class mapping files looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] =
    ["pkgcheck2html.conf.json", "pkgcheck-report.yaml", ".pkgcheck-report.yaml"];

/// On-disk format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension, JSON unless it is `.yaml`/`.yml`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Accepted violations: category -> package -> version -> classes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Excludes(BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>);

impl Excludes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `class` is excluded at exactly this locator
    pub fn contains(&self, class: &str, category: &str, package: &str, version: &str) -> bool {
        self.0
            .get(category)
            .and_then(|packages| packages.get(package))
            .and_then(|versions| versions.get(version))
            .is_some_and(|classes| classes.iter().any(|c| c == class))
    }

    /// Add an exclude, returns false if it was already present
    pub fn insert(&mut self, class: &str, category: &str, package: &str, version: &str) -> bool {
        let classes = self
            .0
            .entry(category.to_string())
            .or_default()
            .entry(package.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default();

        if classes.iter().any(|c| c == class) {
            return false;
        }
        classes.push(class.to_string());
        true
    }

    /// Add an exclude for the class and locator of a result
    pub fn record(&mut self, result: &CheckResult) -> bool {
        self.insert(&result.class, &result.category, &result.package, &result.version)
    }

    /// Total number of excluded (locator, class) pairs
    pub fn len(&self) -> usize {
        self.0
            .values()
            .flat_map(|packages| packages.values())
            .flat_map(|versions| versions.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load excludes from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ReportError::config(format!(
                "Failed to read excludes file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ReportError::config(format!(
                "Failed to parse excludes file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Load excludes, starting empty when the file does not exist yet
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No excludes at {}, starting empty", path.as_ref().display());
            Ok(Self::new())
        }
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> ReportResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReportError::config(format!("Failed to serialize excludes: {e}")))
    }

    /// Write the excludes as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ReportResult<()> {
        let content = self.to_json()?;
        fs::write(&path, content).map_err(|e| {
            ReportError::config(format!(
                "Failed to write excludes file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }
}

/// Class-to-severity lookup with per-locator overrides
#[derive(Debug, Clone, Default)]
pub struct ClassRules {
    /// Base mapping of check class to severity
    classes: HashMap<String, Severity>,
    /// Locators where a class is forced to be unclassified
    excludes: Excludes,
}

impl ClassRules {
    /// Create rules from an already typed mapping
    pub fn new(classes: HashMap<String, Severity>, excludes: Excludes) -> Self {
        Self { classes, excludes }
    }

    /// Create rules from raw configuration tags
    ///
    /// Unknown tags are kept as unclassified so a newer configuration never
    /// aborts an older binary.
    pub fn from_tags<I, K, V>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let classes = tags
            .into_iter()
            .map(|(class, tag)| {
                let class = class.into();
                let severity = Severity::from_tag(tag.as_ref()).unwrap_or_else(|| {
                    tracing::warn!("Unknown severity tag '{}' for class {}", tag.as_ref(), class);
                    Severity::Unclassified
                });
                (class, severity)
            })
            .collect();

        Self { classes, excludes: Excludes::new() }
    }

    /// Load a class mapping from a JSON or YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ReportError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let raw = parse_mapping(&contents, ConfigFormat::from_path(&path)).map_err(|e| {
            ReportError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Ok(Self::from_raw(raw))
    }

    /// Load a class mapping from string content
    pub fn load_from_str(content: &str, format: ConfigFormat) -> ReportResult<Self> {
        let raw = parse_mapping(content, format)
            .map_err(|e| ReportError::config(format!("Failed to parse class mapping: {e}")))?;
        Ok(Self::from_raw(raw))
    }

    // null values are treated like missing entries
    fn from_raw(raw: BTreeMap<String, Option<String>>) -> Self {
        Self::from_tags(raw.into_iter().map(|(class, tag)| (class, tag.unwrap_or_default())))
    }

    /// Load the explicit file, else the first default file present, else built-in defaults
    pub fn discover(explicit: Option<&Path>) -> ReportResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        for name in DEFAULT_CONFIG_FILES {
            let path = PathBuf::from(name);
            if path.exists() {
                tracing::debug!("Using class mapping from {}", path.display());
                return Self::load_from_file(path);
            }
        }

        tracing::debug!("No class mapping found, using built-in defaults");
        Ok(Self::with_defaults())
    }

    /// Built-in mapping for the classic pkgcheck keywords
    pub fn with_defaults() -> Self {
        Self::from_tags([
            ("NonsolvableDeps", "err"),
            ("IUSEMetadataReport", "err"),
            ("LicenseMetadataReport", "err"),
            ("MissingManifest", "err"),
            ("VisibilityReport", "err"),
            ("UnknownManifest", "err"),
            ("MetadataError", "err"),
            ("UnusedLocalFlagsReport", "err"),
            ("DroppedKeywordsReport", "warn"),
            ("TreeVulnerabilitiesReport", "warn"),
            ("DescriptionReport", "warn"),
            ("CategoryMetadataXmlCheck", "warn"),
            ("PackageMetadataXmlCheck", "warn"),
            ("PkgDirReport", "warn"),
            ("UnusedGlobalFlagsResult", "warn"),
            ("NonExistentDeps", "warn"),
        ])
    }

    /// Replace the excludes
    pub fn with_excludes(mut self, excludes: Excludes) -> Self {
        self.excludes = excludes;
        self
    }

    /// Severity of `class` at the given locator; an exclude always wins
    pub fn resolve(&self, class: &str, category: &str, package: &str, version: &str) -> Severity {
        if self.excludes.contains(class, category, package, version) {
            return Severity::Unclassified;
        }
        self.classes.get(class).copied().unwrap_or_default()
    }

    /// Base mapping sorted by class name
    pub fn classes(&self) -> Vec<(&str, Severity)> {
        let mut classes: Vec<_> = self.classes.iter().map(|(c, s)| (c.as_str(), *s)).collect();
        classes.sort_unstable();
        classes
    }

    pub fn excludes(&self) -> &Excludes {
        &self.excludes
    }
}

// Only an unparseable document is an error; entries with a non-string tag are skipped
fn parse_mapping(content: &str, format: ConfigFormat) -> Result<BTreeMap<String, Option<String>>, String> {
    let entries: Vec<(String, Option<Option<String>>)> = match format {
        ConfigFormat::Json => serde_json::from_str::<BTreeMap<String, serde_json::Value>>(content)
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|(class, value)| {
                let tag = match value {
                    serde_json::Value::Null => Some(None),
                    serde_json::Value::String(tag) => Some(Some(tag)),
                    _ => None,
                };
                (class, tag)
            })
            .collect(),
        ConfigFormat::Yaml => serde_yaml::from_str::<BTreeMap<String, serde_yaml::Value>>(content)
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|(class, value)| {
                let tag = match value {
                    serde_yaml::Value::Null => Some(None),
                    serde_yaml::Value::String(tag) => Some(Some(tag)),
                    _ => None,
                };
                (class, tag)
            })
            .collect(),
    };

    Ok(entries
        .into_iter()
        .filter_map(|(class, tag)| {
            if tag.is_none() {
                tracing::warn!("Ignoring class {} with a non-string severity tag", class);
            }
            tag.map(|tag| (class, tag))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scenario_rules() -> ClassRules {
        ClassRules::from_tags([("X", "err"), ("Y", "warn"), ("V", "verbose")])
    }

    #[test]
    fn test_base_mapping() {
        let rules = scenario_rules();
        assert_eq!(rules.resolve("X", "dev-libs", "foo", "1.0"), Severity::Error);
        assert_eq!(rules.resolve("Y", "", "", ""), Severity::Warning);
        assert_eq!(rules.resolve("Unknown", "dev-libs", "foo", ""), Severity::Unclassified);
    }

    #[test]
    fn test_exclude_overrides_base_mapping() {
        let mut excludes = Excludes::new();
        excludes.insert("X", "dev-libs", "foo", "1.0");
        let rules = scenario_rules().with_excludes(excludes);

        assert_eq!(rules.resolve("X", "dev-libs", "foo", "1.0"), Severity::Unclassified);
        // exact locator only
        assert_eq!(rules.resolve("X", "dev-libs", "foo", "2.0"), Severity::Error);
        assert_eq!(rules.resolve("X", "dev-libs", "foo", ""), Severity::Error);
        assert_eq!(rules.resolve("Y", "dev-libs", "foo", "1.0"), Severity::Warning);
    }

    #[test]
    fn test_package_level_exclude() {
        let excludes: Excludes =
            serde_json::from_str(r#"{"dev-libs": {"foo": {"": ["X"]}}}"#).unwrap();
        let rules = scenario_rules().with_excludes(excludes);

        assert_eq!(rules.resolve("X", "dev-libs", "foo", ""), Severity::Unclassified);
        assert_eq!(rules.resolve("X", "dev-libs", "foo", "1.0"), Severity::Error);
    }

    #[test]
    fn test_unknown_and_null_tags_are_unclassified() {
        let rules = ClassRules::load_from_str(
            r#"{"X": "err", "Odd": "fatal", "Nothing": null, "Empty": ""}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(rules.resolve("X", "", "", ""), Severity::Error);
        assert_eq!(rules.resolve("Odd", "", "", ""), Severity::Unclassified);
        assert_eq!(rules.resolve("Nothing", "", "", ""), Severity::Unclassified);
        assert_eq!(rules.classes().len(), 4);
    }

    #[test]
    fn test_malformed_mapping_is_fatal() {
        assert!(ClassRules::load_from_str("{not json", ConfigFormat::Json).is_err());
        assert!(matches!(
            ClassRules::load_from_str("- a\n- b\n", ConfigFormat::Yaml),
            Err(ReportError::Configuration { .. })
        ));
    }

    #[test]
    fn test_non_string_entries_are_skipped() {
        let rules = ClassRules::load_from_str(r#"{"X": 3, "Y": "warn", "Z": ["err"]}"#, ConfigFormat::Json)
            .unwrap();
        assert_eq!(rules.resolve("Y", "", "", ""), Severity::Warning);
        assert_eq!(rules.resolve("X", "", "", ""), Severity::Unclassified);
        assert_eq!(rules.classes(), vec![("Y", Severity::Warning)]);

        let rules = ClassRules::load_from_str("X: 3\nY: err\nZ: ~\n", ConfigFormat::Yaml).unwrap();
        assert_eq!(rules.resolve("Y", "", "", ""), Severity::Error);
        assert_eq!(rules.classes(), vec![("Y", Severity::Error), ("Z", Severity::Unclassified)]);
    }

    #[test]
    fn test_yaml_mapping_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("classes.yaml");
        fs::write(&path, "VisibilityReport: err\nPkgDirReport: staging\n").unwrap();

        let rules = ClassRules::load_from_file(&path).unwrap();
        assert_eq!(rules.resolve("PkgDirReport", "", "", ""), Severity::Staging);
        assert_eq!(
            rules.classes(),
            vec![("PkgDirReport", Severity::Staging), ("VisibilityReport", Severity::Error)]
        );
    }

    #[test]
    fn test_defaults() {
        let rules = ClassRules::with_defaults();
        assert_eq!(rules.resolve("VisibilityReport", "", "", ""), Severity::Error);
        assert_eq!(rules.resolve("NonExistentDeps", "", "", ""), Severity::Warning);
        assert!(rules.excludes().is_empty());
    }

    #[test]
    fn test_excludes_insert_is_idempotent() {
        let mut excludes = Excludes::new();
        let result = CheckResult::new("X").with_locator("dev-libs", "foo", "1.0");

        assert!(excludes.record(&result));
        assert!(!excludes.record(&result));
        assert!(excludes.insert("Y", "dev-libs", "foo", "1.0"));
        assert_eq!(excludes.len(), 2);
    }

    #[test]
    fn test_excludes_merge_with_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("excludes.json");

        let mut excludes = Excludes::load_or_default(&path).unwrap();
        assert!(excludes.is_empty());
        excludes.insert("X", "dev-libs", "foo", "1.0");
        excludes.save(&path).unwrap();

        let mut reloaded = Excludes::load_or_default(&path).unwrap();
        assert!(reloaded.contains("X", "dev-libs", "foo", "1.0"));
        reloaded.insert("X", "dev-libs", "bar", "");
        reloaded.save(&path).unwrap();

        let merged = Excludes::load_from_file(&path).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_excludes_malformed_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("excludes.json");
        fs::write(&path, r#"{"dev-libs": ["foo"]}"#).unwrap();

        assert!(Excludes::load_from_file(&path).is_err());
    }
}
