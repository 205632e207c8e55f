//! Reading pkgcheck XML results
//!
//! CDD Principle: Infrastructure Layer - Input turns external documents into domain results
//! - Each `<result>` child of the root becomes one fixed-schema CheckResult
//! - Any field outside the locator schema lands in the extra map
//! - Unreadable or malformed inputs abort the run, there is no partial mode

use crate::domain::results::{CheckResult, ReportError, ReportResult};
use crate::xml::XmlElement;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Path that stands for standard input
pub const STDIN_PATH: &str = "-";

/// Build a result from one `<result>` element
pub fn result_from_element(element: &XmlElement) -> Result<CheckResult, String> {
    let mut result = CheckResult::default();

    for field in &element.children {
        let slot = match field.name.as_str() {
            "category" => &mut result.category,
            "package" => &mut result.package,
            "version" => &mut result.version,
            "class" => &mut result.class,
            other => {
                // first occurrence wins, like the other fields
                result.extra.entry(other.to_string()).or_insert_with(|| field.text.clone());
                continue;
            }
        };
        if slot.is_empty() {
            *slot = field.text.clone();
        }
    }

    if result.class.is_empty() {
        return Err(format!("<{}> element without a class", element.name));
    }
    Ok(result)
}

/// Parse all results of one document
pub fn parse_results(content: &str, source_name: &str) -> ReportResult<Vec<CheckResult>> {
    let root = XmlElement::parse(content)
        .map_err(|e| ReportError::input(source_name, e.to_string()))?;

    root.children
        .iter()
        .enumerate()
        .map(|(index, element)| {
            result_from_element(element).map_err(|message| {
                ReportError::input(source_name, format!("result #{}: {}", index + 1, message))
            })
        })
        .collect()
}

/// Read a whole input, `-` meaning standard input
pub fn read_input<P: AsRef<Path>>(path: P) -> ReportResult<String> {
    let path = path.as_ref();

    if path.as_os_str() == STDIN_PATH {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| ReportError::input("<stdin>", e.to_string()))?;
        return Ok(content);
    }

    fs::read_to_string(path).map_err(|e| ReportError::input(path.display().to_string(), e.to_string()))
}

/// Parse an input as a generic document
pub fn read_document<P: AsRef<Path>>(path: P) -> ReportResult<XmlElement> {
    let content = read_input(&path)?;
    XmlElement::parse(&content)
        .map_err(|e| ReportError::input(path.as_ref().display().to_string(), e.to_string()))
}

/// Read results from one input
pub fn read_results<P: AsRef<Path>>(path: P) -> ReportResult<Vec<CheckResult>> {
    let content = read_input(&path)?;
    let results = parse_results(&content, &path.as_ref().display().to_string())?;
    tracing::debug!("Read {} results from {}", results.len(), path.as_ref().display());
    Ok(results)
}

/// Read results from every input in order
pub fn read_all_results(paths: &[PathBuf]) -> ReportResult<Vec<CheckResult>> {
    let mut results = Vec::new();
    for path in paths {
        results.extend(read_results(path)?);
    }
    Ok(results)
}

/// Append the results of every later document to the first one
pub fn combine_documents(paths: &[PathBuf]) -> ReportResult<XmlElement> {
    let (first, rest) = paths
        .split_first()
        .ok_or_else(|| ReportError::input("<none>", "no input documents given"))?;

    let mut combined = read_document(first)?;
    for path in rest {
        let document = read_document(path)?;
        combined.children.extend(document.children);
    }
    Ok(combined)
}

/// Oldest modification time among the input files, stdin excluded
pub fn inputs_timestamp(paths: &[PathBuf]) -> ReportResult<Option<DateTime<Utc>>> {
    let mut oldest: Option<DateTime<Utc>> = None;

    for path in paths.iter().filter(|p| p.as_os_str() != STDIN_PATH) {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| ReportError::input(path.display().to_string(), e.to_string()))?;
        let modified = DateTime::<Utc>::from(modified);
        oldest = Some(oldest.map_or(modified, |current| current.min(modified)));
    }

    Ok(oldest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<checks>
  <result>
    <category>dev-libs</category>
    <package>foo</package>
    <version>1.0</version>
    <class>VisibilityReport</class>
    <msg>depends on masked package</msg>
  </result>
  <result>
    <class>RepoCheck</class>
  </result>
</checks>"#;

    #[test]
    fn test_parse_results() {
        let results = parse_results(SAMPLE, "sample.xml").unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].sort_key(), ("dev-libs", "foo", "1.0", "VisibilityReport"));
        assert_eq!(results[0].message(), "depends on masked package");
        assert!(!results[0].extra.contains_key("class"));

        assert!(results[1].group_key().is_root());
        assert_eq!(results[1].message(), "");
    }

    #[test]
    fn test_result_without_class_is_rejected() {
        let err = parse_results("<checks><result><category>a</category></result></checks>", "bad.xml")
            .unwrap_err();
        assert!(matches!(err, ReportError::Input { ref source_name, .. } if source_name == "bad.xml"));
    }

    #[test]
    fn test_malformed_input_is_an_input_error() {
        assert!(matches!(
            parse_results("<checks><result>", "broken.xml"),
            Err(ReportError::Input { .. })
        ));
    }

    #[test]
    fn test_read_all_and_combine() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.xml");
        let second = temp_dir.path().join("b.xml");
        fs::write(&first, SAMPLE).unwrap();
        fs::write(&second, "<checks><result><class>Other</class></result></checks>").unwrap();

        let paths = vec![first, second];
        let results = read_all_results(&paths).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].class, "Other");

        let combined = combine_documents(&paths).unwrap();
        assert_eq!(combined.children.len(), 3);
        let reparsed = parse_results(&combined.to_document().unwrap(), "combined").unwrap();
        assert_eq!(reparsed, results);
    }

    #[test]
    fn test_missing_input_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.xml");
        assert!(read_results(&missing).is_err());
        assert!(inputs_timestamp(&[missing]).is_err());
    }

    #[test]
    fn test_inputs_timestamp_uses_oldest_file() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("old.xml");
        let new = temp_dir.path().join("new.xml");
        fs::write(&old, SAMPLE).unwrap();
        fs::write(&new, SAMPLE).unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options().write(true).open(&old).unwrap().set_modified(past).unwrap();

        let ts = inputs_timestamp(&[new, old, PathBuf::from(STDIN_PATH)]).unwrap().unwrap();
        assert!((ts - DateTime::<Utc>::from(past)).num_seconds().abs() <= 1);
        assert_eq!(inputs_timestamp(&[PathBuf::from(STDIN_PATH)]).unwrap(), None);
    }
}
