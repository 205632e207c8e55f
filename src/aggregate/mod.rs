//! Grouping and class indexes over sorted results
//!
//! CDD Principle: Domain Services - Aggregation over an already ordered result sequence
//! - Runs are contiguous spans with equal truncated keys, nothing is ever re-sorted
//! - deep_group builds a concrete category/package/version tree borrowing the input
//! - find_of_class answers which category/package groups contain a class of a severity

use crate::config::ClassRules;
use crate::domain::results::{CheckResult, GroupKey, Severity, SeverityCounts};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Stable sort by (category, package, version, class)
pub fn sort_results(results: &mut [CheckResult]) {
    results.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Split a sorted sequence into contiguous runs sharing the key truncated to `level`
///
/// A run ends exactly where the truncated key changes and the trailing run is
/// always emitted, so an empty input yields a single empty run with the root
/// key.
pub fn group_runs(results: &[CheckResult], level: usize) -> Vec<(GroupKey, &[CheckResult])> {
    let mut runs = Vec::new();
    let mut current = GroupKey::root();
    let mut start = 0;

    for (index, result) in results.iter().enumerate() {
        let key = result.group_key().truncated(level);
        if key != current {
            if index > start {
                runs.push((current, &results[start..index]));
            }
            current = key;
            start = index;
        }
    }
    runs.push((current, &results[start..]));

    runs
}

/// Node of the grouping tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupNode<'a> {
    /// Category or package level group
    Branch { key: GroupKey, children: Vec<GroupNode<'a>> },
    /// Results in input order
    Leaf { key: GroupKey, results: &'a [CheckResult] },
}

impl<'a> GroupNode<'a> {
    pub fn key(&self) -> &GroupKey {
        match self {
            Self::Branch { key, .. } | Self::Leaf { key, .. } => key,
        }
    }

    /// All results below this node in tree order
    pub fn results(&self) -> Vec<&'a CheckResult> {
        let mut out = Vec::new();
        self.collect_results(&mut out);
        out
    }

    fn collect_results(&self, out: &mut Vec<&'a CheckResult>) {
        match self {
            Self::Branch { children, .. } => {
                for child in children {
                    child.collect_results(out);
                }
            }
            Self::Leaf { results, .. } => out.extend(results.iter()),
        }
    }
}

/// Group sorted results into the category/package/version tree
///
/// A run becomes a leaf at version depth, or earlier when its key has no
/// more components (results without a category form one leaf at the top).
pub fn deep_group(results: &[CheckResult]) -> Vec<GroupNode<'_>> {
    group_level(results, 1)
}

fn group_level(results: &[CheckResult], level: usize) -> Vec<GroupNode<'_>> {
    group_runs(results, level)
        .into_iter()
        .map(|(key, run)| {
            if level >= GroupKey::MAX_DEPTH || key.depth() < level {
                GroupNode::Leaf { key, results: run }
            } else {
                GroupNode::Branch { key, children: group_level(run, level + 1) }
            }
        })
        .collect()
}

/// One class and the package groups it occurs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassIndexEntry {
    pub class: String,
    /// Depth-2 keys, deduplicated and sorted
    pub groups: Vec<GroupKey>,
}

/// Index of classes mapped to `severity` and the category/package groups containing them
pub fn find_of_class(
    results: &[CheckResult],
    rules: &ClassRules,
    severity: Severity,
) -> Vec<ClassIndexEntry> {
    let mut index: BTreeMap<&str, BTreeSet<GroupKey>> = BTreeMap::new();

    for (key, run) in group_runs(results, 2) {
        for result in run {
            if result.severity(rules) == severity {
                index.entry(result.class.as_str()).or_default().insert(key.clone());
            }
        }
    }

    index
        .into_iter()
        .map(|(class, groups)| ClassIndexEntry {
            class: class.to_string(),
            groups: groups.into_iter().collect(),
        })
        .collect()
}

/// Depth-2 groups holding at least one result of any of the given severities, in input order
pub fn borked_groups(
    results: &[CheckResult],
    rules: &ClassRules,
    severities: &[Severity],
) -> Vec<GroupKey> {
    group_runs(results, 2)
        .into_iter()
        .filter(|(_, run)| run.iter().any(|r| severities.contains(&r.severity(rules))))
        .map(|(key, _)| key)
        .collect()
}

/// Counts over a result set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub by_severity: SeverityCounts,
    /// Results per class, sorted by class
    pub by_class: Vec<(String, usize)>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.by_severity.total()
    }
}

pub fn summarize(results: &[CheckResult], rules: &ClassRules) -> Summary {
    let mut by_severity = SeverityCounts::default();
    let mut by_class: BTreeMap<&str, usize> = BTreeMap::new();

    for result in results {
        by_severity.add(result.severity(rules));
        *by_class.entry(result.class.as_str()).or_default() += 1;
    }

    Summary {
        by_severity,
        by_class: by_class.into_iter().map(|(c, n)| (c.to_string(), n)).collect(),
    }
}
