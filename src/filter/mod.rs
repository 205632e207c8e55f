//! Result filtering by package set and maintainer
//!
//! Architectural Principle: Service Layer - ResultFilter composes independent predicates
//! - Package and maintainer predicates are built once and ANDed per result
//! - Maintainer targets are resolved up front, including project expansion
//! - Results without a package locator never pass a non-trivial filter

use crate::domain::results::CheckResult;
use crate::maintainers::{
    expand_identity, shorten_identity, MaintainerIndex, MembershipGraph, FULL_DOMAIN,
    MAINTAINER_NEEDED,
};
use std::collections::BTreeSet;

/// Allow-set of `category/package` atoms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    packages: Option<BTreeSet<String>>,
}

impl PackageFilter {
    /// Accept every result
    pub fn any() -> Self {
        Self::default()
    }

    /// Keep only the given atoms
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { packages: Some(packages.into_iter().map(Into::into).collect()) }
    }

    /// Parse a comma separated atom list
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim).filter(|atom| !atom.is_empty()))
    }

    pub fn is_trivial(&self) -> bool {
        self.packages.is_none()
    }

    pub fn matches(&self, result: &CheckResult) -> bool {
        let Some(packages) = &self.packages else {
            return true;
        };
        result.package_atom().is_some_and(|atom| packages.contains(&atom))
    }
}

/// Who a maintainer filter is looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintainerTarget {
    /// Packages without any maintainer
    Unowned,
    /// Packages maintained by any of these storage-form identities
    Identities(BTreeSet<String>),
}

impl MaintainerTarget {
    /// Resolve a user supplied identity (`dev`, `dev@g.o` or an e-mail)
    ///
    /// With a membership graph every project that has the identity among its
    /// transitive members is added to the targets.
    pub fn resolve(requested: &str, projects: Option<&MembershipGraph>) -> Self {
        let identity = expand_identity(requested);

        if identity == format!("{MAINTAINER_NEEDED}{FULL_DOMAIN}") {
            return Self::Unowned;
        }

        let mut matches = vec![identity.clone()];
        if let Some(graph) = projects {
            let containing = graph.projects_containing_member(&identity);
            tracing::debug!("{} is a member of {} projects", identity, containing.len());
            matches.extend(containing);
        }

        Self::Identities(matches.iter().map(|m| shorten_identity(m)).collect())
    }

    /// Whether a maintainer list satisfies this target
    pub fn matches(&self, maintainers: &[String]) -> bool {
        match self {
            Self::Unowned => maintainers == [MAINTAINER_NEEDED],
            Self::Identities(identities) => maintainers.iter().any(|m| identities.contains(m)),
        }
    }
}

/// Combined package and maintainer predicate
#[derive(Debug, Default)]
pub struct ResultFilter<'a> {
    packages: PackageFilter,
    maintainer: Option<(MaintainerTarget, &'a MaintainerIndex)>,
}

impl<'a> ResultFilter<'a> {
    /// Filter that keeps every result
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn with_packages(mut self, packages: PackageFilter) -> Self {
        self.packages = packages;
        self
    }

    pub fn with_maintainer(mut self, target: MaintainerTarget, index: &'a MaintainerIndex) -> Self {
        self.maintainer = Some((target, index));
        self
    }

    pub fn is_trivial(&self) -> bool {
        self.packages.is_trivial() && self.maintainer.is_none()
    }

    /// Whether a result passes both predicates
    pub fn matches(&self, result: &CheckResult) -> bool {
        // package set first, it needs no metadata lookup
        self.packages.matches(result) && self.matches_maintainer(result)
    }

    fn matches_maintainer(&self, result: &CheckResult) -> bool {
        let Some((target, index)) = &self.maintainer else {
            return true;
        };
        if result.category.is_empty() || result.package.is_empty() {
            return false;
        }
        target.matches(&index.lookup(&result.category, &result.package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintainers::testing::StaticMetadata;
    use crate::maintainers::Project;

    fn index() -> MaintainerIndex {
        MaintainerIndex::new(
            StaticMetadata::default()
                .with("dev-libs/foo", &["alice@gentoo.org"])
                .with("dev-python/bar", &["python@gentoo.org"])
                .with("dev-libs/orphan", &[])
                .with("dev-libs/nobody", &["nobody@gentoo.org"]),
        )
    }

    fn graph() -> MembershipGraph {
        MembershipGraph::new(vec![
            Project::new("python@gentoo.org").with_subproject("pypy@gentoo.org", true),
            Project::new("pypy@gentoo.org").with_member("alice@gentoo.org"),
        ])
    }

    fn result(category: &str, package: &str) -> CheckResult {
        CheckResult::new("X").with_locator(category, package, "1.0")
    }

    #[test]
    fn test_package_filter() {
        let filter = PackageFilter::from_list("dev-libs/foo, dev-libs/bar,");

        assert!(filter.matches(&result("dev-libs", "foo")));
        assert!(filter.matches(&result("dev-libs", "bar")));
        assert!(!filter.matches(&result("dev-libs", "baz")));
        assert!(!filter.matches(&CheckResult::new("X")));
        assert!(!filter.matches(&result("dev-libs", "")));

        assert!(PackageFilter::any().matches(&CheckResult::new("X")));
    }

    #[test]
    fn test_resolve_targets() {
        assert_eq!(MaintainerTarget::resolve("maintainer-needed", None), MaintainerTarget::Unowned);
        assert_eq!(
            MaintainerTarget::resolve("maintainer-needed@g.o", None),
            MaintainerTarget::Unowned
        );
        assert_eq!(
            MaintainerTarget::resolve("alice", None),
            MaintainerTarget::Identities(BTreeSet::from(["alice@g.o".to_string()]))
        );
        assert_eq!(
            MaintainerTarget::resolve("alice@g.o", Some(&graph())),
            MaintainerTarget::Identities(BTreeSet::from([
                "alice@g.o".to_string(),
                "pypy@g.o".to_string(),
                "python@g.o".to_string(),
            ]))
        );
    }

    #[test]
    fn test_maintainer_filter() {
        let index = index();
        let filter = ResultFilter::accept_all()
            .with_maintainer(MaintainerTarget::resolve("alice", None), &index);

        assert!(filter.matches(&result("dev-libs", "foo")));
        assert!(!filter.matches(&result("dev-python", "bar")));
        assert!(!filter.matches(&result("dev-libs", "orphan")));
        assert!(!filter.matches(&CheckResult::new("X")));
    }

    #[test]
    fn test_project_expansion() {
        let index = index();
        let filter = ResultFilter::accept_all()
            .with_maintainer(MaintainerTarget::resolve("alice", Some(&graph())), &index);

        assert!(filter.matches(&result("dev-libs", "foo")));
        assert!(filter.matches(&result("dev-python", "bar")));
        assert!(!filter.matches(&result("dev-libs", "orphan")));
    }

    #[test]
    fn test_nobody_does_not_match_unowned_packages() {
        let index = index();
        let nobody = ResultFilter::accept_all()
            .with_maintainer(MaintainerTarget::resolve("nobody@gentoo.org", None), &index);
        let unowned = ResultFilter::accept_all()
            .with_maintainer(MaintainerTarget::resolve("maintainer-needed", None), &index);

        assert!(!nobody.matches(&result("dev-libs", "orphan")));
        assert!(nobody.matches(&result("dev-libs", "nobody")));
        assert!(unowned.matches(&result("dev-libs", "orphan")));
        assert!(unowned.matches(&result("dev-libs", "missing")));
        assert!(!unowned.matches(&result("dev-libs", "foo")));
    }

    #[test]
    fn test_unowned_combined_with_package_filter() {
        let index = index();
        let filter = ResultFilter::accept_all()
            .with_packages(PackageFilter::from_list("dev-libs/orphan,dev-libs/foo"))
            .with_maintainer(MaintainerTarget::Unowned, &index);

        assert!(filter.matches(&result("dev-libs", "orphan")));
        assert!(!filter.matches(&result("dev-libs", "foo")));
        assert!(!filter.matches(&result("dev-libs", "missing")));
        assert!(!filter.is_trivial());
        assert!(ResultFilter::accept_all().is_trivial());
    }
}
