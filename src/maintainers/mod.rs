//! Maintainer identities and per-package ownership
//!
//! Architecture: Domain Services - Ownership lookups behind a metadata source seam
//! - Identity canonicalization is defined once and used at every comparison boundary
//! - MaintainerIndex turns raw metadata.xml e-mail lists into storage-form identities
//! - Missing or broken metadata is never an error, it resolves to the sentinel owner

pub mod projects;

use crate::xml::XmlElement;
use std::fs;
use std::path::{Path, PathBuf};

pub use projects::{MembershipGraph, Project, SubprojectRef};

/// Owner of packages that declare no maintainer
pub const MAINTAINER_NEEDED: &str = "maintainer-needed";

/// Canonical mail domain of developer identities
pub const FULL_DOMAIN: &str = "@gentoo.org";

/// Short alias of the canonical domain used in stored identities
pub const SHORT_DOMAIN: &str = "@g.o";

/// Canonical (full e-mail) form of a user supplied identity
///
/// A bare name gets the full domain, the short domain is expanded and any
/// other e-mail address is returned untouched.
pub fn expand_identity(identity: &str) -> String {
    if !identity.contains('@') {
        format!("{identity}{FULL_DOMAIN}")
    } else if let Some(name) = identity.strip_suffix(SHORT_DOMAIN) {
        format!("{name}{FULL_DOMAIN}")
    } else {
        identity.to_string()
    }
}

/// Storage (short domain) form of a canonical identity
pub fn shorten_identity(identity: &str) -> String {
    match identity.strip_suffix(FULL_DOMAIN) {
        Some(name) => format!("{name}{SHORT_DOMAIN}"),
        None => identity.to_string(),
    }
}

/// Source of raw per-package maintainer lists
pub trait MetadataSource {
    /// Raw maintainer e-mails of a package, `None` when there is no usable metadata
    fn maintainer_emails(&self, category: &str, package: &str) -> Option<Vec<String>>;
}

/// Reads `<repo>/<category>/<package>/metadata.xml`
#[derive(Debug, Clone)]
pub struct RepoMetadata {
    repo: PathBuf,
}

impl RepoMetadata {
    pub fn new<P: AsRef<Path>>(repo: P) -> Self {
        Self { repo: repo.as_ref().to_path_buf() }
    }

    /// Path of the repository-wide projects.xml
    pub fn projects_path(&self) -> PathBuf {
        self.repo.join("metadata").join("projects.xml")
    }

    fn metadata_path(&self, category: &str, package: &str) -> PathBuf {
        self.repo.join(category).join(package).join("metadata.xml")
    }
}

impl MetadataSource for RepoMetadata {
    fn maintainer_emails(&self, category: &str, package: &str) -> Option<Vec<String>> {
        let path = self.metadata_path(category, package);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No metadata at {}: {}", path.display(), e);
                return None;
            }
        };

        let metadata = match XmlElement::parse(&content) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("Unparseable metadata at {}: {}", path.display(), e);
                return None;
            }
        };

        let emails = metadata
            .children("maintainer")
            .filter_map(|m| m.child_text("email"))
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .collect();
        Some(emails)
    }
}

/// Maps `category/package` locators to their maintainers
pub struct MaintainerIndex {
    source: Box<dyn MetadataSource>,
}

impl MaintainerIndex {
    pub fn new(source: impl MetadataSource + 'static) -> Self {
        Self { source: Box::new(source) }
    }

    /// Create an index over a repository checkout
    pub fn for_repo<P: AsRef<Path>>(repo: P) -> Self {
        Self::new(RepoMetadata::new(repo))
    }

    /// Maintainers of a package in storage form, or the sentinel owner
    pub fn lookup(&self, category: &str, package: &str) -> Vec<String> {
        let maintainers: Vec<String> = self
            .source
            .maintainer_emails(category, package)
            .unwrap_or_default()
            .iter()
            .map(|email| shorten_identity(email))
            .collect();

        if maintainers.is_empty() {
            vec![MAINTAINER_NEEDED.to_string()]
        } else {
            maintainers
        }
    }
}

impl std::fmt::Debug for MaintainerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintainerIndex").finish_non_exhaustive()
    }
}
