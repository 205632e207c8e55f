//! Project membership graph from projects.xml
//!
//! Architecture: Domain Services - Transitive membership through inheriting subprojects
//! - Projects are kept in document order so expansion output is stable
//! - Resolution walks an explicit stack with a visited set and terminates on cycles

use crate::domain::results::{ReportError, ReportResult};
use crate::xml::XmlElement;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Reference from a project to one of its subprojects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprojectRef {
    /// Identity of the referenced project
    pub identity: String,
    /// Whether members of the subproject count as members of the parent
    pub inherit_members: bool,
}

/// A named group of maintainers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
    /// Project e-mail identity
    pub identity: String,
    /// Direct member identities in document order
    pub members: Vec<String>,
    /// Subproject references in document order
    pub subprojects: Vec<SubprojectRef>,
}

impl Project {
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: identity.into(), ..Default::default() }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn with_subproject(mut self, identity: impl Into<String>, inherit_members: bool) -> Self {
        self.subprojects.push(SubprojectRef { identity: identity.into(), inherit_members });
        self
    }

    fn from_element(element: &XmlElement) -> Option<Self> {
        let identity = element.child_text("email").filter(|e| !e.is_empty())?;

        let members = element
            .children("member")
            .filter_map(|m| m.child_text("email"))
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .collect();

        let subprojects = element
            .children("subproject")
            .filter_map(|sp| {
                sp.attr("ref").map(|identity| SubprojectRef {
                    identity: identity.to_string(),
                    inherit_members: sp.attr("inherit-members") == Some("1"),
                })
            })
            .collect();

        Some(Self { identity: identity.to_string(), members, subprojects })
    }
}

/// All projects of a repository
#[derive(Debug, Clone, Default)]
pub struct MembershipGraph {
    projects: Vec<Project>,
    by_identity: HashMap<String, usize>,
}

impl MembershipGraph {
    /// Build a graph, the first project wins when an identity repeats
    pub fn new(projects: Vec<Project>) -> Self {
        let mut by_identity = HashMap::new();
        for (index, project) in projects.iter().enumerate() {
            if by_identity.contains_key(&project.identity) {
                tracing::warn!("Duplicate project {} ignored", project.identity);
                continue;
            }
            by_identity.insert(project.identity.clone(), index);
        }
        Self { projects, by_identity }
    }

    /// Parse a projects.xml document
    pub fn parse(content: &str) -> ReportResult<Self> {
        let root = XmlElement::parse(content)?;
        let projects = root
            .children("project")
            .filter_map(|element| {
                let project = Project::from_element(element);
                if project.is_none() {
                    tracing::debug!("Skipping project without an e-mail identity");
                }
                project
            })
            .collect();
        Ok(Self::new(projects))
    }

    /// Load projects.xml from disk
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            ReportError::input(path.as_ref().display().to_string(), e.to_string())
        })?;
        Self::parse(&content)
            .map_err(|e| ReportError::input(path.as_ref().display().to_string(), e.to_string()))
    }

    pub fn project(&self, identity: &str) -> Option<&Project> {
        self.by_identity.get(identity).map(|&index| &self.projects[index])
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    /// Direct members plus members of every inheriting subproject, recursively
    ///
    /// Each project is expanded at most once per call, so inheritance cycles
    /// contribute nothing beyond what is already collected. Unknown
    /// identities have no members.
    pub fn transitive_members(&self, identity: &str) -> BTreeSet<String> {
        let mut members = BTreeSet::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack = vec![identity];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(project) = self.project(current) else {
                continue;
            };

            members.extend(project.members.iter().cloned());
            for subproject in project.subprojects.iter().rev() {
                if subproject.inherit_members && !visited.contains(subproject.identity.as_str()) {
                    stack.push(&subproject.identity);
                }
            }
        }

        members
    }

    /// Identities of every project that has `member` among its transitive members
    pub fn projects_containing_member(&self, member: &str) -> Vec<String> {
        self.projects
            .iter()
            .enumerate()
            .filter(|(index, project)| self.by_identity.get(&project.identity) == Some(index))
            .filter(|(_, project)| self.transitive_members(&project.identity).contains(member))
            .map(|(_, project)| project.identity.clone())
            .collect()
    }
}
