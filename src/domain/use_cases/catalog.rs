//! Filtering and sorting of an in-memory project list.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Deserialize;

use crate::entities::project::{Complexity, Project};

/// Constraints applied by [`filter_projects`]. An empty list or a blank
/// search places no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
    pub types: Vec<String>,
    pub tech: Vec<String>,
    pub status: Vec<String>,
    pub complexity: Vec<Complexity>,
    pub search: Option<String>,
}

impl ProjectFilter {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.tech.is_empty()
            && self.status.is_empty()
            && self.complexity.is_empty()
            && self.search.as_deref().is_none_or(|s| s.trim().is_empty())
    }

    fn matches(&self, project: &Project) -> bool {
        if !self.types.is_empty() && !self.types.contains(&project.category) {
            return false;
        }

        if !self.tech.is_empty() && !project.technologies.iter().any(|t| self.tech.contains(t)) {
            return false;
        }

        if !self.status.is_empty()
            && !project.status.as_ref().is_some_and(|s| self.status.contains(s))
        {
            return false;
        }

        if !self.complexity.is_empty()
            && !project.complexity.is_some_and(|c| self.complexity.contains(&c))
        {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                project.title.to_lowercase().contains(&term)
                    || project.description.to_lowercase().contains(&term)
                    || project
                        .technologies
                        .iter()
                        .any(|t| t.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    #[serde(alias = "dateCreated", alias = "date")]
    DateCreated,
    Complexity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

pub fn filter_projects(projects: &[Project], filter: &ProjectFilter) -> Vec<Project> {
    projects
        .iter()
        .filter(|project| filter.matches(project))
        .cloned()
        .collect()
}

fn compare_by(key: SortKey, a: &Project, b: &Project) -> Ordering {
    match key {
        SortKey::Name => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.title.cmp(&b.title)),
        // `None` orders before any value: missing dates and complexities come first.
        SortKey::DateCreated => a.created_at.cmp(&b.created_at),
        SortKey::Complexity => a.complexity.cmp(&b.complexity),
    }
}

/// Stable sort; equal keys keep their input order in both directions.
pub fn sort_projects(projects: &[Project], key: SortKey, direction: SortDirection) -> Vec<Project> {
    let mut sorted = projects.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = compare_by(key, a, b);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    sorted
}

pub fn all_tech_stacks(projects: &[Project]) -> Vec<String> {
    projects
        .iter()
        .flat_map(|p| p.technologies.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn all_categories(projects: &[Project]) -> Vec<String> {
    projects
        .iter()
        .map(|p| p.category.clone())
        .filter(|c| !c.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
