//! Maps changed file names to Azure DevOps projects

use crate::config::ProjectRule;

/// Ordered prefix rules; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct ProjectResolver {
    rules: Vec<ProjectRule>,
    default_project: String,
}

impl ProjectResolver {
    pub fn new(rules: Vec<ProjectRule>, default_project: impl Into<String>) -> Self {
        Self {
            rules,
            default_project: default_project.into(),
        }
    }

    pub fn resolve(&self, file_name: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| file_name.starts_with(&rule.prefix))
            .map(|rule| rule.project.as_str())
            .unwrap_or(&self.default_project)
    }
}

/// Secure-file name for a changed path: its final path component.
pub fn artifact_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
