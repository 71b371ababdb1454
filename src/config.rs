//! Service configuration: TOML file overlaid with environment variables

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::error::SyncError;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_AZURE_API: &str = "https://dev.azure.com";
pub const DEFAULT_API_VERSION: &str = "7.1-preview.1";
pub const DEFAULT_REF: &str = "main";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_LOG_FILES: usize = 5;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default, rename = "project_rule")]
    pub project_rules: Vec<ProjectRule>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub default_ref: String,
    pub token: Option<String>,
    pub webhook_secret: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API.to_string(),
            default_ref: DEFAULT_REF.to_string(),
            token: None,
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AzureConfig {
    pub api_base: String,
    pub organization: Option<String>,
    pub default_project: Option<String>,
    pub pat: Option<String>,
    pub api_version: String,
    pub request_timeout_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_AZURE_API.to_string(),
            organization: None,
            default_project: None,
            pat: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Routes every file whose name starts with `prefix` to `project`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProjectRule {
    pub prefix: String,
    pub project: String,
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SyncError> {
        toml::from_str(content)
            .map_err(|e| SyncError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Overlay values from the environment. Set, non-empty variables win over the file.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = get("GITHUB_WEBHOOK_SECRET") {
            self.github.webhook_secret = Some(v);
        }
        if let Some(v) = get("GITHUB_REF") {
            self.github.default_ref = v;
        }
        if let Some(v) = get("AZURE_ORGANIZATION") {
            self.azure.organization = Some(v);
        }
        if let Some(v) = get("AZURE_PROJECT") {
            self.azure.default_project = Some(v);
        }
        if let Some(v) = get("AZURE_DEVOPS_PAT") {
            self.azure.pat = Some(v);
        }
        self
    }

    /// Checks that every credential and identifier the dispatch needs is present.
    /// The webhook secret is deliberately left out: without it verification fails closed.
    pub fn validate(&self) -> Result<(), SyncError> {
        require(&self.github.token, "GitHub token (GITHUB_TOKEN)")?;
        require(&self.azure.pat, "Azure DevOps PAT (AZURE_DEVOPS_PAT)")?;
        require(
            &self.azure.organization,
            "Azure organization (AZURE_ORGANIZATION)",
        )?;
        require(
            &self.azure.default_project,
            "default Azure project (AZURE_PROJECT)",
        )?;

        if self.azure.request_timeout_secs == 0 {
            return Err(SyncError::ConfigError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        for (idx, rule) in self.project_rules.iter().enumerate() {
            if rule.prefix.is_empty() || rule.project.is_empty() {
                return Err(SyncError::ConfigError(format!(
                    "project_rule #{} needs both a prefix and a project",
                    idx + 1
                )));
            }
        }
        Ok(())
    }

    pub fn default_project(&self) -> &str {
        self.azure.default_project.as_deref().unwrap_or_default()
    }
}

fn require(value: &Option<String>, what: &str) -> Result<(), SyncError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(SyncError::ConfigError(format!("Missing {}", what))),
    }
}

/// Load, overlay and validate the configuration file
pub fn load_config(path: &str) -> Result<SyncConfig, SyncError> {
    let config_str = fs::read_to_string(path).map_err(|e| {
        SyncError::ConfigError(format!("Failed to read config file '{}': {}", path, e))
    })?;

    let config = SyncConfig::from_toml_str(&config_str)?.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
