pub mod api;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod platform;
pub mod replacer;
pub mod resolver;
pub mod scm;
pub mod shutdown;
pub mod signature;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::config::SyncConfig;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::SyncError;
use crate::platform::AzureDevOpsClient;
use crate::resolver::ProjectResolver;
use crate::scm::GitHubClient;
use crate::shutdown::Shutdown;
use crate::webhook::PushEvent;

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub webhook_secret: Option<String>,
    pub shutdown: Shutdown,
    /// Background dispatches still owned by the server
    dispatches: Mutex<JoinSet<DispatchReport>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(dispatcher: Dispatcher, webhook_secret: Option<String>, shutdown: Shutdown) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            webhook_secret,
            shutdown,
            dispatches: Mutex::default(),
        }
    }

    /// Wire the GitHub and Azure DevOps clients from a validated config.
    pub fn from_config(config: &SyncConfig, shutdown: Shutdown) -> Result<Self, SyncError> {
        let timeout = Duration::from_secs(config.azure.request_timeout_secs);
        let token = config
            .github
            .token
            .clone()
            .ok_or_else(|| SyncError::ConfigError("Missing GitHub token".to_string()))?;

        let scm = GitHubClient::new(config.github.api_base.clone(), token, timeout)?;
        let platform = AzureDevOpsClient::from_config(&config.azure)?;
        let resolver = ProjectResolver::new(config.project_rules.clone(), config.default_project());

        let dispatcher = Dispatcher::new(
            Arc::new(scm),
            Arc::new(platform),
            resolver,
            config.github.default_ref.clone(),
        );
        Ok(Self::new(
            dispatcher,
            config.github.webhook_secret.clone(),
            shutdown,
        ))
    }

    /// Run a dispatch for `event` on a background task the server keeps track of.
    pub async fn spawn_dispatch(&self, event: PushEvent) {
        let dispatcher = self.dispatcher.clone();
        let shutdown = self.shutdown.clone();

        let mut tasks = self.dispatches.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!("Dispatch task failed: {}", e);
            }
        }
        tasks.spawn(async move { dispatcher.dispatch(&event, shutdown).await });
    }

    /// Wait up to `grace` for tracked dispatches to finish, then abort the rest.
    ///
    /// Called after the cancel signal, so in-flight dispatches get to record
    /// their cancelled files and log a summary before the runtime goes away.
    pub async fn drain_dispatches(&self, grace: Duration) -> Vec<DispatchReport> {
        let mut tasks = std::mem::take(&mut *self.dispatches.lock().await);
        let mut reports = Vec::new();

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(report) => reports.push(report),
                    Err(e) => error!("Dispatch task failed: {}", e),
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} dispatch(es) still running after {:?}, aborting",
                tasks.len(),
                grace
            );
            tasks.shutdown().await;
        }
        reports
    }
}
