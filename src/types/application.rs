//! Application snapshots as reported by the application lister.
//!
//! The trigger never mutates these; it receives immutable snapshots from the
//! lister (kept fresh by another subsystem) and reads them within one batch.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ApplicationId, DeploymentId, EnvironmentId, RepoId};

/// The platform an application deploys onto.
///
/// The deployment configuration in Git declares a kind, and it must match the
/// kind registered for the application or the config is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    Kubernetes,
    Terraform,
    CloudRun,
    Lambda,
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplicationKind::Kubernetes => "kubernetes",
            ApplicationKind::Terraform => "terraform",
            ApplicationKind::CloudRun => "cloud_run",
            ApplicationKind::Lambda => "lambda",
        };
        write!(f, "{s}")
    }
}

/// Where an application's deployment configuration lives in Git.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitPath {
    /// The registered repository containing the application.
    pub repo_id: RepoId,

    /// Path of the deployment configuration file, relative to the repository
    /// root.
    pub config_path: String,
}

impl GitPath {
    pub fn new(repo_id: impl Into<RepoId>, config_path: impl Into<String>) -> Self {
        GitPath {
            repo_id: repo_id.into(),
            config_path: config_path.into(),
        }
    }
}

/// Sync status reported by the drift detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSyncStatus {
    Unknown,
    Synced,
    Deploying,
    OutOfSync,
}

/// The observed sync state of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSyncState {
    pub status: ApplicationSyncStatus,
}

impl ApplicationSyncState {
    pub fn new(status: ApplicationSyncStatus) -> Self {
        ApplicationSyncState { status }
    }
}

/// A registered application, as seen by the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub kind: ApplicationKind,
    pub env_id: EnvironmentId,
    pub git_path: GitPath,
    pub sync_state: ApplicationSyncState,

    /// The deployment most recently triggered for this application, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_recently_triggered_deployment_id: Option<DeploymentId>,
}

/// An environment looked up for notification display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
}
