//! The deployment record submitted to the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::git::Commit;

use super::application::{Application, ApplicationKind, GitPath};
use super::ids::{ApplicationId, EnvironmentId};

/// How the created deployment should be synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Let the planner decide between a quick sync and a full pipeline.
    Auto,
    /// Apply the desired state directly.
    QuickSync,
    /// Run the full deployment pipeline.
    Pipeline,
}

/// Why and by whom a deployment was triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTrigger {
    /// The branch tracked for the application's repository.
    pub branch: String,

    /// The head commit of that branch at trigger time.
    pub commit: Commit,

    /// Who asked for the deployment. Empty unless the trigger came from a
    /// user-issued sync command.
    pub commander: String,

    pub sync_strategy: SyncStrategy,

    pub timestamp: DateTime<Utc>,
}

/// A deployment to be created on the control plane.
///
/// The control plane assigns the deployment id; this record carries
/// everything else. The trigger reads the assigned id back only to complete
/// command reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub application_id: ApplicationId,
    pub application_name: String,
    pub kind: ApplicationKind,
    pub env_id: EnvironmentId,
    pub git_path: GitPath,
    pub trigger: DeploymentTrigger,
}

impl Deployment {
    /// Builds the deployment record for an application at the given branch
    /// head.
    pub fn new(
        application: &Application,
        branch: impl Into<String>,
        commit: Commit,
        commander: impl Into<String>,
        sync_strategy: SyncStrategy,
    ) -> Self {
        Deployment {
            application_id: application.id.clone(),
            application_name: application.name.clone(),
            kind: application.kind,
            env_id: application.env_id.clone(),
            git_path: application.git_path.clone(),
            trigger: DeploymentTrigger {
                branch: branch.into(),
                commit,
                commander: commander.into(),
                sync_strategy,
                timestamp: Utc::now(),
            },
        }
    }
}
