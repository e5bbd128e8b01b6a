//! Notification events emitted around deployment triggering.
//!
//! Events are handed to the [`Notifier`](crate::trigger::Notifier)
//! collaborator; the transport (Slack, webhook, ...) lives elsewhere.

use serde::{Deserialize, Serialize};

use super::application::Application;
use super::deployment::Deployment;
use super::ids::{CommitHash, DeploymentId};

/// The kind of a notification event.
///
/// Also used in deployment configuration to scope mention lists to specific
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEventType {
    DeploymentTriggered,
    DeploymentTriggerFailed,
}

/// An event emitted by the trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A deployment was created on the control plane.
    DeploymentTriggered {
        deployment_id: DeploymentId,
        deployment: Deployment,
        env_name: String,
        mentioned_accounts: Vec<String>,
    },

    /// A candidate could not be triggered.
    DeploymentTriggerFailed {
        application: Application,
        commit_hash: CommitHash,
        commit_message: String,
        reason: String,
    },
}

impl NotificationEvent {
    pub fn event_type(&self) -> NotificationEventType {
        match self {
            NotificationEvent::DeploymentTriggered { .. } => {
                NotificationEventType::DeploymentTriggered
            }
            NotificationEvent::DeploymentTriggerFailed { .. } => {
                NotificationEventType::DeploymentTriggerFailed
            }
        }
    }
}
