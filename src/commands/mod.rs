//! User-issued commands delivered through the control plane.
//!
//! The command lister surfaces pending application commands; the trigger acts
//! on `SyncApplication` commands and reports their outcome back through the
//! control-plane API once the resulting deployment exists.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ApplicationId, CommandId, SyncStrategy};

/// Metadata key under which a handled sync command records the deployment it
/// produced.
pub const TRIGGERED_DEPLOYMENT_ID_KEY: &str = "TriggeredDeploymentID";

/// The reported outcome of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    NotHandledYet,
    Succeeded,
    Failed,
    TimedOut,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::NotHandledYet => "not_handled_yet",
            CommandStatus::Succeeded => "succeeded",
            CommandStatus::Failed => "failed",
            CommandStatus::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

/// A request to sync one application now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncApplication {
    pub application_id: ApplicationId,

    /// An explicit strategy chosen by the commander. When absent the trigger
    /// falls back to [`SyncStrategy::Auto`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_strategy: Option<SyncStrategy>,
}

/// The payload of an application command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    SyncApplication(SyncApplication),
    DisableApplication { application_id: ApplicationId },
}

/// A pending command from the command lister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,

    /// The user who issued the command.
    pub commander: String,

    pub kind: CommandKind,
}

impl Command {
    /// Returns the sync payload if this is a `SyncApplication` command.
    pub fn sync_application(&self) -> Option<&SyncApplication> {
        match &self.kind {
            CommandKind::SyncApplication(sync) => Some(sync),
            _ => None,
        }
    }
}
