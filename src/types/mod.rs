//! Core domain types shared across the trigger.

pub mod application;
pub mod deployment;
pub mod ids;
pub mod notification;

pub use application::{
    Application, ApplicationKind, ApplicationSyncState, ApplicationSyncStatus, Environment,
    GitPath,
};
pub use deployment::{Deployment, DeploymentTrigger, SyncStrategy};
pub use ids::{ApplicationId, CommandId, CommitHash, DeploymentId, EnvironmentId, RepoId};
pub use notification::{NotificationEvent, NotificationEventType};
