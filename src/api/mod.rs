//! The control-plane API surface consumed by the trigger.
//!
//! The transport (gRPC, HTTP, ...) is owned by the hosting agent; the trigger
//! only depends on this trait. Implementations are expected to be cheap to
//! share behind an `Arc` and safe to call from the serial trigger loop.

use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

use crate::commands::CommandStatus;
use crate::types::{ApplicationId, CommandId, CommitHash, Deployment, DeploymentId};

/// Errors surfaced by the control-plane client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The requested record does not exist. For
    /// `get_application_most_recent_deployment` this means the application
    /// has never been deployed.
    #[error("not found")]
    NotFound,

    /// The control plane could not be reached.
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// The call reached the control plane but failed.
    #[error("rpc failed: {0}")]
    Failed(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// The most recent deployment recorded for an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MostRecentDeployment {
    pub deployment_id: DeploymentId,
    pub commit_hash: CommitHash,
}

/// Control-plane RPCs used while triggering deployments.
pub trait ApiClient: Send + Sync {
    /// Looks up the most recent deployment of an application. Returns
    /// [`ApiError::NotFound`] for applications that have never been deployed.
    fn get_application_most_recent_deployment(
        &self,
        application_id: &ApplicationId,
    ) -> impl Future<Output = Result<MostRecentDeployment, ApiError>> + Send;

    /// Creates a deployment and returns the id assigned by the control plane.
    fn create_deployment(
        &self,
        deployment: &Deployment,
    ) -> impl Future<Output = Result<DeploymentId, ApiError>> + Send;

    /// Marks a command as handled with the given status and metadata.
    fn report_command_handled(
        &self,
        command_id: &CommandId,
        status: CommandStatus,
        metadata: HashMap<String, String>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
