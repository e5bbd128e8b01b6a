//! Trigger determiners, one per candidate kind.
//!
//! A determiner answers: given this application and its current deployment
//! configuration, should a deployment be created now? Command and out-of-sync
//! candidates have already been vetted by their upstream signal, so their
//! determiners always say yes. The on-commit determiner compares the head of
//! the working copy against the commit watermark and, when the head is new,
//! consults an injected [`CommitFilter`] policy.
//!
//! One [`Determiners`] bundle is built per repository group so the on-commit
//! determiner can close over the shared head commit and working copy.

use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, trace};

use crate::api::{ApiClient, ApiError};
use crate::config::DeploymentConfig;
use crate::types::{Application, CommitHash};

use super::candidate::CandidateKind;
use super::commit_store::LastTriggeredCommitStore;

/// A determiner or its commit-filter policy failed.
#[derive(Debug, Error)]
pub enum DetermineError {
    #[error("failed to read the last triggered commit: {0}")]
    CommitStore(#[from] ApiError),

    #[error("commit filter failed: {0}")]
    Filter(String),
}

/// Policy deciding whether the change between two commits is relevant to an
/// application.
///
/// Invoked only when the head commit differs from the watermark and the
/// application has been triggered before. Implementations may inspect the
/// working copy (e.g. diff the configured deployment paths); the default
/// [`TriggerOnAnyChange`] treats every new commit as relevant.
pub trait CommitFilter: Send + Sync {
    fn is_relevant(
        &self,
        repo_path: &Path,
        application: &Application,
        last: &CommitHash,
        head: &CommitHash,
    ) -> impl Future<Output = Result<bool, DetermineError>> + Send;
}

/// The default commit filter: any new commit triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerOnAnyChange;

impl CommitFilter for TriggerOnAnyChange {
    async fn is_relevant(
        &self,
        _repo_path: &Path,
        _application: &Application,
        _last: &CommitHash,
        _head: &CommitHash,
    ) -> Result<bool, DetermineError> {
        Ok(true)
    }
}

/// The trigger decision for one candidate.
pub trait Determiner {
    fn should_trigger(
        &self,
        application: &Application,
        config: &DeploymentConfig,
    ) -> impl Future<Output = Result<bool, DetermineError>> + Send;
}

/// The user explicitly asked, so the answer is always yes. Reporting the
/// command outcome happens after the deployment exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnCommandDeterminer;

impl Determiner for OnCommandDeterminer {
    async fn should_trigger(
        &self,
        _application: &Application,
        _config: &DeploymentConfig,
    ) -> Result<bool, DetermineError> {
        Ok(true)
    }
}

/// Drift has already been confirmed by the upstream detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnOutOfSyncDeterminer;

impl Determiner for OnOutOfSyncDeterminer {
    async fn should_trigger(
        &self,
        _application: &Application,
        _config: &DeploymentConfig,
    ) -> Result<bool, DetermineError> {
        Ok(true)
    }
}

/// Triggers when the head of the tracked branch moved past the watermark.
pub struct OnCommitDeterminer<'a, A, F> {
    repo_path: &'a Path,
    head: CommitHash,
    commit_store: &'a LastTriggeredCommitStore<A>,
    filter: &'a F,
}

impl<A: ApiClient, F: CommitFilter> Determiner for OnCommitDeterminer<'_, A, F> {
    async fn should_trigger(
        &self,
        application: &Application,
        _config: &DeploymentConfig,
    ) -> Result<bool, DetermineError> {
        let last = self.commit_store.get(&application.id).await?;

        if last == self.head {
            trace!(
                app = %application.id,
                commit = %self.head.short(),
                "head commit already accounted for"
            );
            return Ok(false);
        }

        if last.is_empty() {
            debug!(app = %application.id, "application has never been triggered");
            return Ok(true);
        }

        self.filter
            .is_relevant(self.repo_path, application, &last, &self.head)
            .await
    }
}

/// The determiner bundle for one repository group.
pub struct Determiners<'a, A, F> {
    on_command: OnCommandDeterminer,
    on_out_of_sync: OnOutOfSyncDeterminer,
    on_commit: OnCommitDeterminer<'a, A, F>,
}

impl<'a, A: ApiClient, F: CommitFilter> Determiners<'a, A, F> {
    pub fn new(
        repo_path: &'a Path,
        head: CommitHash,
        commit_store: &'a LastTriggeredCommitStore<A>,
        filter: &'a F,
    ) -> Self {
        Determiners {
            on_command: OnCommandDeterminer,
            on_out_of_sync: OnOutOfSyncDeterminer,
            on_commit: OnCommitDeterminer {
                repo_path,
                head,
                commit_store,
                filter,
            },
        }
    }

    /// Dispatches to the determiner for the candidate's kind.
    pub async fn should_trigger(
        &self,
        kind: CandidateKind,
        application: &Application,
        config: &DeploymentConfig,
    ) -> Result<bool, DetermineError> {
        match kind {
            CandidateKind::Commit => self.on_commit.should_trigger(application, config).await,
            CandidateKind::Command => self.on_command.should_trigger(application, config).await,
            CandidateKind::OutOfSync => {
                self.on_out_of_sync.should_trigger(application, config).await
            }
        }
    }
}
