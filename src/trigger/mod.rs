//! The deployment trigger loop.
//!
//! [`Trigger::run`] clones every registered repository, then drives a serial
//! select over three signals: the sync ticker (commit and out-of-sync
//! candidates, at the configured interval), the on-demand ticker (user
//! command candidates, every ten seconds), and cancellation.
//!
//! Each tick's candidates are grouped by repository so every working copy is
//! fetched once per tick regardless of how many applications live in it.
//! Within a group, candidates are checked one at a time: load the deployment
//! configuration from the working copy, ask the determiner for this
//! candidate's kind, and on a positive decision create the deployment on the
//! control plane, advance the commit watermark, and emit a notification.
//!
//! # Failure policy
//!
//! One application must never poison the batch. Config-load failures are
//! logged without notifying (they surface through the application status
//! channel instead); determiner and create failures emit a trigger-failed
//! notification; a repository that cannot be updated skips only its own
//! group. The loop itself only exits on cancellation or a fatal startup
//! clone failure.

pub mod candidate;
pub mod commit_store;
pub mod determiner;
pub mod repos;


pub use candidate::{Candidate, CandidateKind};
pub use commit_store::LastTriggeredCommitStore;
pub use determiner::{
    CommitFilter, DetermineError, Determiner, Determiners, OnCommandDeterminer,
    OnCommitDeterminer, OnOutOfSyncDeterminer, TriggerOnAnyChange,
};
pub use repos::{RepoHead, RepoSet};

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::api::ApiClient;
use crate::commands::{Command, CommandStatus, TRIGGERED_DEPLOYMENT_ID_KEY};
use crate::config::{self, ConfigError, DeploymentConfig, TriggerConfig};
use crate::git::{Commit, GitClient, GitError, Repo};
use crate::types::{
    Application, ApplicationId, Deployment, DeploymentId, Environment, EnvironmentId,
    NotificationEvent, NotificationEventType, RepoId, SyncStrategy,
};

/// Cadence of the on-demand ticker handling user commands.
const ONDEMAND_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on a single notifier dispatch.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Fallback capacity of the last-triggered-commit cache when the configured
/// value is zero.
const DEFAULT_COMMIT_CACHE_CAPACITY: NonZeroUsize =
    NonZeroUsize::new(config::DEFAULT_COMMIT_CACHE_CAPACITY).unwrap();

/// Errors that stop a batch group or the whole loop.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// A registered repository could not be cloned at startup. Fatal.
    #[error("failed to clone repository {repo_id}: {source}")]
    Clone {
        repo_id: RepoId,
        #[source]
        source: GitError,
    },

    /// A candidate references a repository missing from the configuration.
    #[error("repository {0} is not registered in the trigger configuration")]
    UnregisteredRepo(RepoId),

    /// A working copy could not be brought up to date; its group is skipped.
    #[error("failed to update repository {repo_id} to latest: {source}")]
    RepoUpdate {
        repo_id: RepoId,
        #[source]
        source: GitError,
    },
}

/// Read-only snapshot source for registered applications.
pub trait ApplicationLister: Send + Sync {
    fn get(&self, id: &ApplicationId) -> Option<Application>;
    fn list(&self) -> Vec<Application>;
}

/// Read-only snapshot source for pending application commands.
pub trait CommandLister: Send + Sync {
    fn list_application_commands(&self) -> Vec<Command>;
}

/// Resolves environment ids to display data for notifications.
pub trait EnvironmentLister: Send + Sync {
    fn get(
        &self,
        id: &EnvironmentId,
    ) -> impl Future<Output = Result<Environment, crate::api::ApiError>> + Send;
}

/// Notification sink. Implementations are expected to swallow their own
/// delivery failures; the trigger additionally bounds each dispatch with a
/// timeout so a stuck transport cannot stall the loop.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent) -> impl Future<Output = ()> + Send;
}

/// The deployment trigger.
///
/// Owns the commit watermark cache and (while running) the cloned working
/// copies; everything else is a collaborator. The generic parameters are the
/// collaborator implementations; `F` is the commit-filter policy injected
/// into the on-commit determiner and defaults to [`TriggerOnAnyChange`].
pub struct Trigger<A, G, L, C, E, N, F = TriggerOnAnyChange> {
    api_client: Arc<A>,
    git_client: G,
    application_lister: L,
    command_lister: C,
    environment_lister: E,
    notifier: N,
    config: TriggerConfig,
    commit_store: LastTriggeredCommitStore<A>,
    commit_filter: F,
}

impl<A, G, L, C, E, N> Trigger<A, G, L, C, E, N, TriggerOnAnyChange>
where
    A: ApiClient,
{
    pub fn new(
        api_client: Arc<A>,
        git_client: G,
        application_lister: L,
        command_lister: C,
        environment_lister: E,
        notifier: N,
        config: TriggerConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.commit_cache_capacity)
            .unwrap_or(DEFAULT_COMMIT_CACHE_CAPACITY);
        let commit_store = LastTriggeredCommitStore::new(Arc::clone(&api_client), capacity);

        Trigger {
            api_client,
            git_client,
            application_lister,
            command_lister,
            environment_lister,
            notifier,
            config,
            commit_store,
            commit_filter: TriggerOnAnyChange,
        }
    }
}

impl<A, G, L, C, E, N, F> Trigger<A, G, L, C, E, N, F> {
    /// Replaces the commit-filter policy consulted by the on-commit
    /// determiner.
    pub fn with_commit_filter<F2>(self, commit_filter: F2) -> Trigger<A, G, L, C, E, N, F2> {
        Trigger {
            api_client: self.api_client,
            git_client: self.git_client,
            application_lister: self.application_lister,
            command_lister: self.command_lister,
            environment_lister: self.environment_lister,
            notifier: self.notifier,
            config: self.config,
            commit_store: self.commit_store,
            commit_filter,
        }
    }

    /// How long the caller should wait for [`Trigger::run`] to return after
    /// cancelling it. The loop itself does not consult this value.
    pub fn grace_period(&self) -> Duration {
        self.config.grace_period
    }
}

impl<A, G, L, C, E, N, F> Trigger<A, G, L, C, E, N, F>
where
    A: ApiClient,
    G: GitClient,
    L: ApplicationLister,
    C: CommandLister,
    E: EnvironmentLister,
    N: Notifier,
    F: CommitFilter,
{
    /// Runs the trigger loop until `shutdown` is cancelled.
    ///
    /// Clones every registered repository first; a clone failure is fatal
    /// and returned immediately. Batch errors are logged and kept out of the
    /// return value so one bad tick never stops the loop.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), TriggerError> {
        info!("starting deployment trigger");

        let repos = match RepoSet::clone_all(&self.git_client, &self.config.repositories).await {
            Ok(repos) => repos,
            Err(err) => {
                error!(error = %err, "failed to prepare registered repositories");
                return Err(err);
            }
        };

        let mut sync_tick = time::interval_at(
            Instant::now() + self.config.sync_interval,
            self.config.sync_interval,
        );
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ondemand_tick = time::interval_at(
            Instant::now() + ONDEMAND_CHECK_INTERVAL,
            ONDEMAND_CHECK_INTERVAL,
        );
        ondemand_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("deployment trigger has been stopped");
                    return Ok(());
                }

                _ = sync_tick.tick() => {
                    let mut candidates = candidate::list_commit_candidates(&self.application_lister);
                    let out_of_sync = candidate::list_out_of_sync_candidates(&self.application_lister);
                    info!(
                        total = candidates.len() + out_of_sync.len(),
                        commits = candidates.len(),
                        out_of_sync = out_of_sync.len(),
                        "collected sync-tick candidates"
                    );
                    candidates.extend(out_of_sync);
                    let _ = self.check_candidates(&repos, candidates, &shutdown).await;
                }

                _ = ondemand_tick.tick() => {
                    let candidates =
                        candidate::list_command_candidates(&self.command_lister, &self.application_lister);
                    info!(commands = candidates.len(), "collected on-demand candidates");
                    let _ = self.check_candidates(&repos, candidates, &shutdown).await;
                }
            }
        }
    }

    /// Checks one tick's worth of candidates, grouped by repository.
    ///
    /// Groups are processed sequentially; a failing group is logged (unless
    /// shutdown caused it) and the remaining groups still run. Only the last
    /// group error is returned, for diagnostics.
    async fn check_candidates(
        &self,
        repos: &RepoSet<G::Repo>,
        candidates: Vec<Candidate>,
        shutdown: &CancellationToken,
    ) -> Result<(), TriggerError> {
        let mut groups: Vec<(RepoId, Vec<Candidate>)> = Vec::new();
        for candidate in candidates {
            let repo_id = candidate.application.git_path.repo_id.clone();
            match groups.iter_mut().find(|(id, _)| *id == repo_id) {
                Some((_, group)) => group.push(candidate),
                None => groups.push((repo_id, vec![candidate])),
            }
        }

        let mut last_err = None;
        for (repo_id, group) in groups {
            if let Err(err) = self
                .check_repo_candidates(repos, &repo_id, group, shutdown)
                .await
            {
                if !shutdown.is_cancelled() {
                    error!(
                        repo_id = %repo_id,
                        error = %err,
                        "failed while checking candidates in repository"
                    );
                }
                last_err = Some(err);
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Checks all candidates that share one working copy.
    #[instrument(skip_all, fields(repo_id = %repo_id))]
    async fn check_repo_candidates(
        &self,
        repos: &RepoSet<G::Repo>,
        repo_id: &RepoId,
        candidates: Vec<Candidate>,
        shutdown: &CancellationToken,
    ) -> Result<(), TriggerError> {
        let head = repos.update_to_latest(repo_id).await?;

        let determiners = Determiners::new(
            head.repo.path(),
            head.head_commit.hash.clone(),
            &self.commit_store,
            &self.commit_filter,
        );

        for candidate in candidates {
            if shutdown.is_cancelled() {
                debug!("shutdown requested, stopping candidate checks");
                break;
            }

            let app = &candidate.application;

            let deployment_config =
                match config::load_deployment_config(head.repo.path(), app) {
                    Ok(config) => config,
                    Err(err) => {
                        self.log_config_failure(app, &err);
                        continue;
                    }
                };

            let should_trigger = match determiners
                .should_trigger(candidate.kind, app, &deployment_config)
                .await
            {
                Ok(decision) => decision,
                Err(err) => {
                    let reason = format!(
                        "failed while determining whether application {} should be triggered: {err}",
                        app.name
                    );
                    self.notify_trigger_failed(app, reason.clone(), &head.head_commit)
                        .await;
                    error!(app = %app.id, kind = %candidate.kind, error = %err, "{reason}");
                    continue;
                }
            };

            if !should_trigger {
                // Advance the watermark so this head is not re-evaluated on
                // the next tick.
                self.commit_store
                    .put(app.id.clone(), head.head_commit.hash.clone())
                    .await;
                continue;
            }

            let (commander, sync_strategy) = match &candidate.command {
                Some(command) => (
                    command.commander.clone(),
                    command
                        .sync_application()
                        .and_then(|sync| sync.sync_strategy)
                        .unwrap_or(SyncStrategy::Auto),
                ),
                None => (String::new(), SyncStrategy::Auto),
            };

            let deployment = Deployment::new(
                app,
                head.branch.clone(),
                head.head_commit.clone(),
                commander,
                sync_strategy,
            );

            let deployment_id = match self.api_client.create_deployment(&deployment).await {
                Ok(id) => id,
                Err(err) => {
                    let reason = format!("failed to create deployment for application {}: {err}", app.id);
                    self.notify_trigger_failed(app, reason.clone(), &head.head_commit)
                        .await;
                    error!(app = %app.id, error = %err, "{reason}");
                    continue;
                }
            };

            info!(
                app = %app.id,
                deployment = %deployment_id,
                commit = %head.head_commit.hash.short(),
                kind = %candidate.kind,
                "triggered deployment"
            );

            self.commit_store
                .put(app.id.clone(), head.head_commit.hash.clone())
                .await;
            self.notify_deployment_triggered(&deployment_config, deployment_id.clone(), deployment)
                .await;

            if let Some(command) = &candidate.command {
                self.report_command_handled(command, &deployment_id).await;
            }
        }

        Ok(())
    }

    /// Invalid configs are logged but never notified: a missing or broken
    /// file would otherwise page on every tick, and the problem is already
    /// visible through the application's status channel.
    fn log_config_failure(&self, app: &Application, err: &ConfigError) {
        error!(
            app = %app.id,
            path = %app.git_path.config_path,
            error = %err,
            "failed to load deployment config file"
        );
    }

    /// Marks a handled sync command as succeeded, recording the deployment it
    /// produced. Failures are logged and swallowed: the deployment already
    /// exists and is authoritative.
    async fn report_command_handled(&self, command: &Command, deployment_id: &DeploymentId) {
        let metadata = HashMap::from([(
            TRIGGERED_DEPLOYMENT_ID_KEY.to_string(),
            deployment_id.to_string(),
        )]);

        if let Err(err) = self
            .api_client
            .report_command_handled(&command.id, CommandStatus::Succeeded, metadata)
            .await
        {
            error!(command = %command.id, error = %err, "failed to report command as handled");
        }
    }

    async fn notify_deployment_triggered(
        &self,
        deployment_config: &DeploymentConfig,
        deployment_id: DeploymentId,
        deployment: Deployment,
    ) {
        let mentioned_accounts = deployment_config
            .notification
            .as_ref()
            .map(|n| n.find_accounts(NotificationEventType::DeploymentTriggered))
            .unwrap_or_default();

        let env = match self.environment_lister.get(&deployment.env_id).await {
            Ok(env) => env,
            Err(err) => {
                warn!(
                    env_id = %deployment.env_id,
                    error = %err,
                    "could not resolve environment, skipping triggered notification"
                );
                return;
            }
        };

        self.notify(NotificationEvent::DeploymentTriggered {
            deployment_id,
            deployment,
            env_name: env.name,
            mentioned_accounts,
        })
        .await;
    }

    async fn notify_trigger_failed(&self, app: &Application, reason: String, commit: &Commit) {
        self.notify(NotificationEvent::DeploymentTriggerFailed {
            application: app.clone(),
            commit_hash: commit.hash.clone(),
            commit_message: commit.message.clone(),
            reason,
        })
        .await;
    }

    async fn notify(&self, event: NotificationEvent) {
        if time::timeout(NOTIFY_TIMEOUT, self.notifier.notify(event))
            .await
            .is_err()
        {
            warn!(timeout = ?NOTIFY_TIMEOUT, "notifier did not accept the event in time");
        }
    }
}
