//! Shared fixtures and mock collaborators for tests.
//!
//! Every mock is a cheap handle (`Clone` sharing the same interior), so a
//! test can hand one copy to the trigger and keep another to inject state or
//! read recorded calls.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tempfile::TempDir;

use crate::api::{ApiClient, ApiError, MostRecentDeployment};
use crate::commands::{Command, CommandStatus};
use crate::git::{Commit, GitClient, GitError, GitResult, Repo};
use crate::trigger::{ApplicationLister, CommandLister, EnvironmentLister, Notifier};
use crate::types::{
    Application, ApplicationId, ApplicationKind, ApplicationSyncState, ApplicationSyncStatus,
    CommandId, CommitHash, Deployment, DeploymentId, Environment, EnvironmentId, GitPath,
    NotificationEvent, RepoId,
};

/// Installs a compact tracing subscriber for a test run. Later calls are
/// no-ops, so every test can call this unconditionally.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deploy_trigger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A registered application living in `repo_id`, synced, kind Kubernetes.
pub fn test_application(id: &str, repo_id: &str) -> Application {
    Application {
        id: ApplicationId::new(id),
        name: id.to_string(),
        kind: ApplicationKind::Kubernetes,
        env_id: EnvironmentId::new("env-1"),
        git_path: GitPath::new(repo_id, format!("{id}/app.yaml")),
        sync_state: ApplicationSyncState::new(ApplicationSyncStatus::Synced),
        most_recently_triggered_deployment_id: None,
    }
}

/// Marks an application as drifted.
pub fn out_of_sync(mut application: Application) -> Application {
    application.sync_state.status = ApplicationSyncStatus::OutOfSync;
    application
}

pub fn test_commit(hash: &str) -> Commit {
    Commit {
        hash: CommitHash::new(hash),
        message: format!("commit {hash}"),
        author: "dev".to_string(),
        timestamp: Utc::now(),
    }
}

// ─── Control plane ──────────────────────────────────────────────────────────

#[derive(Default)]
struct ApiInner {
    most_recent: Mutex<HashMap<ApplicationId, MostRecentDeployment>>,
    most_recent_calls: AtomicUsize,
    fail_most_recent: AtomicBool,
    created: Mutex<Vec<Deployment>>,
    fail_create_for: Mutex<HashSet<ApplicationId>>,
    reported: Mutex<Vec<(CommandId, CommandStatus, HashMap<String, String>)>>,
    fail_report: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MockApiClient {
    inner: Arc<ApiInner>,
}

impl MockApiClient {
    pub fn set_most_recent(&self, app_id: &str, deployment_id: DeploymentId, commit_hash: CommitHash) {
        self.inner.most_recent.lock().unwrap().insert(
            ApplicationId::new(app_id),
            MostRecentDeployment {
                deployment_id,
                commit_hash,
            },
        );
    }

    pub fn most_recent_calls(&self) -> usize {
        self.inner.most_recent_calls.load(Ordering::SeqCst)
    }

    pub fn fail_most_recent(&self, fail: bool) {
        self.inner.fail_most_recent.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create_for(&self, app_id: &str) {
        self.inner
            .fail_create_for
            .lock()
            .unwrap()
            .insert(ApplicationId::new(app_id));
    }

    pub fn fail_report(&self, fail: bool) {
        self.inner.fail_report.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<Deployment> {
        self.inner.created.lock().unwrap().clone()
    }

    pub fn reported(&self) -> Vec<(CommandId, CommandStatus, HashMap<String, String>)> {
        self.inner.reported.lock().unwrap().clone()
    }
}

impl ApiClient for MockApiClient {
    async fn get_application_most_recent_deployment(
        &self,
        application_id: &ApplicationId,
    ) -> Result<MostRecentDeployment, ApiError> {
        self.inner.most_recent_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_most_recent.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("injected failure".to_string()));
        }
        self.inner
            .most_recent
            .lock()
            .unwrap()
            .get(application_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<DeploymentId, ApiError> {
        if self
            .inner
            .fail_create_for
            .lock()
            .unwrap()
            .contains(&deployment.application_id)
        {
            return Err(ApiError::Failed("injected failure".to_string()));
        }
        let mut created = self.inner.created.lock().unwrap();
        created.push(deployment.clone());
        Ok(DeploymentId::new(format!("d-{}", created.len())))
    }

    async fn report_command_handled(
        &self,
        command_id: &CommandId,
        status: CommandStatus,
        metadata: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        if self.inner.fail_report.load(Ordering::SeqCst) {
            return Err(ApiError::Failed("injected failure".to_string()));
        }
        self.inner
            .reported
            .lock()
            .unwrap()
            .push((command_id.clone(), status, metadata));
        Ok(())
    }
}

// ─── Git ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RepoInner {
    dir: TempDir,
    branch: String,
    head: Mutex<Commit>,
    pull_calls: AtomicUsize,
    fail_pull: AtomicBool,
}

/// A fake working copy backed by a temp directory, so deployment config
/// files can really be written and read.
#[derive(Clone, Debug)]
pub struct MockRepo {
    inner: Arc<RepoInner>,
}

impl MockRepo {
    pub fn new(branch: &str, head: Commit) -> Self {
        MockRepo {
            inner: Arc::new(RepoInner {
                dir: tempfile::tempdir().unwrap(),
                branch: branch.to_string(),
                head: Mutex::new(head),
                pull_calls: AtomicUsize::new(0),
                fail_pull: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_head(&self, commit: Commit) {
        *self.inner.head.lock().unwrap() = commit;
    }

    pub fn pull_calls(&self) -> usize {
        self.inner.pull_calls.load(Ordering::SeqCst)
    }

    pub fn fail_pull(&self, fail: bool) {
        self.inner.fail_pull.store(fail, Ordering::SeqCst);
    }

    /// Writes an application's deployment config file into the working copy.
    pub fn write_config(&self, application: &Application, contents: &str) {
        let path = self.inner.dir.path().join(&application.git_path.config_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}

impl Repo for MockRepo {
    fn path(&self) -> &Path {
        self.inner.dir.path()
    }

    fn cloned_branch(&self) -> &str {
        &self.inner.branch
    }

    async fn pull(&self, _branch: &str) -> GitResult<()> {
        self.inner.pull_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_pull.load(Ordering::SeqCst) {
            return Err(GitError::CommandFailed {
                command: "git fetch origin".to_string(),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn latest_commit(&self) -> GitResult<Commit> {
        Ok(self.inner.head.lock().unwrap().clone())
    }
}

#[derive(Clone, Default)]
pub struct MockGitClient {
    repos: Arc<Mutex<HashMap<RepoId, MockRepo>>>,
}

impl MockGitClient {
    pub fn register(&self, repo_id: &str, repo: MockRepo) {
        self.repos
            .lock()
            .unwrap()
            .insert(RepoId::new(repo_id), repo);
    }
}

impl GitClient for MockGitClient {
    type Repo = MockRepo;

    async fn clone_repo(
        &self,
        repo_id: &RepoId,
        _remote: &str,
        _branch: &str,
        _destination: &Path,
    ) -> GitResult<MockRepo> {
        self.repos
            .lock()
            .unwrap()
            .get(repo_id)
            .cloned()
            .ok_or_else(|| GitError::CommandFailed {
                command: format!("git clone {repo_id}"),
                stderr: "remote not found".to_string(),
            })
    }
}

// ─── Listers and notifier ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockApplicationLister {
    apps: Arc<Mutex<Vec<Application>>>,
}

impl MockApplicationLister {
    pub fn add(&self, application: Application) {
        self.apps.lock().unwrap().push(application);
    }
}

impl ApplicationLister for MockApplicationLister {
    fn get(&self, id: &ApplicationId) -> Option<Application> {
        self.apps
            .lock()
            .unwrap()
            .iter()
            .find(|app| &app.id == id)
            .cloned()
    }

    fn list(&self) -> Vec<Application> {
        self.apps.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct MockCommandLister {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl MockCommandLister {
    pub fn add(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}

impl CommandLister for MockCommandLister {
    fn list_application_commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct MockEnvironmentLister {
    envs: Arc<Mutex<HashMap<EnvironmentId, Environment>>>,
}

impl MockEnvironmentLister {
    pub fn insert(&self, id: &str, name: &str) {
        self.envs.lock().unwrap().insert(
            EnvironmentId::new(id),
            Environment {
                id: EnvironmentId::new(id),
                name: name.to_string(),
            },
        );
    }
}

impl EnvironmentLister for MockEnvironmentLister {
    async fn get(&self, id: &EnvironmentId) -> Result<Environment, ApiError> {
        self.envs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }
}

#[derive(Clone, Default)]
pub struct MockNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl MockNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn triggered_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, NotificationEvent::DeploymentTriggered { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, NotificationEvent::DeploymentTriggerFailed { .. }))
            .count()
    }
}

impl Notifier for MockNotifier {
    async fn notify(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
