//! Git collaborator contract and the process-backed default client.
//!
//! The trigger needs very little from Git: clone each registered repository
//! once, fast-forward a working copy to the remote head, and read the head
//! commit. Those operations are expressed as the [`GitClient`] and [`Repo`]
//! traits so tests can substitute in-memory fakes; [`command::CommandGitClient`]
//! implements them by shelling out to the `git` binary.

pub mod command;

pub use command::CommandGitClient;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use thiserror::Error;

use crate::types::{CommitHash, RepoId};

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed.
    #[error("git command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Git produced output we could not understand.
    #[error("unexpected git output: {output}")]
    InvalidOutput { output: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A commit as reported by the git collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: CommitHash,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// A cloned working copy.
///
/// One working copy is shared by every candidate in a batch; the serial
/// trigger loop guarantees it is never used concurrently.
pub trait Repo: Send + Sync {
    /// Filesystem location of the working copy.
    fn path(&self) -> &Path;

    /// The branch fixed at clone time.
    fn cloned_branch(&self) -> &str;

    /// Fetches the given branch and fast-forwards the working copy to it.
    fn pull(&self, branch: &str) -> impl Future<Output = GitResult<()>> + Send;

    /// Reads the head commit of the working copy.
    fn latest_commit(&self) -> impl Future<Output = GitResult<Commit>> + Send;
}

/// Clones repositories into working copies.
pub trait GitClient: Send + Sync {
    type Repo: Repo;

    /// Clones `remote` at `branch` into `destination`. An empty destination
    /// lets the client derive one from the repository id.
    fn clone_repo(
        &self,
        repo_id: &RepoId,
        remote: &str,
        branch: &str,
        destination: &Path,
    ) -> impl Future<Output = GitResult<Self::Repo>> + Send;
}
