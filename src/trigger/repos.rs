//! Registry of cloned working copies, keyed by repository id.
//!
//! Every registered repository is cloned exactly once at startup; a clone
//! failure is fatal and the trigger loop never starts. Afterwards the set
//! only fast-forwards the existing working copies. One working copy serves
//! every candidate of its repository within a batch; the serial loop is the
//! only writer.

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::config::RepoConfig;
use crate::git::{Commit, GitClient, Repo};
use crate::types::RepoId;

use super::TriggerError;

/// A working copy brought up to date, with the branch head it landed on.
#[derive(Debug)]
pub struct RepoHead<'a, R> {
    pub repo: &'a R,
    pub branch: String,
    pub head_commit: Commit,
}

/// The set of cloned working copies.
#[derive(Debug)]
pub struct RepoSet<R> {
    repos: HashMap<RepoId, R>,
}

impl<R: Repo> RepoSet<R> {
    /// Clones every configured repository. The destination is left to the
    /// git client.
    pub async fn clone_all<G: GitClient<Repo = R>>(
        client: &G,
        configs: &[RepoConfig],
    ) -> Result<Self, TriggerError> {
        let mut repos = HashMap::with_capacity(configs.len());

        for config in configs {
            let repo = client
                .clone_repo(&config.repo_id, &config.remote, &config.branch, Path::new(""))
                .await
                .map_err(|source| TriggerError::Clone {
                    repo_id: config.repo_id.clone(),
                    source,
                })?;
            info!(repo_id = %config.repo_id, branch = %config.branch, "cloned repository");
            repos.insert(config.repo_id.clone(), repo);
        }

        Ok(RepoSet { repos })
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Fast-forwards the working copy to the remote head of its cloned
    /// branch and reads the head commit.
    pub async fn update_to_latest(&self, repo_id: &RepoId) -> Result<RepoHead<'_, R>, TriggerError> {
        let repo = self
            .repos
            .get(repo_id)
            .ok_or_else(|| TriggerError::UnregisteredRepo(repo_id.clone()))?;

        let branch = repo.cloned_branch().to_string();
        repo.pull(&branch)
            .await
            .map_err(|source| TriggerError::RepoUpdate {
                repo_id: repo_id.clone(),
                source,
            })?;

        let head_commit = repo
            .latest_commit()
            .await
            .map_err(|source| TriggerError::RepoUpdate {
                repo_id: repo_id.clone(),
                source,
            })?;

        Ok(RepoHead {
            repo,
            branch,
            head_commit,
        })
    }
}
