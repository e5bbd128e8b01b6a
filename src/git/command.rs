//! Git client backed by the `git` binary.
//!
//! Working copies live under a base directory owned by the client; a stale
//! working copy at a clone destination is discarded so every process start
//! begins from a fresh clone.

use chrono::DateTime;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::types::{CommitHash, RepoId};

use super::{Commit, GitClient, GitError, GitResult, Repo};

/// Field separator used in `--pretty` formats. Commit subjects cannot contain
/// control characters, so the unit separator is safe to split on.
const FIELD_SEP: char = '\u{1f}';

async fn run_git(dir: &Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// A working copy managed through the `git` CLI.
#[derive(Debug, Clone)]
pub struct CommandRepo {
    path: PathBuf,
    branch: String,
}

impl Repo for CommandRepo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn cloned_branch(&self) -> &str {
        &self.branch
    }

    async fn pull(&self, branch: &str) -> GitResult<()> {
        run_git(&self.path, &["fetch", "origin", branch]).await?;
        run_git(&self.path, &["merge", "--ff-only", "FETCH_HEAD"]).await?;
        Ok(())
    }

    async fn latest_commit(&self) -> GitResult<Commit> {
        let format = format!("--pretty=format:%H{FIELD_SEP}%an{FIELD_SEP}%at{FIELD_SEP}%s");
        let out = run_git(&self.path, &["log", "-1", &format]).await?;
        parse_commit_line(out.trim_end())
    }
}

fn parse_commit_line(line: &str) -> GitResult<Commit> {
    let mut fields = line.splitn(4, FIELD_SEP);
    let (Some(hash), Some(author), Some(unix_secs), Some(message)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(GitError::InvalidOutput {
            output: line.to_string(),
        });
    };

    let secs: i64 = unix_secs.parse().map_err(|_| GitError::InvalidOutput {
        output: line.to_string(),
    })?;
    let timestamp = DateTime::from_timestamp(secs, 0).ok_or_else(|| GitError::InvalidOutput {
        output: line.to_string(),
    })?;

    Ok(Commit {
        hash: CommitHash::new(hash),
        message: message.to_string(),
        author: author.to_string(),
        timestamp,
    })
}

/// [`GitClient`] implementation shelling out to `git`.
#[derive(Debug, Clone)]
pub struct CommandGitClient {
    base_dir: PathBuf,
}

impl CommandGitClient {
    /// Creates a client whose derived working copies live under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        CommandGitClient {
            base_dir: base_dir.into(),
        }
    }
}

impl GitClient for CommandGitClient {
    type Repo = CommandRepo;

    async fn clone_repo(
        &self,
        repo_id: &RepoId,
        remote: &str,
        branch: &str,
        destination: &Path,
    ) -> GitResult<CommandRepo> {
        let dest = if destination.as_os_str().is_empty() {
            self.base_dir.join(repo_id.as_str())
        } else {
            destination.to_path_buf()
        };

        if dest.exists() {
            debug!(repo_id = %repo_id, path = %dest.display(), "discarding stale working copy");
            std::fs::remove_dir_all(&dest)?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let dest_str = dest.to_string_lossy();
        run_git(
            Path::new("."),
            &[
                "clone",
                "--single-branch",
                "--branch",
                branch,
                remote,
                &dest_str,
            ],
        )
        .await?;

        debug!(repo_id = %repo_id, branch = branch, path = %dest.display(), "cloned repository");

        Ok(CommandRepo {
            path: dest,
            branch: branch.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    fn git_in(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed in {}", dir.display());
    }

    fn init_origin(dir: &Path) {
        git_in(dir, &["init", "--initial-branch=main"]);
        git_in(dir, &["config", "user.email", "ci@example.com"]);
        git_in(dir, &["config", "user.name", "ci"]);
        std::fs::write(dir.join("app.yaml"), "kind: kubernetes\n").unwrap();
        git_in(dir, &["add", "."]);
        git_in(dir, &["commit", "-m", "initial manifests"]);
    }

    fn commit_change(dir: &Path, message: &str) {
        std::fs::write(dir.join("app.yaml"), format!("kind: kubernetes # {message}\n")).unwrap();
        git_in(dir, &["add", "."]);
        git_in(dir, &["commit", "-m", message]);
    }

    #[tokio::test]
    async fn clone_reads_head_commit() {
        let origin = tempdir().unwrap();
        init_origin(origin.path());

        let workspace = tempdir().unwrap();
        let client = CommandGitClient::new(workspace.path());
        let repo = client
            .clone_repo(
                &RepoId::new("repo-1"),
                &origin.path().to_string_lossy(),
                "main",
                Path::new(""),
            )
            .await
            .unwrap();

        assert_eq!(repo.cloned_branch(), "main");
        assert!(repo.path().starts_with(workspace.path()));

        let head = repo.latest_commit().await.unwrap();
        assert_eq!(head.message, "initial manifests");
        assert_eq!(head.author, "ci");
        assert_eq!(head.hash.as_str().len(), 40);
    }

    #[tokio::test]
    async fn pull_fast_forwards_to_new_commits() {
        let origin = tempdir().unwrap();
        init_origin(origin.path());

        let workspace = tempdir().unwrap();
        let client = CommandGitClient::new(workspace.path());
        let repo = client
            .clone_repo(
                &RepoId::new("repo-1"),
                &origin.path().to_string_lossy(),
                "main",
                Path::new(""),
            )
            .await
            .unwrap();

        let before = repo.latest_commit().await.unwrap();
        commit_change(origin.path(), "bump image tag");

        repo.pull("main").await.unwrap();
        let after = repo.latest_commit().await.unwrap();

        assert_ne!(before.hash, after.hash);
        assert_eq!(after.message, "bump image tag");
    }

    #[tokio::test]
    async fn clone_failure_reports_stderr() {
        let workspace = tempdir().unwrap();
        let client = CommandGitClient::new(workspace.path());

        let err = client
            .clone_repo(
                &RepoId::new("repo-1"),
                "/nonexistent/remote.git",
                "main",
                Path::new(""),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GitError::CommandFailed { .. }));
    }

    #[test]
    fn parse_commit_line_rejects_truncated_output() {
        assert!(parse_commit_line("deadbeef\u{1f}author").is_err());
        assert!(parse_commit_line("").is_err());
    }

    #[test]
    fn parse_commit_line_keeps_separator_free_subject() {
        let line = format!("{}\u{1f}dev\u{1f}1700000000\u{1f}fix: handle empty path", "a".repeat(40));
        let commit = parse_commit_line(&line).unwrap();
        assert_eq!(commit.message, "fix: handle empty path");
        assert_eq!(commit.author, "dev");
    }
}
