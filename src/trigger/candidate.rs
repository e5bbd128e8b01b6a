//! Trigger candidates and the collectors that produce them.
//!
//! A candidate pairs an application with the signal that put it up for
//! consideration in the current tick. Collectors are pure functions over
//! lister snapshots: they never block and never touch the network.

use std::fmt;
use tracing::warn;

use crate::commands::Command;
use crate::types::{Application, ApplicationSyncStatus};

use super::{ApplicationLister, CommandLister};

/// The signal that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A (potentially) new commit on the tracked branch.
    Commit,
    /// A user-issued sync command.
    Command,
    /// Reported configuration drift.
    OutOfSync,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateKind::Commit => "commit",
            CandidateKind::Command => "command",
            CandidateKind::OutOfSync => "out_of_sync",
        };
        write!(f, "{s}")
    }
}

/// An application under consideration for triggering.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub application: Application,
    pub kind: CandidateKind,

    /// Present iff `kind` is [`CandidateKind::Command`].
    pub command: Option<Command>,
}

impl Candidate {
    pub fn commit(application: Application) -> Self {
        Candidate {
            application,
            kind: CandidateKind::Commit,
            command: None,
        }
    }

    pub fn out_of_sync(application: Application) -> Self {
        Candidate {
            application,
            kind: CandidateKind::OutOfSync,
            command: None,
        }
    }

    pub fn command(application: Application, command: Command) -> Self {
        Candidate {
            application,
            kind: CandidateKind::Command,
            command: Some(command),
        }
    }
}

/// Every registered application is a commit candidate; the on-commit
/// determiner decides per application whether the head commit warrants a
/// deployment.
pub fn list_commit_candidates(applications: &impl ApplicationLister) -> Vec<Candidate> {
    applications
        .list()
        .into_iter()
        .map(Candidate::commit)
        .collect()
}

/// Applications currently reported as drifted.
pub fn list_out_of_sync_candidates(applications: &impl ApplicationLister) -> Vec<Candidate> {
    applications
        .list()
        .into_iter()
        .filter(|app| app.sync_state.status == ApplicationSyncStatus::OutOfSync)
        .map(Candidate::out_of_sync)
        .collect()
}

/// Pending sync commands whose target application is registered. Commands of
/// other kinds are ignored; commands for unknown applications are logged and
/// dropped.
pub fn list_command_candidates(
    commands: &impl CommandLister,
    applications: &impl ApplicationLister,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for command in commands.list_application_commands() {
        let Some(sync) = command.sync_application() else {
            continue;
        };
        let application_id = sync.application_id.clone();

        match applications.get(&application_id) {
            Some(application) => candidates.push(Candidate::command(application, command)),
            None => {
                warn!(
                    command = %command.id,
                    application_id = %application_id,
                    commander = %command.commander,
                    "detected a sync command for an unregistered application"
                );
            }
        }
    }

    candidates
}
