//! Per-application deployment configuration, read from Git.
//!
//! Every application keeps a small YAML file in its repository describing how
//! it deploys. The trigger only needs the declared kind (to validate it
//! against the registered application) and the optional notification section
//! (to resolve mention lists for triggered-deployment events).

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

use crate::types::{Application, ApplicationKind, NotificationEventType};

/// Errors from loading a deployment configuration file.
///
/// `NotFound` is distinguishable from other I/O failures: a missing file in
/// the working copy usually means the application was registered with a wrong
/// path, which surfaces through a separate status channel rather than a
/// notification.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("deployment config file {path} was not found in the working copy")]
    NotFound { path: String },

    #[error("failed to read deployment config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse deployment config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("deployment config declares kind {config} but the application is registered as {application}")]
    KindMismatch {
        config: ApplicationKind,
        application: ApplicationKind,
    },
}

/// A mention list scoped to one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMention {
    pub event: NotificationEventType,
    #[serde(default)]
    pub accounts: Vec<String>,
}

/// The notification section of a deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentNotification {
    #[serde(default)]
    pub mentions: Vec<NotificationMention>,
}

impl DeploymentNotification {
    /// Accounts to mention for the given event type.
    pub fn find_accounts(&self, event: NotificationEventType) -> Vec<String> {
        self.mentions
            .iter()
            .filter(|m| m.event == event)
            .flat_map(|m| m.accounts.iter().cloned())
            .collect()
    }
}

/// The subset of an application's deployment configuration the trigger reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub kind: ApplicationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<DeploymentNotification>,
}

/// Loads and validates the deployment configuration for an application from
/// its working copy.
///
/// The file is read from `<repo_path>/<application.git_path.config_path>`.
/// A config whose declared kind differs from the application's registered
/// kind is rejected.
pub fn load_deployment_config(
    repo_path: &Path,
    application: &Application,
) -> Result<DeploymentConfig, ConfigError> {
    let rel_path = &application.git_path.config_path;
    let abs_path = repo_path.join(rel_path);

    let raw = std::fs::read_to_string(&abs_path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ConfigError::NotFound {
                path: rel_path.clone(),
            }
        } else {
            ConfigError::Io {
                path: rel_path.clone(),
                source,
            }
        }
    })?;

    let config: DeploymentConfig =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: rel_path.clone(),
            source,
        })?;

    if config.kind != application.kind {
        return Err(ConfigError::KindMismatch {
            config: config.kind,
            application: application.kind,
        });
    }

    Ok(config)
}
