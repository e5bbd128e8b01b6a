//! Trigger configuration.
//!
//! The agent hosting the trigger parses a YAML document into
//! [`TriggerConfig`]. Durations accept human-readable forms ("1m 30s").

pub mod deployment;

pub use deployment::{
    ConfigError, DeploymentConfig, DeploymentNotification, NotificationMention,
    load_deployment_config,
};

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::types::RepoId;

/// Default interval between sync ticks.
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Default time the caller waits for the loop to stop before killing the
/// process.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Default capacity of the last-triggered-commit cache.
pub const DEFAULT_COMMIT_CACHE_CAPACITY: usize = 500;

fn human_readable_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

fn default_sync_interval() -> Duration {
    DEFAULT_SYNC_INTERVAL
}

fn default_grace_period() -> Duration {
    DEFAULT_GRACE_PERIOD
}

fn default_commit_cache_capacity() -> usize {
    DEFAULT_COMMIT_CACHE_CAPACITY
}

/// A Git repository registered with the trigger.
///
/// Each registered repository is cloned exactly once at startup; the tracked
/// branch is fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoConfig {
    pub repo_id: RepoId,
    pub remote: String,
    pub branch: String,
}

/// Configuration for the trigger loop.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Cadence of the sync tick (commit and out-of-sync candidates).
    #[serde(
        default = "default_sync_interval",
        deserialize_with = "human_readable_duration"
    )]
    pub sync_interval: Duration,

    /// Repositories to clone and watch.
    #[serde(default)]
    pub repositories: Vec<RepoConfig>,

    /// Capacity of the last-triggered-commit cache. Zero falls back to the
    /// default.
    #[serde(default = "default_commit_cache_capacity")]
    pub commit_cache_capacity: usize,

    /// How long the caller waits for the loop to stop on shutdown. The loop
    /// itself does not consult this.
    #[serde(
        default = "default_grace_period",
        deserialize_with = "human_readable_duration"
    )]
    pub grace_period: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            repositories: Vec::new(),
            commit_cache_capacity: DEFAULT_COMMIT_CACHE_CAPACITY,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl TriggerConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }
}
