//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! `DeploymentId` where an `ApplicationId` is expected) and make the code more
//! self-documenting. All identifiers are opaque strings assigned by the
//! control plane, except [`RepoId`], which comes from the trigger
//! configuration, and [`CommitHash`], which comes from Git.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_id! {
    /// An application registered with the control plane.
    ApplicationId
}

string_id! {
    /// A deployment record on the control plane.
    DeploymentId
}

string_id! {
    /// An environment an application is deployed into.
    EnvironmentId
}

string_id! {
    /// A user-issued command tracked by the control plane.
    CommandId
}

string_id! {
    /// A Git repository registered in the trigger configuration.
    RepoId
}

/// A Git commit hash.
///
/// The empty hash is a valid value with a specific meaning: "no commit has
/// ever been recorded for this application". The control plane reports it for
/// applications that have never been deployed, and the last-triggered-commit
/// store caches it as a legitimate answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(s: impl Into<String>) -> Self {
        CommitHash(s.into())
    }

    /// The "never triggered" hash.
    pub fn empty() -> Self {
        CommitHash(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short version of the hash for display, or the full value if
    /// it is shorter than seven characters.
    pub fn short(&self) -> &str {
        if self.0.len() >= 7 { &self.0[..7] } else { &self.0 }
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CommitHash {
    fn from(s: String) -> Self {
        CommitHash(s)
    }
}

impl From<&str> for CommitHash {
    fn from(s: &str) -> Self {
        CommitHash(s.to_string())
    }
}
