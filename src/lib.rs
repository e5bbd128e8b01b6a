//! Deployment trigger for a continuous-delivery agent.
//!
//! This library watches a set of registered application definitions and
//! decides, for each, whether a new deployment should be created on the
//! central control plane. Three signals can cause a trigger: a new commit on
//! the tracked branch of the application's repository, an on-demand sync
//! command issued by a user, and a reported out-of-sync (drift) state.
//!
//! The crate owns the trigger loop and its supporting pieces; the control
//! plane, the application/command/environment listers and the notification
//! transport are collaborators expressed as traits.

#[cfg(test)]
pub mod test_utils;

pub mod api;
pub mod commands;
pub mod config;
pub mod git;
pub mod trigger;
pub mod types;
