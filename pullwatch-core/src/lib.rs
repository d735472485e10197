//! pullwatch core library — domain types, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs
//! - [`error`] — [`ConfigError`]
//! - [`config`] — load / validate / paths
pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, RepoEntry};
pub use error::ConfigError;
pub use types::{
    CycleOutcome, MemberId, ProcessAction, RepoKind, RepoName, RepoTarget, RestartPolicy,
};
