//! # pullwatch-sync
//!
//! Repository synchronization and update orchestration.
//!
//! Call [`pipeline::run`] to sweep configured repositories, or drive a
//! single one with [`Orchestrator::run_repo`].

pub mod error;
pub mod git;
pub mod orchestrator;
pub mod pipeline;

pub use error::SyncError;
pub use git::{Detected, GitRepo, SyncOutcome};
pub use orchestrator::{Orchestrator, RepoReport};
pub use pipeline::Scope;
