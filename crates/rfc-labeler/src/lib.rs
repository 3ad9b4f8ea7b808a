//! RFC lifecycle labeler for GitHub.
//!
//! This crate provides:
//! - Per-repository settings resolution (`.github/rfc-labeler.yml`)
//! - The stale search query and per-sweep action budget
//! - The mark/unmark engine
//! - A GitHub REST client, a webhook receiver and a periodic scheduler

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod app;
pub mod budget;
pub mod config;
pub mod event;
pub mod github;
pub mod labeler;
pub mod query;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod webhooks;

pub use app::LabelerApp;
pub use config::{LabelerConfig, Resolution};
pub use event::{ActivityEvent, EventKind};
pub use github::{GitHubApi, GitHubClient, GitHubError, RepoRef};
pub use labeler::{Labeler, LabelerError, SweepReport, UnmarkOutcome};
pub use scheduler::RepoScheduler;
pub use settings::Settings;
