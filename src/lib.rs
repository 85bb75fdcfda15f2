//! Find the pull-request comments that still need action.
//!
//! A [`Refresher`] walks a fixed list of repositories through the GitHub CLI,
//! runs every comment through [`classify`], and persists the actionable ones
//! as a [`CacheSnapshot`]. A [`Scheduler`] decides when automatic refreshes
//! are due.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod github;
pub mod output;
pub mod refresher;
pub mod schedule;

pub use cache::CacheStore;
pub use classifier::classify;
pub use config::Config;
pub use data::{CacheSnapshot, Classification, RepoId, UpdateMetadata};
pub use error::{GhError, RefreshError};
pub use github::{GhCli, GitHubSource, PrState};
pub use refresher::{RefreshSettings, Refresher};
pub use schedule::{ActiveWindow, Scheduler};
