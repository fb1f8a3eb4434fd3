//! GitHub API client surface for the merge bot
//!
//! This crate provides a trait-based GitHub API client. The merge bot's
//! core only depends on the `GitHubClient` trait, so the direct octocrab
//! implementation and the in-memory test double are interchangeable.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              GitHubClient trait                  │
//! │  - fetch_pull_request() / fetch_changed_files()  │
//! │  - fetch_labels() / add_label() / remove_label() │
//! │  - fetch_check_runs() / create_check_run()       │
//! │  - fetch_reviews() / post_comment()              │
//! └─────────────────────────────────────────────────┘
//!                        │
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//! ┌─────────────────┐         ┌─────────────────────┐
//! │ OctocrabClient  │         │ InMemoryGitHubClient│
//! │ (direct API)    │         │ (tests, dry runs)   │
//! └─────────────────┘         └─────────────────────┘
//! ```

pub mod client;
pub mod memory;
pub mod octocrab_client;
pub mod types;

/// Default GitHub host (public GitHub)
pub const DEFAULT_HOST: &str = "github.com";

pub use client::GitHubClient;
pub use memory::{InMemoryGitHubClient, RecordedCheckRun};
pub use octocrab_client::OctocrabClient;
pub use types::{
    CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus, IssueComment, Label, PullRequest,
    Repository, Review, ReviewState,
};

// Re-export octocrab so consumers don't need to depend on it directly
pub use octocrab;
