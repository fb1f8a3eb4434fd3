//! GitHub client trait definition
//!
//! This module defines the core `GitHubClient` trait that all client
//! implementations must satisfy. The merge bot only talks to GitHub
//! through this trait, so tests can substitute the in-memory client.

use crate::types::{
    CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus, Label, PullRequest, Repository,
    Review,
};
use async_trait::async_trait;

/// GitHub API client trait
///
/// Defines the narrow interface the merge bot needs: pull request and
/// review reads, label mutation, check-run reads/writes, branch
/// protection and repository-tree introspection.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// Fetch a single pull request by number
    ///
    /// Returns full PR details including additions/deletions and the
    /// merged flag, which are not available in the list endpoint.
    async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<PullRequest>;

    /// Fetch the changed file paths of a pull request
    async fn fetch_changed_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<String>>;

    /// Fetch the labels currently attached to a pull request
    async fn fetch_labels(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<Label>>;

    /// Add a label to a pull request
    ///
    /// The label is created in the repository with the given color if
    /// it does not exist yet. Adding an already-present label is a
    /// server-side no-op.
    async fn add_label(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        label: &Label,
    ) -> anyhow::Result<()>;

    /// Remove a label from a pull request
    ///
    /// Removing an absent label is reported as `Ok(())`; the caller's
    /// intent (label not present) already holds.
    async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        name: &str,
    ) -> anyhow::Result<()>;

    /// Fetch CI check runs for a specific commit
    async fn fetch_check_runs(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<Vec<CheckRun>>;

    /// Create or update a check run on a commit
    ///
    /// `conclusion` must be `Some` when `status` is `Completed`.
    async fn create_check_run(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
        name: &str,
        status: CheckRunStatus,
        conclusion: Option<CheckConclusion>,
        output: Option<CheckRunOutput>,
    ) -> anyhow::Result<()>;

    /// Fetch submitted reviews for a pull request
    async fn fetch_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<Review>>;

    /// Post an issue comment on a pull request
    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> anyhow::Result<()>;

    /// Fetch the required status-check contexts declared by branch protection
    ///
    /// Returns an empty list when the branch carries no protection rules.
    async fn fetch_branch_protection_contexts(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> anyhow::Result<Vec<String>>;

    /// Fetch repository metadata (visibility, default branch)
    async fn fetch_repository(&self, owner: &str, repo: &str) -> anyhow::Result<Repository>;

    /// List all file paths in the tree of the given ref (recursive)
    async fn list_tree(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> anyhow::Result<Vec<String>>;

    /// Fetch the decoded content of a file at the given ref
    ///
    /// Returns `Ok(None)` when the path does not exist; lookup misses
    /// are data, not errors.
    async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> anyhow::Result<Option<String>>;

    /// Whether the user is a collaborator on the repository
    ///
    /// Used as the "known contributor" authorization floor for
    /// unprivileged commands.
    async fn is_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
    ) -> anyhow::Result<bool>;
}
