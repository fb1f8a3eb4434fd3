//! In-memory GitHub client
//!
//! A fully in-memory implementation of [`GitHubClient`] backing the
//! engine's tests and offline dry runs. State is seeded up front and
//! mutated through the same trait surface the real client exposes.

use crate::client::GitHubClient;
use crate::types::{
    CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus, IssueComment, Label, PullRequest,
    Repository, Review,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A check run recorded by [`InMemoryGitHubClient::create_check_run`]
#[derive(Debug, Clone)]
pub struct RecordedCheckRun {
    pub commit_sha: String,
    pub name: String,
    pub status: CheckRunStatus,
    pub conclusion: Option<CheckConclusion>,
    pub output: Option<CheckRunOutput>,
}

#[derive(Debug, Default)]
struct Inner {
    repository: Option<Repository>,
    pull_requests: HashMap<u64, PullRequest>,
    changed_files: HashMap<u64, Vec<String>>,
    labels: HashMap<u64, Vec<Label>>,
    check_runs: HashMap<String, Vec<CheckRun>>,
    reviews: HashMap<u64, Vec<Review>>,
    files: HashMap<String, String>,
    comments: HashMap<u64, Vec<IssueComment>>,
    collaborators: HashSet<String>,
    protection_contexts: HashMap<String, Vec<String>>,
    recorded_check_runs: Vec<RecordedCheckRun>,
    fail_label_writes: bool,
    next_check_run_id: u64,
}

/// In-memory [`GitHubClient`] implementation
#[derive(Debug, Default)]
pub struct InMemoryGitHubClient {
    inner: Mutex<Inner>,
}

impl InMemoryGitHubClient {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding ---

    pub fn set_repository(&self, repository: Repository) {
        self.inner.lock().unwrap().repository = Some(repository);
    }

    pub fn put_pull_request(&self, pr: PullRequest) {
        self.inner.lock().unwrap().pull_requests.insert(pr.number, pr);
    }

    pub fn set_changed_files(&self, pr_number: u64, files: Vec<String>) {
        self.inner
            .lock()
            .unwrap()
            .changed_files
            .insert(pr_number, files);
    }

    pub fn put_file(&self, path: impl Into<String>, content: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .files
            .insert(path.into(), content.into());
    }

    pub fn put_check_run(&self, commit_sha: &str, run: CheckRun) {
        self.inner
            .lock()
            .unwrap()
            .check_runs
            .entry(commit_sha.to_string())
            .or_default()
            .push(run);
    }

    pub fn put_review(&self, pr_number: u64, review: Review) {
        self.inner
            .lock()
            .unwrap()
            .reviews
            .entry(pr_number)
            .or_default()
            .push(review);
    }

    pub fn add_collaborator(&self, username: impl Into<String>) {
        self.inner.lock().unwrap().collaborators.insert(username.into());
    }

    pub fn set_protection_contexts(&self, branch: &str, contexts: Vec<String>) {
        self.inner
            .lock()
            .unwrap()
            .protection_contexts
            .insert(branch.to_string(), contexts);
    }

    /// Make label add/remove calls fail, for exercising unconfirmed
    /// label-state results.
    pub fn fail_label_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_label_writes = fail;
    }

    // --- inspection ---

    pub fn labels_for(&self, pr_number: u64) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .labels
            .get(&pr_number)
            .map(|labels| labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn recorded_check_runs(&self) -> Vec<RecordedCheckRun> {
        self.inner.lock().unwrap().recorded_check_runs.clone()
    }

    pub fn comments_for(&self, pr_number: u64) -> Vec<IssueComment> {
        self.inner
            .lock()
            .unwrap()
            .comments
            .get(&pr_number)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GitHubClient for InMemoryGitHubClient {
    async fn fetch_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<PullRequest> {
        self.inner
            .lock()
            .unwrap()
            .pull_requests
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("pull request #{} not found", pr_number))
    }

    async fn fetch_changed_files(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .changed_files
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_labels(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<Label>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .labels
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_label(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
        label: &Label,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_label_writes {
            anyhow::bail!("label store unavailable");
        }
        let labels = inner.labels.entry(pr_number).or_default();
        if !labels.iter().any(|l| l.name == label.name) {
            labels.push(label.clone());
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
        name: &str,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_label_writes {
            anyhow::bail!("label store unavailable");
        }
        if let Some(labels) = inner.labels.get_mut(&pr_number) {
            labels.retain(|l| l.name != name);
        }
        Ok(())
    }

    async fn fetch_check_runs(
        &self,
        _owner: &str,
        _repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<Vec<CheckRun>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .check_runs
            .get(commit_sha)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_check_run(
        &self,
        _owner: &str,
        _repo: &str,
        commit_sha: &str,
        name: &str,
        status: CheckRunStatus,
        conclusion: Option<CheckConclusion>,
        output: Option<CheckRunOutput>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.recorded_check_runs.push(RecordedCheckRun {
            commit_sha: commit_sha.to_string(),
            name: name.to_string(),
            status,
            conclusion,
            output,
        });
        inner.next_check_run_id += 1;
        let id = inner.next_check_run_id;
        inner
            .check_runs
            .entry(commit_sha.to_string())
            .or_default()
            .push(CheckRun {
                id,
                name: name.to_string(),
                status,
                conclusion,
                started_at: None,
                completed_at: None,
            });
        Ok(())
    }

    async fn fetch_reviews(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<Review>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .reviews
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_comment(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
        body: &str,
    ) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .comments
            .entry(pr_number)
            .or_default()
            .push(IssueComment {
                author: "merge-bot".to_string(),
                body: body.to_string(),
            });
        Ok(())
    }

    async fn fetch_branch_protection_contexts(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .protection_contexts
            .get(branch)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_repository(&self, owner: &str, repo: &str) -> anyhow::Result<Repository> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .repository
            .clone()
            .unwrap_or_else(|| Repository {
                owner: owner.to_string(),
                name: repo.to_string(),
                private: false,
                default_branch: "main".to_string(),
            }))
    }

    async fn list_tree(
        &self,
        _owner: &str,
        _repo: &str,
        _git_ref: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut paths: Vec<String> = self.inner.lock().unwrap().files.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    async fn fetch_file(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        _git_ref: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(self.inner.lock().unwrap().files.get(path).cloned())
    }

    async fn is_collaborator(
        &self,
        _owner: &str,
        _repo: &str,
        username: &str,
    ) -> anyhow::Result<bool> {
        Ok(self.inner.lock().unwrap().collaborators.contains(username))
    }
}
