//! Octocrab-based GitHub API client
//!
//! Direct implementation of the `GitHubClient` trait using the octocrab
//! library. Endpoints octocrab does not model (branch protection,
//! collaborator permission, tree listing) go through raw routes.

use crate::client::GitHubClient;
use crate::types::{
    CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus, Label, PullRequest, Repository,
    Review, ReviewState,
};
use async_trait::async_trait;
use log::{debug, warn};
use octocrab::Octocrab;
use serde_json::{json, Value};
use std::sync::Arc;

/// Direct GitHub API client using octocrab
#[derive(Debug, Clone)]
pub struct OctocrabClient {
    octocrab: Arc<Octocrab>,
}

impl OctocrabClient {
    /// Create a new client with the given octocrab instance
    pub fn new(octocrab: Arc<Octocrab>) -> Self {
        Self { octocrab }
    }

    /// Get a reference to the underlying octocrab instance
    pub fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }
}

/// Whether an octocrab error is a plain 404 from the API
fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(
        err,
        octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404
    )
}

#[async_trait]
impl GitHubClient for OctocrabClient {
    async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<PullRequest> {
        debug!("Fetching PR {}/{}#{}", owner, repo, pr_number);

        let pr = self.octocrab.pulls(owner, repo).get(pr_number).await?;
        Ok(convert_pull_request(&pr))
    }

    async fn fetch_changed_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<String>> {
        debug!("Fetching changed files for {}/{}#{}", owner, repo, pr_number);

        let mut files = Vec::new();
        let mut page_num = 1u32;
        const PER_PAGE: u32 = 100;

        loop {
            let route = format!(
                "/repos/{}/{}/pulls/{}/files?per_page={}&page={}",
                owner, repo, pr_number, PER_PAGE, page_num
            );
            let batch: Vec<Value> = self.octocrab.get(route, None::<&()>).await?;
            let batch_len = batch.len();

            for entry in batch {
                if let Some(name) = entry.get("filename").and_then(Value::as_str) {
                    files.push(name.to_string());
                }
            }

            if (batch_len as u32) < PER_PAGE {
                break;
            }
            page_num += 1;
        }

        Ok(files)
    }

    async fn fetch_labels(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<Label>> {
        let route = format!(
            "/repos/{}/{}/issues/{}/labels?per_page=100",
            owner, repo, pr_number
        );
        let raw: Vec<Value> = self.octocrab.get(route, None::<&()>).await?;

        let labels = raw
            .into_iter()
            .filter_map(|entry| {
                let name = entry.get("name").and_then(Value::as_str)?;
                let color = entry.get("color").and_then(Value::as_str).unwrap_or("");
                Some(Label::new(name, color))
            })
            .collect();

        Ok(labels)
    }

    async fn add_label(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        label: &Label,
    ) -> anyhow::Result<()> {
        debug!("Adding label '{}' to {}/{}#{}", label.name, owner, repo, pr_number);

        // Make sure the label exists in the repository with the intended
        // color. An already-existing label is fine.
        if let Err(e) = self
            .octocrab
            .issues(owner, repo)
            .create_label(&label.name, &label.color, "")
            .await
        {
            debug!("Label '{}' not created (likely exists): {}", label.name, e);
        }

        self.octocrab
            .issues(owner, repo)
            .add_labels(pr_number, &[label.name.clone()])
            .await?;
        Ok(())
    }

    async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        name: &str,
    ) -> anyhow::Result<()> {
        debug!("Removing label '{}' from {}/{}#{}", name, owner, repo, pr_number);

        match self
            .octocrab
            .issues(owner, repo)
            .remove_label(pr_number, name)
            .await
        {
            Ok(_) => Ok(()),
            // Removing an absent label already satisfies the intent.
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_check_runs(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> anyhow::Result<Vec<CheckRun>> {
        debug!("Fetching check runs for {}/{} @ {}", owner, repo, commit_sha);

        let checks = self
            .octocrab
            .checks(owner, repo)
            .list_check_runs_for_git_ref(commit_sha.to_string().into())
            .send()
            .await?;

        let runs = checks
            .check_runs
            .into_iter()
            .map(|run| {
                // Determine status based on whether completed_at is set
                let status = if run.completed_at.is_some() {
                    CheckRunStatus::Completed
                } else if run.started_at.is_some() {
                    CheckRunStatus::InProgress
                } else {
                    CheckRunStatus::Queued
                };

                CheckRun {
                    id: run.id.0,
                    name: run.name,
                    status,
                    conclusion: run.conclusion.as_ref().map(|c| convert_conclusion_string(c)),
                    started_at: run.started_at,
                    completed_at: run.completed_at,
                }
            })
            .collect();

        Ok(runs)
    }

    async fn create_check_run(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
        name: &str,
        status: CheckRunStatus,
        conclusion: Option<CheckConclusion>,
        output: Option<CheckRunOutput>,
    ) -> anyhow::Result<()> {
        debug!(
            "Creating check run '{}' on {}/{} @ {}",
            name, owner, repo, commit_sha
        );

        let mut body = json!({
            "name": name,
            "head_sha": commit_sha,
            "status": status,
        });
        if let Some(conclusion) = conclusion {
            body["conclusion"] = serde_json::to_value(conclusion)?;
        }
        if let Some(output) = output {
            body["output"] = serde_json::to_value(&output)?;
        }

        let route = format!("/repos/{}/{}/check-runs", owner, repo);
        let _: Value = self.octocrab.post(route, Some(&body)).await?;
        Ok(())
    }

    async fn fetch_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> anyhow::Result<Vec<Review>> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/reviews?per_page=100",
            owner, repo, pr_number
        );
        let raw: Vec<Value> = self.octocrab.get(route, None::<&()>).await?;

        let reviews = raw
            .into_iter()
            .filter_map(|entry| {
                let author = entry
                    .get("user")
                    .and_then(|u| u.get("login"))
                    .and_then(Value::as_str)?
                    .to_string();
                let state = match entry.get("state").and_then(Value::as_str)? {
                    "APPROVED" => ReviewState::Approved,
                    "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
                    "COMMENTED" => ReviewState::Commented,
                    "DISMISSED" => ReviewState::Dismissed,
                    other => {
                        warn!("Unrecognized review state '{}', skipping", other);
                        return None;
                    }
                };
                let submitted_at = entry
                    .get("submitted_at")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok());
                Some(Review {
                    author,
                    state,
                    submitted_at,
                })
            })
            .collect();

        Ok(reviews)
    }

    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> anyhow::Result<()> {
        self.octocrab
            .issues(owner, repo)
            .create_comment(pr_number, body)
            .await?;
        Ok(())
    }

    async fn fetch_branch_protection_contexts(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> anyhow::Result<Vec<String>> {
        let route = format!(
            "/repos/{}/{}/branches/{}/protection/required_status_checks",
            owner, repo, branch
        );
        let result: Result<Value, octocrab::Error> =
            self.octocrab.get(route, None::<&()>).await;

        match result {
            Ok(value) => {
                let contexts = value
                    .get("contexts")
                    .and_then(Value::as_array)
                    .map(|arr| {
                        arr.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(contexts)
            }
            // An unprotected branch declares no required contexts.
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_repository(&self, owner: &str, repo: &str) -> anyhow::Result<Repository> {
        let route = format!("/repos/{}/{}", owner, repo);
        let value: Value = self.octocrab.get(route, None::<&()>).await?;

        Ok(Repository {
            owner: owner.to_string(),
            name: repo.to_string(),
            private: value
                .get("private")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            default_branch: value
                .get("default_branch")
                .and_then(Value::as_str)
                .unwrap_or("main")
                .to_string(),
        })
    }

    async fn list_tree(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> anyhow::Result<Vec<String>> {
        let route = format!(
            "/repos/{}/{}/git/trees/{}?recursive=1",
            owner, repo, git_ref
        );
        let value: Value = self.octocrab.get(route, None::<&()>).await?;

        let paths = value
            .get("tree")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.get("type").and_then(Value::as_str) == Some("blob"))
                    .filter_map(|e| e.get("path").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(paths)
    }

    async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> anyhow::Result<Option<String>> {
        let result = self
            .octocrab
            .repos(owner, repo)
            .get_content()
            .path(path)
            .r#ref(git_ref)
            .send()
            .await;

        match result {
            Ok(content) => Ok(content
                .items
                .into_iter()
                .next()
                .and_then(|item| item.decoded_content())),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
    ) -> anyhow::Result<bool> {
        let route = format!(
            "/repos/{}/{}/collaborators/{}/permission",
            owner, repo, username
        );
        let result: Result<Value, octocrab::Error> =
            self.octocrab.get(route, None::<&()>).await;

        match result {
            Ok(value) => {
                let permission = value
                    .get("permission")
                    .and_then(Value::as_str)
                    .unwrap_or("none");
                Ok(permission != "none")
            }
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Convert octocrab PullRequest to our PullRequest type
fn convert_pull_request(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        body: pr.body.clone(),
        author: pr
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        draft: pr.draft.unwrap_or(false),
        merged: pr.merged_at.is_some(),
        head_sha: pr.head.sha.clone(),
        base_branch: pr.base.ref_field.clone(),
        head_branch: pr.head.ref_field.clone(),
        additions: pr.additions.unwrap_or(0),
        deletions: pr.deletions.unwrap_or(0),
        created_at: pr.created_at.unwrap_or_else(chrono::Utc::now),
        updated_at: pr.updated_at.unwrap_or_else(chrono::Utc::now),
        html_url: pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
    }
}

/// Convert an octocrab conclusion string to our enum
fn convert_conclusion_string(conclusion: &str) -> CheckConclusion {
    match conclusion {
        "success" => CheckConclusion::Success,
        "failure" => CheckConclusion::Failure,
        "neutral" => CheckConclusion::Neutral,
        "cancelled" => CheckConclusion::Cancelled,
        "skipped" => CheckConclusion::Skipped,
        "timed_out" => CheckConclusion::TimedOut,
        "action_required" => CheckConclusion::ActionRequired,
        _ => CheckConclusion::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_conclusion_string() {
        assert_eq!(convert_conclusion_string("success"), CheckConclusion::Success);
        assert_eq!(convert_conclusion_string("failure"), CheckConclusion::Failure);
        assert_eq!(convert_conclusion_string("timed_out"), CheckConclusion::TimedOut);
        assert_eq!(convert_conclusion_string("banana"), CheckConclusion::Stale);
    }
}
