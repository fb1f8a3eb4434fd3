//! Required-check computation and check-run classification
//!
//! Computes the set of status checks a pull request must pass (enabled
//! features unioned with branch-protection contexts) and classifies the
//! current check-run set into in-progress and failed subsets for the
//! decision engine.

use crate::output;
use gh_bot_config::Features;
use gh_client::{CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus, GitHubClient};
use log::{debug, warn};
use std::collections::HashMap;

/// Check name contributed by the test-run feature
pub const TEST_RUN_CHECK: &str = "tox";
/// Check name contributed by the build feature
pub const BUILD_CHECK: &str = "build";
/// Check name contributed by the package-install feature
pub const PACKAGE_INSTALL_CHECK: &str = "install";
/// Check name contributed by the title-lint feature
pub const TITLE_LINT_CHECK: &str = "pr-title";

/// Classification of the current check-run set against the required set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Required checks still running (or queued)
    pub in_progress: Vec<String>,
    /// Required checks that concluded without success
    pub failed: Vec<String>,
}

/// Check names contributed by enabled features, in fixed order
pub fn feature_checks(features: &Features) -> Vec<String> {
    let mut checks = Vec::new();
    if features.test_run {
        checks.push(TEST_RUN_CHECK.to_string());
    }
    if features.build {
        checks.push(BUILD_CHECK.to_string());
    }
    if features.package_install {
        checks.push(PACKAGE_INSTALL_CHECK.to_string());
    }
    if features.title_lint {
        checks.push(TITLE_LINT_CHECK.to_string());
    }
    checks
}

/// Union of feature checks and branch-protection contexts
///
/// Order-preserving: feature checks first, then protection contexts,
/// duplicates dropped.
pub fn required_checks(features: &Features, protection_contexts: &[String]) -> Vec<String> {
    let mut required = feature_checks(features);
    for context in protection_contexts {
        if !required.iter().any(|name| name == context) {
            required.push(context.clone());
        }
    }
    required
}

/// Classify check runs against the required set
///
/// Only checks in the required set are reported, and the merge gate's
/// own check name is never classified (a check must not depend on
/// itself). A check counts as failed when its conclusion is anything
/// other than success; queued and running checks count as in progress.
/// When a name has several runs, the newest one wins.
pub fn classify(check_runs: &[CheckRun], required: &[String], own_name: &str) -> Classification {
    let mut latest: HashMap<&str, &CheckRun> = HashMap::new();
    for run in check_runs {
        let entry = latest.entry(run.name.as_str()).or_insert(run);
        if run.id > entry.id {
            *entry = run;
        }
    }

    let mut classification = Classification::default();
    for name in required {
        if name == own_name {
            continue;
        }
        let run = match latest.get(name.as_str()) {
            Some(run) => run,
            None => continue,
        };
        match run.status {
            CheckRunStatus::Queued | CheckRunStatus::InProgress => {
                classification.in_progress.push(name.clone());
            }
            CheckRunStatus::Completed => {
                if run.conclusion != Some(CheckConclusion::Success) {
                    classification.failed.push(name.clone());
                }
            }
        }
    }
    classification
}

/// Computes required checks and reports the gate's own check run
pub struct CheckRunAggregator<'a> {
    client: &'a dyn GitHubClient,
    owner: &'a str,
    repo: &'a str,
    gate_check_name: &'a str,
}

impl<'a> CheckRunAggregator<'a> {
    pub fn new(
        client: &'a dyn GitHubClient,
        owner: &'a str,
        repo: &'a str,
        gate_check_name: &'a str,
    ) -> Self {
        Self {
            client,
            owner,
            repo,
            gate_check_name,
        }
    }

    /// Required check names for a pull request
    ///
    /// Branch protection is only introspected for public repositories;
    /// for private repositories the protection contribution is empty,
    /// which is not an error.
    pub async fn required_checks(
        &self,
        features: &Features,
        base_branch: &str,
    ) -> anyhow::Result<Vec<String>> {
        let repository = self.client.fetch_repository(self.owner, self.repo).await?;

        let contexts = if repository.private {
            debug!("Skipping branch protection for private repository");
            Vec::new()
        } else {
            self.client
                .fetch_branch_protection_contexts(self.owner, self.repo, base_branch)
                .await?
        };

        Ok(required_checks(features, &contexts))
    }

    /// Launch a check run unless one is already underway
    ///
    /// A trigger for a (commit, check-name) pair that is already queued
    /// or running is treated as a reminder; the existing run stands and
    /// no parallel run is launched. Returns true when a new run was
    /// created.
    pub async fn trigger(&self, commit_sha: &str, name: &str) -> anyhow::Result<bool> {
        let runs = self
            .client
            .fetch_check_runs(self.owner, self.repo, commit_sha)
            .await?;
        let underway = runs.iter().any(|run| {
            run.name == name
                && matches!(
                    run.status,
                    CheckRunStatus::Queued | CheckRunStatus::InProgress
                )
        });
        if underway {
            debug!("Check '{}' already underway on {}, not relaunching", name, commit_sha);
            return Ok(false);
        }

        self.client
            .create_check_run(
                self.owner,
                self.repo,
                commit_sha,
                name,
                CheckRunStatus::Queued,
                None,
                None,
            )
            .await?;
        Ok(true)
    }

    /// Report the merge gate's own check run
    ///
    /// A failed write is retried once with a degraded failure
    /// conclusion; a second failure is logged and swallowed so the
    /// evaluation itself never dies on reporting.
    pub async fn report(
        &self,
        commit_sha: &str,
        conclusion: CheckConclusion,
        output: CheckRunOutput,
    ) {
        let first = self
            .client
            .create_check_run(
                self.owner,
                self.repo,
                commit_sha,
                self.gate_check_name,
                CheckRunStatus::Completed,
                Some(conclusion),
                Some(output.clone()),
            )
            .await;

        if let Err(e) = first {
            warn!(
                "Reporting '{}' failed, retrying with failure conclusion: {}",
                self.gate_check_name, e
            );
            let degraded = output::render_output(
                &output.title,
                "Reporting the merge gate result failed; degraded to failure",
                &output.summary,
                &[],
            );
            if let Err(e) = self
                .client
                .create_check_run(
                    self.owner,
                    self.repo,
                    commit_sha,
                    self.gate_check_name,
                    CheckRunStatus::Completed,
                    Some(CheckConclusion::Failure),
                    Some(degraded),
                )
                .await
            {
                log::error!("Degraded check-run report also failed: {}", e);
            }
        }
    }
}
