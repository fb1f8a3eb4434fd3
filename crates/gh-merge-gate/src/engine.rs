//! Merge-gate decision engine
//!
//! The top-level reducer: consumes ownership resolution, label state,
//! and check-run classification, and produces a single decision plus
//! human-readable failure reasons. Rules run in a fixed order and all
//! applicable reasons are collected before the final decision, so
//! operators see every blocking condition at once.
//!
//! The engine holds no state between invocations; every evaluation
//! recomputes from current remote state, which makes concurrent and
//! repeated evaluations convergent.

use crate::checks::{classify, CheckRunAggregator};
use crate::labels::{
    self, LabelStateManager, CAN_BE_MERGED, CHANGES_REQUESTED_PREFIX, HOLD, LGTM_PREFIX, WIP,
};
use crate::output::render_output;
use crate::owners::{self, resolve_applicable};
use gh_bot_config::BotConfig;
use gh_client::{CheckConclusion, GitHubClient, ReviewState};
use log::{debug, info};
use std::collections::BTreeSet;

/// Labels that block merging outright while present
const BLOCKING_LABELS: &[&str] = &[HOLD, WIP];

/// The verdict of one evaluation
///
/// `reasons` is empty if and only if `mergeable` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDecision {
    pub mergeable: bool,
    pub reasons: Vec<String>,
}

impl MergeDecision {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            mergeable: reasons.is_empty(),
            reasons,
        }
    }
}

/// Terminal outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// The pull request is already merged; nothing to evaluate
    Skipped,
    /// A decision was produced and side effects applied
    Decided(MergeDecision),
}

/// The merge-gate decision engine for one repository
pub struct MergeGateDecisionEngine<'a> {
    client: &'a dyn GitHubClient,
    config: &'a BotConfig,
    owner: &'a str,
    repo: &'a str,
}

impl<'a> MergeGateDecisionEngine<'a> {
    pub fn new(
        client: &'a dyn GitHubClient,
        config: &'a BotConfig,
        owner: &'a str,
        repo: &'a str,
    ) -> Self {
        Self {
            client,
            config,
            owner,
            repo,
        }
    }

    /// Evaluate the merge gate for a pull request
    ///
    /// Recomputes the decision from current remote state and applies
    /// the side effects: the `can-be-merged` label tracks the verdict
    /// and the gate's own check run carries the reasons.
    pub async fn evaluate(&self, pr_number: u64) -> anyhow::Result<EvaluationOutcome> {
        let pr = self
            .client
            .fetch_pull_request(self.owner, self.repo, pr_number)
            .await?;
        if pr.merged {
            info!("PR #{} is already merged, skipping evaluation", pr_number);
            return Ok(EvaluationOutcome::Skipped);
        }

        let repository = self.client.fetch_repository(self.owner, self.repo).await?;
        let label_names: BTreeSet<String> = self
            .client
            .fetch_labels(self.owner, self.repo, pr_number)
            .await?
            .into_iter()
            .map(|l| l.name)
            .collect();
        let check_runs = self
            .client
            .fetch_check_runs(self.owner, self.repo, &pr.head_sha)
            .await?;
        let reviews = self
            .client
            .fetch_reviews(self.owner, self.repo, pr_number)
            .await?;
        let changed_files = self
            .client
            .fetch_changed_files(self.owner, self.repo, pr_number)
            .await?;
        let index = owners::load_index(
            self.client,
            self.owner,
            self.repo,
            &repository.default_branch,
        )
        .await?;
        let applicable = resolve_applicable(&index, &changed_files);

        let aggregator = CheckRunAggregator::new(
            self.client,
            self.owner,
            self.repo,
            &self.config.gate_check_name,
        );
        let required = aggregator
            .required_checks(&self.config.features, &pr.base_branch)
            .await?;
        let classification = classify(&check_runs, &required, &self.config.gate_check_name);

        let mut reasons = Vec::new();

        // (1) required checks still running
        if !classification.in_progress.is_empty() {
            reasons.push(format!(
                "Required checks are still in progress: {}",
                classification.in_progress.join(", ")
            ));
        }

        // (2) blocking labels
        for name in BLOCKING_LABELS {
            if label_names.contains(*name) {
                reasons.push(format!("Merge is blocked by the '{}' label", name));
            }
        }

        // (3) required checks failed
        if !classification.failed.is_empty() {
            reasons.push(format!(
                "Required checks failed: {}",
                classification.failed.join(", ")
            ));
        }

        // (4) changes requested by a current approver
        let approver_set = applicable.required_approvers();
        for label in &label_names {
            if let Some(user) = labels::user_from(label, CHANGES_REQUESTED_PREFIX) {
                if approver_set.contains(user) {
                    reasons.push(format!("Changes were requested by approver '{}'", user));
                }
            }
        }

        // (5) ownership approval
        let approved_users = approved_users(&label_names, &reviews);
        if !applicable.approval_satisfied(&approved_users) {
            let missing = applicable.unsatisfied_paths(&approved_users);
            reasons.push(format!(
                "Missing owner approval for: {}",
                missing.join(", ")
            ));
        }

        // (6) minimum LGTM count
        let lgtm_users: BTreeSet<&str> = label_names
            .iter()
            .filter_map(|l| labels::user_from(l, LGTM_PREFIX))
            .filter(|user| *user != pr.author)
            .collect();
        let reviewer_pool: BTreeSet<String> = applicable
            .reviewers()
            .union(&applicable.required_approvers())
            .filter(|user| **user != pr.author)
            .cloned()
            .collect();
        let min = self.config.min_lgtm as usize;
        let lgtm_count = lgtm_users.len();
        let satisfied = if lgtm_count >= min {
            true
        } else if reviewer_pool.len() < min {
            // The pool is smaller than the configured minimum; every
            // eligible reviewer signing off is as good as it gets.
            reviewer_pool
                .iter()
                .all(|user| lgtm_users.contains(user.as_str()))
        } else {
            false
        };
        if !satisfied {
            reasons.push(format!(
                "Not enough LGTMs: {} of {} required",
                lgtm_count, min
            ));
        }

        let decision = MergeDecision::from_reasons(reasons);
        debug!(
            "PR #{} decision: mergeable={} reasons={:?}",
            pr_number, decision.mergeable, decision.reasons
        );

        // Side effects: the label and the gate's own check run
        let manager = LabelStateManager::new(
            self.client,
            self.owner,
            self.repo,
            pr_number,
            self.config,
        );
        manager.ensure(CAN_BE_MERGED, decision.mergeable).await;

        let (conclusion, summary, body) = if decision.mergeable {
            (
                CheckConclusion::Success,
                "All merge requirements are satisfied".to_string(),
                "Pull request is ready to merge".to_string(),
            )
        } else {
            (
                CheckConclusion::Failure,
                format!("{} requirement(s) not met", decision.reasons.len()),
                decision.reasons.join("\n"),
            )
        };
        let output = render_output("Merge gate", &summary, &body, &self.config.secrets);
        aggregator.report(&pr.head_sha, conclusion, output).await;

        Ok(EvaluationOutcome::Decided(decision))
    }
}

/// Users carrying an approval signal: an approved review or an
/// `approved-<user>` label
fn approved_users(label_names: &BTreeSet<String>, reviews: &[gh_client::Review]) -> BTreeSet<String> {
    let mut users: BTreeSet<String> = reviews
        .iter()
        .filter(|r| r.state == ReviewState::Approved)
        .map(|r| r.author.clone())
        .collect();
    for label in label_names {
        if let Some(user) = labels::user_from(label, labels::APPROVED_PREFIX) {
            users.insert(user.to_string());
        }
    }
    users
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_client::{
        CheckRun, CheckRunStatus, InMemoryGitHubClient, Label, PullRequest, Repository, Review,
    };

    fn pull_request(number: u64, merged: bool) -> PullRequest {
        PullRequest {
            number,
            title: "Add frobnicator".to_string(),
            body: None,
            author: "author1".to_string(),
            draft: false,
            merged,
            head_sha: "sha1".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feature".to_string(),
            additions: 10,
            deletions: 2,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            html_url: "https://github.com/o/r/pull/1".to_string(),
        }
    }

    fn check(id: u64, name: &str, status: CheckRunStatus, conclusion: Option<CheckConclusion>) -> CheckRun {
        CheckRun {
            id,
            name: name.to_string(),
            status,
            conclusion,
            started_at: None,
            completed_at: None,
        }
    }

    fn approved_review(author: &str) -> Review {
        Review {
            author: author.to_string(),
            state: ReviewState::Approved,
            submitted_at: None,
        }
    }

    /// A public repo with root OWNERS {approvers: [R1], reviewers: [U1]},
    /// PR #1 by author1 touching a top-level file, both feature checks green.
    fn seeded_client() -> InMemoryGitHubClient {
        let client = InMemoryGitHubClient::new();
        client.set_repository(Repository {
            owner: "o".to_string(),
            name: "r".to_string(),
            private: false,
            default_branch: "main".to_string(),
        });
        client.put_pull_request(pull_request(1, false));
        client.set_changed_files(1, vec!["main.py".to_string()]);
        client.put_file("OWNERS", "approvers: [R1]\nreviewers: [U1]\n");
        client.put_check_run(
            "sha1",
            check(1, "tox", CheckRunStatus::Completed, Some(CheckConclusion::Success)),
        );
        client.put_check_run(
            "sha1",
            check(2, "build", CheckRunStatus::Completed, Some(CheckConclusion::Success)),
        );
        client
    }

    fn lgtm_label(user: &str) -> Label {
        Label::new(format!("lgtm-{}", user), "c2e0c6")
    }

    async fn decide(client: &InMemoryGitHubClient, config: &BotConfig) -> MergeDecision {
        let engine = MergeGateDecisionEngine::new(client, config, "o", "r");
        match engine.evaluate(1).await.unwrap() {
            EvaluationOutcome::Decided(decision) => decision,
            EvaluationOutcome::Skipped => panic!("expected a decision"),
        }
    }

    #[tokio::test]
    async fn test_skips_already_merged_pr() {
        let client = seeded_client();
        client.put_pull_request(pull_request(1, true));
        let config = BotConfig::default();

        let engine = MergeGateDecisionEngine::new(&client, &config, "o", "r");
        let outcome = engine.evaluate(1).await.unwrap();
        assert_eq!(outcome, EvaluationOutcome::Skipped);
        // No side effects for a merged PR
        assert!(client.recorded_check_runs().is_empty());
        assert!(client.labels_for(1).is_empty());
    }

    #[tokio::test]
    async fn test_mergeable_pr_gets_label_and_success_check() {
        let client = seeded_client();
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        let config = BotConfig::default();

        let decision = decide(&client, &config).await;
        assert!(decision.mergeable);
        assert!(decision.reasons.is_empty());
        assert!(client.labels_for(1).contains(&CAN_BE_MERGED.to_string()));

        let reports = client.recorded_check_runs();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "merge-gate");
        assert_eq!(reports[0].conclusion, Some(CheckConclusion::Success));
    }

    #[tokio::test]
    async fn test_in_progress_check_blocks() {
        let client = seeded_client();
        client.put_check_run("sha1", check(3, "build", CheckRunStatus::InProgress, None));
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        let config = BotConfig::default();

        let decision = decide(&client, &config).await;
        assert!(!decision.mergeable);
        assert!(decision.reasons.iter().any(|r| r.contains("in progress")));
        assert!(decision.reasons.iter().any(|r| r.contains("build")));
        assert!(!client.labels_for(1).contains(&CAN_BE_MERGED.to_string()));
    }

    #[tokio::test]
    async fn test_all_reasons_are_collected() {
        let client = seeded_client();
        // hold label, a failed check, no approval, no lgtm: four reasons
        client
            .add_label("o", "r", 1, &Label::new("hold", "b60205"))
            .await
            .unwrap();
        client.put_check_run(
            "sha1",
            check(3, "tox", CheckRunStatus::Completed, Some(CheckConclusion::Failure)),
        );
        let config = BotConfig::default();

        let decision = decide(&client, &config).await;
        assert!(!decision.mergeable);
        assert_eq!(decision.reasons.len(), 4);
        assert!(decision.reasons.iter().any(|r| r.contains("hold")));
        assert!(decision.reasons.iter().any(|r| r.contains("failed")));
        assert!(decision.reasons.iter().any(|r| r.contains("approval")));
        assert!(decision.reasons.iter().any(|r| r.contains("LGTM")));

        let reports = client.recorded_check_runs();
        assert_eq!(reports[0].conclusion, Some(CheckConclusion::Failure));
        let output = reports[0].output.as_ref().unwrap();
        assert!(output.text.contains("hold"));
    }

    #[tokio::test]
    async fn test_changes_requested_by_approver_blocks() {
        let client = seeded_client();
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        client
            .add_label("o", "r", 1, &Label::new("changes-requested-R1", "e11d21"))
            .await
            .unwrap();
        let config = BotConfig::default();

        let decision = decide(&client, &config).await;
        assert!(!decision.mergeable);
        assert!(decision
            .reasons
            .iter()
            .any(|r| r.contains("Changes were requested by approver 'R1'")));
    }

    #[tokio::test]
    async fn test_changes_requested_by_non_approver_does_not_block() {
        let client = seeded_client();
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        client
            .add_label("o", "r", 1, &Label::new("changes-requested-rando", "e11d21"))
            .await
            .unwrap();
        let config = BotConfig::default();

        let decision = decide(&client, &config).await;
        assert!(decision.mergeable);
    }

    #[tokio::test]
    async fn test_approval_via_label_only() {
        let client = seeded_client();
        client
            .add_label("o", "r", 1, &Label::new("approved-R1", "0e8a16"))
            .await
            .unwrap();
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        let config = BotConfig::default();

        let decision = decide(&client, &config).await;
        assert!(decision.mergeable);
    }

    #[tokio::test]
    async fn test_small_reviewer_pool_satisfies_min_lgtm() {
        // min_lgtm = 2 but the only eligible reviewer (author excluded)
        // is U1; once U1 LGTMs the rule is satisfied.
        let client = seeded_client();
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        client
            .add_label("o", "r", 1, &Label::new("approved-R1", "0e8a16"))
            .await
            .unwrap();
        let mut config = BotConfig::default();
        config.min_lgtm = 3;

        // Pool is {R1, U1}: smaller than 3, but R1 has not LGTM'd yet
        let decision = decide(&client, &config).await;
        assert!(!decision.mergeable);

        client
            .add_label("o", "r", 1, &lgtm_label("R1"))
            .await
            .unwrap();
        let decision = decide(&client, &config).await;
        assert!(decision.mergeable);
    }

    #[tokio::test]
    async fn test_author_lgtm_does_not_count() {
        let client = seeded_client();
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("author1"))
            .await
            .unwrap();
        let mut config = BotConfig::default();
        config.min_lgtm = 1;

        let decision = decide(&client, &config).await;
        assert!(!decision.mergeable);
        assert!(decision.reasons.iter().any(|r| r.contains("LGTM")));
    }

    #[tokio::test]
    async fn test_repeated_evaluation_converges() {
        let client = seeded_client();
        client.put_review(1, approved_review("R1"));
        client
            .add_label("o", "r", 1, &lgtm_label("U1"))
            .await
            .unwrap();
        let config = BotConfig::default();

        let first = decide(&client, &config).await;
        let second = decide(&client, &config).await;
        assert_eq!(first, second);
        // Exactly one can-be-merged label regardless of repetition
        let labels = client.labels_for(1);
        assert_eq!(
            labels.iter().filter(|l| *l == CAN_BE_MERGED).count(),
            1
        );
    }
}
