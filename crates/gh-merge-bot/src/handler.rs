//! Event routing
//!
//! Maps typed inbound events onto the merge-gate core: every event
//! ends in an engine evaluation; some first run extra work (size
//! labeling, check triggering, review mirroring, command dispatch).

use gh_bot_config::BotConfig;
use gh_client::{CheckConclusion, GitHubClient, ReviewState};
use gh_merge_gate::checks::CheckRunAggregator;
use gh_merge_gate::labels::{
    LabelStateManager, APPROVED_PREFIX, CHANGES_REQUESTED_PREFIX, COMMENTED_PREFIX,
};
use gh_merge_gate::output::render_output;
use gh_merge_gate::{CommandDispatcher, GateEvent, MergeGateDecisionEngine};
use log::{error, info, warn};
use std::sync::Arc;

/// Handle one inbound event end to end
pub async fn handle_event(
    client: Arc<dyn GitHubClient>,
    config: Arc<BotConfig>,
    owner: &str,
    repo: &str,
    event: GateEvent,
) -> anyhow::Result<()> {
    let pr_number = event.pr_number();
    info!("Handling {:?} for PR #{}", event, pr_number);

    match &event {
        GateEvent::PullRequestOpened { .. } | GateEvent::PullRequestSynchronized { .. } => {
            let pr = client.fetch_pull_request(owner, repo, pr_number).await?;

            let manager = LabelStateManager::new(&*client, owner, repo, pr_number, &config);
            manager.add_size_label(pr.additions, pr.deletions).await;

            let aggregator =
                CheckRunAggregator::new(&*client, owner, repo, &config.gate_check_name);
            let required = aggregator
                .required_checks(&config.features, &pr.base_branch)
                .await?;
            for name in &required {
                if name == &config.gate_check_name {
                    continue;
                }
                if let Err(e) = aggregator.trigger(&pr.head_sha, name).await {
                    warn!("Could not trigger check '{}': {}", name, e);
                }
            }
        }
        GateEvent::ReviewSubmitted {
            reviewer, state, ..
        } => {
            mirror_review(&*client, &config, owner, repo, pr_number, reviewer, *state).await;
        }
        GateEvent::CommentCreated { author, body, .. } => {
            let repository = client.fetch_repository(owner, repo).await?;
            let index = gh_merge_gate::load_index(
                &*client,
                owner,
                repo,
                &repository.default_branch,
            )
            .await?;

            let dispatcher = CommandDispatcher::new(
                Arc::clone(&client),
                Arc::clone(&config),
                owner,
                repo,
            );
            let outcomes = dispatcher
                .dispatch_all(pr_number, author, body, &index.maintainers())
                .await;
            for outcome in &outcomes {
                if let Err(e) = &outcome.result {
                    warn!("Command '/{}' was not applied: {}", outcome.command, e);
                }
            }
        }
        GateEvent::LabelAdded { .. }
        | GateEvent::LabelRemoved { .. }
        | GateEvent::CheckRunCompleted { .. } => {}
    }

    let engine = MergeGateDecisionEngine::new(&*client, &config, owner, repo);
    let outcome = engine.evaluate(pr_number).await?;
    info!("PR #{} evaluation outcome: {:?}", pr_number, outcome);
    Ok(())
}

/// Mirror a submitted review into its `<state>-<user>` label
///
/// The labels are the durable trace of review state; a later
/// evaluation reads them alongside the live review list.
async fn mirror_review(
    client: &dyn GitHubClient,
    config: &BotConfig,
    owner: &str,
    repo: &str,
    pr_number: u64,
    reviewer: &str,
    state: ReviewState,
) {
    let manager = LabelStateManager::new(client, owner, repo, pr_number, config);
    let approved = format!("{}{}", APPROVED_PREFIX, reviewer);
    let changes = format!("{}{}", CHANGES_REQUESTED_PREFIX, reviewer);
    let commented = format!("{}{}", COMMENTED_PREFIX, reviewer);

    match state {
        ReviewState::Approved => {
            manager.ensure(&changes, false).await;
            manager.ensure(&approved, true).await;
        }
        ReviewState::ChangesRequested => {
            manager.ensure(&approved, false).await;
            manager.ensure(&changes, true).await;
        }
        ReviewState::Commented => {
            manager.ensure(&commented, true).await;
        }
        ReviewState::Dismissed => {
            manager.ensure(&approved, false).await;
            manager.ensure(&changes, false).await;
        }
    }
}

/// Outer error boundary
///
/// An evaluation that dies unexpectedly is surfaced as a failed gate
/// check run on the PR's head commit, never as a process crash.
pub async fn report_unexpected_failure(
    client: &dyn GitHubClient,
    config: &BotConfig,
    owner: &str,
    repo: &str,
    pr_number: u64,
    err: &anyhow::Error,
) {
    error!("Evaluation of PR #{} failed: {:#}", pr_number, err);

    let head_sha = match client.fetch_pull_request(owner, repo, pr_number).await {
        Ok(pr) => pr.head_sha,
        Err(e) => {
            error!("Cannot report failure for PR #{}: {}", pr_number, e);
            return;
        }
    };

    let output = render_output(
        "Merge gate",
        "The evaluation failed unexpectedly",
        &format!("{:#}", err),
        &config.secrets,
    );
    let aggregator = CheckRunAggregator::new(client, owner, repo, &config.gate_check_name);
    aggregator
        .report(&head_sha, CheckConclusion::Failure, output)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_client::{
        CheckRunStatus, InMemoryGitHubClient, PullRequest, Repository,
    };

    fn seeded_client() -> Arc<InMemoryGitHubClient> {
        let client = Arc::new(InMemoryGitHubClient::new());
        client.set_repository(Repository {
            owner: "o".to_string(),
            name: "r".to_string(),
            private: false,
            default_branch: "main".to_string(),
        });
        client.put_pull_request(PullRequest {
            number: 1,
            title: "t".to_string(),
            body: None,
            author: "author1".to_string(),
            draft: false,
            merged: false,
            head_sha: "sha1".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feature".to_string(),
            additions: 30,
            deletions: 5,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            html_url: String::new(),
        });
        client.set_changed_files(1, vec!["main.py".to_string()]);
        client.put_file("OWNERS", "approvers: [R1]\n");
        client
    }

    #[tokio::test]
    async fn test_pr_opened_sizes_triggers_and_evaluates() {
        let client = seeded_client();
        let config = Arc::new(BotConfig::default());

        handle_event(
            client.clone() as Arc<dyn GitHubClient>,
            config,
            "o",
            "r",
            GateEvent::PullRequestOpened { number: 1 },
        )
        .await
        .unwrap();

        // additions + deletions = 35 lands in size/S
        assert!(client.labels_for(1).contains(&"size/S".to_string()));

        // Both feature checks were launched, plus the gate's own report
        let recorded = client.recorded_check_runs();
        let names: Vec<&str> = recorded.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"tox"));
        assert!(names.contains(&"build"));
        assert!(names.contains(&"merge-gate"));
    }

    #[tokio::test]
    async fn test_review_submitted_mirrors_label() {
        let client = seeded_client();
        let config = Arc::new(BotConfig::default());

        handle_event(
            client.clone() as Arc<dyn GitHubClient>,
            config.clone(),
            "o",
            "r",
            GateEvent::ReviewSubmitted {
                number: 1,
                reviewer: "R1".to_string(),
                state: ReviewState::Approved,
            },
        )
        .await
        .unwrap();
        assert!(client.labels_for(1).contains(&"approved-R1".to_string()));

        // A later changes-requested review flips the labels
        handle_event(
            client.clone() as Arc<dyn GitHubClient>,
            config,
            "o",
            "r",
            GateEvent::ReviewSubmitted {
                number: 1,
                reviewer: "R1".to_string(),
                state: ReviewState::ChangesRequested,
            },
        )
        .await
        .unwrap();
        let labels = client.labels_for(1);
        assert!(!labels.contains(&"approved-R1".to_string()));
        assert!(labels.contains(&"changes-requested-R1".to_string()));
    }

    #[tokio::test]
    async fn test_comment_dispatches_commands_then_evaluates() {
        let client = seeded_client();
        client.add_collaborator("carol");
        let config = Arc::new(BotConfig::default());

        handle_event(
            client.clone() as Arc<dyn GitHubClient>,
            config,
            "o",
            "r",
            GateEvent::CommentCreated {
                number: 1,
                author: "carol".to_string(),
                body: "/lgtm".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(client.labels_for(1).contains(&"lgtm-carol".to_string()));
        // The evaluation after dispatch reported the gate check
        assert!(client
            .recorded_check_runs()
            .iter()
            .any(|r| r.name == "merge-gate"));
    }

    #[tokio::test]
    async fn test_check_completed_reevaluates() {
        let client = seeded_client();
        client.put_check_run(
            "sha1",
            gh_client::CheckRun {
                id: 1,
                name: "tox".to_string(),
                status: CheckRunStatus::Completed,
                conclusion: Some(CheckConclusion::Success),
                started_at: None,
                completed_at: None,
            },
        );
        let config = Arc::new(BotConfig::default());

        handle_event(
            client.clone() as Arc<dyn GitHubClient>,
            config,
            "o",
            "r",
            GateEvent::CheckRunCompleted {
                number: 1,
                check_name: "tox".to_string(),
            },
        )
        .await
        .unwrap();

        let recorded = client.recorded_check_runs();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].name, "merge-gate");
        // build has no run yet and tox alone cannot pass the gate
        assert_eq!(recorded[0].conclusion, Some(CheckConclusion::Failure));
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_reported_as_check() {
        let client = seeded_client();
        let config = BotConfig::default();
        let err = anyhow::anyhow!("listing tree exploded");

        report_unexpected_failure(&*client, &config, "o", "r", 1, &err).await;

        let recorded = client.recorded_check_runs();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].conclusion, Some(CheckConclusion::Failure));
        assert!(recorded[0]
            .output
            .as_ref()
            .unwrap()
            .text
            .contains("listing tree exploded"));
    }
}
