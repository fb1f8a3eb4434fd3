//! Label vocabulary and state management
//!
//! Owns the recognized label set (static names, prefix-based dynamic
//! families, size buckets), color resolution, and idempotent label
//! add/remove with bounded eventual-consistency confirmation.
//!
//! Color assignment is a pure function of the label name and the
//! injected tables; there is no process-global color state.

use gh_bot_config::{BotConfig, SizeThreshold};
use gh_client::{GitHubClient, Label};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Labels longer than this are rejected, not truncated
pub const MAX_LABEL_LEN: usize = 49;

// Static label names
pub const HOLD: &str = "hold";
pub const VERIFIED: &str = "verified";
pub const WIP: &str = "wip";
pub const CAN_BE_MERGED: &str = "can-be-merged";
pub const NEEDS_REBASE: &str = "needs-rebase";
pub const HAS_CONFLICTS: &str = "has-conflicts";
pub const AUTOMERGE: &str = "automerge";
pub const LGTM: &str = "lgtm";
pub const APPROVE: &str = "approve";

// Dynamic label family prefixes
pub const SIZE_PREFIX: &str = "size/";
pub const BRANCH_PREFIX: &str = "branch-";
pub const CHERRY_PICK_PREFIX: &str = "cherry-pick-";
pub const APPROVED_PREFIX: &str = "approved-";
pub const LGTM_PREFIX: &str = "lgtm-";
pub const CHANGES_REQUESTED_PREFIX: &str = "changes-requested-";
pub const COMMENTED_PREFIX: &str = "commented-";

/// Neutral fallback when no table matches
pub const DEFAULT_COLOR: &str = "ededed";

/// Fixed colors for exact-match static labels
const STATIC_COLORS: &[(&str, &str)] = &[
    (HOLD, "b60205"),
    (VERIFIED, "0e8a16"),
    (WIP, "fbca04"),
    (CAN_BE_MERGED, "0e8a16"),
    (NEEDS_REBASE, "d93f0b"),
    (HAS_CONFLICTS, "e11d21"),
    (AUTOMERGE, "1d76db"),
    (LGTM, "0e8a16"),
    (APPROVE, "006b75"),
];

/// Prefix→color table for dynamic families, longest prefix wins
const PREFIX_COLORS: &[(&str, &str)] = &[
    (BRANCH_PREFIX, "1d76db"),
    (CHERRY_PICK_PREFIX, "5319e7"),
    (APPROVED_PREFIX, "0e8a16"),
    (LGTM_PREFIX, "c2e0c6"),
    (CHANGES_REQUESTED_PREFIX, "e11d21"),
    (COMMENTED_PREFIX, "bfdadc"),
];

/// Category of a recognized label
///
/// Categories determine color source and whether multiple instances of
/// the category may coexist on a PR (size labels: at most one;
/// reviewed-by-kind labels: one per distinct user and state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelCategory {
    Static,
    Sized,
    Branch,
    CherryPick,
    ReviewedByKind,
}

/// Classify a label name into its category
pub fn categorize(name: &str) -> LabelCategory {
    if STATIC_COLORS.iter().any(|(n, _)| *n == name) {
        return LabelCategory::Static;
    }
    if name.starts_with(SIZE_PREFIX) {
        return LabelCategory::Sized;
    }
    if name.starts_with(BRANCH_PREFIX) {
        return LabelCategory::Branch;
    }
    if name.starts_with(CHERRY_PICK_PREFIX) {
        return LabelCategory::CherryPick;
    }
    if name.starts_with(APPROVED_PREFIX)
        || name.starts_with(LGTM_PREFIX)
        || name.starts_with(CHANGES_REQUESTED_PREFIX)
        || name.starts_with(COMMENTED_PREFIX)
    {
        return LabelCategory::ReviewedByKind;
    }
    LabelCategory::Static
}

/// Extract the user from a `<prefix><user>` label
pub fn user_from<'a>(label: &'a str, prefix: &str) -> Option<&'a str> {
    label.strip_prefix(prefix).filter(|user| !user.is_empty())
}

/// Built-in size buckets, ascending
///
/// The final bucket catches everything past the last real threshold.
pub fn default_size_buckets() -> Vec<SizeThreshold> {
    let bucket = |threshold: u64, label: &str, color: &str| SizeThreshold {
        threshold,
        label: label.to_string(),
        color: color.to_string(),
    };
    vec![
        bucket(20, "XS", "3cbf00"),
        bucket(50, "S", "5d9801"),
        bucket(100, "M", "7f7203"),
        bucket(300, "L", "a14c05"),
        bucket(500, "XL", "c32607"),
        bucket(u64::MAX, "XXL", "e11d21"),
    ]
}

/// Select the bucket for a change of the given size
///
/// First bucket whose threshold exceeds `size`; the last bucket when
/// `size` exceeds every threshold.
pub fn bucket_for(size: u64, buckets: &[SizeThreshold]) -> &SizeThreshold {
    buckets
        .iter()
        .find(|b| b.threshold > size)
        .unwrap_or_else(|| buckets.last().expect("size buckets must not be empty"))
}

/// Resolve the color for a label name
///
/// Static table first, then size buckets, then longest-prefix match,
/// then the neutral default.
pub fn color_for<'a>(name: &str, buckets: &'a [SizeThreshold]) -> &'a str {
    if let Some((_, color)) = STATIC_COLORS.iter().find(|(n, _)| *n == name) {
        return color;
    }
    if let Some(bucket_name) = name.strip_prefix(SIZE_PREFIX) {
        if let Some(bucket) = buckets.iter().find(|b| b.label == bucket_name) {
            return bucket.color.as_str();
        }
        return DEFAULT_COLOR;
    }
    PREFIX_COLORS
        .iter()
        .filter(|(prefix, _)| name.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COLOR)
}

/// Idempotent label state manager for one pull request
///
/// Wraps the label store's add/remove with intent confirmation: after a
/// state-changing write, the externally observed label set is polled
/// with fixed backoff until it matches the intended state or the
/// bounded wait runs out.
pub struct LabelStateManager<'a> {
    client: &'a dyn GitHubClient,
    owner: &'a str,
    repo: &'a str,
    pr_number: u64,
    size_buckets: Vec<SizeThreshold>,
    confirm_timeout: Duration,
    confirm_interval: Duration,
}

impl<'a> LabelStateManager<'a> {
    pub fn new(
        client: &'a dyn GitHubClient,
        owner: &'a str,
        repo: &'a str,
        pr_number: u64,
        config: &BotConfig,
    ) -> Self {
        let size_buckets = if config.size_thresholds.is_empty() {
            default_size_buckets()
        } else {
            config.size_thresholds.clone()
        };
        Self {
            client,
            owner,
            repo,
            pr_number,
            size_buckets,
            confirm_timeout: Duration::from_secs(config.label_confirm_timeout_secs),
            confirm_interval: Duration::from_secs(config.label_confirm_interval_secs),
        }
    }

    pub fn size_buckets(&self) -> &[SizeThreshold] {
        &self.size_buckets
    }

    /// Drive the label toward the intended presence state
    ///
    /// Returns true once the end state matches `present`, false when it
    /// could not be confirmed within the bounded wait. Adding an
    /// already-present label or removing an absent one is a no-op that
    /// still succeeds.
    pub async fn ensure(&self, name: &str, present: bool) -> bool {
        if name.len() > MAX_LABEL_LEN {
            warn!(
                "Rejecting label '{}': {} chars exceeds the {} limit",
                name,
                name.len(),
                MAX_LABEL_LEN
            );
            return false;
        }

        match self.observed_presence(name).await {
            Some(observed) if observed == present => {
                debug!("Label '{}' already in intended state", name);
                return true;
            }
            Some(_) => {}
            None => return false,
        }

        let write = if present {
            let label = Label::new(name, color_for(name, &self.size_buckets));
            self.client
                .add_label(self.owner, self.repo, self.pr_number, &label)
                .await
        } else {
            self.client
                .remove_label(self.owner, self.repo, self.pr_number, name)
                .await
        };

        if let Err(e) = write {
            warn!("Label write for '{}' failed, state unconfirmed: {}", name, e);
            return false;
        }

        self.confirm(name, present).await
    }

    /// Apply the size-bucket label for a change of the given magnitude
    ///
    /// Any other size-category label is removed first so that at most
    /// one `size/*` label exists at a time.
    pub async fn add_size_label(&self, additions: u64, deletions: u64) -> bool {
        let size = additions + deletions;
        let bucket = bucket_for(size, &self.size_buckets);
        let target = format!("{}{}", SIZE_PREFIX, bucket.label);

        let current = match self
            .client
            .fetch_labels(self.owner, self.repo, self.pr_number)
            .await
        {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Could not read labels before size bucketing: {}", e);
                return false;
            }
        };

        for label in &current {
            if label.name.starts_with(SIZE_PREFIX) && label.name != target {
                self.ensure(&label.name, false).await;
            }
        }

        self.ensure(&target, true).await
    }

    /// Observed presence of the label, None when the store is unreadable
    async fn observed_presence(&self, name: &str) -> Option<bool> {
        match self
            .client
            .fetch_labels(self.owner, self.repo, self.pr_number)
            .await
        {
            Ok(labels) => Some(labels.iter().any(|l| l.name == name)),
            Err(e) => {
                warn!("Could not read labels for '{}': {}", name, e);
                None
            }
        }
    }

    /// Poll until the observed state matches intent or the wait runs out
    async fn confirm(&self, name: &str, present: bool) -> bool {
        let started = Instant::now();
        loop {
            if self.observed_presence(name).await == Some(present) {
                return true;
            }
            if started.elapsed() >= self.confirm_timeout {
                warn!(
                    "Label '{}' state unconfirmed after {:?}",
                    name, self.confirm_timeout
                );
                return false;
            }
            tokio::time::sleep(self.confirm_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_client::InMemoryGitHubClient;

    fn manager<'a>(client: &'a InMemoryGitHubClient, config: &BotConfig) -> LabelStateManager<'a> {
        LabelStateManager::new(client, "owner", "repo", 1, config)
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("hold"), LabelCategory::Static);
        assert_eq!(categorize("lgtm"), LabelCategory::Static);
        assert_eq!(categorize("size/XL"), LabelCategory::Sized);
        assert_eq!(categorize("branch-f42"), LabelCategory::Branch);
        assert_eq!(categorize("cherry-pick-stable"), LabelCategory::CherryPick);
        assert_eq!(categorize("lgtm-alice"), LabelCategory::ReviewedByKind);
        assert_eq!(categorize("approved-bob"), LabelCategory::ReviewedByKind);
        assert_eq!(
            categorize("changes-requested-carol"),
            LabelCategory::ReviewedByKind
        );
    }

    #[test]
    fn test_user_from() {
        assert_eq!(user_from("lgtm-alice", LGTM_PREFIX), Some("alice"));
        assert_eq!(user_from("lgtm-", LGTM_PREFIX), None);
        assert_eq!(user_from("hold", LGTM_PREFIX), None);
    }

    #[test]
    fn test_bucket_for_defaults() {
        let buckets = default_size_buckets();
        assert_eq!(bucket_for(0, &buckets).label, "XS");
        assert_eq!(bucket_for(19, &buckets).label, "XS");
        assert_eq!(bucket_for(20, &buckets).label, "S");
        assert_eq!(bucket_for(99, &buckets).label, "M");
        assert_eq!(bucket_for(450 + 60, &buckets).label, "XXL");
    }

    #[test]
    fn test_bucket_for_custom_overflow_uses_last() {
        let buckets = vec![
            SizeThreshold {
                threshold: 10,
                label: "small".to_string(),
                color: "aaaaaa".to_string(),
            },
            SizeThreshold {
                threshold: 40,
                label: "big".to_string(),
                color: "bbbbbb".to_string(),
            },
        ];
        assert_eq!(bucket_for(5, &buckets).label, "small");
        assert_eq!(bucket_for(1000, &buckets).label, "big");
    }

    #[test]
    fn test_color_for_static() {
        let buckets = default_size_buckets();
        assert_eq!(color_for("hold", &buckets), "b60205");
        assert_eq!(color_for("can-be-merged", &buckets), "0e8a16");
    }

    #[test]
    fn test_color_for_size() {
        let buckets = default_size_buckets();
        assert_eq!(color_for("size/XS", &buckets), "3cbf00");
        assert_eq!(color_for("size/nope", &buckets), DEFAULT_COLOR);
    }

    #[test]
    fn test_color_for_longest_prefix() {
        let buckets = default_size_buckets();
        // "changes-requested-" must win over any shorter prefix
        assert_eq!(color_for("changes-requested-alice", &buckets), "e11d21");
        assert_eq!(color_for("lgtm-alice", &buckets), "c2e0c6");
        assert_eq!(color_for("totally-unknown", &buckets), DEFAULT_COLOR);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let client = InMemoryGitHubClient::new();
        let config = BotConfig::default();
        let manager = manager(&client, &config);

        assert!(manager.ensure("hold", true).await);
        // Second call observes the intended state and is a no-op
        assert!(manager.ensure("hold", true).await);
        assert_eq!(client.labels_for(1), vec!["hold".to_string()]);

        assert!(manager.ensure("hold", false).await);
        assert!(manager.ensure("hold", false).await);
        assert!(client.labels_for(1).is_empty());
    }

    #[tokio::test]
    async fn test_ensure_rejects_oversized_label() {
        let client = InMemoryGitHubClient::new();
        let config = BotConfig::default();
        let manager = manager(&client, &config);

        let long_name = "x".repeat(MAX_LABEL_LEN + 1);
        assert!(!manager.ensure(&long_name, true).await);
        assert!(client.labels_for(1).is_empty());
    }

    #[tokio::test]
    async fn test_ensure_unconfirmed_on_write_failure() {
        let client = InMemoryGitHubClient::new();
        let config = BotConfig::default();
        client.fail_label_writes(true);
        let manager = manager(&client, &config);

        assert!(!manager.ensure("hold", true).await);
    }

    #[tokio::test]
    async fn test_at_most_one_size_label() {
        let client = InMemoryGitHubClient::new();
        let config = BotConfig::default();
        let manager = manager(&client, &config);

        assert!(manager.add_size_label(5, 5).await);
        assert_eq!(client.labels_for(1), vec!["size/XS".to_string()]);

        assert!(manager.add_size_label(450, 60).await);
        assert_eq!(client.labels_for(1), vec!["size/XXL".to_string()]);

        // Re-applying the same bucket keeps exactly one label
        assert!(manager.add_size_label(450, 60).await);
        assert_eq!(client.labels_for(1), vec!["size/XXL".to_string()]);
    }
}
