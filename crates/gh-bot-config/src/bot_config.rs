//! Bot configuration
//!
//! Configuration loaded from .gh-merge-bot.toml.

use serde::{Deserialize, Serialize};

/// Per-feature enable flags
///
/// Each enabled feature contributes one check name to the required
/// check set of every pull request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Features {
    /// Run the test suite check (contributes "tox")
    #[serde(default = "default_true")]
    pub test_run: bool,

    /// Run the build check (contributes "build")
    #[serde(default = "default_true")]
    pub build: bool,

    /// Run the package installability check (contributes "install")
    #[serde(default)]
    pub package_install: bool,

    /// Lint the PR title (contributes "pr-title")
    #[serde(default)]
    pub title_lint: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Features {
    fn default() -> Self {
        Self {
            test_run: true,
            build: true,
            package_install: false,
            title_lint: false,
        }
    }
}

/// One size-label bucket boundary
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SizeThreshold {
    /// Upper bound (exclusive) on additions + deletions for this bucket
    pub threshold: u64,
    /// Bucket name appended to the "size/" prefix (e.g. "M")
    pub label: String,
    /// Label color as six-digit hex without '#'
    pub color: String,
}

/// Bot configuration loaded from .gh-merge-bot.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    /// Minimum number of distinct non-owner LGTM reviewers
    #[serde(default = "default_min_lgtm")]
    pub min_lgtm: u32,

    /// Custom size buckets, ascending by threshold; built-in defaults
    /// are used when empty
    #[serde(default)]
    pub size_thresholds: Vec<SizeThreshold>,

    /// Per-feature enable flags
    #[serde(default)]
    pub features: Features,

    /// Commands allowed on draft pull requests
    #[serde(default = "default_draft_commands")]
    pub draft_commands: Vec<String>,

    /// Secret strings masked in any check-run output
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Name of the merge gate's own check run
    #[serde(default = "default_gate_check_name")]
    pub gate_check_name: String,

    /// How long to wait for a label write to become observable (seconds)
    #[serde(default = "default_label_confirm_timeout_secs")]
    pub label_confirm_timeout_secs: u64,

    /// Fixed backoff between label confirmation polls (seconds)
    #[serde(default = "default_label_confirm_interval_secs")]
    pub label_confirm_interval_secs: u64,
}

fn default_min_lgtm() -> u32 {
    1
}

fn default_draft_commands() -> Vec<String> {
    vec!["hold".to_string(), "wip".to_string()]
}

fn default_gate_check_name() -> String {
    "merge-gate".to_string()
}

fn default_label_confirm_timeout_secs() -> u64 {
    30
}

fn default_label_confirm_interval_secs() -> u64 {
    3
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            min_lgtm: default_min_lgtm(),
            size_thresholds: Vec::new(),
            features: Features::default(),
            draft_commands: default_draft_commands(),
            secrets: Vec::new(),
            gate_check_name: default_gate_check_name(),
            label_confirm_timeout_secs: default_label_confirm_timeout_secs(),
            label_confirm_interval_secs: default_label_confirm_interval_secs(),
        }
    }
}

impl BotConfig {
    /// Load config from CWD first, then home directory, or use defaults
    pub fn load() -> Self {
        if let Some(content) = crate::load_config_file() {
            match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded bot config from file");
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                }
            }
        }

        log::debug!("Using default bot config");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.min_lgtm, 1);
        assert!(config.size_thresholds.is_empty());
        assert!(config.features.test_run);
        assert!(config.features.build);
        assert!(!config.features.package_install);
        assert_eq!(config.gate_check_name, "merge-gate");
        assert_eq!(config.label_confirm_timeout_secs, 30);
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            min_lgtm = 2
            secrets = ["hunter2"]

            [features]
            title_lint = true

            [[size_thresholds]]
            threshold = 10
            label = "tiny"
            color = "00ff00"
        "#;
        let config: BotConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.min_lgtm, 2);
        assert_eq!(config.secrets, vec!["hunter2".to_string()]);
        assert!(config.features.title_lint);
        // test_run keeps its default when the section is partial
        assert!(config.features.test_run);
        assert_eq!(config.size_thresholds.len(), 1);
        assert_eq!(config.size_thresholds[0].label, "tiny");
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml = r#"
            min_lgtm = 3
        "#;
        let config: BotConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.min_lgtm, 3);
        assert_eq!(config.gate_check_name, "merge-gate");
        assert_eq!(config.draft_commands, vec!["hold", "wip"]);
    }
}
