//! Slash-command parsing and dispatch
//!
//! Parses newline-delimited `/command [args]` tokens from a comment
//! body and routes recognized commands to label operations. Unknown
//! commands are silently ignored. Each command runs as an independent
//! task; outcomes are gathered per command and one command's failure
//! never cancels its siblings.

use crate::error::{GateError, GateResult};
use crate::labels::{LabelStateManager, AUTOMERGE, HOLD, LGTM_PREFIX, WIP};
use gh_bot_config::BotConfig;
use gh_client::GitHubClient;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;

/// One `/command [args]` token parsed from a comment line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// `cancel` as the sole argument means "remove instead of add"
    pub fn cancel(&self) -> bool {
        self.args.len() == 1 && self.args[0] == "cancel"
    }
}

/// Parse all slash-commands from a comment body, one per line
pub fn parse_commands(body: &str) -> Vec<ParsedCommand> {
    let pattern = Regex::new(r"^/([a-z][a-z-]*)(?:\s+(.+))?$").expect("command pattern is valid");

    body.lines()
        .filter_map(|line| {
            let captures = pattern.captures(line.trim())?;
            let name = captures.get(1)?.as_str().to_string();
            let args = captures
                .get(2)
                .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            Some(ParsedCommand { name, args })
        })
        .collect()
}

/// Commands the dispatcher recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Block merging until released (privileged)
    Hold,
    /// Mark the PR as work in progress
    Wip,
    /// Leave an LGTM signal as the issuer
    Lgtm,
    /// Queue the PR for automatic merge once the gate passes (privileged)
    Automerge,
}

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hold" => Some(Self::Hold),
            "wip" => Some(Self::Wip),
            "lgtm" => Some(Self::Lgtm),
            "automerge" => Some(Self::Automerge),
            _ => None,
        }
    }

    /// Privileged commands require maintainer membership
    pub fn privileged(&self) -> bool {
        matches!(self, Self::Hold | Self::Automerge)
    }

    /// The label this command toggles
    pub fn label_for(&self, issuer: &str) -> String {
        match self {
            Self::Hold => HOLD.to_string(),
            Self::Wip => WIP.to_string(),
            Self::Automerge => AUTOMERGE.to_string(),
            Self::Lgtm => format!("{}{}", LGTM_PREFIX, issuer),
        }
    }
}

/// Tagged result of one dispatched command
#[derive(Debug)]
pub struct CommandOutcome {
    pub command: String,
    pub result: GateResult<()>,
}

/// Routes parsed commands to label operations with per-command
/// authorization and isolated, concurrent execution
pub struct CommandDispatcher {
    client: Arc<dyn GitHubClient>,
    config: Arc<BotConfig>,
    owner: String,
    repo: String,
}

impl CommandDispatcher {
    pub fn new(
        client: Arc<dyn GitHubClient>,
        config: Arc<BotConfig>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse and dispatch every command in a comment body
    ///
    /// Commands run concurrently; all outcomes are collected before
    /// returning. `maintainers` is the approver/allowed-user set used
    /// for privileged-command authorization.
    pub async fn dispatch_all(
        &self,
        pr_number: u64,
        issuer: &str,
        body: &str,
        maintainers: &BTreeSet<String>,
    ) -> Vec<CommandOutcome> {
        let commands: Vec<(ParsedCommand, CommandKind)> = parse_commands(body)
            .into_iter()
            .filter_map(|cmd| {
                match CommandKind::from_name(&cmd.name) {
                    Some(kind) => Some((cmd, kind)),
                    None => {
                        debug!("Ignoring unknown command '/{}'", cmd.name);
                        None
                    }
                }
            })
            .collect();

        let mut set = JoinSet::new();
        for (cmd, kind) in commands {
            let client = Arc::clone(&self.client);
            let config = Arc::clone(&self.config);
            let owner = self.owner.clone();
            let repo = self.repo.clone();
            let issuer = issuer.to_string();
            let maintainers = maintainers.clone();

            set.spawn(async move {
                let name = cmd.name.clone();
                let result = run_command(
                    client, config, owner, repo, pr_number, issuer, maintainers, cmd, kind,
                )
                .await;
                CommandOutcome {
                    command: name,
                    result,
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Err(e) = &outcome.result {
                        warn!("Command '/{}' failed: {}", outcome.command, e);
                    }
                    outcomes.push(outcome);
                }
                Err(e) => warn!("Command task panicked: {}", e),
            }
        }
        outcomes
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_command(
    client: Arc<dyn GitHubClient>,
    config: Arc<BotConfig>,
    owner: String,
    repo: String,
    pr_number: u64,
    issuer: String,
    maintainers: BTreeSet<String>,
    cmd: ParsedCommand,
    kind: CommandKind,
) -> GateResult<()> {
    let pr = client
        .fetch_pull_request(&owner, &repo, pr_number)
        .await
        .map_err(GateError::TransientRemote)?;

    if pr.draft && !config.draft_commands.iter().any(|c| *c == cmd.name) {
        info!(
            "Command '/{}' is not allowed on draft PR #{}, ignoring",
            cmd.name, pr_number
        );
        return Ok(());
    }

    let authorized = if kind.privileged() {
        maintainers.contains(&issuer)
    } else {
        client
            .is_collaborator(&owner, &repo, &issuer)
            .await
            .map_err(GateError::TransientRemote)?
    };

    if !authorized {
        let explanation = format!(
            "@{} you are not authorized to run `/{}` on this repository.",
            issuer, cmd.name
        );
        if let Err(e) = client.post_comment(&owner, &repo, pr_number, &explanation).await {
            warn!("Could not post authorization comment: {}", e);
        }
        return Err(GateError::Authorization {
            user: issuer,
            command: cmd.name,
        });
    }

    let label = kind.label_for(&issuer);
    let manager = LabelStateManager::new(&*client, &owner, &repo, pr_number, &config);
    manager.ensure(&label, !cmd.cancel()).await;
    Ok(())
}
