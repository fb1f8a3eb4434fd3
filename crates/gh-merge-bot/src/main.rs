//! Merge bot entry point
//!
//! Wires config, logging, and the GitHub client together and consumes
//! pre-parsed event envelopes as JSON lines on stdin, one per event.
//! The webhook HTTP transport lives outside this binary; whatever
//! receives the webhooks reduces them to `GateEvent` envelopes and
//! pipes them in.

mod handler;

use anyhow::Context;
use gh_bot_config::BotConfig;
use gh_client::{GitHubClient, OctocrabClient};
use gh_merge_gate::GateEvent;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set")?;
    let repository =
        std::env::var("GITHUB_REPOSITORY").context("GITHUB_REPOSITORY is not set")?;
    let (owner, repo) = repository
        .split_once('/')
        .context("GITHUB_REPOSITORY must look like 'owner/repo'")?;

    let config = Arc::new(BotConfig::load());
    let octocrab = octocrab::Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to build the GitHub client")?;
    let client: Arc<dyn GitHubClient> = Arc::new(OctocrabClient::new(Arc::new(octocrab)));

    info!("Merge bot ready for {}/{}", owner, repo);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let event: GateEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping undecodable event envelope: {}", e);
                continue;
            }
        };

        let pr_number = event.pr_number();
        if let Err(e) =
            handler::handle_event(Arc::clone(&client), Arc::clone(&config), owner, repo, event)
                .await
        {
            handler::report_unexpected_failure(&*client, &config, owner, repo, pr_number, &e)
                .await;
        }
    }

    info!("Event stream closed, shutting down");
    Ok(())
}
