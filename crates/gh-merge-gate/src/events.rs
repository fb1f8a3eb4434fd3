//! Typed inbound events
//!
//! The webhook transport lives outside this crate; by the time an
//! event reaches the core it has been reduced to one of these
//! variants. Every variant triggers a fresh engine evaluation; some
//! carry extra work (command dispatch, review mirroring, size label).

use gh_client::ReviewState;
use serde::{Deserialize, Serialize};

/// One inbound event the merge gate reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateEvent {
    /// A pull request was opened
    PullRequestOpened { number: u64 },
    /// New commits were pushed to a pull request
    PullRequestSynchronized { number: u64 },
    /// A label was added to a pull request
    LabelAdded { number: u64, label: String },
    /// A label was removed from a pull request
    LabelRemoved { number: u64, label: String },
    /// A check run finished
    CheckRunCompleted { number: u64, check_name: String },
    /// A review was submitted
    ReviewSubmitted {
        number: u64,
        reviewer: String,
        state: ReviewState,
    },
    /// An issue comment was created on a pull request
    CommentCreated {
        number: u64,
        author: String,
        body: String,
    },
}

impl GateEvent {
    /// The pull request this event concerns
    pub fn pr_number(&self) -> u64 {
        match self {
            Self::PullRequestOpened { number }
            | Self::PullRequestSynchronized { number }
            | Self::LabelAdded { number, .. }
            | Self::LabelRemoved { number, .. }
            | Self::CheckRunCompleted { number, .. }
            | Self::ReviewSubmitted { number, .. }
            | Self::CommentCreated { number, .. } => *number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let event = GateEvent::ReviewSubmitted {
            number: 7,
            reviewer: "alice".to_string(),
            state: ReviewState::Approved,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"review_submitted\""));
        let back: GateEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_envelope_decodes_comment() {
        let json = r#"{"type":"comment_created","number":3,"author":"bob","body":"/lgtm"}"#;
        let event: GateEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.pr_number(), 3);
        assert!(matches!(event, GateEvent::CommentCreated { .. }));
    }
}
