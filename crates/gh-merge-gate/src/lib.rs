//! Merge-gating decision engine
//!
//! This crate is the core of the merge bot: it resolves who must
//! approve a pull request from hierarchical OWNERS files, tracks label
//! and check-run state as signals, and combines those signals into a
//! single mergeable/not-mergeable verdict with idempotent
//! re-evaluation.
//!
//! # Architecture
//!
//! ```text
//!  inbound event
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────┐
//! │          MergeGateDecisionEngine             │
//! │  fixed-order rules, all reasons collected    │
//! └──────┬───────────────┬───────────────┬───────┘
//!        ▼               ▼               ▼
//! ┌────────────┐  ┌──────────────┐  ┌────────────────┐
//! │ owners     │  │ labels       │  │ checks         │
//! │ (resolve)  │  │ (state mgmt) │  │ (classify)     │
//! └────────────┘  └──────────────┘  └────────────────┘
//! ```
//!
//! Slash-commands from comments are parsed and routed by
//! [`commands::CommandDispatcher`]; typed inbound events live in
//! [`events`]. All data is recomputed from remote state per
//! evaluation; the engine holds nothing between events.

pub mod checks;
pub mod commands;
pub mod engine;
pub mod error;
pub mod events;
pub mod labels;
pub mod output;
pub mod owners;

pub use checks::{classify, required_checks, CheckRunAggregator, Classification};
pub use commands::{parse_commands, CommandDispatcher, CommandKind, CommandOutcome};
pub use engine::{EvaluationOutcome, MergeDecision, MergeGateDecisionEngine};
pub use error::{GateError, GateResult};
pub use events::GateEvent;
pub use labels::{categorize, color_for, LabelCategory, LabelStateManager};
pub use owners::{
    load_index, parse_owners, resolve_applicable, ApplicableOwnership, OwnershipEntry,
    OwnershipIndex,
};
