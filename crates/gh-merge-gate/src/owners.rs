//! Hierarchical ownership resolution
//!
//! Parses per-directory OWNERS files into a flat index keyed by
//! normalized directory path and resolves, for a set of changed files,
//! the minimal set of ownership entries that apply to a pull request.
//! Ancestor tests are plain path-prefix comparisons; there is no
//! recursive structure to walk.

use crate::error::{GateError, GateResult};
use gh_client::GitHubClient;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// File name of a per-directory ownership declaration
pub const OWNERS_FILE: &str = "OWNERS";

/// Path key of the repository-root ownership entry
pub const ROOT_PATH: &str = ".";

/// One per-directory ownership declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEntry {
    /// Normalized directory path; `"."` is the repository root
    pub path: String,
    /// Users whose approval satisfies this entry (any one of them)
    pub approvers: BTreeSet<String>,
    /// Advisory reviewers, used for assignment rather than gating
    pub reviewers: BTreeSet<String>,
    /// Whether changes under this directory still need root approval
    pub requires_root_approvers: bool,
    /// Users allowed to run privileged commands for this area
    pub allowed_users: BTreeSet<String>,
}

/// Raw OWNERS file shape
///
/// Any deviation (non-mapping document, non-list values, non-string
/// items) fails deserialization and rejects that single file.
#[derive(Debug, Deserialize)]
struct RawOwners {
    approvers: Option<Vec<String>>,
    reviewers: Option<Vec<String>>,
    #[serde(rename = "root-approvers")]
    root_approvers: Option<bool>,
    #[serde(rename = "allowed-users")]
    allowed_users: Option<Vec<String>>,
}

/// Parse one OWNERS file into an entry for the given directory
pub fn parse_owners(dir: &str, content: &str) -> GateResult<OwnershipEntry> {
    let raw: RawOwners = serde_yaml::from_str(content)
        .map_err(|e| GateError::Validation(format!("OWNERS at '{}': {}", dir, e)))?;

    Ok(OwnershipEntry {
        path: dir.to_string(),
        approvers: raw.approvers.unwrap_or_default().into_iter().collect(),
        reviewers: raw.reviewers.unwrap_or_default().into_iter().collect(),
        requires_root_approvers: raw.root_approvers.unwrap_or(true),
        allowed_users: raw.allowed_users.unwrap_or_default().into_iter().collect(),
    })
}

/// Mapping from directory path to ownership entry
///
/// Built once per pull request from the default-branch tree; immutable
/// for the lifetime of one event's processing.
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
    entries: BTreeMap<String, OwnershipEntry>,
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: OwnershipEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&OwnershipEntry> {
        self.entries.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OwnershipEntry)> {
        self.entries.iter()
    }

    /// Union of approvers and allowed users across all entries
    ///
    /// Used as the privileged-command membership set.
    pub fn maintainers(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|e| e.approvers.iter().chain(e.allowed_users.iter()))
            .cloned()
            .collect()
    }
}

/// Load the ownership index from the default-branch tree
///
/// Every OWNERS file in the tree contributes one entry; unreadable or
/// unparsable files are dropped with a logged warning, never fatal.
pub async fn load_index(
    client: &dyn GitHubClient,
    owner: &str,
    repo: &str,
    git_ref: &str,
) -> anyhow::Result<OwnershipIndex> {
    let mut index = OwnershipIndex::new();

    let paths = client.list_tree(owner, repo, git_ref).await?;
    for path in paths {
        let dir = match owners_dir(&path) {
            Some(dir) => dir,
            None => continue,
        };

        let content = match client.fetch_file(owner, repo, &path, git_ref).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!("OWNERS file '{}' vanished between listing and fetch", path);
                continue;
            }
            Err(e) => {
                warn!("Failed to read OWNERS file '{}': {}", path, e);
                continue;
            }
        };

        match parse_owners(&dir, &content) {
            Ok(entry) => {
                debug!("Loaded ownership entry for '{}'", dir);
                index.insert(entry);
            }
            Err(e) => warn!("Skipping malformed OWNERS file '{}': {}", path, e),
        }
    }

    Ok(index)
}

/// Directory an OWNERS file governs, or None for non-OWNERS paths
fn owners_dir(path: &str) -> Option<String> {
    if path == OWNERS_FILE {
        return Some(ROOT_PATH.to_string());
    }
    path.strip_suffix(&format!("/{}", OWNERS_FILE))
        .map(str::to_string)
}

/// Parent directory of a changed file, `"."` for top-level files
fn parent_dir(file: &str) -> &str {
    match file.rfind('/') {
        Some(idx) => &file[..idx],
        None => ROOT_PATH,
    }
}

/// Whether `dir` equals or is an ancestor of `other`
fn covers(dir: &str, other: &str) -> bool {
    other == dir || other.starts_with(&format!("{}/", dir))
}

/// The ownership entries that apply to one pull request
///
/// Computed fresh per evaluation; never persisted.
#[derive(Debug, Clone)]
pub struct ApplicableOwnership {
    entries: BTreeMap<String, OwnershipEntry>,
}

impl ApplicableOwnership {
    /// Directory paths of the applicable entries
    pub fn paths(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Union of approvers across applicable entries
    pub fn required_approvers(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|e| e.approvers.iter())
            .cloned()
            .collect()
    }

    /// Union of advisory reviewers across applicable entries
    pub fn reviewers(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|e| e.reviewers.iter())
            .cloned()
            .collect()
    }

    /// Whether the given approvals satisfy every applicable entry
    ///
    /// One approver per entry suffices (OR within an entry, AND across
    /// entries). Entries that declare no approvers impose no
    /// requirement.
    pub fn approval_satisfied(&self, approved_users: &BTreeSet<String>) -> bool {
        self.entries
            .values()
            .filter(|e| !e.approvers.is_empty())
            .all(|e| e.approvers.iter().any(|a| approved_users.contains(a)))
    }

    /// Paths whose approval requirement is not yet met
    pub fn unsatisfied_paths(&self, approved_users: &BTreeSet<String>) -> Vec<&str> {
        self.entries
            .values()
            .filter(|e| !e.approvers.is_empty())
            .filter(|e| !e.approvers.iter().any(|a| approved_users.contains(a)))
            .map(|e| e.path.as_str())
            .collect()
    }
}

/// Resolve the ownership entries applicable to a set of changed files
///
/// Every non-root entry whose directory equals or is an ancestor of a
/// changed file's parent directory is included. The root entry is
/// included unless every directory covering a changed file opts out of
/// root approval AND every changed file is covered by at least one such
/// directory; an ownerless folder never silently waives root approval.
pub fn resolve_applicable(index: &OwnershipIndex, changed_files: &[String]) -> ApplicableOwnership {
    let mut entries: BTreeMap<String, OwnershipEntry> = BTreeMap::new();

    for (path, entry) in index.iter() {
        if path == ROOT_PATH {
            continue;
        }
        let applies = changed_files
            .iter()
            .any(|file| covers(path, parent_dir(file)));
        if applies {
            entries.insert(path.clone(), entry.clone());
        }
    }

    // Root is waived only when every changed file is covered by at
    // least one applicable directory and none of its covering
    // directories still requires root approval.
    let root_waived = !changed_files.is_empty()
        && changed_files.iter().all(|file| {
            let covering: Vec<&OwnershipEntry> = entries
                .values()
                .filter(|e| covers(&e.path, parent_dir(file)))
                .collect();
            !covering.is_empty() && covering.iter().all(|e| !e.requires_root_approvers)
        });

    if !root_waived {
        if let Some(root) = index.get(ROOT_PATH) {
            entries.insert(ROOT_PATH.to_string(), root.clone());
        }
    }

    ApplicableOwnership { entries }
}
