//! Forge-client contract and the pull-request workflow's data shapes.
//!
//! No concrete GitHub/GitLab client lives here — those are out-of-scope
//! collaborators. This module defines the trait the PR workflow
//! (`manager::IndexManager::index_pull_request`) is generic over, plus an
//! in-memory test double used by this crate's own tests.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommitStatusState {
    Pending,
    Success,
    Failure,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitStatusOptions {
    pub context: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestFile {
    pub path: String,
    pub status: PullRequestFileStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestFileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDetails {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
    pub base_sha: String,
    pub files: Vec<PullRequestFile>,
}

/// `{ kind, fetchPullRequest, createComment, setCommitStatus }`.
/// Individual call failures are surfaced as `Err` but never abort the
/// surrounding indexing run; the PR workflow logs and records them.
pub trait ForgeClient: Send + Sync {
    fn kind(&self) -> &str;
    fn fetch_pull_request(&self, id: &str) -> Result<PullRequestDetails>;
    fn create_comment(&self, id: &str, body: &str) -> Result<()>;
    fn set_commit_status(&self, sha: &str, state: CommitStatusState, opts: &CommitStatusOptions) -> Result<()>;
}

/// In-memory test double: records every call it receives so workflow tests
/// can assert on statuses posted and comments rendered, and can be told to
/// fail a specific call to exercise the best-effort error paths.
#[cfg(any(test, feature = "test-support"))]
pub mod test_double {
    use super::*;
    use crate::error::IndexError;
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    pub struct StatusCall {
        pub sha: String,
        pub state: CommitStatusState,
        pub opts: CommitStatusOptions,
    }

    #[derive(Debug, Clone)]
    pub struct CommentCall {
        pub id: String,
        pub body: String,
    }

    #[derive(Default)]
    pub struct InMemoryForge {
        pub pull_request: Mutex<Option<PullRequestDetails>>,
        pub statuses: Mutex<Vec<StatusCall>>,
        pub comments: Mutex<Vec<CommentCall>>,
        pub fail_fetch: Mutex<bool>,
        pub fail_status: Mutex<bool>,
        pub fail_comment: Mutex<bool>,
    }

    impl InMemoryForge {
        pub fn new(pr: PullRequestDetails) -> Self {
            Self { pull_request: Mutex::new(Some(pr)), ..Default::default() }
        }
    }

    impl ForgeClient for InMemoryForge {
        fn kind(&self) -> &str {
            "test"
        }

        fn fetch_pull_request(&self, id: &str) -> Result<PullRequestDetails> {
            if *self.fail_fetch.lock() {
                return Err(IndexError::ForgeFailure("fetch_pull_request failed".to_string()));
            }
            self.pull_request
                .lock()
                .clone()
                .filter(|pr| pr.id == id)
                .ok_or_else(|| IndexError::NotFound(format!("pull request {id}")))
        }

        fn create_comment(&self, id: &str, body: &str) -> Result<()> {
            if *self.fail_comment.lock() {
                return Err(IndexError::ForgeFailure("create_comment failed".to_string()));
            }
            self.comments.lock().push(CommentCall { id: id.to_string(), body: body.to_string() });
            Ok(())
        }

        fn set_commit_status(&self, sha: &str, state: CommitStatusState, opts: &CommitStatusOptions) -> Result<()> {
            if *self.fail_status.lock() {
                return Err(IndexError::ForgeFailure("set_commit_status failed".to_string()));
            }
            self.statuses.lock().push(StatusCall { sha: sha.to_string(), state, opts: opts.clone() });
            Ok(())
        }
    }
}
