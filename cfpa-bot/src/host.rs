//! Abstraction over the code host (GitHub) used by the command processor.
//!
//! The processor only needs a handful of operations against the upstream
//! repository; [`crate::github::InstallationHost`] provides them over the
//! GitHub REST API.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The person who wrote a command comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    pub id: u64,
}

impl Identity {
    pub fn new(login: impl Into<String>, id: u64) -> Self {
        Self {
            login: login.into(),
            id,
        }
    }

    /// The GitHub no-reply address, so commits are attributed to the account.
    pub fn noreply_email(&self) -> String {
        format!("{}+{}@users.noreply.github.com", self.id, self.login)
    }
}

/// A repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// The parts of a pull request the processor cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    /// Login of the pull request's author.
    pub author: String,
    pub head_repo: RepoRef,
    pub head_branch: String,
}

#[async_trait]
pub trait HostApi: Send + Sync {
    /// Fetch a pull request of the upstream repository.
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRef>;

    /// Whether `login` is a collaborator on the upstream repository.
    async fn is_collaborator(&self, login: &str) -> Result<bool>;

    /// Post a comment on an issue or pull request of the upstream repository.
    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;

    /// A URL that can be cloned from and pushed to.
    async fn clone_url(&self, repo: &RepoRef) -> Result<String>;
}
