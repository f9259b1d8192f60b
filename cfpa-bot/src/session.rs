//! Disposable working copy of a pull request's head branch.
//!
//! A session is created at most once per command batch, on the first command
//! that needs it, and is consumed either by [`RepositorySession::push`] or by
//! [`RepositorySession::dispose`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CommandError;
use crate::git::Vcs;
use crate::host::{HostApi, Identity, PullRequestRef, RepoRef};

/// Where sessions are created and which branch they may never touch.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Parent directory of the disposable clones.
    pub scratch_dir: PathBuf,
    pub upstream: RepoRef,
    pub protected_branch: String,
}

impl SessionSettings {
    fn is_protected(&self, pr: &PullRequestRef) -> bool {
        pr.head_repo == self.upstream && pr.head_branch == self.protected_branch
    }
}

pub struct RepositorySession {
    vcs: Arc<dyn Vcs>,
    root: PathBuf,
    author: Identity,
    commits: usize,
}

impl RepositorySession {
    /// Clone the head branch of `pr` into a fresh scratch directory.
    ///
    /// Refuses, before touching the network, when the head is the upstream
    /// repository's protected branch.
    pub async fn open(
        vcs: Arc<dyn Vcs>,
        host: &dyn HostApi,
        settings: &SessionSettings,
        pr: &PullRequestRef,
        author: Identity,
    ) -> Result<Self, CommandError> {
        if settings.is_protected(pr) {
            return Err(CommandError::ProtectedBranch {
                owner: pr.head_repo.owner.clone(),
                repo: pr.head_repo.name.clone(),
                branch: pr.head_branch.clone(),
            });
        }

        tokio::fs::create_dir_all(&settings.scratch_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create scratch directory {}",
                    settings.scratch_dir.display()
                )
            })?;
        let dir = settings.scratch_dir.join(Uuid::new_v4().simple().to_string());

        let url = host.clone_url(&pr.head_repo).await?;
        info!(
            "Opening session for PR #{} on {}/{}:{}",
            pr.number, pr.head_repo.owner, pr.head_repo.name, pr.head_branch
        );
        if let Err(e) = vcs.clone_repo(&url, Some(&pr.head_branch), &dir).await {
            remove_dir_best_effort(&dir).await;
            return Err(e.context("Failed to clone pull request branch").into());
        }

        let root = match tokio::fs::canonicalize(&dir).await {
            Ok(root) => root,
            Err(e) => {
                remove_dir_best_effort(&dir).await;
                return Err(anyhow::Error::new(e)
                    .context("Failed to resolve working directory")
                    .into());
            }
        };

        Ok(Self {
            vcs,
            root,
            author,
            commits: 0,
        })
    }

    /// Canonical path of the working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of commits created in this session.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Resolve a user-supplied path against the working tree.
    ///
    /// The result must be the root or lie inside it after `.`/`..` are
    /// collapsed and the longest existing prefix has its symlinks resolved;
    /// anything else is a [`CommandError::SecurityCheck`].
    pub async fn resolve(&self, user_path: &str) -> Result<PathBuf, CommandError> {
        let normalized = normalize_lexically(&self.root.join(user_path));
        let resolved = canonicalize_existing_prefix(&normalized).await;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            warn!(
                "Rejected path {:?} resolving to {}",
                user_path,
                resolved.display()
            );
            Err(CommandError::SecurityCheck {
                path: user_path.to_string(),
            })
        }
    }

    /// Run a raw git subcommand in the working tree.
    pub async fn run(&self, args: &[String]) -> Result<String> {
        self.vcs.run(&self.root, args).await
    }

    pub async fn add_all(&self) -> Result<()> {
        self.vcs.add_all(&self.root).await
    }

    /// Commit staged changes with the commenter as author.
    pub async fn commit(&mut self, message: &str) -> Result<()> {
        if self.vcs.commit(&self.root, message, &self.author).await? {
            self.commits += 1;
        }
        Ok(())
    }

    /// Push everything committed in this session and dispose of the clone.
    pub async fn push(self) -> Result<()> {
        info!(
            "Pushing {} commit(s) from {}",
            self.commits,
            self.root.display()
        );
        let pushed = self.vcs.push(&self.root).await;
        self.dispose().await;
        pushed
    }

    /// Delete the clone without pushing.
    pub async fn dispose(self) {
        remove_dir_best_effort(&self.root).await;
    }
}

async fn remove_dir_best_effort(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete working copy {}: {}", dir.display(), e),
    }
}

/// Collapse `.` and `..` without touching the filesystem. `..` never climbs
/// above the filesystem root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Canonicalize the deepest ancestor of `path` that exists and re-append the
/// rest, so symlinks inside the tree cannot point outside it.
async fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = tokio::fs::canonicalize(existing).await {
            let mut resolved = canonical;
            for part in missing.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pull_request, FakeHost, FakeVcs};

    fn settings(scratch: &Path) -> SessionSettings {
        SessionSettings {
            scratch_dir: scratch.to_path_buf(),
            upstream: RepoRef::new("CFPAOrg", "Minecraft-Mod-Language-Package"),
            protected_branch: "main".to_string(),
        }
    }

    async fn open_session(scratch: &Path, vcs: Arc<FakeVcs>) -> RepositorySession {
        let host = FakeHost::new(pull_request("contributor", "contributor", "patch-1"));
        RepositorySession::open(
            vcs,
            &host,
            &settings(scratch),
            &host.pr,
            Identity::new("contributor", 7),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/work/a/./b/../c")),
            PathBuf::from("/work/a/c")
        );
        assert_eq!(
            normalize_lexically(Path::new("/work/../../../etc/passwd")),
            PathBuf::from("/etc/passwd")
        );
    }

    #[tokio::test]
    async fn test_protected_branch_is_refused_before_cloning() {
        let scratch = tempfile::tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::default());
        let host = FakeHost::new(pull_request(
            "CFPAOrg",
            "contributor",
            "main",
        ));
        let result = RepositorySession::open(
            vcs.clone(),
            &host,
            &settings(scratch.path()),
            &host.pr,
            Identity::new("contributor", 7),
        )
        .await;
        assert!(matches!(result, Err(CommandError::ProtectedBranch { .. })));
        assert_eq!(vcs.clone_count(), 0);
    }

    #[tokio::test]
    async fn test_same_named_branch_on_fork_is_allowed() {
        let scratch = tempfile::tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::default());
        let host = FakeHost::new(pull_request("contributor", "contributor", "main"));
        let session = RepositorySession::open(
            vcs.clone(),
            &host,
            &settings(scratch.path()),
            &host.pr,
            Identity::new("contributor", 7),
        )
        .await
        .unwrap();
        assert_eq!(vcs.clone_count(), 1);
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_resolve_rejects_escapes() {
        let scratch = tempfile::tempdir().unwrap();
        let session = open_session(scratch.path(), Arc::new(FakeVcs::default())).await;

        for escape in ["../../etc/passwd", "..", "/etc/passwd", "a/../../x", "../x/.."] {
            assert!(
                matches!(
                    session.resolve(escape).await,
                    Err(CommandError::SecurityCheck { .. })
                ),
                "{escape:?} should be rejected"
            );
        }
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_resolve_accepts_paths_inside_root() {
        let scratch = tempfile::tempdir().unwrap();
        let session = open_session(scratch.path(), Arc::new(FakeVcs::default())).await;

        let existing = session.resolve("README.md").await.unwrap();
        assert_eq!(existing, session.root().join("README.md"));
        let missing = session.resolve("new/dir/../file.json").await.unwrap();
        assert_eq!(missing, session.root().join("new/file.json"));
        for root in [".", "", "new/.."] {
            assert_eq!(session.resolve(root).await.unwrap(), session.root());
        }
        session.dispose().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_out_of_tree() {
        let scratch = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let session = open_session(scratch.path(), Arc::new(FakeVcs::default())).await;
        std::os::unix::fs::symlink(outside.path(), session.root().join("link")).unwrap();

        assert!(matches!(
            session.resolve("link/secret").await,
            Err(CommandError::SecurityCheck { .. })
        ));
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_push_disposes_working_copy() {
        let scratch = tempfile::tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::default());
        let session = open_session(scratch.path(), vcs.clone()).await;
        let root = session.root().to_path_buf();

        session.push().await.unwrap();
        assert_eq!(vcs.push_count(), 1);
        assert!(!root.exists());
    }
}
