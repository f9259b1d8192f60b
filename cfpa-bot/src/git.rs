//! Git plumbing.
//!
//! [`Vcs`] is the seam the session and the analyzer talk to; [`GitCli`] drives
//! the `git` binary as a subprocess.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::host::Identity;

#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `url` into `dest`. With `branch`, only that branch is fetched.
    async fn clone_repo(&self, url: &str, branch: Option<&str>, dest: &Path) -> Result<()>;

    /// Run a git subcommand inside `workdir` and return its stdout.
    async fn run(&self, workdir: &Path, args: &[String]) -> Result<String>;

    /// Stage every change in the working tree.
    async fn add_all(&self, workdir: &Path) -> Result<()>;

    /// Commit the staged changes. Returns `false` when nothing was staged.
    async fn commit(&self, workdir: &Path, message: &str, author: &Identity) -> Result<bool>;

    /// Push the current branch to `origin`.
    async fn push(&self, workdir: &Path) -> Result<()>;

    /// Names of the branches on `origin`, without the remote prefix.
    async fn remote_branches(&self, workdir: &Path) -> Result<Vec<String>>;

    /// Check out a local branch tracking `origin/<branch>`, creating it if needed.
    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<()>;

    /// Hash of the commit at HEAD.
    async fn head_commit(&self, workdir: &Path) -> Result<String>;
}

/// [`Vcs`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    committer_name: String,
    committer_email: String,
}

impl GitCli {
    pub fn new(committer_name: impl Into<String>, committer_email: impl Into<String>) -> Self {
        Self {
            committer_name: committer_name.into(),
            committer_email: committer_email.into(),
        }
    }

    async fn git<S: AsRef<str>>(&self, workdir: Option<&Path>, args: &[S]) -> Result<GitOutput> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let shown = args
            .iter()
            .map(|arg| redact_credentials(arg))
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Running git {}", shown);

        let mut command = Command::new("git");
        command
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = workdir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to execute git {}", shown))?;

        Ok(GitOutput {
            shown,
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn git_checked<S: AsRef<str>>(&self, workdir: Option<&Path>, args: &[S]) -> Result<String> {
        self.git(workdir, args).await?.into_stdout()
    }
}

struct GitOutput {
    shown: String,
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn into_stdout(self) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(anyhow!(
                "git {} failed: {}",
                self.shown,
                redact_credentials(self.stderr.trim())
            ))
        }
    }
}

/// Replace the user-info part of any URL so access tokens never reach logs
/// or reply comments.
pub fn redact_credentials(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(scheme_end) = rest.find("://") {
        let (before, after) = rest.split_at(scheme_end + 3);
        output.push_str(before);
        let authority_end = after
            .find(|c: char| c == '/' || c.is_whitespace())
            .unwrap_or(after.len());
        let authority = &after[..authority_end];
        match authority.rfind('@') {
            Some(at) => {
                output.push_str("***");
                output.push_str(&authority[at..]);
            }
            None => output.push_str(authority),
        }
        rest = &after[authority_end..];
    }
    output.push_str(rest);
    output
}

fn parse_remote_branches(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("origin/"))
        .filter(|branch| *branch != "HEAD" && !branch.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Vcs for GitCli {
    async fn clone_repo(&self, url: &str, branch: Option<&str>, dest: &Path) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        let mut args = vec!["clone", "--quiet"];
        if let Some(branch) = branch {
            args.extend(["--branch", branch, "--single-branch"]);
        }
        args.extend(["--", url, dest_str.as_ref()]);

        info!("Cloning {} into {}", redact_credentials(url), dest.display());
        self.git_checked(None, &args).await?;
        Ok(())
    }

    async fn run(&self, workdir: &Path, args: &[String]) -> Result<String> {
        self.git_checked(Some(workdir), args).await
    }

    async fn add_all(&self, workdir: &Path) -> Result<()> {
        self.git_checked(Some(workdir), &["add", "--all"]).await?;
        Ok(())
    }

    async fn commit(&self, workdir: &Path, message: &str, author: &Identity) -> Result<bool> {
        // `diff --cached --quiet` exits 0 when nothing is staged.
        let staged = self
            .git(Some(workdir), &["diff", "--cached", "--quiet"])
            .await?;
        if staged.success {
            info!("Nothing staged, skipping commit \"{}\"", message);
            return Ok(false);
        }

        let name_config = format!("user.name={}", self.committer_name);
        let email_config = format!("user.email={}", self.committer_email);
        let author_arg = format!("--author={} <{}>", author.login, author.noreply_email());
        self.git_checked(
            Some(workdir),
            &[
                "-c",
                name_config.as_str(),
                "-c",
                email_config.as_str(),
                "commit",
                "--quiet",
                "-m",
                message,
                author_arg.as_str(),
            ],
        )
        .await?;
        info!("Committed \"{}\" as {}", message, author.login);
        Ok(true)
    }

    async fn push(&self, workdir: &Path) -> Result<()> {
        self.git_checked(Some(workdir), &["push", "--quiet", "origin", "HEAD"])
            .await?;
        info!("Pushed {}", workdir.display());
        Ok(())
    }

    async fn remote_branches(&self, workdir: &Path) -> Result<Vec<String>> {
        let listing = self
            .git_checked(
                Some(workdir),
                &["branch", "--remotes", "--format=%(refname:short)"],
            )
            .await?;
        Ok(parse_remote_branches(&listing))
    }

    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<()> {
        let local_ref = format!("refs/heads/{}", branch);
        let exists = self
            .git(Some(workdir), &["rev-parse", "--verify", "--quiet", local_ref.as_str()])
            .await?
            .success;
        if exists {
            self.git_checked(Some(workdir), &["checkout", "--quiet", "--force", branch])
                .await?;
        } else {
            let upstream = format!("origin/{}", branch);
            self.git_checked(
                Some(workdir),
                &["checkout", "--quiet", "--force", "-b", branch, "--track", upstream.as_str()],
            )
            .await?;
        }
        Ok(())
    }

    async fn head_commit(&self, workdir: &Path) -> Result<String> {
        let sha = self.git_checked(Some(workdir), &["rev-parse", "HEAD"]).await?;
        Ok(sha.trim().to_string())
    }
}
