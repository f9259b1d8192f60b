//! Runs the slash commands of one comment as a single batch.
//!
//! Commands execute in document order against one lazily cloned working copy.
//! The first fatal error stops the batch and discards the working copy; only a
//! batch that runs to the end is pushed, once.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::command::{parse_comment, ParsedLine};
use crate::error::CommandError;
use crate::git::Vcs;
use crate::handlers::{self, BatchContext, LineOutcome};
use crate::host::{HostApi, Identity};
use crate::mapping::MappingStore;
use crate::messages;
use crate::modhost::ModHost;
use crate::session::{RepositorySession, SessionSettings};

/// Who may do what, and where sessions live.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub session: SessionSettings,
    /// The only login allowed to run `/add-mapping`.
    pub admin_login: String,
    /// Logins that pass the permission check without being collaborators.
    pub bypass_logins: Vec<String>,
}

/// A batch whose every line ran. Its working copy, if any, must be pushed.
pub struct CompletedBatch {
    pub replies: Vec<String>,
    pub session: Option<RepositorySession>,
}

/// A batch stopped by a fatal error. Its working copy must not be pushed.
pub struct AbortedBatch {
    pub replies: Vec<String>,
    pub error: CommandError,
    pub session: Option<RepositorySession>,
}

/// Run `lines` in order, stopping at the first fatal error.
pub async fn execute_batch(
    mut ctx: BatchContext<'_>,
    lines: &[ParsedLine],
) -> Result<CompletedBatch, AbortedBatch> {
    let mut replies = Vec::new();
    for line in lines {
        let outcome = match line {
            ParsedLine::Malformed { usage, reason } => {
                Ok(LineOutcome::Recorded(messages::malformed(usage, reason)))
            }
            ParsedLine::Command(command) => {
                info!(
                    "PR #{}: {} runs `{}`",
                    ctx.pr.number, ctx.user.login, command
                );
                handlers::execute(&mut ctx, command).await
            }
        };
        match outcome {
            Ok(LineOutcome::Applied) => {}
            Ok(LineOutcome::Recorded(message)) => replies.push(message),
            Err(error) => {
                return Err(AbortedBatch {
                    replies,
                    error,
                    session: ctx.into_session(),
                })
            }
        }
    }
    Ok(CompletedBatch {
        replies,
        session: ctx.into_session(),
    })
}

#[derive(Clone)]
pub struct CommandProcessor {
    host: Arc<dyn HostApi>,
    mod_host: Arc<dyn ModHost>,
    mappings: Arc<MappingStore>,
    vcs: Arc<dyn Vcs>,
    settings: Arc<DispatchSettings>,
}

impl CommandProcessor {
    pub fn new(
        host: Arc<dyn HostApi>,
        mod_host: Arc<dyn ModHost>,
        mappings: Arc<MappingStore>,
        vcs: Arc<dyn Vcs>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            host,
            mod_host,
            mappings,
            vcs,
            settings: Arc::new(settings),
        }
    }

    /// Process one comment and post at most one reply mentioning `user`.
    pub async fn run(
        &self,
        pr_number: u64,
        body: &str,
        comment_id: u64,
        user: &Identity,
    ) -> Result<()> {
        let lines = parse_comment(body);
        if lines.is_empty() {
            debug!("Comment {} on PR #{} has no commands", comment_id, pr_number);
            return Ok(());
        }

        let mut replies = Vec::new();
        if let Err(e) = self
            .process(pr_number, &lines, comment_id, user, &mut replies)
            .await
        {
            warn!("Command processing failed for PR #{}: {}", pr_number, e);
            replies.push(messages::general_error(&e));
        }

        if replies.is_empty() {
            return Ok(());
        }
        let reply = format!("@{} {}", user.login, replies.join("\n"));
        self.host.create_comment(pr_number, &reply).await
    }

    async fn process(
        &self,
        pr_number: u64,
        lines: &[ParsedLine],
        comment_id: u64,
        user: &Identity,
        replies: &mut Vec<String>,
    ) -> Result<(), CommandError> {
        let pr = self.host.get_pull_request(pr_number).await?;
        let ctx = BatchContext::new(
            self.host.as_ref(),
            self.mod_host.as_ref(),
            &self.mappings,
            self.vcs.clone(),
            &self.settings,
            &pr,
            user,
        );

        match execute_batch(ctx, lines).await {
            Ok(batch) => {
                replies.extend(batch.replies);
                if let Some(session) = batch.session {
                    session.push().await?;
                    self.add_reaction(pr_number, comment_id).await;
                }
                Ok(())
            }
            Err(aborted) => {
                replies.extend(aborted.replies);
                if let Some(session) = aborted.session {
                    info!(
                        "Discarding {} local commit(s) for PR #{}",
                        session.commit_count(),
                        pr_number
                    );
                    session.dispose().await;
                }
                Err(aborted.error)
            }
        }
    }

    /// Marking the triggering comment is disabled.
    async fn add_reaction(&self, pr_number: u64, comment_id: u64) {
        debug!(
            "Skipping reaction on comment {} of PR #{}",
            comment_id, pr_number
        );
    }
}
