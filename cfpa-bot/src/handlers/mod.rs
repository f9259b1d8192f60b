//! Handlers for the individual slash commands.
//!
//! Every handler returns `Ok(LineOutcome)` for anything the batch can carry
//! on from and `Err(CommandError)` for anything that must stop it.

mod add_mapping;
mod mv;
mod sort_keys;
mod update_en;

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::command::BotCommand;
use crate::dispatcher::DispatchSettings;
use crate::error::CommandError;
use crate::git::Vcs;
use crate::host::{HostApi, Identity, PullRequestRef};
use crate::mapping::MappingStore;
use crate::messages;
use crate::modhost::ModHost;
use crate::session::RepositorySession;

/// What one command line contributed to the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The command ran and has nothing to report.
    Applied,
    /// The command has a line for the reply. It may or may not have changed
    /// the working copy.
    Recorded(String),
}

impl LineOutcome {
    pub fn recorded(message: impl Into<String>) -> Self {
        LineOutcome::Recorded(message.into())
    }
}

/// Everything a handler may touch while one comment is processed.
///
/// Owns the batch's working copy, which is opened on first use and handed
/// back to the dispatcher through [`BatchContext::into_session`].
pub struct BatchContext<'a> {
    pub host: &'a dyn HostApi,
    pub mod_host: &'a dyn ModHost,
    pub mappings: &'a MappingStore,
    pub settings: &'a DispatchSettings,
    pub pr: &'a PullRequestRef,
    pub user: &'a Identity,
    vcs: Arc<dyn Vcs>,
    session: Option<RepositorySession>,
    is_collaborator: Option<bool>,
}

impl<'a> BatchContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: &'a dyn HostApi,
        mod_host: &'a dyn ModHost,
        mappings: &'a MappingStore,
        vcs: Arc<dyn Vcs>,
        settings: &'a DispatchSettings,
        pr: &'a PullRequestRef,
        user: &'a Identity,
    ) -> Self {
        Self {
            host,
            mod_host,
            mappings,
            settings,
            pr,
            user,
            vcs,
            session: None,
            is_collaborator: None,
        }
    }

    /// The batch's working copy, cloned on the first call.
    pub async fn session(&mut self) -> Result<&mut RepositorySession, CommandError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                RepositorySession::open(
                    self.vcs.clone(),
                    self.host,
                    &self.settings.session,
                    self.pr,
                    self.user.clone(),
                )
                .await?
            }
        };
        Ok(self.session.insert(session))
    }

    pub fn into_session(self) -> Option<RepositorySession> {
        self.session
    }

    /// Collaborator, pull request author or always-allowed login.
    ///
    /// The collaborator lookup happens at most once per batch.
    pub async fn has_permission(&mut self) -> Result<bool> {
        let login = self.user.login.as_str();
        if self.settings.bypass_logins.iter().any(|l| l == login) || self.pr.author == login {
            return Ok(true);
        }
        let is_collaborator = match self.is_collaborator {
            Some(cached) => cached,
            None => {
                let checked = self.host.is_collaborator(login).await?;
                debug!("{} is collaborator: {}", login, checked);
                *self.is_collaborator.insert(checked)
            }
        };
        Ok(is_collaborator)
    }
}

/// Run one command against the batch.
pub async fn execute(
    ctx: &mut BatchContext<'_>,
    command: &BotCommand,
) -> Result<LineOutcome, CommandError> {
    if command.requires_collaborator() && !ctx.has_permission().await? {
        return Ok(LineOutcome::recorded(messages::PERMISSION_DENIED));
    }
    match command {
        BotCommand::Move { raw, paths } => mv::run(ctx, raw, paths).await,
        BotCommand::UpdateEnglish {
            identifier,
            version,
        } => update_en::run(ctx, identifier, version).await,
        BotCommand::AddMapping { slug, project_id } => {
            add_mapping::run(ctx, slug, *project_id).await
        }
        BotCommand::SortKeys { file } => sort_keys::run(ctx, file).await,
    }
}

/// Create the parent directory of a path that has already passed
/// [`RepositorySession::resolve`].
async fn ensure_parent(path: &std::path::Path) -> Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}
