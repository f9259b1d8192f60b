pub mod analyzer;
pub mod api;
pub mod command;
pub mod config;
pub mod curseforge;
pub mod dispatcher;
pub mod error;
pub mod git;
pub mod github;
pub mod handlers;
pub mod host;
pub mod lock_registry;
pub mod mapping;
pub mod messages;
pub mod modhost;
pub mod session;
pub mod webhook;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use analyzer::RepoAnalyzer;
pub use dispatcher::{CommandProcessor, DispatchSettings};
pub use error::CommandError;
pub use github::{GitHubClient, InstallationHost};
pub use host::{HostApi, Identity, PullRequestRef, RepoRef};
pub use lock_registry::LockRegistry;
pub use mapping::MappingStore;
pub use modhost::ModHost;

use git::Vcs;

pub struct AppState {
    pub github_client: GitHubClient,
    pub mod_host: Arc<dyn ModHost>,
    pub mappings: Arc<MappingStore>,
    pub vcs: Arc<dyn Vcs>,
    pub analyzer: Arc<RepoAnalyzer>,
    pub dispatch: DispatchSettings,
    pub webhook_secret: String,
    /// Bearer token for /analyze. `None` disables the endpoint.
    pub analyze_auth_token: Option<String>,
}

impl AppState {
    /// A command processor acting through the given GitHub App installation.
    pub fn command_processor(&self, installation_id: u64) -> CommandProcessor {
        let host = InstallationHost::new(
            self.github_client.clone(),
            installation_id,
            self.dispatch.session.upstream.clone(),
        );
        CommandProcessor::new(
            Arc::new(host),
            self.mod_host.clone(),
            self.mappings.clone(),
            self.vcs.clone(),
            self.dispatch.clone(),
        )
    }
}
