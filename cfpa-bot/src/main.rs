use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

use cfpa_bot::api::router;
use cfpa_bot::config::Config;
use cfpa_bot::curseforge::CurseForgeClient;
use cfpa_bot::git::GitCli;
use cfpa_bot::session::SessionSettings;
use cfpa_bot::{
    AppState, DispatchSettings, GitHubClient, LockRegistry, MappingStore, RepoAnalyzer, RepoRef,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting CFPA bot");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let mappings = Arc::new(
        MappingStore::load(config.mapping_path())
            .await
            .context("Failed to load mod id mappings")?,
    );
    let vcs = Arc::new(GitCli::new(config.bot_name.clone(), config.bot_email.clone()));
    let analyzer = RepoAnalyzer::new(
        vcs.clone(),
        Arc::new(LockRegistry::new()),
        config.analyze_cache_dir(),
        config.scratch_dir.clone(),
    );

    if config.analyze_auth_token.is_none() {
        info!("ANALYZE_AUTH_TOKEN not set, /analyze is disabled");
    }

    let app_state = Arc::new(AppState {
        github_client: GitHubClient::new(config.github_app_id, config.github_private_key),
        mod_host: Arc::new(CurseForgeClient::new(
            config.curseforge_api_key,
            mappings.clone(),
        )),
        mappings,
        vcs,
        analyzer: Arc::new(analyzer),
        dispatch: DispatchSettings {
            session: SessionSettings {
                scratch_dir: config.scratch_dir,
                upstream: RepoRef::new(config.upstream_owner, config.upstream_repo),
                protected_branch: config.protected_branch,
            },
            admin_login: config.admin_login,
            bypass_logins: config.bypass_logins,
        },
        webhook_secret: config.github_webhook_secret,
        analyze_auth_token: config.analyze_auth_token,
    });

    let app = router(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
