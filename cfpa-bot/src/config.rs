use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub github_app_id: u64,
    pub github_private_key: String,
    pub github_webhook_secret: String,
    pub curseforge_api_key: String,
    /// Repository whose pull requests are served.
    pub upstream_owner: String,
    pub upstream_repo: String,
    /// Branch of the upstream repository commands may never push to.
    pub protected_branch: String,
    /// The only login allowed to run `/add-mapping`.
    pub admin_login: String,
    /// Logins that pass the permission check without being collaborators.
    pub bypass_logins: Vec<String>,
    /// Parent directory for disposable clones.
    pub scratch_dir: PathBuf,
    /// Holds the mod id mapping and the analyzer cache.
    pub config_dir: PathBuf,
    /// Optional bearer token for the /analyze endpoint.
    /// If not set, /analyze is disabled (returns 403 Forbidden).
    pub analyze_auth_token: Option<String>,
    pub port: u16,
    /// Committer identity for commits made by the bot.
    pub bot_name: String,
    pub bot_email: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_app_id = env::var("GITHUB_APP_ID")
            .context("GITHUB_APP_ID environment variable is required")?
            .parse::<u64>()
            .context("GITHUB_APP_ID must be a valid number")?;

        let github_private_key = env::var("GITHUB_PRIVATE_KEY")
            .context("GITHUB_PRIVATE_KEY environment variable is required")?
            .replace("\\n", "\n");

        let github_webhook_secret = env::var("GITHUB_WEBHOOK_SECRET")
            .context("GITHUB_WEBHOOK_SECRET environment variable is required")?;

        let curseforge_api_key = env::var("CURSEFORGE_API_KEY")
            .context("CURSEFORGE_API_KEY environment variable is required")?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        Ok(Config {
            github_app_id,
            github_private_key,
            github_webhook_secret,
            curseforge_api_key,
            upstream_owner: var_or("UPSTREAM_OWNER", "CFPAOrg"),
            upstream_repo: var_or("UPSTREAM_REPO", "Minecraft-Mod-Language-Package"),
            protected_branch: var_or("PROTECTED_BRANCH", "main"),
            admin_login: var_or("ADMIN_LOGIN", "Cyl18"),
            bypass_logins: parse_login_list(env::var("BYPASS_LOGINS").ok().as_deref()),
            scratch_dir: PathBuf::from(var_or("SCRATCH_DIR", "caches")),
            config_dir: PathBuf::from(var_or("CONFIG_DIR", "config")),
            analyze_auth_token: parse_auth_token(env::var("ANALYZE_AUTH_TOKEN").ok()),
            port,
            bot_name: var_or("BOT_NAME", "cfpa-bot"),
            bot_email: var_or("BOT_EMAIL", "cfpa-bot@users.noreply.github.com"),
        })
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.config_dir.join("mod_id_mapping.json")
    }

    pub fn analyze_cache_dir(&self) -> PathBuf {
        self.config_dir.join("repo_analyze_results")
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse an auth token from an optional string value.
///
/// Returns None if the value is missing, empty, or contains only whitespace,
/// so an empty token never allows unauthenticated access.
pub fn parse_auth_token(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Split a comma-separated login list, dropping empty entries.
pub fn parse_login_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .map(str::to_string)
        .collect()
}
