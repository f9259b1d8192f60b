use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::host::{HostApi, PullRequestRef, RepoRef};

const GITHUB_API: &str = "https://api.github.com";
/// Cached tokens are replaced once they have less than this left.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    app_id: u64,
    private_key: String,
    token_cache: Arc<RwLock<HashMap<u64, (String, SystemTime)>>>,
}

#[derive(Debug, Serialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct GitHubAppClaims {
    iss: u64,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryResponse {
    pub name: String,
    pub owner: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestResponse {
    pub number: u64,
    pub user: UserResponse,
    pub head: PullRequestHeadResponse,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestHeadResponse {
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// `null` when the fork has been deleted.
    pub repo: Option<RepositoryResponse>,
}

impl TryFrom<PullRequestResponse> for PullRequestRef {
    type Error = anyhow::Error;

    fn try_from(pr: PullRequestResponse) -> Result<Self> {
        let head_repo = pr
            .head
            .repo
            .ok_or_else(|| anyhow!("The head repository of PR #{} no longer exists", pr.number))?;
        Ok(PullRequestRef {
            number: pr.number,
            author: pr.user.login,
            head_repo: RepoRef::new(head_repo.owner.login, head_repo.name),
            head_branch: pr.head.ref_name,
        })
    }
}

fn token_is_fresh(expires_at: SystemTime, now: SystemTime) -> bool {
    expires_at.duration_since(now).unwrap_or_default() > TOKEN_REFRESH_MARGIN
}

fn authenticated_clone_url(token: &str, repo: &RepoRef) -> String {
    format!(
        "https://x-access-token:{}@github.com/{}/{}.git",
        token, repo.owner, repo.name
    )
}

impl GitHubClient {
    pub fn new(app_id: u64, private_key: String) -> Self {
        let client = Client::builder()
            .user_agent("cfpa-bot/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            app_id,
            private_key,
            token_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn generate_jwt(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("Failed to get current time")?
            .as_secs();

        let claims = GitHubAppClaims {
            iss: self.app_id,
            iat: now - 60, // Issued 60 seconds ago to account for clock skew
            exp: now + 600,
        };

        let header = Header::new(Algorithm::RS256);
        let encoding_key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .context("Failed to parse private key")?;

        encode(&header, &claims, &encoding_key).context("Failed to encode JWT")
    }

    pub async fn get_installation_token(&self, installation_id: u64) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some((token, expires_at)) = cache.get(&installation_id) {
                if token_is_fresh(*expires_at, SystemTime::now()) {
                    return Ok(token.clone());
                }
            }
        }

        let jwt = self.generate_jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            GITHUB_API, installation_id
        );

        info!("Requesting new installation access token");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", jwt))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .context("Failed to send installation token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!(
                "GitHub App token request failed: {} - {}",
                status, error_text
            );
            return Err(anyhow!(
                "GitHub App token request failed: {} - {}",
                status,
                error_text
            ));
        }

        let token_response: InstallationTokenResponse = response
            .json()
            .await
            .context("Failed to parse installation token response")?;

        let expires_at = chrono::DateTime::parse_from_rfc3339(&token_response.expires_at)
            .context("Failed to parse token expiration")?
            .with_timezone(&Utc);
        let expires_at_system = UNIX_EPOCH + Duration::from_secs(expires_at.timestamp() as u64);

        {
            let mut cache = self.token_cache.write().await;
            cache.insert(
                installation_id,
                (token_response.token.clone(), expires_at_system),
            );
        }

        info!("Successfully obtained installation access token");
        Ok(token_response.token)
    }

    pub async fn get_pull_request(
        &self,
        installation_id: u64,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<PullRequestResponse> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            GITHUB_API, repo_owner, repo_name, pr_number
        );

        info!(
            "Fetching PR #{} from {}/{}",
            pr_number, repo_owner, repo_name
        );

        let token = self.get_installation_token(installation_id).await?;
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .context("Failed to send pull request request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!("GitHub API error fetching PR: {} - {}", status, error_text);
            return Err(anyhow!("GitHub API error fetching PR: {}", status));
        }

        response
            .json()
            .await
            .context("Failed to parse pull request response")
    }

    /// `true` if `login` is a collaborator on the repository.
    pub async fn check_collaborator(
        &self,
        installation_id: u64,
        repo_owner: &str,
        repo_name: &str,
        login: &str,
    ) -> Result<bool> {
        let url = format!(
            "{}/repos/{}/{}/collaborators/{}",
            GITHUB_API, repo_owner, repo_name, login
        );

        let token = self.get_installation_token(installation_id).await?;
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .context("Failed to send collaborator request")?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let error_text = response
                    .text()
                    .await
                    .context("Failed to read error response body")?;
                error!(
                    "GitHub API error checking collaborator: {} - {}",
                    status, error_text
                );
                Err(anyhow!(
                    "GitHub API error checking collaborator: {}",
                    status
                ))
            }
        }
    }

    pub async fn post_issue_comment(
        &self,
        installation_id: u64,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        comment_body: &str,
    ) -> Result<Comment> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            GITHUB_API, repo_owner, repo_name, issue_number
        );

        info!(
            "Posting comment to PR #{} in {}/{}",
            issue_number, repo_owner, repo_name
        );

        let token = self.get_installation_token(installation_id).await?;
        let request_body = CreateCommentRequest {
            body: comment_body.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&request_body)
            .send()
            .await
            .context("Failed to send PR comment request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!("GitHub API error: {} - {}", status, error_text);
            return Err(anyhow!("GitHub API error: {} - {}", status, error_text));
        }

        let comment: Comment = response
            .json()
            .await
            .context("Failed to parse comment response")?;
        info!("Successfully posted comment with ID: {}", comment.id);

        Ok(comment)
    }
}

/// [`HostApi`] bound to one installation and the upstream repository it
/// serves.
#[derive(Clone)]
pub struct InstallationHost {
    client: GitHubClient,
    installation_id: u64,
    upstream: RepoRef,
}

impl InstallationHost {
    pub fn new(client: GitHubClient, installation_id: u64, upstream: RepoRef) -> Self {
        Self {
            client,
            installation_id,
            upstream,
        }
    }
}

#[async_trait]
impl HostApi for InstallationHost {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRef> {
        self.client
            .get_pull_request(
                self.installation_id,
                &self.upstream.owner,
                &self.upstream.name,
                number,
            )
            .await?
            .try_into()
    }

    async fn is_collaborator(&self, login: &str) -> Result<bool> {
        self.client
            .check_collaborator(
                self.installation_id,
                &self.upstream.owner,
                &self.upstream.name,
                login,
            )
            .await
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.client
            .post_issue_comment(
                self.installation_id,
                &self.upstream.owner,
                &self.upstream.name,
                number,
                body,
            )
            .await
            .map(|_| ())
    }

    async fn clone_url(&self, repo: &RepoRef) -> Result<String> {
        let token = self
            .client
            .get_installation_token(self.installation_id)
            .await?;
        Ok(authenticated_clone_url(&token, repo))
    }
}
