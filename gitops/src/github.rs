use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use argodiff_defs::{
    AppInfo, CommitStatusRequest, GitHubAuth, GitHubConfig, GitHubError, IssueComment,
    PullRequest, PullRequestFile, User,
};
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

const ARGODIFF_USER_AGENT: &str = "argo-diff";
const PER_PAGE: usize = 100;
/// Installation tokens live for an hour; refresh well before that.
const INSTALLATION_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// The subset of the GitHub REST API the worker needs.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    async fn set_commit_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatusRequest,
    ) -> Result<(), GitHubError>;

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequest, GitHubError>;

    /// All comments on the issue, oldest first.
    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>, GitHubError>;

    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment, GitHubError>;

    async fn edit_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<(), GitHubError>;

    async fn list_pull_request_files(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<PullRequestFile>, GitHubError>;

    /// Login that comments made with these credentials are attributed to.
    async fn identity(&self) -> Result<String, GitHubError>;
}

/// Claims for the GitHub App JWT.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: usize,  // Issued at time (seconds since epoch)
    exp: usize,  // Expiration time (seconds since epoch)
    iss: String, // GitHub App ID
}

/// The response from GitHub when requesting an installation access token.
#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

pub fn create_app_jwt(app_id: &str, private_key_pem: &str) -> Result<String, GitHubError> {
    // Valid for 10 minutes, allowing 60 seconds of clock skew.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| GitHubError::Auth(e.to_string()))?
        .as_secs();
    let claims = Claims {
        iat: (now - 60) as usize,
        exp: (now + 10 * 60) as usize,
        iss: app_id.to_owned(),
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| GitHubError::Auth(format!("invalid app private key: {}", e)))?;
    encode(&Header::new(jsonwebtoken::Algorithm::RS256), &claims, &key)
        .map_err(|e| GitHubError::Auth(e.to_string()))
}

/// GitHub REST client authenticating with a token or as an App installation.
pub struct GitHubRestClient {
    client: Client,
    api_url: String,
    auth: GitHubAuth,
    installation_token: RwLock<Option<(String, Instant)>>,
}

impl GitHubRestClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let client = Client::builder()
            .user_agent(ARGODIFF_USER_AGENT)
            .build()
            .map_err(|e| GitHubError::Http {
                endpoint: config.api_url.clone(),
                message: e.to_string(),
            })?;
        Ok(GitHubRestClient {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
            installation_token: RwLock::new(None),
        })
    }

    async fn get_installation_token(&self) -> Result<String, GitHubError> {
        let (app_id, installation_id, private_key) = match &self.auth {
            GitHubAuth::App {
                app_id,
                installation_id,
                private_key,
            } => (app_id, installation_id, private_key),
            _ => return Err(GitHubError::NotConfigured),
        };

        if let Some((token, fetched)) = self.installation_token.read().await.as_ref() {
            if fetched.elapsed() < INSTALLATION_TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        let mut cached = self.installation_token.write().await;
        if let Some((token, fetched)) = cached.as_ref() {
            if fetched.elapsed() < INSTALLATION_TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        log::debug!("Requesting installation token for installation {}", installation_id);
        let jwt = create_app_jwt(app_id, private_key)?;
        let endpoint = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );
        let request = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", jwt))
            .header("Accept", "application/vnd.github+json");
        let response: InstallationTokenResponse = self.send_json(request, &endpoint).await?;

        *cached = Some((response.token.clone(), Instant::now()));
        Ok(response.token)
    }

    async fn authorization(&self) -> Result<String, GitHubError> {
        match &self.auth {
            GitHubAuth::Token(token) => Ok(format!("token {}", token)),
            GitHubAuth::App { .. } => Ok(format!("token {}", self.get_installation_token().await?)),
            GitHubAuth::None => Err(GitHubError::NotConfigured),
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<(RequestBuilder, String), GitHubError> {
        let endpoint = format!("{}{}", self.api_url, path);
        let request = self
            .client
            .request(method, &endpoint)
            .header("Authorization", self.authorization().await?)
            .header("Accept", "application/vnd.github+json");
        Ok((request, endpoint))
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<String, GitHubError> {
        let response = request.send().await.map_err(|e| GitHubError::Http {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| GitHubError::Http {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(GitHubError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, GitHubError> {
        let body = self.send(request, endpoint).await?;
        serde_json::from_str(&body).map_err(|e| GitHubError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    /// Follows `page` until a short page comes back.
    async fn get_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GitHubError> {
        let mut items = vec![];
        let mut page = 1;
        loop {
            let (request, endpoint) = self.request(Method::GET, path).await?;
            let request = request.query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch: Vec<T> = self.send_json(request, &endpoint).await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl GitHubClient for GitHubRestClient {
    async fn set_commit_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatusRequest,
    ) -> Result<(), GitHubError> {
        let (request, endpoint) = self
            .request(Method::POST, &format!("/repos/{}/{}/statuses/{}", owner, repo, sha))
            .await?;
        self.send(request.json(status), &endpoint).await?;
        Ok(())
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequest, GitHubError> {
        let (request, endpoint) = self
            .request(Method::GET, &format!("/repos/{}/{}/pulls/{}", owner, repo, number))
            .await?;
        self.send_json(request, &endpoint).await
    }

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>, GitHubError> {
        let mut comments: Vec<IssueComment> = self
            .get_paginated(&format!("/repos/{}/{}/issues/{}/comments", owner, repo, number))
            .await?;
        // RFC 3339 timestamps in UTC sort lexically
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment, GitHubError> {
        let (request, endpoint) = self
            .request(
                Method::POST,
                &format!("/repos/{}/{}/issues/{}/comments", owner, repo, number),
            )
            .await?;
        self.send_json(request.json(&json!({ "body": body })), &endpoint)
            .await
    }

    async fn edit_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let (request, endpoint) = self
            .request(
                Method::PATCH,
                &format!("/repos/{}/{}/issues/comments/{}", owner, repo, comment_id),
            )
            .await?;
        self.send(request.json(&json!({ "body": body })), &endpoint)
            .await?;
        Ok(())
    }

    async fn list_pull_request_files(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<PullRequestFile>, GitHubError> {
        self.get_paginated(&format!("/repos/{}/{}/pulls/{}/files", owner, repo, number))
            .await
    }

    async fn identity(&self) -> Result<String, GitHubError> {
        match &self.auth {
            GitHubAuth::App {
                app_id,
                private_key,
                ..
            } => {
                let jwt = create_app_jwt(app_id, private_key)?;
                let endpoint = format!("{}/app", self.api_url);
                let request = self
                    .client
                    .get(&endpoint)
                    .header("Authorization", format!("Bearer {}", jwt))
                    .header("Accept", "application/vnd.github+json");
                let app: AppInfo = self.send_json(request, &endpoint).await?;
                Ok(bot_login(&app))
            }
            GitHubAuth::Token(_) => {
                let (request, endpoint) = self.request(Method::GET, "/user").await?;
                let user: User = self.send_json(request, &endpoint).await?;
                Ok(user.login)
            }
            GitHubAuth::None => Err(GitHubError::NotConfigured),
        }
    }
}

/// Comments made by an App installation are attributed to `<slug>[bot]`.
pub fn bot_login(app: &AppInfo) -> String {
    let name = if app.slug.is_empty() { &app.name } else { &app.slug };
    format!("{}[bot]", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bot_login() {
        let app = AppInfo {
            slug: "argo-diff".to_string(),
            name: "Argo Diff".to_string(),
        };
        assert_eq!(bot_login(&app), "argo-diff[bot]");
        let unnamed = AppInfo {
            slug: String::new(),
            name: "argo-diff".to_string(),
        };
        assert_eq!(bot_login(&unnamed), "argo-diff[bot]");
    }

    #[test]
    fn test_invalid_private_key() {
        let err = create_app_jwt("1234", "not a pem").unwrap_err();
        assert!(matches!(err, GitHubError::Auth(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = GitHubRestClient::new(&GitHubConfig::default()).unwrap();
        assert!(matches!(
            client.identity().await,
            Err(GitHubError::NotConfigured)
        ));
        assert!(matches!(
            client.get_pull_request("acme", "deployments", 1).await,
            Err(GitHubError::NotConfigured)
        ));
    }
}
