//! HTTP client for the artifact hub: repo creation, batched file
//! uploads, space metadata, raw file fetches, and identity lookups.

use base64::Engine;
use serde::Deserialize;

/// One file in a batched commit.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

impl RepoFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Metadata for a published space.
#[derive(Debug, Clone, Deserialize)]
pub struct SpaceInfo {
    #[serde(default)]
    pub sdk: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("hub returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("hub request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
}

impl HubClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Namespace owning the token.
    pub async fn whoami(&self, token: &str) -> Result<String, HubError> {
        #[derive(Deserialize)]
        struct WhoAmI {
            name: String,
        }
        let resp = self
            .http
            .get(format!("{}/api/whoami-v2", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check(resp).await?.json::<WhoAmI>().await?.name)
    }

    /// Username behind an OAuth token; `None` when the token carries no
    /// usable profile.
    pub async fn userinfo(&self, token: &str) -> Result<Option<String>, HubError> {
        #[derive(Deserialize)]
        struct UserInfo {
            #[serde(default)]
            preferred_username: Option<String>,
        }
        let resp = self
            .http
            .get(format!("{}/oauth/userinfo", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(resp
            .json::<UserInfo>()
            .await
            .ok()
            .and_then(|u| u.preferred_username))
    }

    /// Create a public static space named `repo_id` (`namespace/slug`).
    pub async fn create_space(&self, repo_id: &str, token: &str) -> Result<(), HubError> {
        let body = serde_json::json!({
            "name": repo_id,
            "type": "space",
            "sdk": "static",
            "private": false,
        });
        let resp = self
            .http
            .post(format!("{}/api/repos/create", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Upload the whole file set as a single commit on `main`.
    ///
    /// The commit body is ndjson: one header line, then one base64 file
    /// line per blob.
    pub async fn upload_files(
        &self,
        repo_id: &str,
        files: &[RepoFile],
        summary: &str,
        token: &str,
    ) -> Result<(), HubError> {
        let mut lines = Vec::with_capacity(files.len() + 1);
        lines.push(
            serde_json::json!({
                "key": "header",
                "value": { "summary": summary, "description": "" },
            })
            .to_string(),
        );
        for file in files {
            let content = base64::engine::general_purpose::STANDARD.encode(file.content.as_bytes());
            lines.push(
                serde_json::json!({
                    "key": "file",
                    "value": { "path": file.path, "content": content, "encoding": "base64" },
                })
                .to_string(),
            );
        }
        let resp = self
            .http
            .post(format!(
                "{}/api/spaces/{repo_id}/commit/main",
                self.base_url
            ))
            .bearer_auth(token)
            .header("content-type", "application/x-ndjson")
            .body(lines.join("\n"))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Space metadata; `None` when the space does not exist.
    pub async fn space_info(&self, repo_id: &str) -> Result<Option<SpaceInfo>, HubError> {
        let resp = self
            .http
            .get(format!("{}/api/spaces/{repo_id}", self.base_url))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp).await?.json::<SpaceInfo>().await?))
    }

    /// Raw file contents from a space; `None` when missing.
    pub async fn fetch_raw(&self, repo_id: &str, path: &str) -> Result<Option<String>, HubError> {
        let resp = self
            .http
            .get(format!(
                "{}/spaces/{repo_id}/raw/main/{path}",
                self.base_url
            ))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp).await?.text().await?))
    }
}

/// Map non-2xx responses to `HubError::Api`, body as message.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, HubError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(HubError::Api {
        status: status.as_u16(),
        message,
    })
}
