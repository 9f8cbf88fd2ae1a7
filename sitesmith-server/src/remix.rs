//! Remix resolution: fetch a published artifact, verify it is a public
//! static space, strip attribution, report ownership.

use serde::Serialize;

use crate::deploy::{ENTRY_FILE, attribution_for};
use crate::error::ApiError;
use crate::server::SharedState;

#[derive(Debug, Clone, Serialize)]
pub struct RemixResult {
    /// Entry document with the attribution badge removed.
    pub html: String,
    /// Whether the caller is the space's recorded author.
    pub is_owner: bool,
    pub repo_id: String,
}

/// Resolve a published space into generation context.
///
/// Private spaces, non-static spaces, and lookup failures are all
/// reported as `NotFound`; callers can't distinguish a hidden space
/// from a missing one.
pub async fn remix(
    state: &SharedState,
    repo_id: &str,
    token: Option<&str>,
) -> Result<RemixResult, ApiError> {
    let not_found = || ApiError::NotFound(format!("space {repo_id} not found"));

    let info = state
        .hub
        .space_info(repo_id)
        .await
        .map_err(|e| {
            tracing::debug!(%repo_id, "space info lookup failed: {e}");
            not_found()
        })?
        .ok_or_else(not_found)?;

    if info.private || info.sdk.as_deref() != Some("static") {
        return Err(not_found());
    }

    let html = state
        .hub
        .fetch_raw(repo_id, ENTRY_FILE)
        .await
        .map_err(|e| {
            tracing::debug!(%repo_id, "entry file fetch failed: {e}");
            not_found()
        })?
        .ok_or_else(not_found)?;

    let html = html.replacen(&attribution_for(repo_id), "", 1);

    let is_owner = match (token, info.author.as_deref()) {
        (Some(token), Some(author)) => {
            state.hub.userinfo(token).await.ok().flatten().as_deref() == Some(author)
        }
        _ => false,
    };

    tracing::debug!(%repo_id, is_owner, "remix resolved");
    Ok(RemixResult {
        html,
        is_owner,
        repo_id: repo_id.to_string(),
    })
}
