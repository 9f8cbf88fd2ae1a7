//! Deployment pipeline: slug derivation, manifest generation,
//! attribution injection, and the batched upload.

use rand::Rng;
use serde::Deserialize;

use crate::error::ApiError;
use crate::hub::{HubError, RepoFile};
use crate::server::SharedState;

/// Entry file of a published space.
pub const ENTRY_FILE: &str = "index.html";
/// Newline-joined log of every prompt that produced the site.
pub const PROMPT_LOG_FILE: &str = "prompts.txt";
/// Space manifest read by the hub.
pub const MANIFEST_FILE: &str = "README.md";

/// Accent colors the hub accepts in a space manifest.
const ACCENT_COLORS: [&str; 8] = [
    "red", "yellow", "green", "blue", "indigo", "purple", "pink", "gray",
];

const MAX_SLUG_LEN: usize = 96;

/// Body of `POST /api/deploy`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub html: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Existing space to update instead of creating a new one.
    #[serde(default)]
    pub repo_id: Option<String>,
    /// Prompt history, oldest first.
    #[serde(default)]
    pub prompts: Vec<String>,
}

/// Lowercase the title, collapse every run of non-alphanumeric
/// characters into a single `-`, trim separators, cap at 96 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = title
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_matches('-').to_string()
}

/// Footer badge injected into every published document.
///
/// Byte-for-byte deterministic per repo id; the remix resolver strips
/// exactly this string to recover the original document.
pub fn attribution_for(repo_id: &str) -> String {
    format!(
        "<p style=\"position: fixed; left: 8px; bottom: 8px; z-index: 10; margin: 0; \
padding: 4px 8px; border-radius: 8px; font-size: 12px; color: #fff; background: rgba(0,0,0,0.8);\">\
Built with <a href=\"https://sitesmith.dev\" style=\"color: #fff; text-decoration: underline;\" \
target=\"_blank\">sitesmith</a> · <a href=\"https://sitesmith.dev/?remix={repo_id}\" \
style=\"color: #fff; text-decoration: underline;\" target=\"_blank\">Remix</a></p>"
    )
}

/// Insert the attribution badge just before `</body>`. Documents
/// without a body close tag get it appended.
pub fn inject_attribution(html: &str, repo_id: &str) -> String {
    let badge = attribution_for(repo_id);
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], badge, &html[pos..]),
        None => format!("{html}{badge}"),
    }
}

/// Space manifest front-matter. The two accent colors are picked
/// independently so gradients vary between publishes.
fn manifest_for(title: &str, repo_id: &str) -> String {
    let mut rng = rand::thread_rng();
    let from = ACCENT_COLORS[rng.gen_range(0..ACCENT_COLORS.len())];
    let to = ACCENT_COLORS[rng.gen_range(0..ACCENT_COLORS.len())];
    format!(
        "---\n\
title: {title}\n\
emoji: 🐳\n\
colorFrom: {from}\n\
colorTo: {to}\n\
sdk: static\n\
pinned: false\n\
tags:\n\
  - sitesmith\n\
---\n\n\
Built with sitesmith. Remix it: https://sitesmith.dev/?remix={repo_id}\n"
    )
}

/// Publish a document. Returns the repo id the artifact lives at.
pub async fn deploy(
    state: &SharedState,
    req: DeployRequest,
    token: &str,
) -> Result<String, ApiError> {
    if req.html.trim().is_empty() {
        return Err(ApiError::InvalidRequest("missing html document".to_string()));
    }
    if req.repo_id.is_none() && req.title.is_none() {
        return Err(ApiError::InvalidRequest(
            "either title or repo_id is required".to_string(),
        ));
    }

    let (repo_id, manifest) = match req.repo_id {
        Some(ref id) => (id.clone(), None),
        None => {
            let title = req.title.as_deref().unwrap_or_default();
            let slug = slugify(title);
            if slug.is_empty() {
                return Err(ApiError::InvalidRequest(
                    "title has no usable characters".to_string(),
                ));
            }
            let namespace = state.hub.whoami(token).await.map_err(deploy_err)?;
            let repo_id = format!("{namespace}/{slug}");
            state
                .hub
                .create_space(&repo_id, token)
                .await
                .map_err(deploy_err)?;
            tracing::info!(%repo_id, "created space");
            let manifest = manifest_for(title, &repo_id);
            (repo_id, Some(manifest))
        }
    };

    let document = inject_attribution(&req.html, &repo_id);
    let mut files = vec![
        RepoFile::new(ENTRY_FILE, document),
        RepoFile::new(PROMPT_LOG_FILE, req.prompts.join("\n")),
    ];
    if let Some(manifest) = manifest {
        files.push(RepoFile::new(MANIFEST_FILE, manifest));
    }

    state
        .hub
        .upload_files(&repo_id, &files, "Publish site", token)
        .await
        .map_err(deploy_err)?;
    tracing::info!(%repo_id, files = files.len(), "site published");
    Ok(repo_id)
}

fn deploy_err(e: HubError) -> ApiError {
    ApiError::DeploymentFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("My Cool Site!! 2024"), "my-cool-site-2024");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn slugify_caps_at_96_characters() {
        let long = "a".repeat(200);
        assert_eq!(slugify(&long).len(), 96);
        // A separator landing on the cut point is trimmed, not kept.
        let chunks = vec!["chunk"; 40].join(" ");
        let slug = slugify(&chunks);
        assert!(slug.len() <= 96);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn slugify_of_pure_punctuation_is_empty() {
        assert_eq!(slugify("!!! ???"), "");
    }

    #[test]
    fn attribution_goes_before_body_close() {
        let html = "<html><body>Hello</body></html>";
        let out = inject_attribution(html, "alice/site1");
        let badge = attribution_for("alice/site1");
        assert!(out.contains(&badge));
        assert!(out.ends_with("</body></html>"));
        let badge_at = out.find(&badge).unwrap();
        assert!(badge_at < out.rfind("</body>").unwrap());
    }

    #[test]
    fn attribution_appended_when_no_body_tag() {
        let out = inject_attribution("<h1>Hi</h1>", "alice/site1");
        assert!(out.starts_with("<h1>Hi</h1><p "));
    }

    #[test]
    fn attribution_round_trips_through_strip() {
        let html = "<html><body>Hello</body></html>";
        let out = inject_attribution(html, "alice/site1");
        let back = out.replacen(&attribution_for("alice/site1"), "", 1);
        assert_eq!(back, html);
    }

    #[test]
    fn manifest_carries_title_palette_and_kind() {
        let manifest = manifest_for("My Site", "alice/my-site");
        assert!(manifest.starts_with("---\ntitle: My Site\n"));
        assert!(manifest.contains("sdk: static"));
        assert!(manifest.contains("alice/my-site"));
        for line in ["colorFrom: ", "colorTo: "] {
            let color = manifest
                .lines()
                .find_map(|l| l.strip_prefix(line))
                .expect("color line present");
            assert!(ACCENT_COLORS.contains(&color));
        }
    }
}
