//! Generation orchestration: conversation assembly, provider limits,
//! quota, and the marker-terminated streaming loop.

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::llm::{ChatMessage, LlmError};
use crate::providers;
use crate::server::SharedState;

/// Fixed instruction constraining the model to one self-contained page.
const SYSTEM_PROMPT: &str = "ONLY USE HTML, CSS AND JAVASCRIPT. If you want to use an icon set \
or font, import the library first. Use TailwindCSS for styling wherever possible (import \
<script src=\"https://cdn.tailwindcss.com\"></script> in the head) and fall back to custom CSS \
only where Tailwind cannot express something. Elaborate on the design; aim for a polished, \
unique page. ALWAYS RESPOND WITH EXACTLY ONE COMPLETE HTML FILE.";

/// Literal marking a finished document.
pub const CLOSING_MARKER: &str = "</html>";

fn default_provider_key() -> String {
    providers::AUTO.to_string()
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Prompt from the turn before this one, when the user is iterating.
    #[serde(default)]
    pub previous_prompt: Option<String>,
    /// Previously generated document, used as editing context.
    #[serde(default)]
    pub html: Option<String>,
    /// Provider key, or `"auto"` for the server default.
    #[serde(default = "default_provider_key")]
    pub provider: String,
}

/// Ordered conversation for one generation call.
fn build_messages(req: &GenerateRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    if let Some(previous) = &req.previous_prompt {
        messages.push(ChatMessage::user(previous.clone()));
    }
    if let Some(html) = &req.html {
        messages.push(ChatMessage::assistant(format!(
            "The current code is: {html}"
        )));
    }
    messages.push(ChatMessage::user(req.prompt.clone()));
    messages
}

/// Character-count stand-in for the token budget.
fn context_estimate(req: &GenerateRequest) -> usize {
    req.prompt.len()
        + req.previous_prompt.as_deref().map_or(0, str::len)
        + req.html.as_deref().map_or(0, str::len)
}

/// Marker detection for one in-flight generation. Owned by the consumer
/// task; dropped when the call ends.
struct GenerationSession {
    buffer: String,
    quirky: bool,
}

impl GenerationSession {
    fn new(quirky: bool) -> Self {
        Self {
            buffer: String::new(),
            quirky,
        }
    }

    /// Feed one fragment. Returns the text to emit and whether the
    /// document is complete.
    ///
    /// Quirky providers keep generating past the marker, so a
    /// marker-bearing fragment is cut at the first occurrence before
    /// emission. Everyone else emits verbatim and finishes once the
    /// accumulated buffer contains the marker.
    fn push(&mut self, fragment: &str) -> (String, bool) {
        if self.quirky {
            if let Some(pos) = fragment.find(CLOSING_MARKER) {
                let kept = &fragment[..pos + CLOSING_MARKER.len()];
                self.buffer.push_str(kept);
                return (kept.to_string(), true);
            }
            self.buffer.push_str(fragment);
            (fragment.to_string(), false)
        } else {
            self.buffer.push_str(fragment);
            (fragment.to_string(), self.buffer.contains(CLOSING_MARKER))
        }
    }
}

/// Run the pre-flight checks and open the backend stream.
///
/// Fragments arrive on the returned channel in backend order; the
/// channel closes on the document marker, stream end, or upstream
/// failure. Failures after the first fragment are not reported to the
/// caller; the body simply ends early.
pub async fn generate(
    state: &SharedState,
    req: GenerateRequest,
    token: Option<String>,
    client_ip: String,
) -> Result<mpsc::Receiver<String>, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::InvalidRequest("missing prompt".to_string()));
    }

    let provider = providers::resolve(&req.provider);

    // Only an explicit provider choice is held to its ceiling; "auto"
    // lets the backend route around it.
    if req.provider != providers::AUTO && context_estimate(&req) >= provider.max_tokens {
        return Err(ApiError::ContextTooLarge {
            provider: provider.name,
            max_tokens: provider.max_tokens,
        });
    }

    if !state.quota.admit(&client_ip, token.is_some()) {
        tracing::info!(%client_ip, "anonymous generation quota exhausted");
        return Err(ApiError::QuotaExceeded);
    }

    let messages = build_messages(&req);
    let cap = provider
        .supports_max_tokens_param
        .then_some(provider.max_tokens);
    let bearer = token.or_else(|| state.config.default_token.clone());

    let stream = state
        .inference
        .stream_chat(provider, &messages, cap, bearer.as_deref())
        .await
        .map_err(|e| match e {
            LlmError::PaymentRequired(msg) => ApiError::PaymentRequired(msg),
            LlmError::Upstream(msg) => ApiError::GenerationFailed(msg),
        })?;

    tracing::debug!(
        provider = provider.key,
        turns = messages.len(),
        "generation stream opened"
    );

    let (tx, rx) = mpsc::channel::<String>(32);
    let quirky = provider.quirky_truncation;
    tokio::spawn(async move {
        let mut session = GenerationSession::new(quirky);
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            let fragment = match item {
                Ok(f) => f,
                Err(e) => {
                    // Output may already be in flight; the body just ends.
                    tracing::warn!("generation stream error: {e}");
                    return;
                }
            };
            if fragment.is_empty() {
                continue;
            }
            let (out, done) = session.push(&fragment);
            if tx.send(out).await.is_err() {
                // Client went away; stop reading from the backend.
                tracing::debug!("client disconnected mid-generation");
                return;
            }
            if done {
                return;
            }
        }
        // An unterminated stream still counts as success; the caller
        // gets whatever was produced.
        tracing::debug!("stream ended without closing marker");
    });

    Ok(rx)
}
