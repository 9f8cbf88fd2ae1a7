//! Streaming chat-completion client for the inference router.
//!
//! Speaks the OpenAI-compatible wire format: one POST per generation,
//! deltas arriving as `data:` lines on the response body. Errors while
//! *opening* the stream are returned from `stream_chat`; errors after
//! that surface as items on the stream itself, since output may already
//! be in flight.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::providers::ProviderDescriptor;

/// One turn of the model conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The backend reported a billing condition (credits exhausted).
    #[error("{0}")]
    PaymentRequired(String),
    #[error("{0}")]
    Upstream(String),
}

/// Fragments of model output, in arrival order.
pub type DeltaStream = BoxStream<'static, anyhow::Result<String>>;

#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl InferenceClient {
    pub fn new(http: reqwest::Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Open a streaming completion against one provider.
    ///
    /// `max_tokens` must be `None` for providers that reject the
    /// parameter; when `Some`, it is forwarded verbatim.
    pub async fn stream_chat(
        &self,
        provider: &ProviderDescriptor,
        messages: &[ChatMessage],
        max_tokens: Option<usize>,
        token: Option<&str>,
    ) -> Result<DeltaStream, LlmError> {
        let url = format!("{}/{}/v1/chat/completions", self.base_url, provider.id);
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(cap) = max_tokens {
            body["max_tokens"] = cap.into();
        }

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| LlmError::Upstream(format!("inference request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::PAYMENT_REQUIRED
                || text.contains("exceeded your monthly included credits")
            {
                // Surfaced verbatim so the caller can show the upgrade path.
                let message = if text.trim().is_empty() {
                    "inference credits exhausted".to_string()
                } else {
                    text
                };
                return Err(LlmError::PaymentRequired(message));
            }
            return Err(LlmError::Upstream(format!(
                "inference returned {status}: {text}"
            )));
        }

        Ok(deltas(resp))
    }
}

// ── SSE parsing ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What a single line of the response body contributes.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(content) if !content.is_empty() => SseLine::Delta(content),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

struct SseReader {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    // Raw bytes so a multi-byte character split across network chunks
    // is only decoded once a full line is available.
    buf: Vec<u8>,
    ready: VecDeque<String>,
    done: bool,
}

impl SseReader {
    fn take_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            match parse_sse_line(line.trim_end()) {
                SseLine::Delta(delta) => self.ready.push_back(delta),
                SseLine::Done => {
                    self.done = true;
                    break;
                }
                SseLine::Skip => {}
            }
        }
    }
}

/// Adapt a streaming HTTP response into a stream of content deltas.
fn deltas(resp: reqwest::Response) -> DeltaStream {
    let reader = SseReader {
        body: resp.bytes_stream().boxed(),
        buf: Vec::new(),
        ready: VecDeque::new(),
        done: false,
    };
    futures::stream::unfold(reader, |mut r| async move {
        loop {
            if let Some(delta) = r.ready.pop_front() {
                return Some((Ok(delta), r));
            }
            if r.done {
                return None;
            }
            match r.body.next().await {
                Some(Ok(chunk)) => {
                    r.buf.extend_from_slice(&chunk);
                    r.take_lines();
                }
                Some(Err(e)) => {
                    r.done = true;
                    return Some((Err(anyhow::anyhow!("inference stream failed: {e}")), r));
                }
                None => {
                    // Flush a trailing line without a newline, then end.
                    if !r.buf.is_empty() {
                        let line = String::from_utf8_lossy(&r.buf).to_string();
                        r.buf.clear();
                        if let SseLine::Delta(delta) = parse_sse_line(line.trim_end()) {
                            r.ready.push_back(delta);
                        }
                    }
                    r.done = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"<html>"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta("<html>".to_string()));
    }

    #[test]
    fn done_sentinel_terminates() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
    }

    #[test]
    fn skips_role_chunks_blank_lines_and_noise() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: not-json"), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#),
            SseLine::Skip
        );
    }
}
