//! Google Gemini backend speaking the REST `streamGenerateContent` API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::data::{AiClient, ChatOptions, Fragment, FragmentStream, PromptPayload};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client producing one fragment per server-sent event.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self, model: &str, stream: bool) -> String {
        let endpoint = if stream {
            "streamGenerateContent?alt=sse&"
        } else {
            "generateContent?"
        };
        format!(
            "{}/models/{}:{}key={}",
            self.base_url, model, endpoint, self.api_key
        )
    }
}

fn to_gemini_request(payload: &PromptPayload) -> GeminiRequest {
    let mut parts = vec![GeminiRequestPart::Text {
        text: payload.text().to_string(),
    }];

    if let Some(image) = payload.image() {
        match image.parts() {
            Some((mime_type, data)) => parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                },
            }),
            None => warn!("Attached image is not a base64 data URI, sending text only"),
        }
    }

    GeminiRequest {
        contents: vec![GeminiRequestContent {
            role: "user".to_string(),
            parts,
        }],
    }
}

/// Parses one SSE line. `None` for lines that carry no event data.
fn parse_sse_line(line: &str) -> Option<Result<Fragment>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<GeminiResponse>(data) {
        Ok(chunk) => Some(chunk.into_fragment()),
        Err(e) => {
            warn!("Failed to parse SSE data: {} - Error: {}", data, e);
            None
        }
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn chat(&self, payload: PromptPayload, options: ChatOptions) -> Result<FragmentStream> {
        let url = self.build_url(&options.model, options.stream);
        let request = to_gemini_request(&payload);

        debug!(model = %options.model, stream = options.stream, "Sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error: {}", text);
            anyhow::bail!("Gemini API error {}: {}", status, text);
        }

        if !options.stream {
            let body: GeminiResponse = response
                .json()
                .await
                .context("Failed to decode Gemini response")?;
            let fragment = body.into_fragment();
            return Ok(Box::pin(stream::iter(vec![fragment])));
        }

        let bytes = Box::pin(response.bytes_stream());
        let events = stream::unfold(
            (bytes, Vec::<u8>::new(), false),
            |(mut bytes, mut buffer, mut finished)| async move {
                loop {
                    if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        if let Some(item) = parse_sse_line(line.trim()) {
                            return Some((item, (bytes, buffer, finished)));
                        }
                        continue;
                    }

                    if finished {
                        let line = String::from_utf8_lossy(&buffer).trim().to_string();
                        buffer.clear();
                        return parse_sse_line(&line).map(|item| (item, (bytes, buffer, finished)));
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            buffer.clear();
                            let err = anyhow::Error::new(e).context("Gemini stream error");
                            return Some((Err(err), (bytes, buffer, true)));
                        }
                        None => finished = true,
                    }
                }
            },
        );

        Ok(Box::pin(events))
    }
}

// === Gemini API Types ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiRequestContent>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestContent {
    role: String,
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiApiError>,
}

impl GeminiResponse {
    fn into_fragment(self) -> Result<Fragment> {
        if let Some(err) = self.error {
            anyhow::bail!("Gemini API error {}: {}", err.code.unwrap_or_default(), err.message);
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(if text.is_empty() {
            Fragment::empty()
        } else {
            Fragment::text(text)
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}
