use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::stream::BoxStream;
use std::fs;
use std::path::Path;

use super::project::User;

/// An image attached to a prompt, held as a base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data_uri: String,
}

impl ImagePayload {
    pub fn from_data_uri(data_uri: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
        }
    }

    /// Reads an image file and encodes it as a data URI.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;
        let mime = mime_for(path);
        Ok(Self::from_bytes(mime, &bytes))
    }

    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self {
            data_uri: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
        }
    }

    /// Splits the data URI into `(mime_type, base64_data)`.
    pub fn parts(&self) -> Option<(&str, &str)> {
        let rest = self.data_uri.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        Some((mime, data))
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// What is sent to the generative backend: the prompt text, optionally paired
/// with an image. An image is never sent on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPayload {
    Text(String),
    WithImage { text: String, image: ImagePayload },
}

impl PromptPayload {
    pub fn new(text: impl Into<String>, image: Option<ImagePayload>) -> Self {
        let text = text.into();
        match image {
            Some(image) => PromptPayload::WithImage { text, image },
            None => PromptPayload::Text(text),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            PromptPayload::Text(text) | PromptPayload::WithImage { text, .. } => text,
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            PromptPayload::Text(_) => None,
            PromptPayload::WithImage { image, .. } => Some(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub model: String,
    pub stream: bool,
}

/// One piece of a streamed response. Fragments without text are legal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub text: Option<String>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// The generative backend.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Starts a chat call. Resolves once the response stream can be consumed.
    async fn chat(&self, payload: PromptPayload, options: ChatOptions) -> Result<FragmentStream>;
}

/// Key-value storage addressed by string keys.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Returns `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_user(&self) -> Result<User>;

    async fn sign_in(&self) -> Result<User>;

    async fn sign_out(&self) -> Result<()>;
}
