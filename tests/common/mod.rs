//! Fakes for the generative backend, the store and the auth provider.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use promptcraft::data::{
    AiClient, AuthProvider, ChatOptions, Fragment, FragmentStream, PersistenceGateway,
    PromptPayload, User,
};

/// What the scripted backend does for one call.
pub enum Reply {
    /// Resolves with a stream of these items; `Err` items fail mid-stream.
    Fragments(Vec<std::result::Result<Fragment, String>>),
    /// The call itself fails.
    Fail(String),
    /// The call never resolves.
    Hang,
    /// Waits for the gate to be notified, then behaves like the inner reply.
    Gated(Arc<Notify>, Box<Reply>),
}

impl Reply {
    /// The whole body split into fragments of `chunk` characters.
    pub fn chunked(body: &str, chunk: usize) -> Self {
        let chars: Vec<char> = body.chars().collect();
        Reply::Fragments(
            chars
                .chunks(chunk.max(1))
                .map(|c| Ok(Fragment::text(c.iter().collect::<String>())))
                .collect(),
        )
    }

    pub fn body(body: &str) -> Self {
        Self::chunked(body, 16)
    }
}

/// Backend that plays back scripted replies in order and records every call.
#[derive(Default)]
pub struct ScriptedAiClient {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(PromptPayload, ChatOptions)>>,
}

impl ScriptedAiClient {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<(PromptPayload, ChatOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|(payload, _)| payload.text().to_string())
            .collect()
    }

    fn next_reply(&self, payload: PromptPayload, options: ChatOptions) -> Option<Reply> {
        self.calls.lock().unwrap().push((payload, options));
        self.replies.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl AiClient for ScriptedAiClient {
    async fn chat(&self, payload: PromptPayload, options: ChatOptions) -> Result<FragmentStream> {
        let mut reply = self
            .next_reply(payload, options)
            .ok_or_else(|| anyhow!("no scripted reply left"))?;

        loop {
            match reply {
                Reply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
                Reply::Hang => return std::future::pending().await,
                Reply::Fail(message) => return Err(anyhow!(message)),
                Reply::Fragments(items) => {
                    let items = items.into_iter().map(|item| item.map_err(|m| anyhow!(m)));
                    return Ok(Box::pin(stream::iter(items)));
                }
            }
        }
    }
}

/// In-memory key-value store. Writes can be switched to fail.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(anyhow!("write refused for '{}'", key));
        }
        self.insert(key, value);
        Ok(())
    }
}

/// Auth provider with a fixed user.
pub struct FixedAuth {
    user: User,
}

impl FixedAuth {
    pub fn signed_in(id: &str) -> Arc<Self> {
        Arc::new(Self {
            user: User {
                id: id.to_string(),
                username: format!("{}-name", id),
                is_logged_in: true,
            },
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self {
            user: User::anonymous(),
        })
    }
}

#[async_trait]
impl AuthProvider for FixedAuth {
    async fn get_user(&self) -> Result<User> {
        Ok(self.user.clone())
    }

    async fn sign_in(&self) -> Result<User> {
        Ok(self.user.clone())
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }
}

/// A well-formed generator response with the given name and file paths.
pub fn document_json(name: &str, paths: &[&str]) -> String {
    let files: Vec<Value> = paths
        .iter()
        .map(|path| json!({ "path": path, "content": format!("// {}", path) }))
        .collect();
    json!({
        "metadata": {
            "name": name,
            "summary": format!("{} summary", name),
            "architecture": "SPA talking to a REST API",
            "roles": ["admin", "guest"],
            "techStack": {
                "frontend": ["React"],
                "backend": ["Express"],
                "database": ["PostgreSQL"]
            }
        },
        "files": files
    })
    .to_string()
}

/// The same document wrapped in prose and a markdown fence.
pub fn fenced_response(name: &str, paths: &[&str]) -> String {
    format!(
        "Here is your project:\n```json\n{}\n```\nEnjoy!",
        document_json(name, paths)
    )
}
