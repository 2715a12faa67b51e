use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::PipelineError;
use crate::data::{AiClient, ChatOptions, ImagePayload, PromptPayload};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// How long the backend has to hand back a consumable stream.
pub const GENERATION_DEADLINE: Duration = Duration::from_millis(60_000);

const PROGRESS_EVERY: usize = 10;

/// Calls the generative backend and concatenates the streamed text.
#[derive(Clone)]
pub struct StreamAggregator {
    client: Arc<dyn AiClient>,
    model: String,
    deadline: Duration,
}

impl StreamAggregator {
    pub fn new(client: Arc<dyn AiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            deadline: GENERATION_DEADLINE,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs one backend call and returns the full response text.
    ///
    /// Only obtaining the stream is bounded by the deadline. When it elapses the
    /// pending call future is dropped; work the client spawned on its own is not
    /// reached and may keep running until it notices the dropped receiver.
    pub async fn run(
        &self,
        prompt_text: &str,
        attachment: Option<ImagePayload>,
    ) -> Result<String, PipelineError> {
        let payload = PromptPayload::new(prompt_text, attachment);
        let options = ChatOptions {
            model: self.model.clone(),
            stream: true,
        };

        info!(model = %self.model, with_image = payload.image().is_some(), "Requesting generation");

        let call = self.client.chat(payload, options);
        let mut stream = match tokio::time::timeout(self.deadline, call).await {
            Err(_) => {
                warn!(model = %self.model, deadline_ms = self.deadline.as_millis() as u64, "Generation call timed out");
                return Err(PipelineError::TransportTimeout(self.deadline));
            }
            Ok(Err(e)) => {
                warn!(model = %self.model, error = %e, "Generation call failed");
                return Err(PipelineError::TransportFailure(e));
            }
            Ok(Ok(stream)) => stream,
        };

        info!(model = %self.model, "Stream connection established");

        let mut content = String::new();
        let mut fragment_count = 0usize;

        while let Some(item) = stream.next().await {
            let fragment = item.map_err(PipelineError::TransportFailure)?;
            fragment_count += 1;

            if let Some(text) = fragment.text {
                content.push_str(&text);
            }

            if fragment_count % PROGRESS_EVERY == 0 {
                debug!(fragments = fragment_count, "Receiving fragments");
            }
        }

        info!(
            fragments = fragment_count,
            length = content.len(),
            "Stream complete"
        );

        if content.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        Ok(content)
    }
}
