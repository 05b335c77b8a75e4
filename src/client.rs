//! Client for the SuperAgent orchestration service.
//!
//! The API mirrors OpenAI's: chat completions (plain or streamed) and model
//! listing, plus the service's own health and provider endpoints.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::stream::{chunk_stream, ChunkStream};
use crate::transport::{segment, take_field, to_body, Transport};
use crate::types::chat::{ChatCompletionRequest, Completion, Model};

use serde_json::Value;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";
const PROVIDERS_PATH: &str = "/v1/providers";
const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone)]
pub struct SuperAgentClient {
    transport: Transport,
}

impl SuperAgentClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// Client with the built-in defaults and the key from `SUPERAGENT_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(&ClientConfig::superagent())
    }

    pub fn with_http_client(client: reqwest::Client, config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::with_client(client, config)?,
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Create a chat completion and wait for the whole answer.
    pub async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<Completion> {
        let request = ChatCompletionRequest {
            stream: false,
            ..request
        };
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Chat completion");
        self.transport.post(CHAT_COMPLETIONS_PATH, &request).await
    }

    /// Create a chat completion and stream it back chunk by chunk.
    ///
    /// An error status is returned here, before any chunk. Failures after the
    /// stream has started arrive as the stream's last item.
    pub async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream> {
        let request = ChatCompletionRequest {
            stream: true,
            ..request
        };
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Chat completion (streaming)");

        let body = to_body(&request)?;
        let response = self
            .transport
            .open_stream(CHAT_COMPLETIONS_PATH, &body)
            .await?;

        Ok(chunk_stream(
            response.bytes_stream(),
            self.transport.timeout(),
        ))
    }

    /// List the models the service exposes.
    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let envelope: Value = self.transport.get(MODELS_PATH).await?;
        let data: Option<Vec<Model>> = take_field(envelope.clone(), "data")?;
        match data {
            Some(models) => Ok(models),
            None => take_field(envelope, "models"),
        }
    }

    pub async fn retrieve_model(&self, model_id: &str) -> Result<Model> {
        self.transport
            .get(&format!("{MODELS_PATH}/{}", segment(model_id)))
            .await
    }

    pub async fn health(&self) -> Result<Value> {
        self.transport.get(HEALTH_PATH).await
    }

    /// Upstream providers known to the service, as returned.
    pub async fn providers(&self) -> Result<Vec<Value>> {
        let envelope: Value = self.transport.get(PROVIDERS_PATH).await?;
        take_field(envelope, "providers")
    }
}
