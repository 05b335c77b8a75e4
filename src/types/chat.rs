//! Records for the OpenAI-compatible chat API of the SuperAgent service.
//!
//! Covers the request we send, the full completion we get back, and the
//! incremental chunks of a streamed completion.

use super::{is_none_or_empty, nullable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MODEL: &str = "superagent-ensemble";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    #[default]
    Assistant,
    Tool,
    /// Any role string this SDK does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(deserialize_with = "nullable")]
    pub role: Role,
    #[serde(deserialize_with = "nullable")]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls are passed through untouched.
    #[serde(skip_serializing_if = "is_none_or_empty")]
    pub tool_calls: Option<Vec<Value>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<Value>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }
}

/// Why the model stopped generating. Unknown reasons are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other(s),
        }
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// How the service should combine answers from several providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub strategy: String,
    pub min_providers: u32,
    pub confidence_threshold: f64,
    pub fallback_to_best: bool,
    /// Seconds.
    pub timeout: u64,
    pub preferred_providers: Vec<String>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            strategy: "confidence_weighted".to_string(),
            min_providers: 2,
            confidence_threshold: 0.8,
            fallback_to_best: true,
            timeout: 30,
            preferred_providers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub top_p: f64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble_config: Option<EnsembleConfig>,
    /// Extra top-level parameters forwarded as-is. Keys must not repeat the
    /// named fields above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            messages,
            temperature: 0.7,
            top_p: 1.0,
            stream: false,
            max_tokens: None,
            stop: None,
            ensemble_config: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub fn ensemble_config(mut self, config: EnsembleConfig) -> Self {
        self.ensemble_config = Some(config);
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    #[serde(deserialize_with = "nullable")]
    pub prompt_tokens: u64,
    #[serde(deserialize_with = "nullable")]
    pub completion_tokens: u64,
    #[serde(deserialize_with = "nullable")]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Choice {
    #[serde(deserialize_with = "nullable")]
    pub index: u64,
    #[serde(deserialize_with = "nullable")]
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Completion {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "completion_object")]
    pub object: String,
    #[serde(deserialize_with = "nullable")]
    pub created: u64,
    #[serde(deserialize_with = "nullable")]
    pub model: String,
    #[serde(deserialize_with = "nullable")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Default for Completion {
    fn default() -> Self {
        Self {
            id: String::new(),
            object: COMPLETION_OBJECT.to_string(),
            created: 0,
            model: String::new(),
            choices: Vec::new(),
            usage: None,
        }
    }
}

impl Completion {
    /// Text of the first choice, if there is one.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.created)
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Partial message carried by a chunk. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamChoice {
    #[serde(deserialize_with = "nullable")]
    pub index: u64,
    #[serde(deserialize_with = "nullable")]
    pub delta: StreamDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamChunk {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "chunk_object")]
    pub object: String,
    #[serde(deserialize_with = "nullable")]
    pub created: u64,
    #[serde(deserialize_with = "nullable")]
    pub model: String,
    #[serde(deserialize_with = "nullable")]
    pub choices: Vec<StreamChoice>,
    /// Only sent by servers that report usage on the final chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Default for StreamChunk {
    fn default() -> Self {
        Self {
            id: String::new(),
            object: CHUNK_OBJECT.to_string(),
            created: 0,
            model: String::new(),
            choices: Vec::new(),
            usage: None,
        }
    }
}

impl StreamChunk {
    /// Content fragment of the first choice.
    pub fn delta_content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.created)
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "model_object")]
    pub object: String,
    #[serde(deserialize_with = "nullable")]
    pub created: u64,
    #[serde(deserialize_with = "nullable")]
    pub owned_by: String,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            id: String::new(),
            object: MODEL_OBJECT.to_string(),
            created: 0,
            owned_by: String::new(),
        }
    }
}

fn timestamp(secs: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
}

const COMPLETION_OBJECT: &str = "chat.completion";
const CHUNK_OBJECT: &str = "chat.completion.chunk";
const MODEL_OBJECT: &str = "model";

/// Object kind, with `null` read as `kind`.
fn object_or<'de, D>(deserializer: D, kind: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(|| kind.to_string()))
}

fn completion_object<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    object_or(deserializer, COMPLETION_OBJECT)
}

fn chunk_object<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    object_or(deserializer, CHUNK_OBJECT)
}

fn model_object<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    object_or(deserializer, MODEL_OBJECT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_without_optionals_has_two_keys() {
        let value = serde_json::to_value(Message::user("Hello")).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(value, json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn test_message_with_optionals() {
        let msg = Message::assistant("")
            .with_name("helper")
            .with_tool_calls(vec![json!({"id": "call_1", "type": "function"})]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["name"], "helper");
        assert_eq!(value["tool_calls"][0]["id"], "call_1");
    }

    #[test]
    fn test_empty_tool_calls_are_omitted() {
        let value = serde_json::to_value(Message::user("x").with_tool_calls(vec![])).unwrap();
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_message_tolerates_null_content_and_unknown_role() {
        let msg: Message =
            serde_json::from_value(json!({"role": "critic", "content": null})).unwrap();
        assert_eq!(msg.role, Role::Unknown);
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_completion_from_partial_payload() {
        let completion: Completion = serde_json::from_value(json!({
            "choices": [{"message": {"content": "Hi"}}]
        }))
        .unwrap();
        assert_eq!(completion.id, "");
        assert_eq!(completion.object, "chat.completion");
        assert_eq!(completion.created, 0);
        assert_eq!(completion.choices[0].index, 0);
        assert_eq!(completion.choices[0].message.role, Role::Assistant);
        assert_eq!(completion.content(), Some("Hi"));
        assert!(completion.choices[0].finish_reason.is_none());
        assert!(completion.usage.is_none());
    }

    #[test]
    fn test_completion_full_payload() {
        let completion: Completion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "superagent-ensemble",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        }))
        .unwrap();
        assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.as_ref().unwrap().total_tokens, 8);
        assert_eq!(completion.created_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_unknown_finish_reason_kept() {
        let choice: StreamChoice =
            serde_json::from_value(json!({"delta": {}, "finish_reason": "moderated"})).unwrap();
        assert_eq!(
            choice.finish_reason,
            Some(FinishReason::Other("moderated".to_string()))
        );
        let back = serde_json::to_value(&choice).unwrap();
        assert_eq!(back["finish_reason"], "moderated");
    }

    #[test]
    fn test_chunk_defaults() {
        let chunk: StreamChunk = serde_json::from_value(json!({"id": "1"})).unwrap();
        assert_eq!(chunk.object, "chat.completion.chunk");
        assert!(chunk.choices.is_empty());
        assert!(chunk.delta_content().is_none());
    }

    #[test]
    fn test_delta_absent_fields_stay_none() {
        let chunk: StreamChunk = serde_json::from_value(json!({
            "choices": [{"index": 0, "delta": {"content": "Hel"}}]
        }))
        .unwrap();
        assert!(chunk.choices[0].delta.role.is_none());
        assert_eq!(chunk.delta_content(), Some("Hel"));
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let req = ChatCompletionRequest::new(vec![Message::user("Hello")]);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["temperature"], 0.7);
        assert_eq!(value["top_p"], 1.0);
        assert_eq!(value["stream"], false);
        assert!(value.get("max_tokens").is_none());
        assert!(value.get("stop").is_none());
        assert!(value.get("ensemble_config").is_none());
    }

    #[test]
    fn test_request_extra_params_are_top_level() {
        let req = ChatCompletionRequest::new(vec![Message::user("Hi")])
            .max_tokens(64)
            .param("user", json!("u-1"));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["max_tokens"], 64);
        assert_eq!(value["user"], "u-1");
    }

    #[test]
    fn test_model_survives_server_echo() {
        let req = ChatCompletionRequest::new(vec![Message::user("Hi")]).model("gpt-4o-mini");
        let wire = serde_json::to_value(&req).unwrap();
        let echoed: Completion = serde_json::from_value(json!({"model": wire["model"]})).unwrap();
        assert_eq!(echoed.model, req.model);
    }

    #[test]
    fn test_ensemble_config_always_sends_every_field() {
        let value = serde_json::to_value(EnsembleConfig::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "strategy": "confidence_weighted",
                "min_providers": 2,
                "confidence_threshold": 0.8,
                "fallback_to_best": true,
                "timeout": 30,
                "preferred_providers": []
            })
        );
    }

    #[test]
    fn test_model_defaults() {
        let model: Model = serde_json::from_value(json!({"id": "gpt-4"})).unwrap();
        assert_eq!(model.object, "model");
        assert_eq!(model.owned_by, "");
    }

    #[test]
    fn test_null_object_keeps_record_kind() {
        let completion: Completion =
            serde_json::from_value(json!({"id": "c1", "object": null, "created": null})).unwrap();
        assert_eq!(completion.id, "c1");
        assert_eq!(completion.object, "chat.completion");
        assert_eq!(completion.created, 0);

        let chunk: StreamChunk =
            serde_json::from_value(json!({"id": "c2", "object": null, "choices": []})).unwrap();
        assert_eq!(chunk.object, "chat.completion.chunk");

        let model: Model = serde_json::from_value(json!({"id": "gpt-4", "object": null})).unwrap();
        assert_eq!(model.object, "model");
    }
}
