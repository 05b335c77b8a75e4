pub mod client;
pub mod config;
pub mod error;
pub mod services;
pub mod stream;
pub mod transport;
pub mod types;
pub mod verifier;

pub use client::SuperAgentClient;
pub use config::{ClientConfig, SdkConfig};
pub use error::{classify, ErrorKind, Result, SdkError};
pub use services::ServicePreset;
pub use stream::{chunk_stream, decode_lines, ChunkStream, SseDecoder};
pub use types::chat::{
    ChatCompletionRequest, Completion, EnsembleConfig, FinishReason, Message, Model, Role,
    StreamChunk, Usage,
};
pub use types::verifier::{
    ModelRef, ModelWithScore, ProviderHealth, ScoreResult, ScoringWeights, VerificationRequest,
    VerificationResult,
};
pub use verifier::VerifierClient;
