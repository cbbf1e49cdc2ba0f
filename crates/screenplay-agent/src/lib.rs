//! AI-analysis orchestration: LLM client, retrieval, context building,
//! refresh workers, conversation compaction, and pub/sub fan-out.

pub mod anthropic;
pub mod anthropic_stream;
pub mod client;
pub mod compact;
pub mod context;
pub mod cost;
pub mod embedding;
pub mod error;
pub mod provider;
pub mod pubsub;
pub mod retrieval;
pub mod stream;
pub mod workers;

pub use client::LlmClient;
pub use error::{AgentError, Result};
pub use provider::{ChatRequest, ChatResponse, EmbeddingProvider, LlmProvider, Message, ProviderError, Role, Usage};
pub use retrieval::{RetrievalHints, RetrievalResult, Retriever};
pub use workers::Workers;
