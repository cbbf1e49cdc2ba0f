//! Batch text-embedding client (spec §4.6 `embed`, §6 "Embedding API":
//! request = `{model, inputs: [text]}`, response = `[vector]`, dimension
//! 1536 assumed).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::provider::{EmbeddingProvider, ProviderError, Usage};

pub const EMBEDDING_DIM: usize = 1536;

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpEmbeddingProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { client: reqwest::Client::new(), api_key, base_url }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<(Vec<Vec<f32>>, Usage), ProviderError> {
        if inputs.is_empty() {
            return Ok((Vec::new(), Usage::default()));
        }

        debug!(model, count = inputs.len(), "requesting embeddings");

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": model, "input": inputs }))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_ms: 5000 });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message: text });
        }

        let body: EmbeddingResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let vectors = body.data.into_iter().map(|d| d.embedding).collect();
        let usage = Usage {
            input_tokens: body.usage.map(|u| u.prompt_tokens).unwrap_or(0),
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 0,
            output_tokens: 0,
        };
        Ok((vectors, usage))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    prompt_tokens: u32,
}
