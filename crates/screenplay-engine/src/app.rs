//! Shared application state and router assembly.
//!
//! One `Arc<AppState>` handed to every handler, constructed once at
//! startup from long-lived collaborators (spec §9 "Global state":
//! "construct a configuration value at startup and pass it through
//! component constructors ... explicitly injected, not ambient").

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use rusqlite::Connection;

use screenplay_agent::{pubsub::PubSub, LlmClient, Workers};
use screenplay_agent::anthropic::AnthropicProvider;
use screenplay_agent::embedding::HttpEmbeddingProvider;
use screenplay_agent::retrieval::Retriever;
use screenplay_conversation::ConversationManager;
use screenplay_core::config::ScreenplayConfig;
use screenplay_crdt::CrdtStore;
use screenplay_queue::JobQueue;
use screenplay_store::ScriptRepository;

pub struct AppState {
    pub config: ScreenplayConfig,
    pub repo: Arc<ScriptRepository>,
    pub crdt: Arc<CrdtStore>,
    pub conversations: Arc<ConversationManager>,
    pub queue: Arc<JobQueue>,
    pub llm: Arc<LlmClient>,
    pub retriever: Arc<Retriever>,
    pub workers: Arc<Workers>,
    pub pubsub: Arc<PubSub>,
}

impl AppState {
    /// Opens the document, CRDT, conversation, and queue connections
    /// against the same SQLite file (WAL mode makes the separate
    /// connections per spec §4.9's design note safe) and wires every
    /// long-lived collaborator the handlers need.
    pub fn new(config: ScreenplayConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(
            std::path::Path::new(&config.database.path)
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
        )?;

        let store_conn = Connection::open(&config.database.path)?;
        screenplay_store::db::init_db(&store_conn)?;
        let repo = Arc::new(ScriptRepository::new(store_conn));

        let crdt_conn = Connection::open(&config.database.path)?;
        screenplay_crdt::db::init_db(&crdt_conn)?;
        let crdt = Arc::new(CrdtStore::new(crdt_conn));

        let conv_conn = Connection::open(&config.database.path)?;
        screenplay_conversation::db::init_db(&conv_conn)?;
        let conversations = Arc::new(ConversationManager::new(conv_conn));

        let queue_conn = Connection::open(&config.database.path)?;
        screenplay_queue::db::init_db(&queue_conn)?;
        let queue = Arc::new(JobQueue::new(queue_conn)?);

        let anthropic = config.providers.anthropic.clone().unwrap_or_default();
        let embedding = config.providers.embedding.clone().unwrap_or_else(|| {
            screenplay_core::config::EmbeddingConfig {
                api_key: String::new(),
                base_url: "https://api.anthropic.com".to_string(),
                model: "screenplay-embed-1".to_string(),
                dimension: 1536,
            }
        });

        let provider = Arc::new(AnthropicProvider::new(anthropic.api_key.clone(), Some(anthropic.base_url.clone())));
        let embedder = Arc::new(HttpEmbeddingProvider::new(embedding.api_key.clone(), embedding.base_url.clone()));
        let llm = Arc::new(LlmClient::new(provider, embedder, repo.clone()));

        let retriever = Arc::new(Retriever::new(repo.clone(), llm.clone(), embedding.model.clone()));
        let workers = Arc::new(Workers::new(
            repo.clone(),
            llm.clone(),
            anthropic.sonnet_model.clone(),
            anthropic.haiku_model.clone(),
            embedding.model.clone(),
            config.queue.clone(),
        ));
        let pubsub = Arc::new(PubSub::new());

        Ok(Self { config, repo, crdt, conversations, queue, llm, retriever, workers, pubsub })
    }
}

/// Binds the spec §6 entrypoints onto routes. `Chat`/`OnSceneChanged`/
/// `UpdateScriptWithCAS`/`StoreCRDTUpdate`+`LoadCRDT`/`AnalyzeScript` each
/// get exactly one route; no auth/session/multi-tenant surface is added
/// (spec §1 Non-goals — HTTP routing and auth are external collaborators).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route("/scenes/{scene_id}/changed", post(crate::http::scenes::on_scene_changed_handler))
        .route("/scripts/{script_id}/cas", post(crate::http::scenes::update_with_cas_handler))
        .route("/scripts/{script_id}/analyze", post(crate::http::analyze::analyze_script_handler))
        .route(
            "/scripts/{script_id}/crdt",
            get(crate::http::crdt::load_handler).post(crate::http::crdt::store_update_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
