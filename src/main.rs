//! Chatnest - client-side conversation session manager
//!
//! Signs users in through an identity provider, keeps their conversations
//! in sync with a REST backend and a local cache, and asks an LLM for a
//! reply to every user message. A local HTTP API drives the session.

mod api;
mod auth;
mod backend;
mod cache;
mod config;
mod llm;
mod runtime;
mod session;
mod system_prompt;

use api::{create_router, AppState};
use auth::{FirebaseIdentity, IdentityProvider};
use backend::RestBackend;
use cache::SqliteCache;
use config::AppConfig;
use llm::ModelRegistry;
use runtime::{spawn_session, RegistryReplyGenerator};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatnest=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure cache directory exists
    if let Some(parent) = config.cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.cache_path.display(), "Opening local cache");
    let cache = SqliteCache::open(&config.cache_path)?;

    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));
    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = ?llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set MISTRAL_API_KEY or GEMINI_API_KEY.");
    }

    if config.firebase_api_key.is_none() {
        tracing::warn!("FIREBASE_API_KEY is not set; sign-in will be unavailable");
    }
    let identity: Arc<dyn IdentityProvider> = Arc::new(FirebaseIdentity::new(
        config.firebase_api_key.clone().unwrap_or_default(),
        config.http_timeout,
    )?);

    tracing::info!(url = %config.backend_url, "Using conversation backend");
    let backend = RestBackend::new(&config.backend_url, config.http_timeout)?;

    let session = spawn_session(
        backend,
        RegistryReplyGenerator::new(llm_registry),
        cache,
        identity.subscribe(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(session, identity))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Chatnest listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
