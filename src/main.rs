//! Persona Chat - conversation orchestration engine
//!
//! Serves persona-driven chat sessions over HTTP, with model replies,
//! heuristic fallback and inactivity follow-ups.

mod api;
mod auth;
mod config;
mod engine;
mod generator;
mod heuristic;
mod llm;
mod message;
mod persona;
mod prompt;
mod scheduler;
mod session;

use api::{create_router, AppState};
use auth::LocalAuthProvider;
use config::EngineConfig;
use engine::Engine;
use llm::{LlmConfig, ModelRegistry, RegistryLlmClient};
use persona::PersonaCatalog;
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
                .unwrap_or_else(|_| "persona_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = EngineConfig::from_env();
    let port = config.port;

    // Initialize LLM registry
    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            model = %config.model,
            "LLM registry initialized"
        );
        if llm_registry.get(&config.model).is_none() {
            tracing::warn!(model = %config.model, "Configured model is not registered; replies will use heuristics");
        }
    } else {
        tracing::warn!("No LLM API keys configured. Set OPENAI_API_KEY or LLM_GATEWAY. Replies will use heuristics.");
    }

    let display_name = std::env::var("PERSONA_CHAT_USER").unwrap_or_else(|_| "guest".to_string());
    let auth = Arc::new(LocalAuthProvider::new(display_name));

    let engine = Arc::new(Engine::new(
        config,
        PersonaCatalog::with_defaults(),
        auth,
        Arc::new(RegistryLlmClient::new(llm_registry)),
    ));
    engine.watch_auth();

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(engine))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Persona chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
