use std::sync::{Arc, Mutex};

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use voicedesk::config::AppConfig;
use voicedesk::db;
use voicedesk::handlers;
use voicedesk::services::ai::ollama::OllamaProvider;
use voicedesk::services::ai::openrouter::OpenRouterProvider;
use voicedesk::services::ai::CompletionProvider;
use voicedesk::services::calendar::google::GoogleCalendarAgent;
use voicedesk::services::calls::exotel::ExotelCallProvider;
use voicedesk::services::calls::twilio::TwilioCallProvider;
use voicedesk::services::calls::{CallAgent, CallProvider};
use voicedesk::services::credentials::SqliteCredentialStore;
use voicedesk::services::email::gmail::GmailAgent;
use voicedesk::services::sessions::InMemorySessionStore;
use voicedesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let llm: Arc<dyn CompletionProvider> = match config.llm_provider.as_str() {
        "ollama" => {
            tracing::info!("using Ollama completion provider (url: {})", config.ollama_url);
            Arc::new(OllamaProvider::new(config.ollama_url.clone(), "llama3.2".to_string()))
        }
        _ => {
            anyhow::ensure!(
                !config.llm_api_key.is_empty(),
                "OPENROUTER_API_KEY or OPENAI_API_KEY must be set when LLM_PROVIDER=openrouter"
            );
            tracing::info!("using OpenRouter completion provider (model: {})", config.llm_model);
            Arc::new(OpenRouterProvider::new(
                config.llm_api_key.clone(),
                config.llm_model.clone(),
                config.backend_url.clone(),
            ))
        }
    };

    let call_provider: Arc<dyn CallProvider> = match config.call_provider.as_str() {
        "exotel" => {
            tracing::info!("using Exotel call provider");
            Arc::new(ExotelCallProvider::new(
                config.exotel_account_sid.clone(),
                config.exotel_api_key.clone(),
                config.exotel_api_token.clone(),
                config.exotel_virtual_number.clone(),
                config.backend_url.clone(),
            ))
        }
        _ => {
            tracing::info!("using Twilio call provider");
            Arc::new(TwilioCallProvider::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_phone_number.clone(),
                config.backend_url.clone(),
            ))
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        llm: llm.clone(),
        email: Arc::new(GmailAgent::new(llm)),
        calendar: Arc::new(GoogleCalendarAgent::new(config.reference_offset())),
        calls: CallAgent::new(call_provider),
        credentials: Box::new(SqliteCredentialStore::new(Arc::new(Mutex::new(conn)))),
        sessions: Box::new(InMemorySessionStore::new()),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
