use finguard::api::{self, AppState};
use finguard::config::Config;
use finguard::llm::LlmClient;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "finguard.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::load_or_default(CONFIG_PATH)?;

    // Fail fast if the LLM credential is absent
    let llm = LlmClient::from_env(&cfg.llm)?;
    info!(
        base_url = %cfg.llm.base_url,
        model = %llm.model(),
        "LLM client initialized"
    );

    let state = Arc::new(AppState { llm });
    let app = api::router(state, cfg.limits.max_upload_bytes);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    info!(addr = %addr, "Server listening");
    info!("  POST /api/process-invoice - upload and screen an invoice");
    info!("  GET  /api/health          - health check");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
