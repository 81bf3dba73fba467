use ai_text_server::models::build_model_client;
use ai_text_server::{create_router, AppState, Config};
use std::net::SocketAddr;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::load()?;

    // Initialize structured logging; RUST_LOG wins over LOG_LEVEL when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 Starting AI Text Operations Server v{}", env!("CARGO_PKG_VERSION"));

    // MODEL BACKEND: remote inference when a key is configured, local fallback otherwise
    let model = build_model_client(&config.models)?;
    tracing::info!("✅ Model backend ready: {}", model.name());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(model, config);
    let app = create_router(state);

    tracing::info!("🌐 Server starting on http://{}", addr);
    tracing::info!("📡 Available endpoints:");
    tracing::info!("  • GET  /health - Health check");
    tracing::info!("  • POST /api/ai/detect - AI content detection");
    tracing::info!("  • POST /api/generate/{{article,titles,quotes,rewrite}} - Text generation");
    tracing::info!("  • POST /api/classify/{{ticket,resume,sentiment}} - Classification");
    tracing::info!("  • POST /api/assistant/respond - Document question answering");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("✅ Server ready and accepting requests");

    // RELIABILITY: in-flight requests finish before the process exits
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("❌ Server error: {}", e);
            e
        })?;

    tracing::info!("👋 Server shutdown complete");
    Ok(())
}

// RELIABILITY: Multi-Platform Shutdown Signal Handling
// Ctrl+C for interactive runs, SIGTERM for containers
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // Windows doesn't support SIGTERM, use pending future
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Shutdown signal received");
}
