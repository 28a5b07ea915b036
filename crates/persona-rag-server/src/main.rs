use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use persona_rag_server::bootstrap::build_state;
use persona_rag_server::build_router;
use persona_rag_server::config::Settings;
use persona_rag_server::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logger(Path::new("logs"))?;

    info!("🚀 Starting persona RAG server...");

    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let state = build_state(settings).await?;
    info!("✅ Knowledge base indexed");

    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
