//! MCP server initialization for stdio and SSE transports.
//!
//! Provides [`serve_stdio`] and [`serve_sse`] entry points that wire up the model
//! clients, the shared index, and the MCP tool handler into a running server.

use crate::tools::MedVisionTools;
use anyhow::{Context, Result};
use medvision::config::MedVisionConfig;
use medvision::index::SharedIndex;
use medvision::inference;
use medvision::retrieval::RetrievalEngine;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Build the engine from config and load the startup index if one is
/// configured. Returns (engine, config) wrapped in Arc for sharing.
pub async fn setup_engine(
    config: MedVisionConfig,
) -> Result<(Arc<RetrievalEngine>, Arc<MedVisionConfig>)> {
    let (encoder, classifier) = inference::create_models(&config.models)?;
    tracing::info!(
        endpoint = %config.models.endpoint,
        encoder = encoder.name(),
        classifier = classifier.name(),
        "model clients ready"
    );

    let engine = RetrievalEngine::new(
        Arc::new(SharedIndex::empty()),
        encoder,
        classifier,
        config.retrieval.metric,
    );

    match config.resolved_index_path() {
        Some(path) if path.exists() => {
            let summary = engine
                .load_index(&path)
                .await
                .with_context(|| format!("failed to load index at {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                size = summary.size,
                dimension = summary.dimension,
                "startup index loaded"
            );
        }
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "configured index path does not exist, starting without an index"
            );
        }
        None => tracing::info!("no index configured, use build_index or load_index"),
    }

    Ok((Arc::new(engine), Arc::new(config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: MedVisionConfig) -> Result<()> {
    tracing::info!("starting MedVision MCP server on stdio");

    let (engine, config) = setup_engine(config).await?;

    let tools = MedVisionTools::new(engine, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: MedVisionConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting MedVision MCP server on SSE/HTTP");

    let (engine, config) = setup_engine(config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(MedVisionTools::new(engine.clone(), config.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down SSE server");
        })
        .await?;

    Ok(())
}
