use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use qlrgen_core::{QlrAssembler, Registry};
use qlrgen_raster::CogExtractor;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qlrgen_api::config::ApiConfig;
use qlrgen_api::router::create_router;
use qlrgen_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qlrgen_api=info,qlrgen_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        port = config.port,
        template_config = %config.template_config.display(),
        "Starting qlrgen API server"
    );

    // The registry is loaded before binding so a bad deployment never serves.
    let registry = match Registry::load(&config.template_config) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("Failed to load template registry: {}", e);
            tracing::error!(
                "Remediation:\n\
                1. Check that QLRGEN_TEMPLATE_CONFIG points at the registry file\n\
                2. Verify every template_path exists relative to that file"
            );
            std::process::exit(1);
        }
    };
    tracing::info!(collections = ?registry.collection_ids(), "Template registry loaded");

    let extractor = CogExtractor::new(config.extractor_config())?;
    let assembler = QlrAssembler::new(Arc::new(registry), Arc::new(extractor));
    let state = Arc::new(AppState::new(Arc::new(assembler)));

    let mut app = create_router(state);
    if let Some(allowed) = &config.cors_origin {
        let origin = allowed
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid QLRGEN_CORS_ORIGIN '{}'", allowed))?;
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
        app = app.layer(cors);
        tracing::info!("CORS enabled for {}", allowed);
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
