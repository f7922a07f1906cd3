// ABOUTME: Server binary wiring configuration, stores, the Gemini client, and the router
// ABOUTME: Serves the conversation API with CORS, request tracing, and graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! # Chatforge Server Binary
//!
//! Starts the conversation backend: loads configuration from the
//! environment, opens the SQLite database, builds the Gemini client, and
//! serves the HTTP surface. Shutdown drains pending background writes
//! before the process exits.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use chatforge::{
    config::ServerConfig,
    database::SqliteDatabase,
    llm::{GeminiProvider, LlmProvider},
    logging,
    resources::AppResources,
    routes,
};
use http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// How long shutdown waits for pending background writes
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "chatforge-server")]
#[command(about = "Chatforge - chatbot persona conversation backend")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override SQLite database path
    #[arg(long)]
    database_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Container environments sometimes pass unparseable arguments; fall
    // back to environment-only configuration instead of refusing to start.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Argument parsing failed: {e}");
            eprintln!("Using environment configuration only");
            Args {
                http_port: None,
                database_path: None,
            }
        }
    };

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_path) = args.database_path {
        config.database_path = database_path;
    }

    info!("Starting Chatforge server");
    info!("{}", config.summary());

    let database = Arc::new(SqliteDatabase::connect(&config.database_path).await?);
    database.ensure_schema().await?;

    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(&config.gemini)?);
    let config = Arc::new(config);
    let resources = Arc::new(AppResources::new(database, provider, Arc::clone(&config)));

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let app = routes::router(Arc::clone(&resources))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Fire-and-forget persistence writes may still be in flight.
    info!(
        pending = resources.background.pending(),
        "Draining background tasks"
    );
    if tokio::time::timeout(DRAIN_TIMEOUT, resources.background.drain())
        .await
        .is_err()
    {
        warn!("Background tasks did not drain within {DRAIN_TIMEOUT:?}");
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
