// ABOUTME: HTTP route registration for the conversation surface and health check
// ABOUTME: Composes the axum router handed to the platform's server shell
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! HTTP surface.
//!
//! The platform shell mounts this router behind its own authentication
//! middleware, which attaches the [`AuthenticatedUser`] request extension
//! consumed here for tracing.
//!
//! [`AuthenticatedUser`]: crate::models::AuthenticatedUser

pub mod conversations;

pub use conversations::ConversationRoutes;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::resources::AppResources;

/// Build the full application router
pub fn router(resources: Arc<AppResources>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .merge(ConversationRoutes::routes(resources))
}

/// Liveness probe
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "chatforge",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
