// ABOUTME: Conversation route handlers for starting, messaging, and streaming exchanges
// ABOUTME: Maps the chat orchestrator onto JSON and server-sent-events responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! Conversation routes.
//!
//! Three operations: start a conversation (mints a correlation token),
//! send a message synchronously, and send a message with the reply
//! streamed as server-sent events.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

use crate::chat::ChatService;
use crate::errors::AppError;
use crate::models::AuthenticatedUser;
use crate::resources::AppResources;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for both message endpoints
#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    /// Correlation token minted by the start endpoint
    pub conversationid: String,
    /// The user's message text
    pub message: String,
}

/// Response body for the synchronous message endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    /// The assembled reply text
    pub response: String,
}

// ============================================================================
// Conversation Routes
// ============================================================================

/// Conversation routes handler
pub struct ConversationRoutes;

impl ConversationRoutes {
    /// Create all conversation routes
    pub fn routes(resources: Arc<AppResources>) -> Router {
        Router::new()
            .route(
                "/api/conversations/start/:username/:chatbot_name",
                get(Self::start_conversation),
            )
            .route(
                "/api/conversations/chat/:username/:chatbot_name",
                post(Self::send_message),
            )
            .route(
                "/api/conversations/stream/:username/:chatbot_name",
                post(Self::send_message_stream),
            )
            .with_state(resources)
    }

    fn principal_name(principal: Option<&Extension<AuthenticatedUser>>) -> &str {
        principal.map_or("anonymous", |p| p.username.as_str())
    }

    /// Mint a conversation id for a shared chatbot
    async fn start_conversation(
        State(resources): State<Arc<AppResources>>,
        principal: Option<Extension<AuthenticatedUser>>,
        Path((username, chatbot_name)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        info!(
            chatbot = %chatbot_name,
            owner = %username,
            caller = Self::principal_name(principal.as_ref()),
            "starting conversation"
        );

        let service = ChatService::new(&resources);
        let started = service.start_conversation(&username, &chatbot_name).await?;

        Ok((StatusCode::OK, Json(started)).into_response())
    }

    /// Send a message and return the complete reply
    async fn send_message(
        State(resources): State<Arc<AppResources>>,
        principal: Option<Extension<AuthenticatedUser>>,
        Path((username, chatbot_name)): Path<(String, String)>,
        Json(request): Json<ChatMessageRequest>,
    ) -> Result<Response, AppError> {
        info!(
            chatbot = %chatbot_name,
            owner = %username,
            caller = Self::principal_name(principal.as_ref()),
            conversation_id = %request.conversationid,
            "chat message received"
        );

        let service = ChatService::new(&resources);
        let reply = service
            .send_message(
                &username,
                &chatbot_name,
                &request.conversationid,
                &request.message,
            )
            .await?;

        Ok((
            StatusCode::OK,
            Json(ChatMessageResponse { response: reply }),
        )
            .into_response())
    }

    /// Send a message and stream the reply via server-sent events
    async fn send_message_stream(
        State(resources): State<Arc<AppResources>>,
        principal: Option<Extension<AuthenticatedUser>>,
        Path((username, chatbot_name)): Path<(String, String)>,
        Json(request): Json<ChatMessageRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError>
    {
        info!(
            chatbot = %chatbot_name,
            owner = %username,
            caller = Self::principal_name(principal.as_ref()),
            conversation_id = %request.conversationid,
            "streaming chat message received"
        );

        let service = ChatService::new(&resources);
        let frames = service
            .open_stream(
                &username,
                &chatbot_name,
                &request.conversationid,
                &request.message,
            )
            .await?;

        let stream = frames.map(|frame| Ok(frame.into_event()));
        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }
}
