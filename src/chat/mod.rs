// ABOUTME: Chat orchestration driving one exchange end-to-end
// ABOUTME: Resolves the chatbot, refreshes the file reference, assembles context, and persists turns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! # Chat orchestration
//!
//! One request runs through a fixed sequence: resolve chatbot, check the
//! sharing flag, validate the payload, refresh the file reference, assemble
//! context, invoke the model, persist the exchange, respond. A failure at
//! any step short-circuits with no partial retries.
//!
//! Persistence ordering: the user's turn is written synchronously before
//! any model-turn write is attempted, so it survives even if the model
//! writes fail or race. Model turns, file-reference upserts, and last-used
//! touches are fire-and-forget background tasks.

pub mod context;
pub mod file_cache;
pub mod relay;

pub use file_cache::FileReferenceCache;
pub use relay::{relay, Pacer, RelayFrame, TurnWriter};

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::database::{ChatbotStore, ConversationStore};
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{Chatbot, NewTurn, TurnRole};
use crate::resources::AppResources;
use crate::tasks::BackgroundTasks;

/// Response to a conversation start
#[derive(Debug, Serialize)]
pub struct StartedConversation {
    /// Newly minted correlation token for the exchange
    pub conversationid: String,
    /// The chatbot's public description
    pub description: String,
}

/// Drives one conversation exchange against a single chatbot
pub struct ChatService {
    chatbots: Arc<dyn ChatbotStore>,
    conversations: Arc<dyn ConversationStore>,
    file_cache: FileReferenceCache,
    provider: Arc<dyn LlmProvider>,
    config: Arc<ServerConfig>,
    background: BackgroundTasks,
}

impl ChatService {
    /// Create a service over the shared resources
    #[must_use]
    pub fn new(resources: &AppResources) -> Self {
        Self {
            chatbots: Arc::clone(&resources.chatbots),
            conversations: Arc::clone(&resources.conversations),
            file_cache: FileReferenceCache::new(
                Arc::clone(&resources.file_references),
                Arc::clone(&resources.provider),
                Arc::clone(&resources.config),
                resources.background.clone(),
            ),
            provider: Arc::clone(&resources.provider),
            config: Arc::clone(&resources.config),
            background: resources.background.clone(),
        }
    }

    /// Mint a conversation id for a shared chatbot
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chatbot and `PermissionDenied`
    /// when it is not shared.
    pub async fn start_conversation(
        &self,
        owner: &str,
        chatbot_name: &str,
    ) -> AppResult<StartedConversation> {
        let chatbot = self.resolve_chatbot(owner, chatbot_name).await?;
        Self::ensure_shared(&chatbot)?;

        self.touch_last_used(&chatbot);

        Ok(StartedConversation {
            conversationid: Uuid::new_v4().to_string(),
            description: chatbot.description,
        })
    }

    /// Run one non-streaming exchange, returning the assembled reply text
    ///
    /// # Errors
    ///
    /// Client errors for unknown/unshared chatbots and empty fields;
    /// upstream errors with a generic message when the gateway fails; a
    /// database error when the user turn cannot be written.
    pub async fn send_message(
        &self,
        owner: &str,
        chatbot_name: &str,
        conversation_id: &str,
        message: &str,
    ) -> AppResult<String> {
        let (chatbot, request) = self
            .prepare_exchange(owner, chatbot_name, conversation_id, message)
            .await?;

        info!(conversation_id, chatbot = %chatbot.name, "sending message to gateway");
        let response = self.provider.complete(&request).await?;

        self.persist_user_turn(&chatbot, conversation_id, message)
            .await?;
        for part in &response.parts {
            self.spawn_model_turn(&chatbot, conversation_id, part.clone());
        }
        self.touch_last_used(&chatbot);

        debug!(conversation_id, parts = response.parts.len(), "responding to conversation");
        Ok(response.parts.concat())
    }

    /// Open a streaming exchange, returning the frame stream to relay
    ///
    /// The user turn is persisted before the first frame is produced; the
    /// model turn is accumulated by the relay and persisted when the stream
    /// ends, errors, or is dropped.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::send_message`]; errors occurring after the
    /// stream opens surface as an `error` frame instead.
    pub async fn open_stream(
        &self,
        owner: &str,
        chatbot_name: &str,
        conversation_id: &str,
        message: &str,
    ) -> AppResult<impl Stream<Item = RelayFrame> + Send + 'static> {
        let (chatbot, request) = self
            .prepare_exchange(owner, chatbot_name, conversation_id, message)
            .await?;

        info!(conversation_id, chatbot = %chatbot.name, "opening streaming exchange");
        let upstream = self.provider.complete_stream(&request).await?;

        self.persist_user_turn(&chatbot, conversation_id, message)
            .await?;
        self.touch_last_used(&chatbot);

        let writer = TurnWriter::new(
            Arc::clone(&self.conversations),
            self.background.clone(),
            self.config.timestamps.clone(),
            &chatbot,
            conversation_id,
        );
        Ok(relay(
            upstream,
            writer,
            Duration::from_millis(self.config.stream_pacing_ms),
        ))
    }

    async fn resolve_chatbot(&self, owner: &str, name: &str) -> AppResult<Chatbot> {
        self.chatbots
            .get_by_owner_and_name(owner, name)
            .await?
            .ok_or_else(|| AppError::not_found("chatbot"))
    }

    fn ensure_shared(chatbot: &Chatbot) -> AppResult<()> {
        if chatbot.is_shared {
            Ok(())
        } else {
            Err(AppError::permission_denied("chatbot is not shared"))
        }
    }

    fn validate_payload(conversation_id: &str, message: &str) -> AppResult<()> {
        if conversation_id.trim().is_empty() {
            return Err(AppError::invalid_input("conversationid is required"));
        }
        if message.trim().is_empty() {
            return Err(AppError::invalid_input("message is required"));
        }
        Ok(())
    }

    /// Shared front half of both exchange flows: resolve, authorize,
    /// validate, refresh the file reference, and assemble the context.
    async fn prepare_exchange(
        &self,
        owner: &str,
        chatbot_name: &str,
        conversation_id: &str,
        message: &str,
    ) -> AppResult<(Chatbot, ChatRequest)> {
        let chatbot = self.resolve_chatbot(owner, chatbot_name).await?;
        Self::ensure_shared(&chatbot)?;
        Self::validate_payload(conversation_id, message)?;

        let turns = self.conversations.list_turns(conversation_id).await?;

        let file_uri = match chatbot.filepath.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Some(
                self.file_cache
                    .resolve(path, chatbot.id, chatbot.file_updated_at.as_deref())
                    .await?,
            ),
            None => None,
        };

        let mut request = context::build_context(&chatbot, &turns, file_uri.as_deref());
        request.messages.push(ChatMessage::user(message));

        Ok((chatbot, request))
    }

    /// The user's turn write is synchronous: the exchange is not complete
    /// without it.
    async fn persist_user_turn(
        &self,
        chatbot: &Chatbot,
        conversation_id: &str,
        message: &str,
    ) -> AppResult<()> {
        let turn = NewTurn {
            conversation_id: conversation_id.to_owned(),
            chatbot_id: chatbot.id,
            username: chatbot.username.clone(),
            chatbot_name: chatbot.name.clone(),
            role: TurnRole::User,
            content: message.to_owned(),
            created_at: self.config.timestamps.now_string(),
        };
        self.conversations.append_turn(&turn).await?;
        Ok(())
    }

    fn spawn_model_turn(&self, chatbot: &Chatbot, conversation_id: &str, content: String) {
        let turn = NewTurn {
            conversation_id: conversation_id.to_owned(),
            chatbot_id: chatbot.id,
            username: chatbot.username.clone(),
            chatbot_name: chatbot.name.clone(),
            role: TurnRole::Model,
            content,
            created_at: self.config.timestamps.now_string(),
        };
        let conversations = Arc::clone(&self.conversations);
        self.background.spawn("model-turn-write", async move {
            conversations.append_turn(&turn).await.map(|_| ())
        });
    }

    fn touch_last_used(&self, chatbot: &Chatbot) {
        let chatbots = Arc::clone(&self.chatbots);
        let id = chatbot.id;
        let at = self.config.timestamps.now_string();
        self.background.spawn("chatbot-last-used", async move {
            chatbots.touch_last_used(id, &at).await
        });
    }
}
