// ABOUTME: Shared per-process resources handed to route handlers via axum state
// ABOUTME: Holds store trait objects, the gateway provider, config, and the task tracker
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::database::{ChatbotStore, ConversationStore, FileReferenceStore, SqliteDatabase};
use crate::llm::LlmProvider;
use crate::tasks::BackgroundTasks;

/// Everything a request handler needs, shared across all requests
///
/// Handlers depend only on the capability traits; the composition root
/// decides the concrete adapters.
pub struct AppResources {
    pub chatbots: Arc<dyn ChatbotStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub file_references: Arc<dyn FileReferenceStore>,
    pub provider: Arc<dyn LlmProvider>,
    pub config: Arc<ServerConfig>,
    pub background: BackgroundTasks,
}

impl AppResources {
    /// Wire all store capabilities to one SQLite adapter
    #[must_use]
    pub fn new(
        database: Arc<SqliteDatabase>,
        provider: Arc<dyn LlmProvider>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            chatbots: Arc::clone(&database) as Arc<dyn ChatbotStore>,
            conversations: Arc::clone(&database) as Arc<dyn ConversationStore>,
            file_references: database as Arc<dyn FileReferenceStore>,
            provider,
            config,
            background: BackgroundTasks::new(),
        }
    }
}
