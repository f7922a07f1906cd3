// ABOUTME: Store capability traits consumed by the chat orchestration layer
// ABOUTME: One narrow interface per entity, each implemented by the SQLite adapter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! # Store capability interfaces
//!
//! The orchestrator depends only on these traits; [`sqlite::SqliteDatabase`]
//! implements all of them over one connection pool. Tests substitute the
//! same adapter backed by an in-memory database.

pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{Chatbot, ConversationTurn, FileReference, NewChatbot, NewFileReference, NewTurn};

/// Chatbot persona lookups and ownership-scoped writes
#[async_trait]
pub trait ChatbotStore: Send + Sync {
    /// Look up a chatbot by its owner's username and its name
    async fn get_by_owner_and_name(&self, username: &str, name: &str)
        -> AppResult<Option<Chatbot>>;

    /// Look up a chatbot by id
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Chatbot>>;

    /// List all chatbots belonging to an owner
    async fn list_by_owner(&self, username: &str) -> AppResult<Vec<Chatbot>>;

    /// Create a chatbot, returning its id
    async fn create(&self, chatbot: &NewChatbot) -> AppResult<i64>;

    /// Update the last-used stamp; best-effort side channel
    async fn touch_last_used(&self, id: i64, at: &str) -> AppResult<()>;
}

/// Append-only conversation history
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one turn, returning its creation-sequence id
    async fn append_turn(&self, turn: &NewTurn) -> AppResult<i64>;

    /// All turns for a conversation id in creation order
    async fn list_turns(&self, conversation_id: &str) -> AppResult<Vec<ConversationTurn>>;
}

/// Remote file reference mapping, at most one live row per local path
#[async_trait]
pub trait FileReferenceStore: Send + Sync {
    /// Look up the reference for a local path
    async fn get_by_path(&self, filepath: &str) -> AppResult<Option<FileReference>>;

    /// Insert or replace the reference for its path
    async fn upsert(&self, reference: &NewFileReference) -> AppResult<()>;
}
