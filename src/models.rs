// ABOUTME: Domain records for chatbot personas, conversation turns, and file references
// ABOUTME: Shared between the store adapters, chat orchestration, and route handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

use serde::{Deserialize, Serialize};

/// Authenticated principal attached to a request by the platform's auth middleware
///
/// This crate never mints or validates credentials; the surrounding platform
/// installs this as a request extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User id from the platform user store
    pub user_id: i64,
    /// Login name, also the owner key for chatbots
    pub username: String,
}

/// A configured chatbot persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chatbot {
    /// Unique chatbot id
    pub id: i64,
    /// Owner's username
    pub username: String,
    /// Chatbot name, unique per owner
    pub name: String,
    /// Public description shown when a conversation starts
    pub description: String,
    /// Owner-supplied behaviour instructions
    pub behaviour: String,
    /// Owner-supplied long-term context
    pub user_context: String,
    /// Whether other users may converse with this chatbot
    pub is_shared: bool,
    /// Local path of the optional reference file
    pub filepath: Option<String>,
    /// When the reference file was last replaced, in the configured layout
    pub file_updated_at: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last configuration update timestamp
    pub updated_at: String,
    /// Last conversation activity timestamp
    pub last_used: String,
}

/// Payload for creating a chatbot
#[derive(Debug, Clone)]
pub struct NewChatbot {
    pub username: String,
    pub name: String,
    pub description: String,
    pub behaviour: String,
    pub user_context: String,
    pub is_shared: bool,
    pub filepath: Option<String>,
    pub file_updated_at: Option<String>,
    /// Stamp applied to created/updated/last-used on insert
    pub created_at: String,
}

/// Role of a persisted conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Message sent by the person conversing
    User,
    /// Reply generated by the model
    Model,
}

impl TurnRole {
    /// String form stored in the database and sent to the gateway
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One role-tagged message within a conversation
///
/// Append-only; `turn_id` is the creation sequence within the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Creation-sequence id
    pub turn_id: i64,
    /// Opaque correlation token grouping turns into one exchange
    pub conversation_id: String,
    /// Chatbot the turn belongs to
    pub chatbot_id: i64,
    /// Chatbot owner's username (denormalized for joins-free reads)
    pub username: String,
    /// Chatbot name (denormalized)
    pub chatbot_name: String,
    /// "user" or "model"
    pub role: String,
    /// Message text
    pub content: String,
    /// Stamp in the configured layout
    pub created_at: String,
}

/// Payload for appending a conversation turn
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub conversation_id: String,
    pub chatbot_id: i64,
    pub username: String,
    pub chatbot_name: String,
    pub role: TurnRole,
    pub content: String,
    pub created_at: String,
}

/// Remote handle for a reference file uploaded to the AI gateway
///
/// At most one live row per local path; replacement is an upsert keyed on
/// `filepath`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub id: i64,
    pub chatbot_id: i64,
    /// Local file path, the cache key
    pub filepath: String,
    /// Opaque URI minted by the gateway upload endpoint
    pub file_uri: String,
    /// When the upload happened, in the configured layout
    pub refreshed_at: String,
}

/// Payload for inserting or replacing a file reference
#[derive(Debug, Clone)]
pub struct NewFileReference {
    pub chatbot_id: i64,
    pub filepath: String,
    pub file_uri: String,
    pub refreshed_at: String,
}
