// ABOUTME: SQLite persistence adapter for chatbots, conversation turns, and file references
// ABOUTME: Implements the store capability traits over a shared sqlx pool
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::{ChatbotStore, ConversationStore, FileReferenceStore};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Chatbot, ConversationTurn, FileReference, NewChatbot, NewFileReference, NewTurn,
};

/// SQLite-backed implementation of all store capability traits
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a database at the given path, creating the file if needed
    ///
    /// # Errors
    ///
    /// Returns a database error if the connection cannot be established.
    pub async fn connect(database_path: &str) -> AppResult<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Access the underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the tables this adapter relies on if they do not exist yet
    ///
    /// Full migration tooling belongs to the platform; this bootstrap only
    /// covers first boot and test fixtures.
    ///
    /// # Errors
    ///
    /// Returns a database error if a statement fails.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS chatbots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                behaviour TEXT NOT NULL DEFAULT '',
                user_context TEXT NOT NULL DEFAULT '',
                is_shared INTEGER NOT NULL DEFAULT 0,
                filepath TEXT,
                file_updated_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_used TEXT NOT NULL,
                UNIQUE (username, name)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS conversation_turns (
                turn_id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                chatbot_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                chatbot_name TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_turns_conversation
            ON conversation_turns (conversation_id)
            ",
            r"
            CREATE TABLE IF NOT EXISTS file_references (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chatbot_id INTEGER NOT NULL,
                filepath TEXT NOT NULL UNIQUE,
                file_uri TEXT NOT NULL,
                refreshed_at TEXT NOT NULL
            )
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to create schema: {e}")))?;
        }
        Ok(())
    }
}

fn chatbot_from_row(row: &sqlx::sqlite::SqliteRow) -> Chatbot {
    Chatbot {
        id: row.get("id"),
        username: row.get("username"),
        name: row.get("name"),
        description: row.get("description"),
        behaviour: row.get("behaviour"),
        user_context: row.get("user_context"),
        is_shared: row.get::<i64, _>("is_shared") != 0,
        filepath: row.get("filepath"),
        file_updated_at: row.get("file_updated_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_used: row.get("last_used"),
    }
}

const CHATBOT_COLUMNS: &str = "id, username, name, description, behaviour, user_context, \
                               is_shared, filepath, file_updated_at, created_at, updated_at, last_used";

#[async_trait]
impl ChatbotStore for SqliteDatabase {
    async fn get_by_owner_and_name(
        &self,
        username: &str,
        name: &str,
    ) -> AppResult<Option<Chatbot>> {
        let row = sqlx::query(&format!(
            "SELECT {CHATBOT_COLUMNS} FROM chatbots WHERE username = $1 AND name = $2"
        ))
        .bind(username)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get chatbot: {e}")))?;

        Ok(row.as_ref().map(chatbot_from_row))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Chatbot>> {
        let row = sqlx::query(&format!(
            "SELECT {CHATBOT_COLUMNS} FROM chatbots WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get chatbot: {e}")))?;

        Ok(row.as_ref().map(chatbot_from_row))
    }

    async fn list_by_owner(&self, username: &str) -> AppResult<Vec<Chatbot>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHATBOT_COLUMNS} FROM chatbots WHERE username = $1 ORDER BY name"
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list chatbots: {e}")))?;

        Ok(rows.iter().map(chatbot_from_row).collect())
    }

    async fn create(&self, chatbot: &NewChatbot) -> AppResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO chatbots
                (username, name, description, behaviour, user_context, is_shared,
                 filepath, file_updated_at, created_at, updated_at, last_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $9)
            ",
        )
        .bind(&chatbot.username)
        .bind(&chatbot.name)
        .bind(&chatbot.description)
        .bind(&chatbot.behaviour)
        .bind(&chatbot.user_context)
        .bind(i64::from(chatbot.is_shared))
        .bind(&chatbot.filepath)
        .bind(&chatbot.file_updated_at)
        .bind(&chatbot.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create chatbot: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    async fn touch_last_used(&self, id: i64, at: &str) -> AppResult<()> {
        sqlx::query("UPDATE chatbots SET last_used = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update last used: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteDatabase {
    async fn append_turn(&self, turn: &NewTurn) -> AppResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO conversation_turns
                (conversation_id, chatbot_id, username, chatbot_name, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&turn.conversation_id)
        .bind(turn.chatbot_id)
        .bind(&turn.username)
        .bind(&turn.chatbot_name)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(&turn.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to append turn: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    async fn list_turns(&self, conversation_id: &str) -> AppResult<Vec<ConversationTurn>> {
        let rows = sqlx::query(
            r"
            SELECT turn_id, conversation_id, chatbot_id, username, chatbot_name,
                   role, content, created_at
            FROM conversation_turns
            WHERE conversation_id = $1
            ORDER BY turn_id
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list turns: {e}")))?;

        let turns = rows
            .into_iter()
            .map(|r| ConversationTurn {
                turn_id: r.get("turn_id"),
                conversation_id: r.get("conversation_id"),
                chatbot_id: r.get("chatbot_id"),
                username: r.get("username"),
                chatbot_name: r.get("chatbot_name"),
                role: r.get("role"),
                content: r.get("content"),
                created_at: r.get("created_at"),
            })
            .collect();

        Ok(turns)
    }
}

#[async_trait]
impl FileReferenceStore for SqliteDatabase {
    async fn get_by_path(&self, filepath: &str) -> AppResult<Option<FileReference>> {
        let row = sqlx::query(
            r"
            SELECT id, chatbot_id, filepath, file_uri, refreshed_at
            FROM file_references
            WHERE filepath = $1
            ",
        )
        .bind(filepath)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get file reference: {e}")))?;

        Ok(row.map(|r| FileReference {
            id: r.get("id"),
            chatbot_id: r.get("chatbot_id"),
            filepath: r.get("filepath"),
            file_uri: r.get("file_uri"),
            refreshed_at: r.get("refreshed_at"),
        }))
    }

    async fn upsert(&self, reference: &NewFileReference) -> AppResult<()> {
        // Keyed on the path so concurrent refreshes settle on last-writer-wins
        // instead of accumulating duplicate rows.
        sqlx::query(
            r"
            INSERT INTO file_references (chatbot_id, filepath, file_uri, refreshed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (filepath) DO UPDATE SET
                chatbot_id = excluded.chatbot_id,
                file_uri = excluded.file_uri,
                refreshed_at = excluded.refreshed_at
            ",
        )
        .bind(reference.chatbot_id)
        .bind(&reference.filepath)
        .bind(&reference.file_uri)
        .bind(&reference.refreshed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert file reference: {e}")))?;
        Ok(())
    }
}
