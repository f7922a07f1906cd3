// ABOUTME: AI gateway abstraction for chat generation and reference-file uploads
// ABOUTME: Defines the provider contract implemented by the Gemini client and test doubles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! # AI Gateway Interface
//!
//! The orchestration layer talks to the model provider through
//! [`LlmProvider`]: upload a reference file, complete a chat request, or
//! stream a completion chunk by chunk. The production implementation is
//! [`GeminiProvider`]; tests script an in-memory double.

mod gemini;

pub use gemini::GeminiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::errors::AppError;

/// Role of a message sent to the gateway
///
/// Gemini models conversations as alternating `user`/`model` entries;
/// platform and persona instructions travel separately as the system
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

impl MessageRole {
    /// String form used on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A single message in the model-facing sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text content
    pub text: String,
    /// Optional remote file handle attached alongside the text
    pub file_uri: Option<String>,
}

impl ChatMessage {
    /// Create a user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            file_uri: None,
        }
    }

    /// Create a model message
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            file_uri: None,
        }
    }

    /// Create a user message carrying a remote file handle
    #[must_use]
    pub fn user_with_file(text: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            file_uri: Some(file_uri.into()),
        }
    }
}

/// Fixed generation parameters, set once in configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }
}

/// A fully assembled request for one generation call
///
/// `system_parts` are ordered instruction segments; `messages` is the
/// history plus the new user message as the final entry.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_parts: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Create a request from instruction segments and a message sequence
    #[must_use]
    pub const fn new(system_parts: Vec<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_parts,
            messages,
        }
    }
}

/// Response from a non-streaming completion
///
/// The provider may return the reply split into several parts; callers
/// persist each part independently and concatenate them for the client.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Reply fragments in upstream order
    pub parts: Vec<String>,
    /// Finish reason if the provider reported one
    pub finish_reason: Option<String>,
}

/// A chunk of a streaming completion
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// Content delta for this chunk
    pub delta: String,
    /// Finish reason when the provider marks the stream complete
    pub finish_reason: Option<String>,
}

/// Stream type for chat completion responses
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

/// Remote handle returned by the gateway after uploading a local file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Opaque URI usable in later generation calls without re-uploading
    pub uri: String,
    /// Display name echoed back by the gateway
    pub display_name: String,
}

/// AI gateway provider contract
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g. "gemini")
    fn name(&self) -> &'static str;

    /// Upload a local file, returning its remote handle
    ///
    /// This call sits on the request's critical path; failures are fatal to
    /// the enclosing request.
    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, AppError>;

    /// Perform a chat completion (non-streaming)
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Perform a streaming chat completion
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError>;
}
