// ABOUTME: Shared test fixtures: in-memory database resources and a scripted gateway double
// ABOUTME: Used by the integration tests for the cache, relay, and conversation routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use sqlx::sqlite::SqlitePoolOptions;

use chatforge::config::{GeminiConfig, ServerConfig, TimestampConfig};
use chatforge::database::{ChatbotStore, SqliteDatabase};
use chatforge::errors::AppError;
use chatforge::llm::{
    ChatRequest, ChatResponse, ChatStream, GenerationParams, LlmProvider, StreamChunk,
    UploadedFile,
};
use chatforge::models::{Chatbot, NewChatbot};
use chatforge::resources::AppResources;

/// Scripted gateway double
///
/// Counts uploads, records the last assembled request, and replays a
/// configured reply or chunk script.
#[derive(Default)]
pub struct MockProvider {
    pub upload_count: AtomicUsize,
    pub uploaded_paths: Mutex<Vec<String>>,
    pub reply_parts: Mutex<Vec<String>>,
    pub stream_script: Mutex<Vec<Result<StreamChunk, AppError>>>,
    pub fail_upload: AtomicBool,
    pub fail_complete: AtomicBool,
    pub last_request: Mutex<Option<ChatRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        *provider.reply_parts.lock().unwrap() = vec!["Hello there".to_owned()];
        provider
    }

    pub fn with_reply_parts(parts: &[&str]) -> Self {
        let provider = Self::default();
        *provider.reply_parts.lock().unwrap() = parts.iter().map(|p| (*p).to_owned()).collect();
        provider
    }

    pub fn with_stream_script(script: Vec<Result<StreamChunk, AppError>>) -> Self {
        let provider = Self::default();
        *provider.stream_script.lock().unwrap() = script;
        provider
    }

    pub fn uploads(&self) -> usize {
        self.upload_count.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, AppError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(AppError::external_service(
                "mock",
                "unable to prepare reference file",
            ));
        }
        let count = self.upload_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.uploaded_paths
            .lock()
            .unwrap()
            .push(path.display().to_string());
        Ok(UploadedFile {
            uri: format!("files/mock-{count}"),
            display_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("file")
                .to_owned(),
        })
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(AppError::external_service(
                "mock",
                "unable to get response from the model",
            ));
        }
        Ok(ChatResponse {
            parts: self.reply_parts.lock().unwrap().clone(),
            finish_reason: Some("STOP".to_owned()),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(AppError::external_service(
                "mock",
                "unable to get response from the model",
            ));
        }
        let script = std::mem::take(&mut *self.stream_script.lock().unwrap());
        Ok(Box::pin(futures_util::stream::iter(script)) as ChatStream)
    }
}

/// A fragment chunk for stream scripts
pub fn chunk(delta: &str) -> Result<StreamChunk, AppError> {
    Ok(StreamChunk {
        delta: delta.to_owned(),
        finish_reason: None,
    })
}

/// A terminal error for stream scripts
pub fn stream_error() -> Result<StreamChunk, AppError> {
    Err(AppError::external_service(
        "mock",
        "unable to get response from the model",
    ))
}

/// Configuration fixture: default stamps, zero pacing, in-memory database
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        frontend_origin: "http://localhost:5173".to_owned(),
        database_path: ":memory:".to_owned(),
        gemini: GeminiConfig {
            api_key: "test-key".to_owned(),
            model: "gemini-test".to_owned(),
            generation: GenerationParams::default(),
        },
        file_expiration_hours: 47,
        timestamps: TimestampConfig::new("%d %b %y %H:%M %z", 8 * 60).unwrap(),
        stream_pacing_ms: 0,
    }
}

/// Build resources over an in-memory database and the given provider
pub async fn create_test_resources(provider: Arc<dyn LlmProvider>) -> Arc<AppResources> {
    // One connection so every query sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let database = Arc::new(SqliteDatabase::new(pool));
    database.ensure_schema().await.unwrap();

    Arc::new(AppResources::new(
        database,
        provider,
        Arc::new(test_config()),
    ))
}

/// Seed a chatbot owned by `alice`, returning its id
pub async fn seed_chatbot(
    resources: &AppResources,
    name: &str,
    shared: bool,
    filepath: Option<&str>,
    file_updated_at: Option<&str>,
) -> i64 {
    resources
        .chatbots
        .create(&NewChatbot {
            username: "alice".to_owned(),
            name: name.to_owned(),
            description: "A helpful assistant".to_owned(),
            behaviour: "Be friendly".to_owned(),
            user_context: String::new(),
            is_shared: shared,
            filepath: filepath.map(ToOwned::to_owned),
            file_updated_at: file_updated_at.map(ToOwned::to_owned),
            created_at: resources.config.timestamps.now_string(),
        })
        .await
        .unwrap()
}

/// A stamp `hours` away from now in the configured layout; negative is past
pub fn stamp_hours_from_now(config: &ServerConfig, hours: i64) -> String {
    (config.timestamps.now() + Duration::hours(hours))
        .format(&config.timestamps.layout)
        .to_string()
}

/// A sample chatbot record without touching the database
pub fn sample_chatbot(id: i64) -> Chatbot {
    Chatbot {
        id,
        username: "alice".to_owned(),
        name: "helper".to_owned(),
        description: "A helpful assistant".to_owned(),
        behaviour: "Be friendly".to_owned(),
        user_context: String::new(),
        is_shared: true,
        filepath: None,
        file_updated_at: None,
        created_at: "01 Jan 25 10:00 +0800".to_owned(),
        updated_at: "01 Jan 25 10:00 +0800".to_owned(),
        last_used: "01 Jan 25 10:00 +0800".to_owned(),
    }
}
