// ABOUTME: Google Gemini gateway client with streaming and file upload support
// ABOUTME: Talks to the Generative Language API for generateContent, streamGenerateContent, and media upload
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! # Gemini Provider
//!
//! Implementation of [`LlmProvider`] for Google's Gemini models. The model
//! identifier and generation parameters come from [`GeminiConfig`] and are
//! fixed for every call; nothing here is request-tunable.
//!
//! Provider error bodies are logged in full for diagnosis and replaced with
//! a generic message before they reach a client.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, GenerationParams, LlmProvider,
    StreamChunk, UploadedFile,
};
use crate::config::GeminiConfig;
use crate::errors::AppError;

/// Base URL for generation calls
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Base URL for media uploads
const UPLOAD_BASE_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta";

/// Client-safe message for any generation failure
const GENERATION_ERROR: &str = "unable to get response from the model";

/// Client-safe message for any upload failure
const UPLOAD_ERROR: &str = "unable to prepare reference file";

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Gemini API request structure
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

/// Content structure for the Gemini API
#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ContentPart>,
}

/// Part of content (text or an uploaded file handle)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    /// Text content
    Text { text: String },
    /// Reference to a previously uploaded file
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

/// Uploaded file handle inside a content part
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileData {
    #[serde(rename = "fileUri")]
    file_uri: String,
}

/// Generation configuration
#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

impl From<GenerationParams> for GenerationConfig {
    fn from(params: GenerationParams) -> Self {
        Self {
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
            max_output_tokens: params.max_output_tokens,
            response_mime_type: "text/plain",
        }
    }
}

/// Gemini API response structure
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

/// Response candidate
#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

/// API error body from Gemini
#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Streaming response chunk
#[derive(Debug, Deserialize)]
struct StreamingResponse {
    candidates: Option<Vec<Candidate>>,
}

/// Media upload response envelope
#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFileInfo,
}

#[derive(Debug, Deserialize)]
struct UploadedFileInfo {
    uri: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Google Gemini gateway client
pub struct GeminiProvider {
    api_key: String,
    model: String,
    params: GenerationParams,
    client: Client,
}

impl GeminiProvider {
    /// Create a provider from gateway configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key is empty.
    pub fn new(config: &GeminiConfig) -> Result<Self, AppError> {
        if config.api_key.is_empty() {
            return Err(AppError::config("Gemini API key is empty"));
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            params: config.generation,
            client: Client::new(),
        })
    }

    /// Build the API URL for a generation method
    fn build_url(&self, method: &str) -> String {
        format!(
            "{API_BASE_URL}/models/{}:{method}?key={}",
            self.model, self.api_key
        )
    }

    /// Convert a request to the Gemini wire format
    fn build_gemini_request(&self, request: &ChatRequest) -> GeminiRequest {
        let system_instruction = if request.system_parts.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: request
                    .system_parts
                    .iter()
                    .map(|text| ContentPart::Text { text: text.clone() })
                    .collect(),
            })
        };

        let contents = request.messages.iter().map(convert_message).collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: self.params.into(),
        }
    }

    /// Extract the reply parts from a response
    fn extract_parts(response: &GeminiResponse) -> Result<Vec<String>, AppError> {
        let parts: Vec<String> = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(text.clone()),
                        ContentPart::FileData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if parts.is_empty() {
            error!("No content in Gemini response");
            return Err(AppError::external_service("gemini", GENERATION_ERROR));
        }
        Ok(parts)
    }

    /// Log the provider diagnostic and map to a client-safe error
    fn map_api_error(status: u16, response_text: &str, safe_message: &str) -> AppError {
        let diagnostic = serde_json::from_str::<GeminiResponse>(response_text)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| response_text.to_owned(), |e| e.message);

        error!(status, diagnostic = %diagnostic, "Gemini API error");
        AppError::external_service("gemini", safe_message)
    }

    fn finish_reason(response: &GeminiResponse) -> Option<String> {
        response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.finish_reason.clone())
    }
}

/// Convert an assembled message to Gemini content
fn convert_message(message: &ChatMessage) -> GeminiContent {
    let mut parts = vec![ContentPart::Text {
        text: message.text.clone(),
    }];
    if let Some(uri) = &message.file_uri {
        parts.push(ContentPart::FileData {
            file_data: FileData {
                file_uri: uri.clone(),
            },
        });
    }
    GeminiContent {
        role: Some(message.role.as_str().to_owned()),
        parts,
    }
}

/// Best-effort content type from the file extension
fn guess_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, AppError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            error!(error = %e, "Failed to read reference file");
            AppError::internal(UPLOAD_ERROR)
        })?;

        let display_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("reference-file")
            .to_owned();
        let mime_type = guess_mime_type(path);

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| AppError::internal(format!("Invalid metadata part: {e}")))?,
            )
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(display_name.clone())
                    .mime_str(mime_type)
                    .map_err(|e| AppError::internal(format!("Invalid file part: {e}")))?,
            );

        let url = format!("{UPLOAD_BASE_URL}/files?key={}", self.api_key);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Upload request failed");
                AppError::external_service("gemini", UPLOAD_ERROR)
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read upload response");
            AppError::external_service("gemini", UPLOAD_ERROR)
        })?;

        if !status.is_success() {
            return Err(Self::map_api_error(
                status.as_u16(),
                &response_text,
                UPLOAD_ERROR,
            ));
        }

        let uploaded: UploadResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!(error = %e, response = %response_text, "Failed to parse upload response");
            AppError::external_service("gemini", UPLOAD_ERROR)
        })?;

        debug!(uri = %uploaded.file.uri, "Uploaded reference file");

        Ok(UploadedFile {
            uri: uploaded.file.uri,
            display_name: uploaded.file.display_name.unwrap_or(display_name),
        })
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let url = self.build_url("generateContent");
        let gemini_request = self.build_gemini_request(request);

        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AppError::external_service("gemini", GENERATION_ERROR)
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read response");
            AppError::external_service("gemini", GENERATION_ERROR)
        })?;

        if !status.is_success() {
            return Err(Self::map_api_error(
                status.as_u16(),
                &response_text,
                GENERATION_ERROR,
            ));
        }

        let gemini_response: GeminiResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                error!(error = %e, response = %response_text, "Failed to parse response");
                AppError::external_service("gemini", GENERATION_ERROR)
            })?;

        if let Some(api_error) = gemini_response.error {
            error!(diagnostic = %api_error.message, "Gemini API returned error body");
            return Err(AppError::external_service("gemini", GENERATION_ERROR));
        }

        let parts = Self::extract_parts(&gemini_response)?;
        let finish_reason = Self::finish_reason(&gemini_response);

        debug!("Successfully received Gemini response");

        Ok(ChatResponse {
            parts,
            finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let url = self.build_url("streamGenerateContent");
        let gemini_request = self.build_gemini_request(request);

        debug!("Starting streaming request to Gemini API");

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AppError::external_service("gemini", GENERATION_ERROR)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            return Err(Self::map_api_error(
                status.as_u16(),
                &error_text,
                GENERATION_ERROR,
            ));
        }

        let byte_stream = response.bytes_stream();

        let stream = byte_stream.filter_map(|result| async move {
            match result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);

                    // Parse SSE format: lines starting with "data: "
                    for line in text.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data.trim().is_empty() {
                                continue;
                            }

                            match serde_json::from_str::<StreamingResponse>(data) {
                                Ok(parsed) => {
                                    if let Some(chunk) = chunk_from_streaming(&parsed) {
                                        return Some(Ok(chunk));
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "Failed to parse streaming chunk");
                                }
                            }
                        }
                    }

                    None
                }
                Err(e) => {
                    error!(error = %e, "Stream transport error");
                    Some(Err(AppError::external_service("gemini", GENERATION_ERROR)))
                }
            }
        });

        Ok(Box::pin(stream) as ChatStream)
    }
}

/// Extract a delta chunk from one streaming response entry
fn chunk_from_streaming(response: &StreamingResponse) -> Option<StreamChunk> {
    let candidate = response.candidates.as_ref()?.first()?;
    let content = candidate.content.as_ref()?;

    let delta: String = content
        .parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::FileData { .. } => None,
        })
        .collect();

    if delta.is_empty() && candidate.finish_reason.is_none() {
        return None;
    }

    Some(StreamChunk {
        delta,
        finish_reason: candidate.finish_reason.clone(),
    })
}

impl Debug for GeminiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
