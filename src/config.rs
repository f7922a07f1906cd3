// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Explicitly constructed ServerConfig passed into every component, no globals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! Environment-based configuration.
//!
//! The whole configuration is one explicit [`ServerConfig`] value built once
//! at startup (or by hand in tests) and passed into component constructors.

use chrono::{DateTime, FixedOffset, Utc};
use std::env;
use std::str::FromStr;
use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::llm::GenerationParams;

/// Default timestamp layout, equivalent to `02 Jan 06 15:04 -0700`
const DEFAULT_TIMESTAMP_LAYOUT: &str = "%d %b %y %H:%M %z";

/// Default offset from UTC in minutes (UTC+8)
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

/// Timestamp stamping and parsing rules for persisted records
///
/// Every persisted record carries timestamps rendered with this layout in
/// this fixed offset. Parsing is the inverse; callers decide what a parse
/// failure means (the freshness cache treats it as stale).
#[derive(Debug, Clone)]
pub struct TimestampConfig {
    /// chrono format string used for persisted timestamps
    pub layout: String,
    /// Fixed offset from UTC applied before formatting
    pub offset: FixedOffset,
}

impl TimestampConfig {
    /// Build from a layout and an offset in minutes east of UTC
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the offset is out of range.
    pub fn new(layout: impl Into<String>, utc_offset_minutes: i32) -> AppResult<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .ok_or_else(|| AppError::config("UTC offset out of range"))?;
        Ok(Self {
            layout: layout.into(),
            offset,
        })
    }

    /// Current time rendered in the configured layout and offset
    #[must_use]
    pub fn now_string(&self) -> String {
        self.now().format(&self.layout).to_string()
    }

    /// Current time in the configured offset
    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Parse a timestamp previously rendered with [`Self::now_string`]
    ///
    /// # Errors
    ///
    /// Returns a chrono parse error when the value does not match the layout.
    pub fn parse(&self, value: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_str(value, &self.layout)
    }
}

/// Gemini gateway configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for the Generative Language API
    pub api_key: String,
    /// Model identifier sent with every generation call
    pub model: String,
    /// Fixed generation parameters, never request-tunable
    pub generation: GenerationParams,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Allowed frontend origin for CORS
    pub frontend_origin: String,
    /// SQLite database file path
    pub database_path: String,
    /// Gemini gateway settings
    pub gemini: GeminiConfig,
    /// Hours after which an uploaded file reference expires
    pub file_expiration_hours: i64,
    /// Timestamp stamping rules for persisted records
    pub timestamps: TimestampConfig,
    /// Delay between streamed fragment emissions, in milliseconds
    pub stream_pacing_ms: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `GEMINI_API_KEY` is unset or the
    /// UTC offset is out of range.
    pub fn from_env() -> AppResult<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| AppError::config("GEMINI_API_KEY environment variable not set"))?;

        let timestamps = TimestampConfig::new(
            env_or("TIMESTAMP_LAYOUT", DEFAULT_TIMESTAMP_LAYOUT),
            env_parse_or("UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES),
        )?;

        Ok(Self {
            http_port: env_parse_or("BACKEND_PORT", 8080),
            frontend_origin: env_or("FRONTEND_DOMAIN", "http://localhost:5173"),
            database_path: env_or("DATABASE_PATH", "./database_files/chatbot.db"),
            gemini: GeminiConfig {
                api_key,
                model: env_or("MODEL_NAME", "gemini-2.0-flash-thinking-exp-01-21"),
                generation: GenerationParams {
                    temperature: env_parse_or("GEN_TEMPERATURE", 0.9),
                    top_k: env_parse_or("GEN_TOP_K", 40),
                    top_p: env_parse_or("GEN_TOP_P", 0.95),
                    max_output_tokens: env_parse_or("GEN_MAX_OUTPUT_TOKENS", 8192),
                },
            },
            file_expiration_hours: env_parse_or("API_FILE_EXPIRATION_HOUR", 47),
            timestamps,
            stream_pacing_ms: env_parse_or("STREAM_PACING_MS", 100),
        })
    }

    /// One-line startup summary, without secrets
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} db={} model={} file_expiration={}h pacing={}ms",
            self.http_port,
            self.database_path,
            self.gemini.model,
            self.file_expiration_hours,
            self.stream_pacing_ms
        )
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_owned())
}

fn env_parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, fallback: T) -> T {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!(
                "Environment variable {key} has invalid value {value:?}, using fallback {fallback}"
            );
            fallback
        }),
        Err(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn timestamps() -> TimestampConfig {
        TimestampConfig::new(DEFAULT_TIMESTAMP_LAYOUT, DEFAULT_UTC_OFFSET_MINUTES).unwrap()
    }

    #[test]
    fn test_timestamp_round_trip() {
        let config = timestamps();
        let stamped = config.now_string();
        let parsed = config.parse(&stamped).unwrap();
        // Layout has minute resolution, so the round trip stays within one minute
        assert!(config.now().signed_duration_since(parsed) < Duration::minutes(2));
    }

    #[test]
    fn test_timestamp_parse_rejects_garbage() {
        let config = timestamps();
        assert!(config.parse("not a timestamp").is_err());
        assert!(config.parse("").is_err());
    }

    #[test]
    fn test_offset_out_of_range_rejected() {
        assert!(TimestampConfig::new(DEFAULT_TIMESTAMP_LAYOUT, 25 * 60).is_err());
    }
}
