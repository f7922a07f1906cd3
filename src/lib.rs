// ABOUTME: Main library entry point for the Chatforge conversation backend
// ABOUTME: Exposes chatbot persona stores, the Gemini gateway client, and chat orchestration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

#![deny(unsafe_code)]

//! # Chatforge
//!
//! Backend core for a chatbot-configuration platform: users create named
//! chatbot personas (behaviour text, context text, an optional reference
//! file) and converse with them through Google's Gemini API, with the
//! conversation history persisted.
//!
//! The interesting part lives in [`chat`]: the remote-file freshness cache
//! that keeps an uploaded reference file usable across requests, and the
//! streaming relay that bridges the Gemini chunk stream onto a
//! server-sent-events client connection.
//!
//! Authentication, password storage, and schema migration are the platform's
//! concern; this crate consumes an already-authenticated principal and a
//! SQLite-backed set of store adapters.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chatforge::config::ServerConfig;
//! use chatforge::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Chatforge configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Chat orchestration: context assembly, file freshness cache, streaming relay
pub mod chat;

/// Explicit server configuration loaded from the environment
pub mod config;

/// Store capability traits and the SQLite persistence adapter
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// AI gateway abstraction and the Gemini provider implementation
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Domain records shared across stores and handlers
pub mod models;

/// Shared per-process resources handed to route handlers
pub mod resources;

/// HTTP route handlers for the conversation surface
pub mod routes;

/// Tracked background tasks for fire-and-forget persistence writes
pub mod tasks;
