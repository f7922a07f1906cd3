// ABOUTME: Remote-file freshness cache deciding between cache hit and gateway re-upload
// ABOUTME: Keeps the local-path to remote-URI mapping current via best-effort upserts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! Remote-file freshness cache.
//!
//! The gateway expires uploaded files after a bounded window, and the owner
//! can replace the local file at any time; either condition invalidates the
//! stored reference and forces a synchronous re-upload on the request path.
//! The reference record itself is written in the background: losing it only
//! costs a future cache hit, never the current response.

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::database::FileReferenceStore;
use crate::errors::AppResult;
use crate::llm::LlmProvider;
use crate::models::{FileReference, NewFileReference};
use crate::tasks::BackgroundTasks;

/// Cache over the gateway's hosted-file namespace, keyed by local path
pub struct FileReferenceCache {
    store: Arc<dyn FileReferenceStore>,
    provider: Arc<dyn LlmProvider>,
    config: Arc<ServerConfig>,
    background: BackgroundTasks,
}

impl FileReferenceCache {
    /// Create a cache over a store and provider
    pub fn new(
        store: Arc<dyn FileReferenceStore>,
        provider: Arc<dyn LlmProvider>,
        config: Arc<ServerConfig>,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            background,
        }
    }

    /// Resolve the remote URI for a chatbot's reference file
    ///
    /// Returns the stored URI when the reference is still fresh; otherwise
    /// re-uploads synchronously and schedules a background upsert of the
    /// replacement record.
    ///
    /// # Errors
    ///
    /// Returns an error only when an upload is needed and fails; that is
    /// fatal to the enclosing request.
    pub async fn resolve(
        &self,
        filepath: &str,
        chatbot_id: i64,
        file_updated_at: Option<&str>,
    ) -> AppResult<String> {
        let existing = match self.store.get_by_path(filepath).await {
            Ok(existing) => existing,
            Err(e) => {
                // A failed lookup only costs us a re-upload.
                warn!(path = filepath, error = %e, "file reference lookup failed, treating as missing");
                None
            }
        };

        match existing {
            Some(reference) if !self.is_stale(&reference, file_updated_at) => {
                debug!(path = filepath, uri = %reference.file_uri, "file reference still fresh");
                Ok(reference.file_uri)
            }
            _ => self.upload_and_record(filepath, chatbot_id).await,
        }
    }

    /// A reference is stale when its stamp is unreadable, older than the
    /// expiration window, or older than the file's last replacement.
    fn is_stale(&self, reference: &FileReference, file_updated_at: Option<&str>) -> bool {
        let Ok(refreshed_at) = self.config.timestamps.parse(&reference.refreshed_at) else {
            warn!(path = %reference.filepath, stamp = %reference.refreshed_at,
                "unreadable refresh stamp, treating reference as stale");
            return true;
        };

        let age = self.config.timestamps.now().signed_duration_since(refreshed_at);
        if age > Duration::hours(self.config.file_expiration_hours) {
            debug!(path = %reference.filepath, "file reference past expiration window");
            return true;
        }

        if let Some(modified) = file_updated_at {
            match self.config.timestamps.parse(modified) {
                Ok(modified) if modified > refreshed_at => {
                    debug!(path = %reference.filepath, "reference file replaced since upload");
                    return true;
                }
                Ok(_) => {}
                Err(_) => {
                    warn!(path = %reference.filepath, stamp = %modified,
                        "unreadable file-modified stamp, treating reference as stale");
                    return true;
                }
            }
        }

        false
    }

    /// Upload synchronously, then record the new reference off the request path
    async fn upload_and_record(&self, filepath: &str, chatbot_id: i64) -> AppResult<String> {
        let uploaded = self.provider.upload_file(Path::new(filepath)).await?;

        let record = NewFileReference {
            chatbot_id,
            filepath: filepath.to_owned(),
            file_uri: uploaded.uri.clone(),
            refreshed_at: self.config.timestamps.now_string(),
        };
        let store = Arc::clone(&self.store);
        self.background.spawn("file-reference-upsert", async move {
            store.upsert(&record).await
        });

        Ok(uploaded.uri)
    }
}
