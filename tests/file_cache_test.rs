// ABOUTME: Integration tests for the remote-file freshness cache
// ABOUTME: Covers cache hits, expiration, file replacement, parse failures, and upsert behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chatforge::chat::FileReferenceCache;
use chatforge::database::FileReferenceStore;
use chatforge::models::NewFileReference;
use chatforge::resources::AppResources;
use common::{create_test_resources, seed_chatbot, stamp_hours_from_now, MockProvider};

fn cache_for(resources: &AppResources) -> FileReferenceCache {
    FileReferenceCache::new(
        Arc::clone(&resources.file_references),
        Arc::clone(&resources.provider),
        Arc::clone(&resources.config),
        resources.background.clone(),
    )
}

async fn seed_reference(resources: &AppResources, chatbot_id: i64, path: &str, refreshed_at: &str) {
    resources
        .file_references
        .upsert(&NewFileReference {
            chatbot_id,
            filepath: path.to_owned(),
            file_uri: "files/seeded".to_owned(),
            refreshed_at: refreshed_at.to_owned(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_second_resolve_hits_cache_without_upload() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    let first = cache.resolve("notes.pdf", chatbot_id, None).await.unwrap();
    resources.background.drain().await;

    let second = cache.resolve("notes.pdf", chatbot_id, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.uploads(), 1, "fresh reference must not re-upload");
}

#[tokio::test]
async fn test_missing_reference_uploads_and_records() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    let uri = cache.resolve("notes.pdf", chatbot_id, None).await.unwrap();
    assert_eq!(uri, "files/mock-1");

    resources.background.drain().await;
    let stored = resources
        .file_references
        .get_by_path("notes.pdf")
        .await
        .unwrap()
        .expect("reference should be persisted in the background");
    assert_eq!(stored.file_uri, "files/mock-1");
    assert_eq!(stored.chatbot_id, chatbot_id);
}

#[tokio::test]
async fn test_file_replacement_forces_reupload() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    // Reference uploaded two hours ago, file replaced one hour ago.
    let refreshed_at = stamp_hours_from_now(&resources.config, -2);
    let modified_at = stamp_hours_from_now(&resources.config, -1);
    seed_reference(&resources, chatbot_id, "notes.pdf", &refreshed_at).await;

    let uri = cache
        .resolve("notes.pdf", chatbot_id, Some(&modified_at))
        .await
        .unwrap();

    assert_eq!(provider.uploads(), 1, "replaced file must re-upload");
    assert_eq!(uri, "files/mock-1");
}

#[tokio::test]
async fn test_unreplaced_file_within_window_is_fresh() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    let refreshed_at = stamp_hours_from_now(&resources.config, -2);
    let modified_at = stamp_hours_from_now(&resources.config, -10);
    seed_reference(&resources, chatbot_id, "notes.pdf", &refreshed_at).await;

    let uri = cache
        .resolve("notes.pdf", chatbot_id, Some(&modified_at))
        .await
        .unwrap();

    assert_eq!(uri, "files/seeded");
    assert_eq!(provider.uploads(), 0);
}

#[tokio::test]
async fn test_expired_reference_reuploads_with_unchanged_file() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    // Past the 47-hour window even though the file never changed.
    let refreshed_at = stamp_hours_from_now(&resources.config, -48);
    seed_reference(&resources, chatbot_id, "notes.pdf", &refreshed_at).await;

    let uri = cache.resolve("notes.pdf", chatbot_id, None).await.unwrap();

    assert_eq!(provider.uploads(), 1, "expired reference must re-upload");
    assert_eq!(uri, "files/mock-1");
}

#[tokio::test]
async fn test_unreadable_refresh_stamp_treated_as_stale() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    seed_reference(&resources, chatbot_id, "notes.pdf", "not-a-timestamp").await;

    cache.resolve("notes.pdf", chatbot_id, None).await.unwrap();
    assert_eq!(provider.uploads(), 1);
}

#[tokio::test]
async fn test_unreadable_modified_stamp_treated_as_stale() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    let refreshed_at = stamp_hours_from_now(&resources.config, -1);
    seed_reference(&resources, chatbot_id, "notes.pdf", &refreshed_at).await;

    cache
        .resolve("notes.pdf", chatbot_id, Some("garbage"))
        .await
        .unwrap();
    assert_eq!(provider.uploads(), 1);
}

#[tokio::test]
async fn test_refresh_replaces_row_instead_of_duplicating() {
    let provider = Arc::new(MockProvider::new());
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    let refreshed_at = stamp_hours_from_now(&resources.config, -48);
    seed_reference(&resources, chatbot_id, "notes.pdf", &refreshed_at).await;

    cache.resolve("notes.pdf", chatbot_id, None).await.unwrap();
    resources.background.drain().await;

    let stored = resources
        .file_references
        .get_by_path("notes.pdf")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.file_uri, "files/mock-1");
}

#[tokio::test]
async fn test_upload_failure_is_fatal_to_resolve() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_upload.store(true, Ordering::SeqCst);
    let resources = create_test_resources(provider.clone()).await;
    let chatbot_id = seed_chatbot(&resources, "helper", true, Some("notes.pdf"), None).await;
    let cache = cache_for(&resources);

    let result = cache.resolve("notes.pdf", chatbot_id, None).await;
    assert!(result.is_err());
}
