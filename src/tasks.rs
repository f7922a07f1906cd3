// ABOUTME: Tracked background tasks for fire-and-forget persistence writes
// ABOUTME: Counts in-flight tasks so shutdown can drain them before the process exits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! Best-effort background writes.
//!
//! Model-turn persistence, file-reference upserts, and last-used touches
//! run off the request path. Failures are logged, never surfaced to the
//! response already in flight. The tracker keeps a count of in-flight
//! tasks so graceful shutdown can wait for them.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

use crate::errors::AppResult;

/// Handle for spawning tracked, best-effort background tasks
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: AtomicUsize,
    drained: Notify,
}

impl BackgroundTasks {
    /// Create a new empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a best-effort task; an `Err` outcome is logged and dropped
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        inner.pending.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                warn!(task = label, error = %e, "background task failed");
            }
            if inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.drained.notify_waiters();
            }
        });
    }

    /// Number of tasks currently in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Wait until every spawned task has finished
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.drained.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_pending_tasks() {
        let tasks = BackgroundTasks::new();
        let flag = Arc::new(AtomicUsize::new(0));

        let flag_clone = Arc::clone(&flag);
        tasks.spawn("slow-write", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag_clone.store(1, Ordering::SeqCst);
            Ok(())
        });

        tasks.drain().await;
        assert_eq!(flag.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_still_drains() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("failing-write", async move {
            Err(AppError::database("boom"))
        });
        tasks.drain().await;
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_drain_on_empty_tracker_returns_immediately() {
        let tasks = BackgroundTasks::new();
        tasks.drain().await;
    }
}
