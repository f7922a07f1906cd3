// ABOUTME: Streaming relay bridging the gateway chunk stream onto server-sent events
// ABOUTME: Paces fragment emission, accumulates the reply, and persists the model turn
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Chatforge Project

//! Streaming relay.
//!
//! Each upstream fragment becomes one immediately flushed `data:` frame; a
//! configurable pacer throttles emission so slow clients are not
//! overwhelmed. The full text is accumulated and written as the model's
//! turn when the stream ends. A mid-stream error emits a single `error`
//! frame and still persists whatever accumulated; losing the partial text
//! silently would be worse than saving a truncated turn. Client
//! disconnects drop the stream, and the accumulator's drop guard persists
//! the partial text the same way.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::config::TimestampConfig;
use crate::database::ConversationStore;
use crate::llm::ChatStream;
use crate::models::{Chatbot, NewTurn, TurnRole};
use crate::tasks::BackgroundTasks;

/// One frame of the relay's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// A reply fragment, flushed as `data: <fragment>`
    Data(String),
    /// Terminal error frame, `event: error`
    Error(String),
    /// Normal termination, `event: close` / `data: done`
    Close,
}

impl RelayFrame {
    /// Render as a server-sent event
    #[must_use]
    pub fn into_event(self) -> Event {
        match self {
            Self::Data(fragment) => Event::default().data(fragment),
            Self::Error(message) => Event::default().event("error").data(message),
            Self::Close => Event::default().event("close").data("done"),
        }
    }
}

/// Explicit rate limiter for fragment emission
///
/// The first fragment passes immediately; subsequent fragments wait out the
/// configured period. A zero period disables pacing (used by tests).
pub struct Pacer {
    interval: Option<Interval>,
}

impl Pacer {
    /// Create a pacer with the given emission period
    #[must_use]
    pub fn new(period: Duration) -> Self {
        if period.is_zero() {
            Self { interval: None }
        } else {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Self {
                interval: Some(interval),
            }
        }
    }

    /// Wait until the next emission slot
    pub async fn ready(&mut self) {
        if let Some(interval) = &mut self.interval {
            interval.tick().await;
        }
    }
}

/// Destination for the accumulated model turn
pub struct TurnWriter {
    conversations: Arc<dyn ConversationStore>,
    background: BackgroundTasks,
    timestamps: TimestampConfig,
    conversation_id: String,
    chatbot_id: i64,
    username: String,
    chatbot_name: String,
}

impl TurnWriter {
    /// Create a writer bound to one chatbot and conversation
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        background: BackgroundTasks,
        timestamps: TimestampConfig,
        chatbot: &Chatbot,
        conversation_id: &str,
    ) -> Self {
        Self {
            conversations,
            background,
            timestamps,
            conversation_id: conversation_id.to_owned(),
            chatbot_id: chatbot.id,
            username: chatbot.username.clone(),
            chatbot_name: chatbot.name.clone(),
        }
    }

    /// Persist a model turn off the request path
    pub fn spawn_model_turn(&self, content: String) {
        let turn = NewTurn {
            conversation_id: self.conversation_id.clone(),
            chatbot_id: self.chatbot_id,
            username: self.username.clone(),
            chatbot_name: self.chatbot_name.clone(),
            role: TurnRole::Model,
            content,
            created_at: self.timestamps.now_string(),
        };
        let conversations = Arc::clone(&self.conversations);
        self.background.spawn("model-turn-write", async move {
            conversations.append_turn(&turn).await.map(|_| ())
        });
    }
}

/// Accumulates the reply and guarantees it is persisted exactly once,
/// including when the stream is dropped by a disconnecting client.
struct TurnAccumulator {
    writer: TurnWriter,
    buffer: String,
    flushed: bool,
}

impl TurnAccumulator {
    fn new(writer: TurnWriter) -> Self {
        Self {
            writer,
            buffer: String::new(),
            flushed: false,
        }
    }

    fn push(&mut self, delta: &str) {
        self.buffer.push_str(delta);
    }

    fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        if self.buffer.is_empty() {
            debug!("empty model reply, nothing to persist");
            return;
        }
        self.writer.spawn_model_turn(std::mem::take(&mut self.buffer));
    }
}

impl Drop for TurnAccumulator {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Relay an upstream chunk stream to the client as paced frames
pub fn relay(
    mut upstream: ChatStream,
    writer: TurnWriter,
    pacing: Duration,
) -> impl Stream<Item = RelayFrame> {
    async_stream::stream! {
        let mut pacer = Pacer::new(pacing);
        let mut accumulator = TurnAccumulator::new(writer);

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(chunk) => {
                    if chunk.delta.is_empty() {
                        continue;
                    }
                    pacer.ready().await;
                    accumulator.push(&chunk.delta);
                    yield RelayFrame::Data(chunk.delta);
                }
                Err(e) => {
                    error!(error = %e, "upstream stream failed mid-relay");
                    accumulator.flush();
                    yield RelayFrame::Error(e.message);
                    return;
                }
            }
        }

        accumulator.flush();
        yield RelayFrame::Close;
    }
}
