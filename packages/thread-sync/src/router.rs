//! Live event routing.
//!
//! Frames from the user-scoped transport carry events for every thread the
//! user can observe. The router keeps only `message_new` events for the open
//! thread and normalizes them into [`Message`]s. The backend broadcasts a
//! message only to the participant who did not write it, so every routed
//! message is from the counterpart.

use futures::{Stream, StreamExt};

use crate::api::types::{media_ref, Envelope, LiveMessagePayload, MESSAGE_NEW};
use crate::message::{parse_timestamp, Message, MessageId, SenderRole, ThreadId};
use crate::{Error, Result};

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// A new message for the open thread.
    Message(Message),
    /// A new message for some other thread.
    OtherThread(ThreadId),
    /// An event kind this layer does not handle (presence, badges, ...).
    Ignored(String),
}

/// Filters live frames down to the open thread.
#[derive(Debug, Clone)]
pub struct EventRouter {
    thread_id: ThreadId,
}

impl EventRouter {
    pub fn new(thread_id: ThreadId) -> Self {
        Self { thread_id }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Classify a raw frame.
    pub fn route(&self, raw: &str) -> Result<Routed> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| Error::MalformedEventPayload(format!("bad envelope: {}", e)))?;

        if envelope.kind != MESSAGE_NEW {
            return Ok(Routed::Ignored(envelope.kind));
        }

        let payload: LiveMessagePayload = serde_json::from_value(envelope.data)
            .map_err(|e| Error::MalformedEventPayload(format!("bad message_new data: {}", e)))?;

        let thread = payload
            .subscription_id
            .as_ref()
            .map(|id| ThreadId::new(id.to_string()))
            .ok_or_else(|| {
                Error::MalformedEventPayload(format!("message {} has no thread id", payload.id))
            })?;

        if thread != self.thread_id {
            return Ok(Routed::OtherThread(thread));
        }

        let created_at = payload
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| {
                Error::MalformedEventPayload(format!(
                    "message {} has bad created_at {:?}",
                    payload.id, payload.created_at
                ))
            })?;

        let media = media_ref(payload.media_url.as_deref(), payload.message_type.as_deref());
        if payload.content.is_none() && media.is_none() {
            return Err(Error::MalformedEventPayload(format!(
                "message {} has neither content nor media",
                payload.id
            )));
        }

        Ok(Routed::Message(Message {
            id: MessageId::Server(payload.id.to_string()),
            thread_id: thread,
            sender_role: SenderRole::Counterpart,
            created_at,
            content: payload.content,
            media,
        }))
    }

    /// Route a frame, dropping everything but messages for the open thread.
    ///
    /// Never fails: malformed frames are logged and skipped.
    pub fn accept(&self, raw: &str) -> Option<Message> {
        match self.route(raw) {
            Ok(Routed::Message(message)) => Some(message),
            Ok(Routed::OtherThread(thread)) => {
                tracing::debug!(
                    "Dropping message for thread {} (open: {})",
                    thread,
                    self.thread_id
                );
                None
            }
            Ok(Routed::Ignored(kind)) => {
                tracing::trace!("Ignoring live event type: {}", kind);
                None
            }
            Err(e) => {
                tracing::warn!("Dropping live frame: {}", e);
                None
            }
        }
    }

    /// Turn a stream of raw frames into a stream of messages for the open thread.
    pub fn route_stream<S>(self, frames: S) -> impl Stream<Item = Message>
    where
        S: Stream<Item = String>,
    {
        async_stream::stream! {
            let mut frames = std::pin::pin!(frames);
            while let Some(frame) = frames.next().await {
                if let Some(message) = self.accept(&frame) {
                    yield message;
                }
            }
        }
    }
}
