//! Send pipeline.
//!
//! Submits a message over REST and, on success, synthesizes the local copy.
//! The backend fans a new message out only to the counterpart, so the sender
//! never sees an echo and has to materialize its own entry.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::api::types::SendMessageRequest;
use crate::api::ThreadApi;
use crate::message::{MediaKind, MediaRef, Message, MessageId, SenderRole, ThreadId};
use crate::{Error, Result};

/// What the user is sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingContent {
    Text(String),
    /// Previously uploaded media, with an optional text note.
    Media {
        kind: MediaKind,
        url: String,
        note: Option<String>,
    },
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingContent::Text(text.into())
    }

    fn message_type(&self) -> &'static str {
        match self {
            OutgoingContent::Text(_) => "text",
            OutgoingContent::Media { kind, .. } => kind.as_str(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            OutgoingContent::Text(text) if text.trim().is_empty() => Err(Error::EmptyMessage),
            OutgoingContent::Media { url, .. } if url.trim().is_empty() => Err(Error::EmptyMessage),
            _ => Ok(()),
        }
    }

    fn to_request(&self, thread_id: &ThreadId) -> SendMessageRequest {
        let (content, media_url) = match self {
            OutgoingContent::Text(text) => (Some(text.clone()), None),
            OutgoingContent::Media { url, note, .. } => (note.clone(), Some(url.clone())),
        };
        SendMessageRequest {
            subscription_id: thread_id.to_string(),
            message_type: self.message_type().to_string(),
            content,
            media_url,
        }
    }
}

/// Produces timestamp-derived ids for optimistic entries.
///
/// Ids are milliseconds since the epoch, bumped when two sends land in the
/// same millisecond so they stay unique and increasing.
#[derive(Debug, Default)]
pub struct LocalIdGenerator {
    last: AtomicI64,
}

impl LocalIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> MessageId {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return MessageId::Local(candidate),
                Err(current) => last = current,
            }
        }
    }
}

/// Submits messages and synthesizes their local copies.
pub struct SendPipeline<A: ThreadApi> {
    api: Arc<A>,
    ids: LocalIdGenerator,
}

impl<A: ThreadApi> SendPipeline<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            ids: LocalIdGenerator::new(),
        }
    }

    /// Submit `content` to `thread_id`.
    ///
    /// On success returns the optimistic message to append. On failure nothing
    /// is synthesized; `content` is only borrowed so the caller can retry.
    pub async fn send(&self, thread_id: &ThreadId, content: &OutgoingContent) -> Result<Message> {
        content.validate()?;

        let request = content.to_request(thread_id);
        if let Err(e) = self.api.send_message(&request).await {
            tracing::warn!("Send to thread {} failed: {}", thread_id, e);
            return Err(e);
        }

        let (text, media) = match content {
            OutgoingContent::Text(text) => (Some(text.clone()), None),
            OutgoingContent::Media { kind, url, note } => {
                (note.clone(), Some(MediaRef::new(url.clone(), Some(*kind))))
            }
        };

        let message = Message {
            id: self.ids.next_id(),
            thread_id: thread_id.clone(),
            sender_role: SenderRole::Own,
            created_at: Utc::now(),
            content: text,
            media,
        };
        tracing::debug!("Sent message {} to thread {}", message.id, thread_id);
        Ok(message)
    }
}
