//! Thread snapshot loading.
//!
//! Fetches a thread's persisted history and metadata and normalizes each
//! record into a [`Message`], resolving sender roles against the session.

use std::sync::Arc;

use crate::api::types::{media_ref, ThreadResponse, WireMessage};
use crate::api::ThreadApi;
use crate::message::{parse_timestamp, Message, MessageId, SenderRole, ThreadId, ThreadInfo};
use crate::session::Session;
use crate::Result;

/// History and metadata of a thread at the time of fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub info: ThreadInfo,
    /// Messages in server order.
    pub messages: Vec<Message>,
}

/// Loads thread snapshots. Stateless and idempotent.
pub struct SnapshotLoader<A: ThreadApi> {
    api: Arc<A>,
    session: Session,
}

impl<A: ThreadApi> SnapshotLoader<A> {
    pub fn new(api: Arc<A>, session: Session) -> Self {
        Self { api, session }
    }

    /// Resolve sender roles against `session` from now on.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Fetch and normalize the snapshot for `thread_id`.
    ///
    /// Fails with `NotFound` for unknown or inaccessible threads and with
    /// `TransientIo` on network failure.
    pub async fn load(&self, thread_id: &ThreadId) -> Result<Snapshot> {
        let response = self.api.fetch_thread(thread_id).await?;
        let snapshot = self.normalize(thread_id, response);
        tracing::debug!(
            "Loaded thread {} with {} messages",
            thread_id,
            snapshot.messages.len()
        );
        Ok(snapshot)
    }

    fn normalize(&self, thread_id: &ThreadId, response: ThreadResponse) -> Snapshot {
        let id = response
            .subscription_id
            .or(response.id)
            .map(|id| id.to_string())
            .unwrap_or_else(|| thread_id.to_string());

        let info = ThreadInfo {
            id,
            title: response.title,
            subtitle: response.subtitle,
            status: response.status,
            current_user_id: response.current_user_id.map(|id| id.to_string()),
        };

        let messages = response
            .messages
            .into_iter()
            .filter_map(|record| self.to_message(thread_id, record))
            .collect();

        Snapshot { info, messages }
    }

    fn to_message(&self, thread_id: &ThreadId, record: WireMessage) -> Option<Message> {
        let Some(created_at) = parse_timestamp(&record.created_at) else {
            tracing::warn!(
                "Skipping history message {} with bad timestamp {:?}",
                record.id,
                record.created_at
            );
            return None;
        };

        let sender_role = if self.session.is_own(record.is_fan_message) {
            SenderRole::Own
        } else {
            SenderRole::Counterpart
        };

        Some(Message {
            id: MessageId::Server(record.id.to_string()),
            thread_id: thread_id.clone(),
            sender_role,
            created_at,
            media: media_ref(record.media_url.as_deref(), record.message_type.as_deref()),
            content: record.content,
        })
    }
}
