//! Core message types shared by every component.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::ParticipantRole;

/// Text shown for a message that only carries media.
pub const ATTACHMENT_PLACEHOLDER: &str = "Sent an attachment";

/// Identifier of a conversation thread (the backend's `subscription_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Message identifier.
///
/// Server ids and local ids live in disjoint spaces, so an optimistic entry
/// can never be mistaken for a persisted one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MessageId {
    /// Id assigned by the backend.
    Server(String),
    /// Timestamp-derived id of a not-yet-confirmed optimistic entry.
    Local(i64),
}

impl MessageId {
    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Server(id) => f.write_str(id),
            MessageId::Local(ts) => write!(f, "local-{}", ts),
        }
    }
}

/// Who wrote a message, relative to the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderRole {
    #[serde(rename = "self")]
    Own,
    #[serde(rename = "counterpart")]
    Counterpart,
}

/// Kind of media a message points at. Wire name is the `message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// Reference to an uploaded media resource. Owned by the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, kind: Option<MediaKind>) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// A single message in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub sender_role: SenderRole,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
}

impl Message {
    pub fn is_own(&self) -> bool {
        self.sender_role == SenderRole::Own
    }

    /// Text to render for this message.
    ///
    /// Falls back to a placeholder when only media is attached.
    pub fn display_text(&self) -> &str {
        match self.content.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ if self.media.is_some() => ATTACHMENT_PLACEHOLDER,
            _ => "",
        }
    }

    /// Creation time as `HH:MM` in local time.
    pub fn display_time(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }

    /// Sender label given the current user's role.
    pub fn sender_label(&self, own_role: ParticipantRole) -> &'static str {
        match self.sender_role {
            SenderRole::Own => "You",
            SenderRole::Counterpart => own_role.counterpart().label(),
        }
    }
}

/// Thread metadata returned alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<String>,
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601; naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
