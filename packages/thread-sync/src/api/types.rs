//! Wire types for the messaging backend

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::{MediaKind, MediaRef};

// ============================================================================
// Shared
// ============================================================================

/// Identifier that the backend may send as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Int(i64),
    Str(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Int(id) => write!(f, "{}", id),
            WireId::Str(id) => f.write_str(id),
        }
    }
}

/// Build a media reference from the wire's `media_url` and `message_type`.
pub fn media_ref(media_url: Option<&str>, message_type: Option<&str>) -> Option<MediaRef> {
    let url = media_url.map(str::trim).filter(|u| !u.is_empty())?;
    let kind = match message_type {
        Some("audio") => Some(MediaKind::Audio),
        Some("video") => Some(MediaKind::Video),
        Some("image") => Some(MediaKind::Image),
        _ => None,
    };
    Some(MediaRef::new(url, kind))
}

// ============================================================================
// Thread Snapshot
// ============================================================================

/// Response of `GET /messages/thread/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThreadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<WireId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default, alias = "currentUserId", skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<WireId>,
}

/// A persisted message record inside a thread snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: WireId,
    #[serde(default)]
    pub is_fan_message: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    pub created_at: String,
}

// ============================================================================
// Live Events
// ============================================================================

/// Event type carrying a new message
pub const MESSAGE_NEW: &str = "message_new";

/// Envelope of every frame on the live transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of a `message_new` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMessagePayload {
    pub id: WireId,
    #[serde(default)]
    pub subscription_id: Option<WireId>,
    #[serde(default)]
    pub is_fan_message: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ============================================================================
// Send
// ============================================================================

/// Body of `POST /messages/send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub subscription_id: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}
