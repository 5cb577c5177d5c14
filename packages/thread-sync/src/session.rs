//! Session context threaded into every component.
//!
//! The session carries the credential, the user id and the participant role.
//! Components take it at construction instead of reading global storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which side of a two-party thread the current user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    #[default]
    Fan,
    Creator,
}

impl ParticipantRole {
    pub fn is_fan(&self) -> bool {
        matches!(self, ParticipantRole::Fan)
    }

    /// The role of the other participant.
    pub fn counterpart(&self) -> Self {
        match self {
            ParticipantRole::Fan => ParticipantRole::Creator,
            ParticipantRole::Creator => ParticipantRole::Fan,
        }
    }

    /// Human label used when rendering the counterpart's messages.
    pub fn label(&self) -> &'static str {
        match self {
            ParticipantRole::Fan => "Fan",
            ParticipantRole::Creator => "Creator",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantRole::Fan => write!(f, "fan"),
            ParticipantRole::Creator => write!(f, "creator"),
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fan" | "user" => Ok(ParticipantRole::Fan),
            "creator" => Ok(ParticipantRole::Creator),
            other => Err(Error::Config(format!("unknown participant role: {}", other))),
        }
    }
}

/// Identity of the authenticated user for the lifetime of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    credential: Option<String>,
    user_id: Option<String>,
    role: ParticipantRole,
}

impl Session {
    /// Create a session with an optional bearer credential.
    pub fn new(credential: Option<String>, role: ParticipantRole) -> Self {
        Self {
            credential,
            user_id: None,
            role,
        }
    }

    /// Attach the user id (usually learned from the thread snapshot).
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The bearer credential, if present and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    /// Whether a wire record flagged `is_fan_message` was written by us.
    pub fn is_own(&self, is_fan_message: bool) -> bool {
        is_fan_message == self.role.is_fan()
    }
}
