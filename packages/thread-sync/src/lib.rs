//! Thread Sync - real-time conversation core for the fan/creator messaging client.
//!
//! This crate keeps one open conversation thread in sync with the backend:
//!
//! - **Snapshot loading**: ordered history and metadata over REST
//! - **Live transport**: one user-scoped WebSocket per mounted view
//! - **Event routing**: `message_new` envelopes filtered to the open thread
//! - **State merging**: snapshot, live and optimistic entries in one list
//! - **Sending**: submit over REST, then append locally (the backend only
//!   notifies the counterpart)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thread_sync::{ClientConfig, MarketClient, OutgoingContent, Session, ThreadView};
//!
//! # async fn run() -> thread_sync::Result<()> {
//! let config = ClientConfig::load()?;
//! let session = Session::new(Some("token".into()), thread_sync::ParticipantRole::Fan);
//! let api = Arc::new(MarketClient::new(&config, &session)?);
//!
//! let mut view = ThreadView::new(api, session, &config, "42".into());
//! view.open().await?;
//! view.send(&OutgoingContent::text("hello")).await?;
//! println!("{} messages", view.messages().len());
//! view.close().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod connection;
pub mod merger;
pub mod message;
pub mod router;
pub mod send;
pub mod session;
pub mod snapshot;
pub mod view;

#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use api::{MarketClient, ThreadApi};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionOptions, ReconnectPolicy};
pub use merger::ThreadState;
pub use message::{MediaKind, MediaRef, Message, MessageId, SenderRole, ThreadId, ThreadInfo};
pub use router::{EventRouter, Routed};
pub use send::{LocalIdGenerator, OutgoingContent, SendPipeline};
pub use session::{ParticipantRole, Session};
pub use snapshot::{Snapshot, SnapshotLoader};
pub use view::{LiveUpdate, Liveness, ThreadView, ViewStatus};

/// Error types for thread-sync operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The thread does not exist or the caller may not see it.
    #[error("Thread not found: {0}")]
    NotFound(String),

    /// Network failure on fetch, submit or connect. Retryable.
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// A live event did not match the expected shape.
    #[error("Malformed event payload: {0}")]
    MalformedEventPayload(String),

    /// A successful REST response carried a body we could not decode.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unauthorized: credential rejected by the backend")]
    Unauthorized,

    /// The backend refused the request (validation and similar 4xx).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("No credential in session")]
    MissingCredential,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether repeating the same user action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientIo(_))
    }
}

/// Result type for thread-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(Error::TransientIo("timeout".into()).is_retryable());
        assert!(!Error::NotFound("t1".into()).is_retryable());
        assert!(!Error::Unauthorized.is_retryable());
        assert!(!Error::EmptyMessage.is_retryable());
    }
}
