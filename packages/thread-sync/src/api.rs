//! REST client for the messaging backend
//!
//! The loader and send pipeline depend on [`ThreadApi`] rather than on the
//! HTTP client, so both can run against an in-memory backend in tests.

pub mod client;
pub mod types;

pub use client::*;

use async_trait::async_trait;

use crate::message::ThreadId;
use crate::Result;
use types::{SendMessageRequest, ThreadResponse};

/// Backend operations the thread core relies on.
#[async_trait]
pub trait ThreadApi: Send + Sync {
    /// Fetch a thread's metadata and ordered message history.
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<ThreadResponse>;

    /// Persist a new message. Only success or failure is meaningful.
    async fn send_message(&self, request: &SendMessageRequest) -> Result<()>;

    /// Replace the credential used by every later request.
    fn set_credential(&self, credential: Option<&str>);
}
