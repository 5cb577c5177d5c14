//! In-memory backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::types::{SendMessageRequest, ThreadResponse, WireId, WireMessage};
use crate::api::ThreadApi;
use crate::message::ThreadId;
use crate::{Error, Result};

pub fn wire_message(id: i64, is_fan_message: bool, content: &str, created_at: &str) -> WireMessage {
    WireMessage {
        id: WireId::Int(id),
        is_fan_message,
        content: Some(content.to_string()),
        media_url: None,
        message_type: Some("text".to_string()),
        created_at: created_at.to_string(),
    }
}

/// Frame of a `message_new` event for `thread`.
pub fn message_new_frame(id: i64, thread: &str, content: &str) -> String {
    serde_json::json!({
        "type": "message_new",
        "data": {
            "id": id,
            "subscription_id": thread,
            "is_fan_message": false,
            "content": content,
            "created_at": "2024-05-01T10:00:00"
        }
    })
    .to_string()
}

#[derive(Default)]
pub struct FakeApi {
    threads: Mutex<HashMap<String, Vec<WireMessage>>>,
    sent: Mutex<Vec<SendMessageRequest>>,
    next_send_error: Mutex<Option<Error>>,
    next_fetch_error: Mutex<Option<Error>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
    credential: Mutex<Option<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&self, id: &str, messages: Vec<WireMessage>) {
        self.threads.lock().unwrap().insert(id.to_string(), messages);
    }

    /// Make the next send fail with `error`.
    pub fn fail_next_send(&self, error: Error) {
        *self.next_send_error.lock().unwrap() = Some(error);
    }

    /// Make the next fetch fail with `error`.
    pub fn fail_next_fetch(&self, error: Error) {
        *self.next_fetch_error.lock().unwrap() = Some(error);
    }

    pub fn delay_fetches(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<SendMessageRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn credential(&self) -> Option<String> {
        self.credential.lock().unwrap().clone()
    }
}

#[async_trait]
impl ThreadApi for FakeApi {
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<ThreadResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.next_fetch_error.lock().unwrap().take();
        if let Some(err) = failure {
            return Err(err);
        }

        let messages = self
            .threads
            .lock()
            .unwrap()
            .get(thread_id.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(thread_id.to_string()))?;

        Ok(ThreadResponse {
            subscription_id: Some(WireId::Str(thread_id.to_string())),
            id: None,
            title: format!("Thread {}", thread_id),
            subtitle: "Consultation".to_string(),
            status: "active".to_string(),
            messages,
            current_user_id: Some(WireId::Str("u-1".to_string())),
        })
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<()> {
        if let Some(err) = self.next_send_error.lock().unwrap().take() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn set_credential(&self, credential: Option<&str>) {
        *self.credential.lock().unwrap() = credential.map(str::to_string);
    }
}
