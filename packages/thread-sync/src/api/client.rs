//! Messaging backend HTTP client

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use super::types::*;
use super::ThreadApi;
use crate::config::ClientConfig;
use crate::message::ThreadId;
use crate::session::Session;
use crate::{Error, Result};

/// HTTP client for the messaging backend
#[derive(Debug, Clone)]
pub struct MarketClient {
    config: ClientConfig,
    client: Client,
    credential: Arc<RwLock<Option<String>>>,
}

impl MarketClient {
    /// Create a client bound to the session's credential.
    ///
    /// Clones share the credential, so [`ThreadApi::set_credential`] on one
    /// is seen by all.
    pub fn new(config: &ClientConfig, session: &Session) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
            credential: Arc::new(RwLock::new(session.credential().map(str::to_string))),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.api_url
    }

    /// Credential currently attached to requests
    pub fn credential(&self) -> Option<String> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ========================================================================
    // Internal HTTP Methods
    // ========================================================================

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let credential = self.credential.read().unwrap_or_else(PoisonError::into_inner);
        match credential.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, url: &str, resource: &str) -> Result<T> {
        let request = self.authorize(self.client.get(url));
        let response = request.send().await.map_err(transport_error)?;
        let response = check_status(response, resource).await?;

        response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("GET {}: {}", url, e)))
    }

    /// Make a POST request, discarding the response body
    async fn post<B: Serialize>(&self, url: &str, body: &B, resource: &str) -> Result<()> {
        let request = self.authorize(self.client.post(url).json(body));
        let response = request.send().await.map_err(transport_error)?;
        check_status(response, resource).await?;
        Ok(())
    }
}

#[async_trait]
impl ThreadApi for MarketClient {
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<ThreadResponse> {
        let url = self.config.thread_url(thread_id.as_str());
        tracing::debug!("Fetching thread {}", thread_id);
        self.get(&url, thread_id.as_str()).await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<()> {
        let url = self.config.send_url();
        tracing::debug!(
            "Sending {} message to thread {}",
            request.message_type,
            request.subscription_id
        );
        self.post(&url, request, &request.subscription_id).await
    }

    fn set_credential(&self, credential: Option<&str>) {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        *self.credential.write().unwrap_or_else(PoisonError::into_inner) = credential;
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_decode() {
        Error::MalformedResponse(err.to_string())
    } else {
        Error::TransientIo(err.to_string())
    }
}

/// Map a non-success status onto the error taxonomy.
async fn check_status(response: Response, resource: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, resource, body))
}

fn status_error(status: StatusCode, resource: &str, body: String) -> Error {
    match status {
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Error::NotFound(resource.to_string()),
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        s if s.is_server_error() => Error::TransientIo(format!("{} {}", s, body)),
        s => Error::Rejected {
            status: s.as_u16(),
            message: rejection_message(&body),
        },
    }
}

/// Pull a readable message out of an error body (`{"detail": ...}` or raw text).
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("message"))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
