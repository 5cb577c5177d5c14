//! Live transport connection management
//!
//! Owns the single WebSocket of a mounted conversation view. The connection
//! is scoped to the user (credential in the query string), not to a thread,
//! so one socket carries events for every thread the user can observe.
//!
//! Frames are forwarded by a background reader task into a bounded channel;
//! the view drains the channel at its own pace and is never re-entered.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::session::Session;
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Floor for reconnect delays, so a zero setting cannot spin.
const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// What to do when an open transport drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stop delivering live updates until the view reopens.
    #[default]
    Disabled,
    /// Reconnect with exponential backoff, starting at `initial` and capped at `max`.
    Backoff { initial: Duration, max: Duration },
}

/// Transport tuning.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub connect_timeout: Duration,
    /// How long `close` waits for the reader to finish before aborting it.
    pub close_timeout: Duration,
    /// Frames buffered between the reader task and the view.
    pub buffer: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
            buffer: 256,
            reconnect: ReconnectPolicy::Disabled,
        }
    }
}

struct LiveConnection {
    credential: String,
    shutdown: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
}

/// Manages at most one live transport at a time
pub struct ConnectionManager {
    ws_url: String,
    options: ConnectionOptions,
    active: Option<LiveConnection>,
}

impl ConnectionManager {
    pub fn new(ws_url: impl Into<String>, options: ConnectionOptions) -> Self {
        Self {
            ws_url: ws_url.into(),
            options,
            active: None,
        }
    }

    /// Open the transport for `session`, closing any previous one first.
    ///
    /// Returns the receiving end of the frame channel. Fails with
    /// `MissingCredential` when the session has no credential and with
    /// `TransientIo` when the socket cannot be opened.
    pub async fn open(&mut self, session: &Session) -> Result<mpsc::Receiver<String>> {
        let credential = session
            .credential()
            .ok_or(Error::MissingCredential)?
            .to_string();

        self.close().await;

        let url = self.endpoint_for(&credential)?;
        let stream = connect(&url, self.options.connect_timeout).await?;
        tracing::info!("Live transport connected to {}", self.ws_url);

        let (frames_tx, frames_rx) = mpsc::channel(self.options.buffer.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(run_reader(
            stream,
            url,
            frames_tx,
            shutdown_rx,
            self.options.clone(),
        ));

        self.active = Some(LiveConnection {
            credential,
            shutdown: Some(shutdown_tx),
            reader,
        });
        Ok(frames_rx)
    }

    /// Keep the current transport if it is alive and bound to the session's
    /// credential; otherwise reopen it.
    ///
    /// Returns `Some(receiver)` only when a new transport was opened.
    pub async fn ensure(&mut self, session: &Session) -> Result<Option<mpsc::Receiver<String>>> {
        if self.is_connected() && self.credential() == session.credential() {
            return Ok(None);
        }
        if self.active.is_some() {
            tracing::info!("Credential changed or transport dropped, reconnecting");
        }
        self.open(session).await.map(Some)
    }

    /// Close the transport, if any.
    pub async fn close(&mut self) {
        let Some(mut conn) = self.active.take() else {
            return;
        };

        if let Some(shutdown) = conn.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(self.options.close_timeout, &mut conn.reader)
            .await
            .is_err()
        {
            tracing::debug!("Live reader did not stop in time, aborting");
            conn.reader.abort();
        }
        tracing::info!("Live transport closed");
    }

    /// Whether a transport is open and its reader still running.
    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .map(|conn| !conn.reader.is_finished())
            .unwrap_or(false)
    }

    /// Credential the current transport was opened with.
    pub fn credential(&self) -> Option<&str> {
        self.active.as_ref().map(|conn| conn.credential.as_str())
    }

    /// Transport URL with the credential attached as `token`.
    fn endpoint_for(&self, credential: &str) -> Result<String> {
        let mut url = Url::parse(&self.ws_url)
            .map_err(|e| Error::Config(format!("invalid websocket url {}: {}", self.ws_url, e)))?;
        url.query_pairs_mut().append_pair("token", credential);
        Ok(url.into())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(conn) = self.active.take() {
            conn.reader.abort();
        }
    }
}

async fn connect(url: &str, timeout: Duration) -> Result<WsStream> {
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(Error::TransientIo(format!("websocket connect failed: {}", e))),
        Err(_) => Err(Error::TransientIo(format!(
            "websocket connect timed out after {:?}",
            timeout
        ))),
    }
}

// ============================================================================
// Reader Task
// ============================================================================

enum PumpEnd {
    Shutdown,
    ReceiverGone,
    Disconnected,
}

async fn run_reader(
    mut stream: WsStream,
    url: String,
    frames: mpsc::Sender<String>,
    mut shutdown: oneshot::Receiver<()>,
    options: ConnectionOptions,
) {
    loop {
        match pump(&mut stream, &frames, &mut shutdown).await {
            PumpEnd::Shutdown | PumpEnd::ReceiverGone => {
                let _ = stream.close(None).await;
                return;
            }
            PumpEnd::Disconnected => {}
        }

        let ReconnectPolicy::Backoff { initial, max } = options.reconnect else {
            tracing::warn!("Live transport dropped, live updates stopped");
            return;
        };

        let mut retry_delay = initial.max(MIN_RETRY_DELAY);
        loop {
            tracing::debug!("Reconnecting in {:?}...", retry_delay);
            tokio::select! {
                _ = &mut shutdown => return,
                _ = frames.closed() => return,
                _ = tokio::time::sleep(retry_delay) => {}
            }

            match connect(&url, options.connect_timeout).await {
                Ok(reconnected) => {
                    tracing::info!("Live transport reconnected");
                    stream = reconnected;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Reconnect failed: {}", e);
                    retry_delay = next_delay(retry_delay, max);
                }
            }
        }
    }
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max).max(MIN_RETRY_DELAY)
}

/// Forward frames until shutdown, receiver drop, or disconnect.
async fn pump(
    stream: &mut WsStream,
    frames: &mpsc::Sender<String>,
    shutdown: &mut oneshot::Receiver<()>,
) -> PumpEnd {
    loop {
        tokio::select! {
            _ = &mut *shutdown => return PumpEnd::Shutdown,
            _ = frames.closed() => return PumpEnd::ReceiverGone,
            next = stream.next() => match next {
                Some(Ok(WsMessage::Text(text))) => {
                    if frames.send(text.as_str().to_owned()).await.is_err() {
                        return PumpEnd::ReceiverGone;
                    }
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if frames.send(text).await.is_err() {
                            return PumpEnd::ReceiverGone;
                        }
                    }
                    Err(_) => tracing::warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::debug!("Live transport closed by server: {:?}", frame);
                    return PumpEnd::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Live transport error: {}", e);
                    return PumpEnd::Disconnected;
                }
                None => return PumpEnd::Disconnected,
            }
        }
    }
}
