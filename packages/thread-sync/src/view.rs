//! Conversation view controller.
//!
//! Wires the loader, connection, router, merger and send pipeline together
//! for one open thread. A view is driven from a single task: every mutation
//! goes through `&mut self`, and live frames arrive through a channel that
//! the view drains when it chooses to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::ThreadApi;
use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::merger::ThreadState;
use crate::message::{Message, ThreadId, ThreadInfo};
use crate::router::EventRouter;
use crate::send::{OutgoingContent, SendPipeline};
use crate::session::Session;
use crate::snapshot::SnapshotLoader;
use crate::{Error, Result};

/// Load state of the view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewStatus {
    #[default]
    Loading,
    Ready,
    /// The thread does not exist or is not visible to this user.
    NotFound,
    /// Snapshot fetch failed; the user may retry.
    Failed(String),
}

/// Result of draining one live frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveUpdate {
    /// A message was appended; read it with [`ThreadView::messages`].
    Appended,
    /// The frame was for another thread, another event kind, or malformed.
    Skipped,
    /// No transport, or the transport has stopped delivering.
    Disconnected,
}

/// Shared flag telling in-flight work whether the view is still mounted.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the view as torn down. Results arriving afterwards are discarded.
    pub fn tear_down(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One mounted conversation view.
pub struct ThreadView<A: ThreadApi> {
    thread_id: ThreadId,
    session: Session,
    api: Arc<A>,
    loader: SnapshotLoader<A>,
    pipeline: SendPipeline<A>,
    router: EventRouter,
    state: ThreadState,
    connection: ConnectionManager,
    /// Why live updates can never start, when the transport URL is unusable.
    transport_error: Option<String>,
    live: Option<mpsc::Receiver<String>>,
    info: Option<ThreadInfo>,
    status: ViewStatus,
    liveness: Liveness,
    draft: String,
}

impl<A: ThreadApi> ThreadView<A> {
    pub fn new(api: Arc<A>, session: Session, config: &ClientConfig, thread_id: ThreadId) -> Self {
        // An unusable transport URL only disables live updates.
        let (ws_url, transport_error) = match config.websocket_url() {
            Ok(url) => (url, None),
            Err(e) => {
                tracing::warn!("Live updates disabled: {}", e);
                (String::new(), Some(e.to_string()))
            }
        };

        Self {
            loader: SnapshotLoader::new(api.clone(), session.clone()),
            pipeline: SendPipeline::new(api.clone()),
            router: EventRouter::new(thread_id.clone()),
            state: ThreadState::new(thread_id.clone()),
            connection: ConnectionManager::new(ws_url, config.connection_options()),
            transport_error,
            live: None,
            info: None,
            status: ViewStatus::Loading,
            liveness: Liveness::new(),
            draft: String::new(),
            api,
            thread_id,
            session,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load the snapshot, then connect the live transport.
    ///
    /// Only a snapshot failure is returned; a transport failure leaves the
    /// view usable without live updates.
    pub async fn open(&mut self) -> Result<()> {
        self.load().await?;
        self.connect().await;
        Ok(())
    }

    /// Fetch the snapshot and seed the message list.
    ///
    /// Nothing is mutated if the view is torn down while the fetch is in
    /// flight, or if the fetch fails.
    pub async fn load(&mut self) -> Result<()> {
        self.status = ViewStatus::Loading;
        let result = self.loader.load(&self.thread_id).await;

        if !self.liveness.is_alive() {
            tracing::debug!("Discarding snapshot of {} for torn-down view", self.thread_id);
            return Ok(());
        }

        match result {
            Ok(snapshot) => {
                self.state.seed(snapshot.messages);
                self.info = Some(snapshot.info);
                self.status = ViewStatus::Ready;
                Ok(())
            }
            Err(e) => {
                self.status = match &e {
                    Error::NotFound(_) => ViewStatus::NotFound,
                    other => ViewStatus::Failed(other.to_string()),
                };
                tracing::warn!("Failed to load thread {}: {}", self.thread_id, e);
                Err(e)
            }
        }
    }

    /// Open the live transport. Returns whether live updates are flowing.
    pub async fn connect(&mut self) -> bool {
        if !self.liveness.is_alive() {
            return false;
        }
        if let Some(reason) = &self.transport_error {
            tracing::warn!("Live updates unavailable for {}: {}", self.thread_id, reason);
            return false;
        }
        match self.connection.open(&self.session).await {
            Ok(frames) => {
                self.live = Some(frames);
                true
            }
            Err(e) => {
                tracing::warn!("Live updates unavailable for {}: {}", self.thread_id, e);
                self.live = None;
                false
            }
        }
    }

    /// Replace the session.
    ///
    /// Later requests carry the new credential and later snapshots resolve
    /// roles against the new role. A changed credential reopens the transport.
    pub async fn set_session(&mut self, session: Session) {
        self.api.set_credential(session.credential());
        self.loader.set_session(session.clone());
        self.session = session;
        if !self.liveness.is_alive() || self.transport_error.is_some() {
            return;
        }
        match self.connection.ensure(&self.session).await {
            Ok(Some(frames)) => self.live = Some(frames),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Live updates unavailable for {}: {}", self.thread_id, e);
                self.connection.close().await;
                self.live = None;
            }
        }
    }

    /// Tear the view down and release the transport.
    ///
    /// A closed view stays closed; remounting builds a new view.
    pub async fn close(&mut self) {
        self.liveness.tear_down();
        self.live = None;
        self.connection.close().await;
    }

    /// Handle to the view's liveness flag.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    // ========================================================================
    // Live Updates
    // ========================================================================

    /// Wait for the next live frame and merge it.
    pub async fn pump_live(&mut self) -> LiveUpdate {
        let Some(frames) = self.live.as_mut() else {
            return LiveUpdate::Disconnected;
        };
        match frames.recv().await {
            Some(frame) => self.handle_frame(&frame),
            None => {
                tracing::info!("Live updates ended for {}", self.thread_id);
                self.live = None;
                LiveUpdate::Disconnected
            }
        }
    }

    /// Route one raw frame into the message list.
    pub fn handle_frame(&mut self, raw: &str) -> LiveUpdate {
        if !self.liveness.is_alive() {
            return LiveUpdate::Skipped;
        }
        let Some(message) = self.router.accept(raw) else {
            return LiveUpdate::Skipped;
        };
        if self.state.append_live(message) {
            LiveUpdate::Appended
        } else {
            LiveUpdate::Skipped
        }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send `content` and append the optimistic copy on success.
    ///
    /// Returns the appended message.
    pub async fn send(&mut self, content: &OutgoingContent) -> Result<Message> {
        let message = self.pipeline.send(&self.thread_id, content).await?;
        self.state.append_local(message.clone());
        Ok(message)
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Send the draft as text. The draft is cleared only on success.
    pub async fn send_draft(&mut self) -> Result<Message> {
        let content = OutgoingContent::Text(self.draft.clone());
        let message = self.send(&content).await?;
        self.draft.clear();
        Ok(message)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn info(&self) -> Option<&ThreadInfo> {
        self.info.as_ref()
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    /// Why live updates are unavailable for this view's configuration.
    pub fn transport_error(&self) -> Option<&str> {
        self.transport_error.as_deref()
    }

    /// Whether a live transport is attached.
    pub fn is_live(&self) -> bool {
        self.live.is_some() && self.connection.is_connected()
    }
}
