//! In-process fakes for exercising ports and the registry without a
//! network.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;

use crate::{
    Credential, Result,
    directory::{ChannelDirectory, InMemoryDirectory},
    handle::TransportListener,
    host::{NodeContext, NodeStatus},
    transport::{AuthenticatedInfo, Identity, RawMessage, Transport, TransportEvent, TransportFactory},
};

/// Transport driven by the test: events are pushed with [`emit`] and sends
/// are recorded.
///
/// [`emit`]: FakeTransport::emit
pub struct FakeTransport {
    credential: Credential,
    directory: InMemoryDirectory,
    listener: Mutex<Option<TransportListener>>,
    starts: AtomicUsize,
    disconnects: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
    auto_open: bool,
    hang_on_disconnect: bool,
}

impl FakeTransport {
    pub fn new(credential: Credential, directory: InMemoryDirectory) -> Self {
        Self {
            credential,
            directory,
            listener: Mutex::new(None),
            starts: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            auto_open: false,
            hang_on_disconnect: false,
        }
    }

    /// Make `disconnect()` count the call and then never complete.
    #[must_use]
    pub fn hang_on_disconnect(mut self) -> Self {
        self.hang_on_disconnect = true;
        self
    }

    /// Run the full connect sequence from inside `start()`.
    #[must_use]
    pub fn auto_open(mut self) -> Self {
        self.auto_open = true;
        self
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Report an event through the listener of the latest `start()`.
    /// Ignored before the first start.
    pub fn emit(&self, event: TransportEvent) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(listener) = listener {
            listener.emit(event);
        }
    }

    /// Connecting, authenticated, then opened.
    pub fn open(&self) {
        self.emit(TransportEvent::Connecting);
        self.emit(TransportEvent::Authenticated(AuthenticatedInfo {
            self_identity: Identity::new("U0", "chatmux"),
            team: Identity::new("T0", "test"),
        }));
        self.emit(TransportEvent::ConnectionOpened);
    }

    pub fn deliver(&self, message: RawMessage) {
        self.emit(TransportEvent::Message(message));
    }

    /// `(text, channel_id)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` disconnects were seen. Disconnects run in
    /// the background, so call this from a thread without a runtime.
    pub fn wait_for_disconnects(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.disconnect_count() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn start(&self, listener: TransportListener) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
        if self.auto_open {
            self.open();
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_disconnect {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn send_message(&self, text: &str, channel_id: &str) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), channel_id.to_string()));
    }

    fn directory(&self) -> &dyn ChannelDirectory {
        &self.directory
    }
}

/// Factory handing out [`FakeTransport`]s that share one directory.
pub struct FakeTransportFactory {
    directory: InMemoryDirectory,
    auto_open: bool,
    hang_on_disconnect: bool,
    created: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    pub fn new(directory: InMemoryDirectory) -> Self {
        Self {
            directory,
            auto_open: false,
            hang_on_disconnect: false,
            created: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn auto_open(mut self) -> Self {
        self.auto_open = true;
        self
    }

    /// Transports created from now on never finish disconnecting.
    #[must_use]
    pub fn hang_on_disconnect(mut self) -> Self {
        self.hang_on_disconnect = true;
        self
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Most recently created transport for `credential`.
    pub fn latest(&self, credential: &Credential) -> Option<Arc<FakeTransport>> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|t| t.credential() == credential)
            .cloned()
    }

    pub fn latest_by_token(&self, token: &str) -> Option<Arc<FakeTransport>> {
        let credential = Credential::parse(token).ok()?;
        self.latest(&credential)
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self, credential: &Credential) -> Arc<dyn Transport> {
        let mut transport = FakeTransport::new(credential.clone(), self.directory.clone());
        if self.auto_open {
            transport = transport.auto_open();
        }
        if self.hang_on_disconnect {
            transport = transport.hang_on_disconnect();
        }
        let transport = Arc::new(transport);
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&transport));
        transport
    }
}

/// Node that records everything a port reports.
pub struct RecordingNode {
    id: String,
    statuses: Mutex<Vec<NodeStatus>>,
    sent: Mutex<Vec<serde_json::Value>>,
    on_first_status: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl RecordingNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            statuses: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            on_first_status: Mutex::new(None),
        }
    }

    /// Run `hook` right after the first status is recorded.
    #[must_use]
    pub fn on_first_status(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self
            .on_first_status
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Box::new(hook));
        self
    }

    pub fn statuses(&self) -> Vec<NodeStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_status(&self) -> Option<NodeStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl NodeContext for RecordingNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self, status: NodeStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(status);
        let hook = self
            .on_first_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn send(&self, message: serde_json::Value) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }
}
