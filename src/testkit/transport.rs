//! Mock [`Connector`] and [`Link`] implementations.
//!
//! - [`ScriptedConnector`] - pre-loaded handshake results, with a shared
//!   attempt counter. Best for: reconnection and auth-failure paths.
//! - [`ChannelLink`] - channel-backed link driven by a [`LinkHandle`].
//!   Best for: delivering frames on demand and asserting what was sent.

use std::collections::VecDeque;
use std::future::pending;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{ConnectError, Error, Result};
use crate::port::{Connector, Link, LinkSignal};
use crate::protocol::{Envelope, OutboundFrame};

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU32>);

impl Counter {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ChannelLink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LinkState {
    sent: Mutex<Vec<OutboundFrame>>,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

/// A link whose inbound side is fed through a [`LinkHandle`].
pub struct ChannelLink {
    rx: mpsc::UnboundedReceiver<LinkSignal>,
    state: Arc<LinkState>,
}

/// External control over a [`ChannelLink`].
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<LinkSignal>,
    state: Arc<LinkState>,
}

impl ChannelLink {
    pub fn new() -> (Self, LinkHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(LinkState::default());
        (
            Self {
                rx,
                state: Arc::clone(&state),
            },
            LinkHandle { tx, state },
        )
    }
}

impl LinkHandle {
    /// Deliver an envelope as if the venue sent it.
    pub fn push(&self, event: &str, data: serde_json::Value) {
        self.signal(LinkSignal::Frame(Envelope::new(event, data)));
    }

    pub fn signal(&self, signal: LinkSignal) {
        let _ = self.tx.send(signal);
    }

    /// Simulate a transport drop.
    pub fn drop_connection(&self, reason: &str) {
        self.signal(LinkSignal::Closed {
            reason: reason.into(),
        });
    }

    /// Simulate the venue closing the link on credential grounds.
    pub fn reject_auth(&self, reason: &str) {
        self.signal(LinkSignal::AuthRejected {
            reason: reason.into(),
        });
    }

    /// Make every subsequent `send` fail.
    pub fn fail_sends(&self) {
        self.state.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Frames the session sent on this link, in order.
    pub fn sent(&self) -> Vec<OutboundFrame> {
        self.state.sent.lock().clone()
    }

    /// Whether the session closed this link.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Link for ChannelLink {
    async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        if self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Connection("scripted send failure".into()));
        }
        self.state.sent.lock().push(frame.clone());
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<LinkSignal> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

// ---------------------------------------------------------------------------
// ScriptedConnector
// ---------------------------------------------------------------------------

enum Step {
    Link(ChannelLink),
    Fail(ConnectError),
    /// Never completes, like a handshake into a blackholed network.
    Stall,
}

/// A connector that pops one scripted result per handshake.
///
/// An exhausted script yields [`ConnectError::Transient`].
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    attempts: Counter,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose first handshake succeeds.
    pub fn with_link() -> (Self, LinkHandle) {
        let connector = Self::new();
        let handle = connector.then_link();
        (connector, handle)
    }

    /// Queue a successful handshake and return control of its link.
    pub fn then_link(&self) -> LinkHandle {
        let (link, handle) = ChannelLink::new();
        self.script.lock().push_back(Step::Link(link));
        handle
    }

    /// Queue a failed handshake.
    pub fn then_fail(&self, err: ConnectError) {
        self.script.lock().push_back(Step::Fail(err));
    }

    /// Queue a handshake that never answers.
    pub fn then_stall(&self) {
        self.script.lock().push_back(Step::Stall);
    }

    /// Shared handshake counter.
    pub fn attempts(&self) -> Counter {
        self.attempts.clone()
    }

    /// Tokens presented on each handshake.
    pub fn tokens(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.tokens)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, token: &str) -> std::result::Result<Box<dyn Link>, ConnectError> {
        self.attempts.bump();
        self.tokens.lock().push(token.to_string());
        let next = self.script.lock().pop_front();
        match next {
            Some(Step::Link(link)) => Ok(Box::new(link)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Stall) => pending().await,
            None => Err(ConnectError::Transient("no scripted handshake left".into())),
        }
    }

    fn endpoint(&self) -> &str {
        "scripted"
    }
}
