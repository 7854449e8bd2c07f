#![allow(dead_code)]

pub mod frames;

use std::sync::Arc;
use std::time::Duration;

use parley::application::{AppEvent, Session, SessionConfig};
use parley::domain::ConnectionState;
use parley::port::Connector;
use parley::testkit::token::RecordingTokens;
use parley::testkit::transport::{LinkHandle, ScriptedConnector};
use tokio::sync::broadcast;

pub const INTERVAL: Duration = Duration::from_secs(5);

pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        reconnect_interval: INTERVAL,
        ..SessionConfig::default()
    }
}

/// A session wired to scripted collaborators, with an event receiver that
/// was subscribed before anything happened.
pub struct Harness {
    pub session: Session,
    pub connector: Arc<ScriptedConnector>,
    pub tokens: RecordingTokens,
    pub events: broadcast::Receiver<AppEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_session_config())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::build(RecordingTokens::valid("token-1"), config)
    }

    pub fn without_token() -> Self {
        Self::build(RecordingTokens::missing(), test_session_config())
    }

    fn build(tokens: RecordingTokens, config: SessionConfig) -> Self {
        let connector = Arc::new(ScriptedConnector::new());
        let session = Session::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::new(tokens.clone()),
            config,
        );
        let events = session.subscribe();
        Self {
            session,
            connector,
            tokens,
            events,
        }
    }

    /// Queue a link, connect and process the handshake.
    pub async fn connect(&mut self) -> LinkHandle {
        let link = self.connector.then_link();
        self.session.connect();
        self.session.pump().await;
        assert_eq!(self.session.state(), ConnectionState::Connected);
        link
    }

    /// Deliver one frame and let the session route it.
    pub async fn deliver(&mut self, link: &LinkHandle, event: &str, data: serde_json::Value) {
        link.push(event, data);
        self.session.pump().await;
    }

    /// Every event published since the last drain.
    pub fn drain(&mut self) -> Vec<AppEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn attempts(&self) -> u32 {
        self.connector.attempts().get()
    }
}
