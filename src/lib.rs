//! Parley - session and negotiation-protocol client for a real-time trading
//! venue.
//!
//! The client keeps one authenticated connection alive, turns every inbound
//! frame into a typed application event, and drives three keyed
//! confirmation flows plus a turn-based price negotiation on top of it.
//!
//! # Modules
//!
//! - [`domain`] - identifiers, connection state, orders, turns and prompts
//! - [`protocol`] - the JSON envelope wire format, inbound and outbound
//! - [`port`] - traits the session depends on: token supply and transport
//! - [`adapter`] - WebSocket transport, credential store and REST client
//! - [`application`] - the session, its driver task, the router and the
//!   turn and confirmation coordinators
//! - [`config`] - TOML configuration and logging setup
//! - [`cli`] - the `parley` command-line front end
//! - [`error`] - error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parley::adapter::{StoredTokenProvider, WebSocketConnector};
//! use parley::application::{spawn, Session, SessionConfig};
//!
//! # async fn demo() {
//! let tokens = Arc::new(StoredTokenProvider::new("token", None));
//! let connector = Arc::new(WebSocketConnector::new("wss://venue.example/ws"));
//! let (handle, _driver) = spawn(Session::new(connector, tokens, SessionConfig::default()));
//!
//! let mut events = handle.subscribe();
//! handle.start_auto_reconnect().await;
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod protocol;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
