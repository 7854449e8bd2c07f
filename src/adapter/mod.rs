//! Implementations of ports.
//!
//! - [`websocket`] - the venue's persistent connection over WebSocket
//! - [`token`] - in-process credential store
//! - [`api`] - REST order API

pub mod api;
pub mod token;
pub mod websocket;

pub use api::ApiClient;
pub use token::StoredTokenProvider;
pub use websocket::{WebSocketConnector, WebSocketLink};
