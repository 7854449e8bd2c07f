//! Transport port for the persistent venue connection.
//!
//! A [`Connector`] performs the authenticated handshake and yields a fresh
//! [`Link`] each time. The session treats every link as a distinct underlying
//! transport object: handlers are attached to it exactly once and it is never
//! reused after it closes.

use async_trait::async_trait;

use crate::error::{ConnectError, Result};
use crate::protocol::{Envelope, OutboundFrame};

/// Something that happened on an established link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkSignal {
    /// A decoded envelope.
    Frame(Envelope),
    /// The link closed or failed. Recoverable by reconnecting.
    Closed { reason: String },
    /// The venue closed the link on credential grounds.
    AuthRejected { reason: String },
}

/// Opens authenticated links to the venue.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::AuthExpired`] when the venue rejects the
    /// credential and [`ConnectError::Transient`] for any other failure.
    async fn connect(&self, token: &str) -> std::result::Result<Box<dyn Link>, ConnectError>;

    /// Human-readable endpoint name for logs.
    fn endpoint(&self) -> &str;
}

/// An established bidirectional link.
#[async_trait]
pub trait Link: Send {
    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    async fn send(&mut self, frame: &OutboundFrame) -> Result<()>;

    /// Wait for the next signal. Must be cancel-safe.
    ///
    /// Returns `None` once the link has ended and nothing more will arrive.
    async fn next_signal(&mut self) -> Option<LinkSignal>;

    /// Close the link. Best effort.
    async fn close(&mut self);
}
