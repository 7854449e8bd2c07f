//! WebSocket transport for the venue's real-time connection.
//!
//! [`WebSocketConnector`] performs the authenticated handshake and yields a
//! [`WebSocketLink`] per connection. The link decodes text frames into
//! [`Envelope`]s and maps close/error conditions onto [`LinkSignal`]s:
//!
//! - **Text**: decoded as an envelope; undecodable frames are logged and skipped
//! - **Ping**: answered with a pong carrying the same payload
//! - **Close 1008 (policy)**: the venue rejected the credential
//! - **Other close / error / end of stream**: recoverable loss

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::error::{ConnectError, Result};
use crate::port::{Connector, Link, LinkSignal};
use crate::protocol::{Envelope, OutboundFrame};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens bearer-authenticated WebSocket links to one endpoint.
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, token: &str) -> std::result::Result<Box<dyn Link>, ConnectError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectError::Transient(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ConnectError::AuthExpired(format!("unusable token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        debug!(url = %self.url, "Opening WebSocket");
        let (ws, response) = connect_async(request).await.map_err(classify_handshake)?;
        info!(status = %response.status(), "WebSocket connected");

        Ok(Box::new(WebSocketLink { ws, closed: false }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

fn classify_handshake(err: WsError) -> ConnectError {
    match &err {
        WsError::Http(response)
            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
        {
            ConnectError::AuthExpired(format!("handshake rejected with {}", response.status()))
        }
        _ => ConnectError::Transient(err.to_string()),
    }
}

/// One established WebSocket connection.
pub struct WebSocketLink {
    ws: Stream,
    closed: bool,
}

#[async_trait]
impl Link for WebSocketLink {
    async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        let text = frame.to_text()?;
        trace!(event = frame.event_name(), bytes = text.len(), "Sending frame");
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<LinkSignal> {
        if self.closed {
            return None;
        }

        loop {
            let Some(message) = self.ws.next().await else {
                self.closed = true;
                return Some(LinkSignal::Closed {
                    reason: "stream ended".into(),
                });
            };

            match message {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => return Some(LinkSignal::Frame(envelope)),
                        Err(e) => {
                            warn!(error = %e, bytes = text.len(), "Failed to parse envelope");
                        }
                    }
                }
                Ok(Message::Ping(data)) => {
                    trace!("Received WebSocket ping");
                    if let Err(e) = self.ws.send(Message::Pong(data)).await {
                        self.closed = true;
                        return Some(LinkSignal::Closed {
                            reason: format!("failed to send pong: {e}"),
                        });
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    self.closed = true;
                    return Some(close_signal(frame));
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    self.closed = true;
                    return Some(LinkSignal::Closed {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}

fn close_signal(frame: Option<CloseFrame<'_>>) -> LinkSignal {
    match frame {
        Some(frame) if frame.code == CloseCode::Policy => LinkSignal::AuthRejected {
            reason: frame.reason.to_string(),
        },
        Some(frame) => LinkSignal::Closed {
            reason: format!("{}: {}", u16::from(frame.code), frame.reason),
        },
        None => LinkSignal::Closed {
            reason: "closed by server".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn policy_close_is_auth_rejection() {
        let signal = close_signal(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: Cow::Borrowed("token expired"),
        }));
        assert_eq!(
            signal,
            LinkSignal::AuthRejected {
                reason: "token expired".into()
            }
        );
    }

    #[test]
    fn normal_close_is_recoverable() {
        let signal = close_signal(Some(CloseFrame {
            code: CloseCode::Away,
            reason: Cow::Borrowed("restart"),
        }));
        assert_eq!(
            signal,
            LinkSignal::Closed {
                reason: "1001: restart".into()
            }
        );
        assert!(matches!(close_signal(None), LinkSignal::Closed { .. }));
    }

    #[test]
    fn unauthorized_handshake_is_auth_failure() {
        let response = tokio_tungstenite::tungstenite::http::Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(None)
            .unwrap();
        assert!(classify_handshake(WsError::Http(response)).is_auth());
    }

    #[test]
    fn other_handshake_failures_are_transient() {
        let err = classify_handshake(WsError::ConnectionClosed);
        assert!(!err.is_auth());
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:1");
        let err = connector.connect("t").await.err().unwrap();
        assert!(matches!(err, ConnectError::Transient(_)));
    }
}
