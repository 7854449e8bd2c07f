//! Session driver: runs a [`Session`] on its own task.
//!
//! The driver owns the session and multiplexes two inputs: commands from
//! [`SessionHandle`]s and the session's own wake-ups (link frames, handshake
//! results, reconnect ticks). Every state mutation therefore happens on one
//! task, in arrival order.

use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::bus::{AppEvent, EventBus};
use super::session::Session;
use crate::domain::{
    AssetId, ConfirmationKey, ConfirmationRequest, ConnectionState, OrderId, PartyId,
};
use crate::error::ResponseError;

type Reply<T> = oneshot::Sender<T>;

/// Requests accepted by the driver.
#[derive(Debug)]
pub enum Command {
    Connect,
    ManualConnect,
    Disconnect(Reply<()>),
    StartAutoReconnect,
    StopAutoReconnect,
    SubscribeMarket(AssetId, Reply<Result<(), ResponseError>>),
    UnsubscribeMarket(AssetId, Reply<Result<(), ResponseError>>),
    SellerApproval {
        offer_id: OrderId,
        bid_id: OrderId,
        approved: bool,
        party_id: PartyId,
        reply: Reply<Result<(), ResponseError>>,
    },
    Negotiation {
        asset: AssetId,
        improved: bool,
        new_price: Option<Decimal>,
        reply: Reply<Result<(), ResponseError>>,
    },
    QuantityTopUp {
        key: ConfirmationKey,
        accepted: bool,
        suggested_quantity: Option<Decimal>,
        reply: Reply<Result<(), ResponseError>>,
    },
    PartialFill {
        key: ConfirmationKey,
        accepted: bool,
        reply: Reply<Result<(), ResponseError>>,
    },
    PendingConfirmations(Reply<Vec<ConfirmationRequest>>),
}

pub struct SessionDriver {
    session: Session,
    commands: mpsc::Receiver<Command>,
}

impl SessionDriver {
    /// Run until every handle has been dropped. The session is disconnected
    /// on the way out.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
                wake = self.session.next_wake() => self.session.handle_wake(wake).await,
            }
        }
        debug!("All session handles dropped, shutting down");
        self.session.disconnect().await;
    }

    async fn execute(&mut self, command: Command) {
        let session = &mut self.session;
        match command {
            Command::Connect => session.connect(),
            Command::ManualConnect => session.manual_connect(),
            Command::Disconnect(reply) => {
                session.disconnect().await;
                let _ = reply.send(());
            }
            Command::StartAutoReconnect => session.start_auto_reconnect(),
            Command::StopAutoReconnect => session.stop_auto_reconnect(),
            Command::SubscribeMarket(asset, reply) => {
                let _ = reply.send(session.subscribe_market(asset).await);
            }
            Command::UnsubscribeMarket(asset, reply) => {
                let _ = reply.send(session.unsubscribe_market(&asset).await);
            }
            Command::SellerApproval {
                offer_id,
                bid_id,
                approved,
                party_id,
                reply,
            } => {
                let result = session
                    .respond_seller_approval(&offer_id, &bid_id, approved, &party_id)
                    .await;
                let _ = reply.send(result);
            }
            Command::Negotiation {
                asset,
                improved,
                new_price,
                reply,
            } => {
                let result = session.respond_negotiation(&asset, improved, new_price).await;
                let _ = reply.send(result);
            }
            Command::QuantityTopUp {
                key,
                accepted,
                suggested_quantity,
                reply,
            } => {
                let result = session
                    .respond_quantity_top_up(&key, accepted, suggested_quantity)
                    .await;
                let _ = reply.send(result);
            }
            Command::PartialFill {
                key,
                accepted,
                reply,
            } => {
                let result = session.respond_partial_fill(&key, accepted).await;
                let _ = reply.send(result);
            }
            Command::PendingConfirmations(reply) => {
                let _ = reply.send(session.pending_confirmations());
            }
        }
    }
}

/// Start `session` on a new task.
#[must_use]
pub fn spawn(session: Session) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let handle = SessionHandle {
        commands: tx,
        state: session.watch_state(),
        events: session.bus().clone(),
    };
    let driver = SessionDriver {
        session,
        commands: rx,
    };
    info!("Session driver started");
    (handle, tokio::spawn(driver.run()))
}

/// Cloneable front door to a running session.
///
/// Response methods return the session's synchronous verdict. Once the
/// driver has stopped they report [`ResponseError::NotConnected`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: EventBus,
}

impl SessionHandle {
    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver for connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            debug!("Session driver is gone, command dropped");
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).await.ok()?;
        rx.await.ok()
    }

    async fn respond(
        &self,
        build: impl FnOnce(Reply<Result<(), ResponseError>>) -> Command,
    ) -> Result<(), ResponseError> {
        self.request(build)
            .await
            .unwrap_or(Err(ResponseError::NotConnected))
    }

    pub async fn connect(&self) {
        self.send(Command::Connect).await;
    }

    pub async fn manual_connect(&self) {
        self.send(Command::ManualConnect).await;
    }

    /// Disconnect and wait for teardown to finish.
    pub async fn disconnect(&self) {
        let _ = self.request(Command::Disconnect).await;
    }

    pub async fn start_auto_reconnect(&self) {
        self.send(Command::StartAutoReconnect).await;
    }

    pub async fn stop_auto_reconnect(&self) {
        self.send(Command::StopAutoReconnect).await;
    }

    /// # Errors
    ///
    /// See [`Session::subscribe_market`].
    pub async fn subscribe_market(&self, asset: AssetId) -> Result<(), ResponseError> {
        self.respond(|reply| Command::SubscribeMarket(asset, reply)).await
    }

    /// # Errors
    ///
    /// See [`Session::unsubscribe_market`].
    pub async fn unsubscribe_market(&self, asset: AssetId) -> Result<(), ResponseError> {
        self.respond(|reply| Command::UnsubscribeMarket(asset, reply)).await
    }

    /// # Errors
    ///
    /// See [`Session::respond_seller_approval`].
    pub async fn respond_seller_approval(
        &self,
        offer_id: OrderId,
        bid_id: OrderId,
        approved: bool,
        party_id: PartyId,
    ) -> Result<(), ResponseError> {
        self.respond(|reply| Command::SellerApproval {
            offer_id,
            bid_id,
            approved,
            party_id,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// See [`Session::respond_negotiation`].
    pub async fn respond_negotiation(
        &self,
        asset: AssetId,
        improved: bool,
        new_price: Option<Decimal>,
    ) -> Result<(), ResponseError> {
        self.respond(|reply| Command::Negotiation {
            asset,
            improved,
            new_price,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// See [`Session::respond_quantity_top_up`].
    pub async fn respond_quantity_top_up(
        &self,
        key: ConfirmationKey,
        accepted: bool,
        suggested_quantity: Option<Decimal>,
    ) -> Result<(), ResponseError> {
        self.respond(|reply| Command::QuantityTopUp {
            key,
            accepted,
            suggested_quantity,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// See [`Session::respond_partial_fill`].
    pub async fn respond_partial_fill(
        &self,
        key: ConfirmationKey,
        accepted: bool,
    ) -> Result<(), ResponseError> {
        self.respond(|reply| Command::PartialFill {
            key,
            accepted,
            reply,
        })
        .await
    }

    /// Snapshot of every outstanding confirmation request.
    pub async fn pending_confirmations(&self) -> Vec<ConfirmationRequest> {
        let pending = self.request(Command::PendingConfirmations).await;
        pending.unwrap_or_default()
    }
}
