//! Connection lifecycle manager.
//!
//! [`Session`] owns the single persistent link to the venue together with
//! every piece of state that hangs off it: the connection state, the dedup
//! cache, outstanding negotiation turns and pending confirmation records.
//! All of it is mutated from one task (see [`driver`](super::driver)), so
//! nothing here is locked.
//!
//! # Lifecycle
//!
//! 1. `connect()` fetches a token and starts a background handshake
//!    (Disconnected -> Connecting)
//! 2. The handshake yields a fresh [`Link`]; handlers are attached to it
//!    exactly once and standing subscriptions are sent (-> Connected)
//! 3. A link failure flips back to Disconnected and arms the fixed-interval
//!    reconnect timer, which retries until Connected
//! 4. An auth rejection forces logout instead and does not arm recovery
//! 5. `disconnect()` cancels everything and ends the session

use std::collections::BTreeSet;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::bus::{AppEvent, EventBus};
use super::confirmation::ConfirmationCoordinator;
use super::dedup::EventDedupCache;
use super::negotiation::TurnCoordinator;
use super::router::{RouteOutcome, RouteTargets, Router};
use crate::domain::{
    AssetId, ConfirmationKey, ConfirmationRequest, ConnectionState, FlowKind, NegotiationTurn,
    OrderId, PartyId,
};
use crate::error::{ConnectError, ResponseError};
use crate::port::{Connector, Link, LinkSignal, TokenProvider};
use crate::protocol::{MarketSubscription, OutboundFrame};

type Handshake = JoinHandle<Result<Box<dyn Link>, ConnectError>>;

/// Tunables for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,
    /// Upper bound on one handshake; a stalled one fails as transient.
    pub connect_timeout: Duration,
    /// Evict dedup keys once the venue reports a terminal outcome.
    pub evict_on_terminal: bool,
    /// Informational response window stamped on confirmation requests.
    pub confirmation_window: Duration,
    pub bus_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            evict_on_terminal: true,
            confirmation_window: Duration::from_secs(60),
            bus_capacity: 256,
        }
    }
}

/// Something the session was waiting on became ready.
pub enum Wake {
    Handshake(Result<Box<dyn Link>, ConnectError>),
    Signal(Option<LinkSignal>),
    ReconnectTick,
}

pub struct Session {
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    config: SessionConfig,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    link: Option<Box<dyn Link>>,
    handshake: Option<Handshake>,
    /// Whether handlers are attached to the current link.
    handlers_attached: bool,
    reconnect_timer: Option<Interval>,
    reconnect_attempts: u32,
    /// A connection succeeded at least once in this load.
    has_connected: bool,
    markets: BTreeSet<AssetId>,
    router: Router,
    turns: TurnCoordinator,
    confirmations: ConfirmationCoordinator,
    bus: EventBus,
}

impl Session {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let router = Router::new(
            EventDedupCache::new(config.evict_on_terminal),
            config.confirmation_window,
        );
        let bus = EventBus::new(config.bus_capacity);
        Self {
            connector,
            tokens,
            config,
            state: ConnectionState::Disconnected,
            state_tx,
            link: None,
            handshake: None,
            handlers_attached: false,
            reconnect_timer: None,
            reconnect_attempts: 0,
            has_connected: false,
            markets: BTreeSet::new(),
            router,
            turns: TurnCoordinator::new(),
            confirmations: ConfirmationCoordinator::new(),
            bus,
        }
    }

    // ---------------------------------------------------------------------
    // Observation
    // ---------------------------------------------------------------------

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Receiver for the passive connection indicator.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.bus.subscribe()
    }

    #[must_use]
    pub const fn handlers_attached(&self) -> bool {
        self.handlers_attached
    }

    #[must_use]
    pub const fn reconnect_armed(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    #[must_use]
    pub fn turn(&self, asset: &AssetId) -> Option<&NegotiationTurn> {
        self.turns.turn(asset)
    }

    #[must_use]
    pub fn pending_confirmation(
        &self,
        kind: FlowKind,
        key: &ConfirmationKey,
    ) -> Option<&ConfirmationRequest> {
        self.confirmations.pending(kind, key)
    }

    #[must_use]
    pub fn pending_confirmations(&self) -> Vec<ConfirmationRequest> {
        self.confirmations.requests().cloned().collect()
    }

    #[must_use]
    pub fn dedup(&self) -> &EventDedupCache {
        self.router.dedup()
    }

    #[must_use]
    pub fn markets(&self) -> &BTreeSet<AssetId> {
        &self.markets
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Connection state changed");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Start connecting with the current token.
    ///
    /// No-op while a link is live or a handshake is in flight. Without a
    /// valid token the provider's forced-logout path runs instead.
    pub fn connect(&mut self) {
        self.begin_connect();
    }

    /// Returns `false` when the session was ended for lack of a token.
    fn begin_connect(&mut self) -> bool {
        if self.link.is_some() || self.handshake.is_some() {
            debug!(state = %self.state, "Connect ignored, session already live");
            return true;
        }

        let Some(token) = self.tokens.valid_token() else {
            warn!("No valid token available, forcing logout");
            self.end_on_auth_failure();
            return false;
        };

        self.handlers_attached = false;
        self.set_state(ConnectionState::Connecting);

        let connector = Arc::clone(&self.connector);
        let limit = self.config.connect_timeout;
        info!(endpoint = connector.endpoint(), "Connecting to venue");
        self.handshake = Some(tokio::spawn(async move {
            match timeout(limit, connector.connect(&token)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::Transient(format!(
                    "handshake timed out after {}ms",
                    limit.as_millis()
                ))),
            }
        }));
        true
    }

    /// User-initiated connect: cancels background recovery first.
    pub fn manual_connect(&mut self) {
        self.stop_auto_reconnect();
        self.connect();
    }

    /// Tear down the link and end the session.
    pub async fn disconnect(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            handshake.abort();
        }
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.stop_auto_reconnect();
        self.handlers_attached = false;
        self.set_state(ConnectionState::Disconnected);
        self.end_session();
        info!("Disconnected from venue");
    }

    /// Attempt a connection now and keep retrying on a fixed interval until
    /// connected. Idempotent while the timer is armed.
    pub fn start_auto_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            debug!("Auto-reconnect already armed");
            return;
        }
        if self.state.is_connected() {
            return;
        }
        if self.begin_connect() {
            self.arm_reconnect_timer();
        }
    }

    pub fn stop_auto_reconnect(&mut self) {
        if self.reconnect_timer.take().is_some() {
            debug!("Auto-reconnect stopped");
        }
        self.reconnect_attempts = 0;
    }

    fn arm_reconnect_timer(&mut self) {
        if self.reconnect_timer.is_some() {
            return;
        }
        let period = self.config.reconnect_interval;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.reconnect_timer = Some(timer);
        debug!(interval_ms = period.as_millis() as u64, "Auto-reconnect armed");
    }

    /// Transition: attach frame handling to the current link.
    ///
    /// Runs once per link. Sends the standing subscriptions.
    async fn attach_handlers(&mut self) -> Result<(), ResponseError> {
        if self.handlers_attached {
            return Ok(());
        }
        self.handlers_attached = true;

        let mut frames = vec![OutboundFrame::SubscribeOrders, OutboundFrame::SubscribeTrades];
        frames.extend(self.markets.iter().map(|asset| {
            OutboundFrame::SubscribeMarket(MarketSubscription {
                asset: asset.clone(),
            })
        }));
        debug!(subscriptions = frames.len(), "Attaching handlers to link");
        for frame in &frames {
            self.transmit(frame).await?;
        }
        Ok(())
    }

    fn end_session(&mut self) {
        self.router.reset();
        self.turns.clear();
        self.confirmations.clear();
    }

    fn end_on_auth_failure(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            handshake.abort();
        }
        self.link = None;
        self.handlers_attached = false;
        self.stop_auto_reconnect();
        self.set_state(ConnectionState::Disconnected);
        self.end_session();
        self.tokens.handle_auth_error();
        self.bus.publish(AppEvent::AuthExpired);
    }

    fn on_link_lost(&mut self, reason: String) {
        warn!(reason = %reason, "Connection lost, will reconnect");
        self.link = None;
        self.handlers_attached = false;
        self.set_state(ConnectionState::Disconnected);
        self.bus.publish(AppEvent::ConnectionLost { reason });
        self.arm_reconnect_timer();
    }

    // ---------------------------------------------------------------------
    // Event loop integration
    // ---------------------------------------------------------------------

    /// Wait for the next handshake result, link signal or reconnect tick.
    ///
    /// Cancel-safe: nothing is consumed unless the returned [`Wake`] is
    /// produced. Pends forever when there is nothing to wait for.
    pub async fn next_wake(&mut self) -> Wake {
        tokio::select! {
            result = join_handshake(&mut self.handshake) => Wake::Handshake(result),
            signal = next_signal(&mut self.link) => Wake::Signal(signal),
            () = next_tick(&mut self.reconnect_timer) => Wake::ReconnectTick,
        }
    }

    pub async fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Handshake(Ok(link)) => self.on_connected(link).await,
            Wake::Handshake(Err(ConnectError::AuthExpired(reason))) => {
                error!(reason = %reason, "Venue rejected credential");
                self.end_on_auth_failure();
            }
            Wake::Handshake(Err(ConnectError::Transient(reason))) => {
                error!(reason = %reason, "Connection attempt failed");
                self.set_state(ConnectionState::Disconnected);
                self.arm_reconnect_timer();
            }
            Wake::Signal(Some(LinkSignal::Frame(envelope))) => {
                let outcome = self.router.route(
                    &envelope,
                    RouteTargets {
                        turns: &mut self.turns,
                        confirmations: &mut self.confirmations,
                        bus: &self.bus,
                    },
                );
                if outcome == RouteOutcome::Duplicate {
                    debug!(event = %envelope.event, "Duplicate event dropped");
                }
            }
            Wake::Signal(Some(LinkSignal::Closed { reason })) => self.on_link_lost(reason),
            Wake::Signal(Some(LinkSignal::AuthRejected { reason })) => {
                error!(reason = %reason, "Link closed on credential grounds");
                if let Some(mut link) = self.link.take() {
                    link.close().await;
                }
                self.end_on_auth_failure();
            }
            Wake::Signal(None) => self.on_link_lost("link ended".into()),
            Wake::ReconnectTick => {
                if self.handshake.is_some() {
                    debug!("Reconnect tick skipped, handshake in flight");
                } else if self.state == ConnectionState::Disconnected {
                    self.reconnect_attempts += 1;
                    info!(attempt = self.reconnect_attempts, "Reconnecting");
                    self.bus.publish(AppEvent::ReconnectAttempt {
                        attempt: self.reconnect_attempts,
                    });
                    self.connect();
                }
            }
        }
    }

    /// Wait for and handle one wake-up.
    pub async fn pump(&mut self) {
        let wake = self.next_wake().await;
        self.handle_wake(wake).await;
    }

    async fn on_connected(&mut self, link: Box<dyn Link>) {
        self.link = Some(link);
        self.set_state(ConnectionState::Connected);
        self.stop_auto_reconnect();

        if let Err(e) = self.attach_handlers().await {
            error!(error = %e, "Failed to attach handlers");
            return;
        }

        if self.has_connected {
            info!("Connection restored");
            self.bus.publish(AppEvent::ConnectionRestored);
        } else {
            info!("Connected to venue");
        }
        self.has_connected = true;
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    fn ensure_connected(&self) -> Result<(), ResponseError> {
        if self.state.is_connected() && self.link.is_some() {
            Ok(())
        } else {
            Err(ResponseError::NotConnected)
        }
    }

    async fn transmit(&mut self, frame: &OutboundFrame) -> Result<(), ResponseError> {
        let Some(link) = self.link.as_mut() else {
            return Err(ResponseError::NotConnected);
        };
        let result = link.send(frame).await;
        match result {
            Ok(()) => {
                debug!(event = frame.event_name(), "Frame sent");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.on_link_lost(reason.clone());
                Err(ResponseError::Transmit(reason))
            }
        }
    }

    /// Track a market subscription. Sent now when connected, and replayed on
    /// every reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Transmit`] if the link fails while sending.
    pub async fn subscribe_market(&mut self, asset: AssetId) -> Result<(), ResponseError> {
        if !self.markets.insert(asset.clone()) || self.ensure_connected().is_err() {
            return Ok(());
        }
        self.transmit(&OutboundFrame::SubscribeMarket(MarketSubscription { asset }))
            .await
    }

    /// # Errors
    ///
    /// Returns [`ResponseError::Transmit`] if the link fails while sending.
    pub async fn unsubscribe_market(&mut self, asset: &AssetId) -> Result<(), ResponseError> {
        if !self.markets.remove(asset) || self.ensure_connected().is_err() {
            return Ok(());
        }
        self.transmit(&OutboundFrame::UnsubscribeMarket(MarketSubscription {
            asset: asset.clone(),
        }))
        .await
    }

    /// Approve or reject a match awaiting seller approval.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::NotConnected`] unless connected
    /// - [`ResponseError::NoPendingRequest`] if no approval is pending for the pair
    /// - [`ResponseError::Transmit`] if the link fails while sending
    pub async fn respond_seller_approval(
        &mut self,
        offer_id: &OrderId,
        bid_id: &OrderId,
        approved: bool,
        party_id: &PartyId,
    ) -> Result<(), ResponseError> {
        self.ensure_connected()?;
        let frame = self
            .confirmations
            .prepare_seller_approval(offer_id, bid_id, approved)?;
        self.transmit(&frame).await?;

        let key = ConfirmationKey::for_match(offer_id, bid_id);
        self.confirmations.complete(FlowKind::SellerApproval, &key);
        info!(key = %key, party = %party_id, approved, "Seller approval sent");
        Ok(())
    }

    /// Improve (`improved = true` with a price) or pass on the current turn.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::NotConnected`] unless connected
    /// - [`ResponseError::NoPendingRequest`] if no turn is outstanding for `asset`
    /// - [`ResponseError::ValidationFailed`] if the price does not improve
    /// - [`ResponseError::Transmit`] if the link fails while sending
    pub async fn respond_negotiation(
        &mut self,
        asset: &AssetId,
        improved: bool,
        new_price: Option<Decimal>,
    ) -> Result<(), ResponseError> {
        self.ensure_connected()?;
        let frame = self.turns.prepare(asset, improved, new_price)?;
        self.transmit(&frame).await?;

        self.turns.complete(asset);
        info!(asset = %asset, improved, "Negotiation response sent");
        Ok(())
    }

    /// Accept or decline a quantity top-up.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::NotConnected`] unless connected
    /// - [`ResponseError::NoPendingRequest`] if no top-up is pending for `key`
    /// - [`ResponseError::Transmit`] if the link fails while sending
    pub async fn respond_quantity_top_up(
        &mut self,
        key: &ConfirmationKey,
        accepted: bool,
        suggested_quantity: Option<Decimal>,
    ) -> Result<(), ResponseError> {
        self.ensure_connected()?;
        let frame = self
            .confirmations
            .prepare_top_up(key, accepted, suggested_quantity)?;
        self.transmit(&frame).await?;

        self.confirmations.complete(FlowKind::QuantityTopUp, key);
        info!(key = %key, accepted, "Top-up response sent");
        Ok(())
    }

    /// Accept or decline a partial fill.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::NotConnected`] unless connected
    /// - [`ResponseError::NoPendingRequest`] if no approval is pending for `key`
    /// - [`ResponseError::Transmit`] if the link fails while sending
    pub async fn respond_partial_fill(
        &mut self,
        key: &ConfirmationKey,
        accepted: bool,
    ) -> Result<(), ResponseError> {
        self.ensure_connected()?;
        let frame = self.confirmations.prepare_partial_fill(key, accepted)?;
        self.transmit(&frame).await?;

        self.confirmations.complete(FlowKind::PartialFillApproval, key);
        info!(key = %key, accepted, "Partial-fill response sent");
        Ok(())
    }
}

async fn join_handshake(slot: &mut Option<Handshake>) -> Result<Box<dyn Link>, ConnectError> {
    let Some(handle) = slot.as_mut() else {
        return pending().await;
    };
    let result = handle.await;
    *slot = None;
    match result {
        Ok(outcome) => outcome,
        Err(e) => Err(ConnectError::Transient(format!("handshake task failed: {e}"))),
    }
}

async fn next_signal(link: &mut Option<Box<dyn Link>>) -> Option<LinkSignal> {
    match link.as_mut() {
        Some(link) => link.next_signal().await,
        None => pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer.as_mut() {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}
