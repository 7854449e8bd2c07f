//! In-process event bus.
//!
//! Every frame the router accepts is re-emitted here as an [`AppEvent`] so UI
//! collaborators can subscribe without coupling to the transport.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::{
    ConfirmationKey, ConfirmationRequest, MarketUpdate, NegotiationTurn, OrderNotice, TradeNotice,
};
use crate::protocol::OrderEventKind;

/// Typed application event.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A reconnection succeeded after an earlier connection in this load.
    ConnectionRestored,
    /// The link dropped; recovery is armed.
    ConnectionLost { reason: String },
    /// A timer-driven reconnection attempt started.
    ReconnectAttempt { attempt: u32 },
    /// The credential was rejected or absent; the session was torn down.
    AuthExpired,
    Order {
        kind: OrderEventKind,
        notice: OrderNotice,
    },
    TradeExecuted(TradeNotice),
    MarketUpdate(MarketUpdate),
    SellerApprovalRequested(ConfirmationRequest),
    SellerApprovalExpired { key: ConfirmationKey },
    NegotiationTurn(NegotiationTurn),
    QuantityTopUpRequested(ConfirmationRequest),
    PartialFillApprovalRequested(ConfirmationRequest),
    PartialFillDeclined {
        key: ConfirmationKey,
        reason: Option<String>,
    },
    CounterpartyDeclined {
        key: ConfirmationKey,
        reason: Option<String>,
    },
    ConfirmationExpired { key: ConfirmationKey },
}

impl AppEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionRestored => "connection_restored",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::ReconnectAttempt { .. } => "reconnect_attempt",
            Self::AuthExpired => "auth_expired",
            Self::Order { .. } => "order",
            Self::TradeExecuted(_) => "trade_executed",
            Self::MarketUpdate(_) => "market_update",
            Self::SellerApprovalRequested(_) => "seller_approval_requested",
            Self::SellerApprovalExpired { .. } => "seller_approval_expired",
            Self::NegotiationTurn(_) => "negotiation_turn",
            Self::QuantityTopUpRequested(_) => "quantity_top_up_requested",
            Self::PartialFillApprovalRequested(_) => "partial_fill_approval_requested",
            Self::PartialFillDeclined { .. } => "partial_fill_declined",
            Self::CounterpartyDeclined { .. } => "counterparty_declined",
            Self::ConfirmationExpired { .. } => "confirmation_expired",
        }
    }
}

/// Broadcast bus for [`AppEvent`]s.
///
/// Bounded: a receiver that falls more than `capacity` events behind loses
/// the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns the number of receivers that got it.
    pub fn publish(&self, event: AppEvent) -> usize {
        let name = event.name();
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(event = name, receivers = delivered, "Published event");
        delivered
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(AppEvent::ConnectionRestored), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_events() {
        let bus = EventBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.clone().subscribe();

        assert_eq!(bus.publish(AppEvent::AuthExpired), 2);
        assert_eq!(a.recv().await.unwrap(), AppEvent::AuthExpired);
        assert_eq!(b.recv().await.unwrap(), AppEvent::AuthExpired);
    }
}
