//! Inbound event router.
//!
//! Single attachment point for every frame on the link. Each envelope is
//! classified into one typed frame, fanned out to the turn or confirmation
//! coordinator where it carries state, and re-emitted on the event bus.
//! The router never blocks, never responds and performs no business
//! validation.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::bus::{AppEvent, EventBus};
use super::confirmation::ConfirmationCoordinator;
use super::dedup::EventDedupCache;
use super::negotiation::TurnCoordinator;
use crate::domain::{ConfirmationKey, ConfirmationRequest, FlowKind, Outcome};
use crate::protocol::{Envelope, InboundFrame, OrderEventKind};

/// What the router did with one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched,
    /// Idempotency key already handled this session; silently dropped.
    Duplicate,
    /// Event name this client does not consume.
    Ignored,
    /// Known event with a payload that failed to decode.
    Malformed,
}

const QUANTITY_FLOWS: [FlowKind; 2] = [FlowKind::QuantityTopUp, FlowKind::PartialFillApproval];
const ALL_FLOWS: [FlowKind; 3] = [
    FlowKind::SellerApproval,
    FlowKind::QuantityTopUp,
    FlowKind::PartialFillApproval,
];

/// Mutable state the router fans frames out to.
pub struct RouteTargets<'a> {
    pub turns: &'a mut TurnCoordinator,
    pub confirmations: &'a mut ConfirmationCoordinator,
    pub bus: &'a EventBus,
}

#[derive(Debug)]
pub struct Router {
    dedup: EventDedupCache,
    confirmation_window: Duration,
}

impl Router {
    #[must_use]
    pub fn new(dedup: EventDedupCache, confirmation_window: std::time::Duration) -> Self {
        Self {
            dedup,
            confirmation_window: Duration::from_std(confirmation_window)
                .unwrap_or_else(|_| Duration::seconds(60)),
        }
    }

    #[must_use]
    pub fn dedup(&self) -> &EventDedupCache {
        &self.dedup
    }

    /// Forget every idempotency key. Called when the session ends.
    pub fn reset(&mut self) {
        self.dedup.clear();
    }

    pub fn route(&mut self, envelope: &Envelope, targets: RouteTargets<'_>) -> RouteOutcome {
        let frame = match InboundFrame::classify(envelope) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(event = %envelope.event, "Ignoring unhandled event");
                return RouteOutcome::Ignored;
            }
            Err(e) => {
                warn!(event = %envelope.event, error = %e, "Failed to decode frame payload");
                return RouteOutcome::Malformed;
            }
        };
        self.dispatch(frame, targets)
    }

    fn dispatch(&mut self, frame: InboundFrame, targets: RouteTargets<'_>) -> RouteOutcome {
        let RouteTargets {
            turns,
            confirmations,
            bus,
        } = targets;

        match frame {
            InboundFrame::Order {
                kind,
                notice,
                matched,
            } => {
                if let (OrderEventKind::Matched, Some(pair)) = (kind, matched) {
                    self.terminal(
                        confirmations,
                        &[FlowKind::SellerApproval],
                        &pair.key(),
                        Outcome::Approved,
                    );
                }
                bus.publish(AppEvent::Order { kind, notice });
            }
            InboundFrame::TradeExecuted(trade) => {
                bus.publish(AppEvent::TradeExecuted(trade));
            }
            InboundFrame::MarketUpdate(update) => {
                bus.publish(AppEvent::MarketUpdate(update));
            }
            InboundFrame::YourTurn(turn) => {
                info!(asset = %turn.asset, side = %turn.turn, "Negotiation turn received");
                turns.on_your_turn(turn.clone());
                bus.publish(AppEvent::NegotiationTurn(turn));
            }
            InboundFrame::SellerApprovalRequest(request) => {
                let Some(request) = self.admit(confirmations, request) else {
                    return RouteOutcome::Duplicate;
                };
                bus.publish(AppEvent::SellerApprovalRequested(request));
            }
            InboundFrame::QuantityConfirmationRequest(request) => {
                let Some(request) = self.admit(confirmations, request) else {
                    return RouteOutcome::Duplicate;
                };
                bus.publish(AppEvent::QuantityTopUpRequested(request));
            }
            InboundFrame::PartialFillApprovalRequest(request) => {
                let Some(request) = self.admit(confirmations, request) else {
                    return RouteOutcome::Duplicate;
                };
                bus.publish(AppEvent::PartialFillApprovalRequested(request));
            }
            InboundFrame::SellerApprovalExpired(pair) => {
                let key = pair.key();
                self.terminal(confirmations, &[FlowKind::SellerApproval], &key, Outcome::Expired);
                bus.publish(AppEvent::SellerApprovalExpired { key });
            }
            InboundFrame::PartialFillDeclined { key, reason } => {
                self.terminal(confirmations, &QUANTITY_FLOWS, &key, Outcome::Declined);
                bus.publish(AppEvent::PartialFillDeclined { key, reason });
            }
            InboundFrame::CounterpartyDeclined { key, reason } => {
                self.terminal(confirmations, &ALL_FLOWS, &key, Outcome::Declined);
                bus.publish(AppEvent::CounterpartyDeclined { key, reason });
            }
            InboundFrame::ConfirmationExpired { key } => {
                self.terminal(confirmations, &QUANTITY_FLOWS, &key, Outcome::Expired);
                bus.publish(AppEvent::ConfirmationExpired { key });
            }
        }
        RouteOutcome::Dispatched
    }

    /// Dedup, stamp and track a prompt. `None` when it is a repeat.
    fn admit(
        &mut self,
        confirmations: &mut ConfirmationCoordinator,
        mut request: ConfirmationRequest,
    ) -> Option<ConfirmationRequest> {
        if self.dedup.is_duplicate(request.kind, &request.key) {
            debug!(flow = %request.kind, key = %request.key, "Duplicate prompt dropped");
            return None;
        }
        request.expires_at = Some(Utc::now() + self.confirmation_window);
        info!(
            flow = %request.kind,
            key = %request.key,
            asset = %request.asset,
            "Confirmation requested"
        );
        confirmations.insert(request.clone());
        Some(request)
    }

    fn terminal(
        &mut self,
        confirmations: &mut ConfirmationCoordinator,
        kinds: &[FlowKind],
        key: &ConfirmationKey,
        outcome: Outcome,
    ) {
        let cleared = confirmations.resolve(kinds, key);
        for kind in kinds {
            self.dedup.resolve(*kind, key);
        }
        info!(key = %key, %outcome, stale_records = cleared.len(), "Confirmation closed by venue");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetId;
    use serde_json::json;

    struct Fixture {
        router: Router,
        turns: TurnCoordinator,
        confirmations: ConfirmationCoordinator,
        bus: EventBus,
    }

    impl Fixture {
        fn new(evict_on_terminal: bool) -> Self {
            Self {
                router: Router::new(
                    EventDedupCache::new(evict_on_terminal),
                    std::time::Duration::from_secs(60),
                ),
                turns: TurnCoordinator::new(),
                confirmations: ConfirmationCoordinator::new(),
                bus: EventBus::new(16),
            }
        }

        fn route(&mut self, event: &str, data: serde_json::Value) -> RouteOutcome {
            self.router.route(
                &Envelope::new(event, data),
                RouteTargets {
                    turns: &mut self.turns,
                    confirmations: &mut self.confirmations,
                    bus: &self.bus,
                },
            )
        }
    }

    fn approval() -> serde_json::Value {
        json!({"offerId": "o1", "bidId": "b1", "asset": "X", "price": 10, "amount": 2})
    }

    #[test]
    fn duplicate_seller_approval_publishes_once() {
        let mut f = Fixture::new(true);
        let mut events = f.bus.subscribe();

        assert_eq!(f.route("match:approval", approval()), RouteOutcome::Dispatched);
        assert_eq!(f.route("match:approval", approval()), RouteOutcome::Duplicate);

        assert!(matches!(
            events.try_recv(),
            Ok(AppEvent::SellerApprovalRequested(_))
        ));
        assert!(events.try_recv().is_err());
        assert_eq!(f.confirmations.len(), 1);
    }

    #[test]
    fn admitted_request_is_stamped_with_deadline() {
        let mut f = Fixture::new(true);
        f.route("match:approval", approval());

        let request = f
            .confirmations
            .pending(FlowKind::SellerApproval, &ConfirmationKey::new("o1:b1"))
            .unwrap();
        let expires = request.expires_at.unwrap();
        assert!(expires > Utc::now() + Duration::seconds(55));
    }

    #[test]
    fn expiry_clears_record_and_allows_new_prompt() {
        let mut f = Fixture::new(true);
        f.route("match:approval", approval());
        f.route("match:approval_expired", json!({"offerId": "o1", "bidId": "b1"}));

        assert!(f.confirmations.is_empty());
        assert_eq!(f.route("match:approval", approval()), RouteOutcome::Dispatched);
    }

    #[test]
    fn matched_order_is_terminal_for_approval() {
        let mut f = Fixture::new(false);
        f.route("match:approval", approval());
        f.route("order:matched", json!({"orderId": "o1", "offerId": "o1", "bidId": "b1"}));

        assert!(f.confirmations.is_empty());
        assert_eq!(f.route("match:approval", approval()), RouteOutcome::Duplicate);
    }

    #[test]
    fn your_turn_is_last_write_wins() {
        let mut f = Fixture::new(true);
        f.route("negotiation:your_turn", json!({"asset": "X", "turn": "BID", "bestBid": 1}));
        f.route("negotiation:your_turn", json!({"asset": "X", "turn": "BID", "bestBid": 2}));

        assert_eq!(f.turns.len(), 1);
        assert_eq!(
            f.turns.turn(&AssetId::new("X")).and_then(|t| t.best_bid),
            Some(rust_decimal_macros::dec!(2))
        );
    }

    #[test]
    fn partial_fill_after_top_up_with_same_key_is_new_prompt() {
        let mut f = Fixture::new(true);
        let data = json!({
            "confirmationKey": "k1", "asset": "X", "price": 5, "side": "BID",
            "partyQuantity": 8, "counterpartyQuantity": 3
        });
        let top_up = f.route("quantity:confirmation_request", data.clone());
        let partial = f.route("quantity:partial_fill_approval", data);
        assert_eq!(top_up, RouteOutcome::Dispatched);
        assert_eq!(partial, RouteOutcome::Dispatched);
        assert_eq!(f.confirmations.len(), 2);

        f.route("counterparty:declined", json!({"confirmationKey": "k1"}));
        assert!(f.confirmations.is_empty());
    }

    #[test]
    fn unknown_and_malformed_frames() {
        let mut f = Fixture::new(true);
        assert_eq!(f.route("heartbeat", json!({})), RouteOutcome::Ignored);
        let outcome = f.route("negotiation:your_turn", json!({"turn": "BID"}));
        assert_eq!(outcome, RouteOutcome::Malformed);
    }
}
