//! Inbound frame types and classification.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::{
    AssetId, ConfirmationKey, ConfirmationRequest, FlowKind, MarketChange, MarketUpdate,
    MatchedPair, NegotiationTurn, OrderId, OrderNotice, PartyId, Side, TradeNotice,
};

/// Raw envelope as received on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Envelope {
    /// Build an envelope from an event name and payload.
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: None,
        }
    }
}

/// Order lifecycle notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventKind {
    Created,
    Updated,
    Matched,
    Cancelled,
    PartiallyFilled,
    Filled,
}

/// Typed inbound frame.
///
/// Confirmation requests come out of the codec without a deadline; the router
/// stamps it on receipt.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Order {
        kind: OrderEventKind,
        notice: OrderNotice,
        /// Offer/bid pair when the venue reports which match was executed.
        matched: Option<MatchedPair>,
    },
    TradeExecuted(TradeNotice),
    MarketUpdate(MarketUpdate),
    SellerApprovalRequest(ConfirmationRequest),
    SellerApprovalExpired(MatchedPair),
    YourTurn(NegotiationTurn),
    QuantityConfirmationRequest(ConfirmationRequest),
    PartialFillApprovalRequest(ConfirmationRequest),
    PartialFillDeclined {
        key: ConfirmationKey,
        reason: Option<String>,
    },
    CounterpartyDeclined {
        key: ConfirmationKey,
        reason: Option<String>,
    },
    ConfirmationExpired {
        key: ConfirmationKey,
    },
}

impl InboundFrame {
    /// Classify an envelope.
    ///
    /// Returns `Ok(None)` for event names this client does not consume.
    ///
    /// # Errors
    ///
    /// Returns an error when a known event carries a payload that does not
    /// match its schema.
    pub fn classify(envelope: &Envelope) -> Result<Option<Self>, serde_json::Error> {
        let data = &envelope.data;
        let frame = match envelope.event.as_str() {
            "order:created" => order(OrderEventKind::Created, data)?,
            "order:updated" => order(OrderEventKind::Updated, data)?,
            "order:matched" => order(OrderEventKind::Matched, data)?,
            "order:cancelled" => order(OrderEventKind::Cancelled, data)?,
            "order:partially_filled" => order(OrderEventKind::PartiallyFilled, data)?,
            "order:filled" => order(OrderEventKind::Filled, data)?,
            "trade:executed" => Self::TradeExecuted(parse::<TradeNotice>(data)?),
            "market:update" => Self::MarketUpdate(parse::<MarketUpdatePayload>(data)?.into()),
            "match:approval" => {
                Self::SellerApprovalRequest(parse::<SellerApprovalPayload>(data)?.into())
            }
            "match:approval_expired" => {
                Self::SellerApprovalExpired(parse::<MatchPayload>(data)?.into())
            }
            "negotiation:your_turn" => Self::YourTurn(parse::<YourTurnPayload>(data)?.into()),
            "quantity:confirmation_request" => Self::QuantityConfirmationRequest(
                parse::<QuantityPayload>(data)?.into_request(FlowKind::QuantityTopUp),
            ),
            "quantity:partial_fill_approval" => Self::PartialFillApprovalRequest(
                parse::<QuantityPayload>(data)?.into_request(FlowKind::PartialFillApproval),
            ),
            "quantity:partial_fill_declined" => {
                let p = parse::<KeyedPayload>(data)?;
                Self::PartialFillDeclined {
                    key: p.confirmation_key,
                    reason: p.reason,
                }
            }
            "counterparty:declined" => {
                let p = parse::<KeyedPayload>(data)?;
                Self::CounterpartyDeclined {
                    key: p.confirmation_key,
                    reason: p.reason,
                }
            }
            "quantity:confirmation_expired" => Self::ConfirmationExpired {
                key: parse::<KeyedPayload>(data)?.confirmation_key,
            },
            _ => return Ok(None),
        };
        Ok(Some(frame))
    }
}

fn parse<T: DeserializeOwned>(data: &serde_json::Value) -> Result<T, serde_json::Error> {
    T::deserialize(data)
}

fn order(
    kind: OrderEventKind,
    data: &serde_json::Value,
) -> Result<InboundFrame, serde_json::Error> {
    let p = parse::<OrderPayload>(data)?;
    let matched = match (p.offer_id, p.bid_id) {
        (Some(offer_id), Some(bid_id)) => Some(MatchedPair { offer_id, bid_id }),
        _ => None,
    };
    Ok(InboundFrame::Order {
        kind,
        notice: OrderNotice {
            order_id: p.order_id,
            asset: p.asset,
            side: p.side,
            price: p.price,
            quantity: p.quantity,
            filled_quantity: p.filled_quantity,
            status: p.status,
        },
        matched,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderPayload {
    #[serde(alias = "id")]
    order_id: OrderId,
    #[serde(default)]
    asset: Option<AssetId>,
    #[serde(default, alias = "action")]
    side: Option<Side>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default, alias = "amount")]
    quantity: Option<Decimal>,
    #[serde(default, alias = "filledAmount")]
    filled_quantity: Option<Decimal>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    offer_id: Option<OrderId>,
    #[serde(default)]
    bid_id: Option<OrderId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketUpdatePayload {
    asset: AssetId,
    #[serde(default)]
    best_bid: Option<Decimal>,
    #[serde(default)]
    best_offer: Option<Decimal>,
    #[serde(default)]
    last_price: Option<Decimal>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    previous_price: Option<Decimal>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    remaining_quantity: Option<Decimal>,
}

impl From<MarketUpdatePayload> for MarketUpdate {
    fn from(p: MarketUpdatePayload) -> Self {
        let change = match (p.kind.as_deref(), p.price.or(p.last_price), p.remaining_quantity) {
            (Some("price_changed"), Some(current), _) => MarketChange::PriceChanged {
                previous: p.previous_price,
                current,
            },
            (Some("remaining_quantity_available"), _, Some(quantity)) => {
                MarketChange::RemainingQuantityAvailable { quantity }
            }
            _ => MarketChange::Snapshot,
        };
        Self {
            asset: p.asset,
            best_bid: p.best_bid,
            best_offer: p.best_offer,
            last_price: p.last_price.or(p.price),
            change,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchPayload {
    offer_id: OrderId,
    bid_id: OrderId,
}

impl From<MatchPayload> for MatchedPair {
    fn from(p: MatchPayload) -> Self {
        Self {
            offer_id: p.offer_id,
            bid_id: p.bid_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SellerApprovalPayload {
    offer_id: OrderId,
    bid_id: OrderId,
    #[serde(default)]
    asset: Option<AssetId>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    offer_quantity: Option<Decimal>,
    #[serde(default, alias = "amount")]
    bid_quantity: Option<Decimal>,
}

impl From<SellerApprovalPayload> for ConfirmationRequest {
    fn from(p: SellerApprovalPayload) -> Self {
        let pair = MatchedPair {
            offer_id: p.offer_id,
            bid_id: p.bid_id,
        };
        let bid_quantity = p.bid_quantity.unwrap_or_default();
        Self {
            kind: FlowKind::SellerApproval,
            key: pair.key(),
            asset: p.asset.unwrap_or_else(|| AssetId::new("")),
            price: p.price.unwrap_or_default(),
            side: Side::Offer,
            party_quantity: p.offer_quantity.unwrap_or(bid_quantity),
            counterparty_quantity: bid_quantity,
            matched: Some(pair),
            expires_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YourTurnPayload {
    asset: AssetId,
    turn: Side,
    #[serde(default)]
    best_bid: Option<Decimal>,
    #[serde(default)]
    best_offer: Option<Decimal>,
    #[serde(default, alias = "bestBidUserId")]
    best_bid_party_id: Option<PartyId>,
    #[serde(default, alias = "bestOfferUserId")]
    best_offer_party_id: Option<PartyId>,
    #[serde(default)]
    best_bid_name: Option<String>,
    #[serde(default)]
    best_offer_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<YourTurnPayload> for NegotiationTurn {
    fn from(p: YourTurnPayload) -> Self {
        Self {
            asset: p.asset,
            turn: p.turn,
            best_bid: p.best_bid,
            best_offer: p.best_offer,
            best_bid_party_id: p.best_bid_party_id,
            best_offer_party_id: p.best_offer_party_id,
            best_bid_name: p.best_bid_name,
            best_offer_name: p.best_offer_name,
            message: p.message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuantityPayload {
    confirmation_key: ConfirmationKey,
    asset: AssetId,
    price: Decimal,
    side: Side,
    party_quantity: Decimal,
    counterparty_quantity: Decimal,
}

impl QuantityPayload {
    fn into_request(self, kind: FlowKind) -> ConfirmationRequest {
        ConfirmationRequest {
            kind,
            key: self.confirmation_key,
            asset: self.asset,
            price: self.price,
            side: self.side,
            party_quantity: self.party_quantity,
            counterparty_quantity: self.counterparty_quantity,
            matched: None,
            expires_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyedPayload {
    confirmation_key: ConfirmationKey,
    #[serde(default, alias = "message")]
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn classify(event: &str, data: serde_json::Value) -> InboundFrame {
        InboundFrame::classify(&Envelope::new(event, data))
            .unwrap()
            .expect("known event")
    }

    #[test]
    fn envelope_parses_from_text() {
        let text = r#"{"event":"order:created","data":{"orderId":"o1"},
                       "timestamp":"2026-01-01T00:00:00Z"}"#;
        let envelope: Envelope = serde_json::from_str(text).unwrap();
        assert_eq!(envelope.event, "order:created");
        assert_eq!(envelope.timestamp.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn unknown_event_is_not_classified() {
        let result = InboundFrame::classify(&Envelope::new("chat:message", json!({}))).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_known_event_is_an_error() {
        let envelope = Envelope::new("match:approval", json!({"offerId": "o1"}));
        let result = InboundFrame::classify(&envelope);
        assert!(result.is_err());
    }

    #[test]
    fn seller_approval_builds_match_key() {
        let frame = classify(
            "match:approval",
            json!({
                "offerId": "o1", "bidId": "b1", "asset": "WHEAT", "price": "101.5", "amount": 4
            }),
        );
        let InboundFrame::SellerApprovalRequest(request) = frame else {
            panic!("expected seller approval");
        };
        assert_eq!(request.key.as_str(), "o1:b1");
        assert_eq!(request.kind, FlowKind::SellerApproval);
        assert_eq!(request.price, dec!(101.5));
        assert_eq!(request.counterparty_quantity, dec!(4));
    }

    #[test]
    fn your_turn_accepts_user_id_aliases() {
        let frame = classify(
            "negotiation:your_turn",
            json!({"asset": "X", "turn": "BID", "bestBid": 100, "bestBidUserId": "u1"}),
        );
        let InboundFrame::YourTurn(turn) = frame else {
            panic!("expected turn");
        };
        assert_eq!(turn.best_bid, Some(dec!(100)));
        assert_eq!(turn.best_bid_party_id, Some(PartyId::new("u1")));
        assert_eq!(turn.turn, Side::Bid);
    }

    #[test]
    fn quantity_request_and_partial_fill_share_payload() {
        let data = json!({
            "confirmationKey": "k1",
            "asset": "X",
            "price": 50,
            "side": "OFFER",
            "partyQuantity": 5,
            "counterpartyQuantity": 3
        });
        let InboundFrame::QuantityConfirmationRequest(top_up) =
            classify("quantity:confirmation_request", data.clone())
        else {
            panic!("expected top-up");
        };
        let InboundFrame::PartialFillApprovalRequest(partial) =
            classify("quantity:partial_fill_approval", data)
        else {
            panic!("expected partial fill");
        };
        assert_eq!(top_up.kind, FlowKind::QuantityTopUp);
        assert_eq!(partial.kind, FlowKind::PartialFillApproval);
        assert_eq!(top_up.key, partial.key);
    }

    #[test]
    fn matched_order_carries_pair() {
        let frame = classify(
            "order:matched",
            json!({"orderId": "o1", "offerId": "o1", "bidId": "b1", "filledAmount": 2}),
        );
        let InboundFrame::Order { kind, notice, matched } = frame else {
            panic!("expected order");
        };
        assert_eq!(kind, OrderEventKind::Matched);
        assert_eq!(notice.filled_quantity, Some(dec!(2)));
        assert_eq!(matched.map(|m| m.key().to_string()), Some("o1:b1".to_string()));
    }

    #[test]
    fn market_update_sub_variants() {
        let InboundFrame::MarketUpdate(price) = classify(
            "market:update",
            json!({"asset": "X", "type": "price_changed", "previousPrice": 10, "price": 11}),
        ) else {
            panic!("expected market update");
        };
        assert_eq!(
            price.change,
            MarketChange::PriceChanged {
                previous: Some(dec!(10)),
                current: dec!(11)
            }
        );

        let InboundFrame::MarketUpdate(remaining) = classify(
            "market:update",
            json!({"asset": "X", "type": "remaining_quantity_available", "remainingQuantity": 7}),
        ) else {
            panic!("expected market update");
        };
        assert_eq!(
            remaining.change,
            MarketChange::RemainingQuantityAvailable { quantity: dec!(7) }
        );

        let InboundFrame::MarketUpdate(plain) =
            classify("market:update", json!({"asset": "X", "bestBid": 9}))
        else {
            panic!("expected market update");
        };
        assert_eq!(plain.change, MarketChange::Snapshot);
    }

    #[test]
    fn declined_frames_carry_reason() {
        let frame = classify(
            "counterparty:declined",
            json!({"confirmationKey": "k1", "message": "not today"}),
        );
        assert_eq!(
            frame,
            InboundFrame::CounterpartyDeclined {
                key: ConfirmationKey::new("k1"),
                reason: Some("not today".into())
            }
        );
    }
}
