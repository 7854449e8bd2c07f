//! Outbound frames. Fire-and-forget: no request/response correlation at
//! this layer.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{AssetId, ConfirmationKey, OrderId};

/// Frame emitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundFrame {
    #[serde(rename = "subscribe_orders")]
    SubscribeOrders,
    #[serde(rename = "subscribe_trades")]
    SubscribeTrades,
    #[serde(rename = "subscribe_market")]
    SubscribeMarket(MarketSubscription),
    #[serde(rename = "unsubscribe_market")]
    UnsubscribeMarket(MarketSubscription),
    #[serde(rename = "match:approval_response")]
    SellerApprovalResponse(SellerApprovalResponse),
    #[serde(rename = "negotiation:response")]
    NegotiationResponse(NegotiationResponse),
    #[serde(rename = "quantity:confirmation_response")]
    QuantityConfirmationResponse(QuantityConfirmationResponse),
}

impl OutboundFrame {
    /// Wire event name, for logging.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::SubscribeOrders => "subscribe_orders",
            Self::SubscribeTrades => "subscribe_trades",
            Self::SubscribeMarket(_) => "subscribe_market",
            Self::UnsubscribeMarket(_) => "unsubscribe_market",
            Self::SellerApprovalResponse(_) => "match:approval_response",
            Self::NegotiationResponse(_) => "negotiation:response",
            Self::QuantityConfirmationResponse(_) => "quantity:confirmation_response",
        }
    }

    /// Serialize to the JSON text sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSubscription {
    pub asset: AssetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerApprovalResponse {
    pub offer_id: OrderId,
    pub bid_id: OrderId,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    pub asset: AssetId,
    pub improved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityConfirmationResponse {
    pub confirmation_key: ConfirmationKey,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_quantity: Option<Decimal>,
}
