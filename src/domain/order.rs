//! Order, trade and market notices carried by generic notification events.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{AssetId, OrderId};

/// Side of a resting order or negotiation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[serde(alias = "bid", alias = "buy", alias = "BUY")]
    Bid,
    #[serde(alias = "offer", alias = "sell", alias = "SELL")]
    Offer,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Offer,
            Self::Offer => Self::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "BID"),
            Self::Offer => write!(f, "OFFER"),
        }
    }
}

/// Order lifecycle notice (created, updated, matched, cancelled, filled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotice {
    pub order_id: OrderId,
    #[serde(default)]
    pub asset: Option<AssetId>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub filled_quantity: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Executed trade notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeNotice {
    #[serde(default)]
    pub trade_id: Option<String>,
    pub asset: AssetId,
    #[serde(default)]
    pub side: Option<Side>,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// What changed in a market update.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketChange {
    /// Plain top-of-book refresh.
    Snapshot,
    PriceChanged {
        previous: Option<Decimal>,
        current: Decimal,
    },
    /// A partial fill left quantity available at the current price.
    RemainingQuantityAvailable { quantity: Decimal },
}

/// Market update for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketUpdate {
    pub asset: AssetId,
    pub best_bid: Option<Decimal>,
    pub best_offer: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub change: MarketChange,
}
