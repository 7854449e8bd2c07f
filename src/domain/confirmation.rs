//! Keyed confirmation prompts: seller approval, quantity top-up and
//! partial-fill approval.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::id::{AssetId, ConfirmationKey, OrderId};
use super::order::Side;

/// Which confirmation protocol a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    SellerApproval,
    QuantityTopUp,
    PartialFillApproval,
}

impl FlowKind {
    /// Namespace prefix used for idempotency keys.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::SellerApproval => "approval",
            Self::QuantityTopUp => "topup",
            Self::PartialFillApproval => "partial",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SellerApproval => write!(f, "seller approval"),
            Self::QuantityTopUp => write!(f, "quantity top-up"),
            Self::PartialFillApproval => write!(f, "partial-fill approval"),
        }
    }
}

/// A pending confirmation prompt.
///
/// Seller approvals carry the originating offer and bid in `matched`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationRequest {
    pub kind: FlowKind,
    pub key: ConfirmationKey,
    pub asset: AssetId,
    pub price: Decimal,
    pub side: Side,
    pub party_quantity: Decimal,
    pub counterparty_quantity: Decimal,
    pub matched: Option<MatchedPair>,
    /// Informational deadline; the venue enforces it, the client never does.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConfirmationRequest {
    /// Quantity transmitted when a top-up is accepted.
    #[must_use]
    pub fn combined_quantity(&self) -> Decimal {
        self.party_quantity + self.counterparty_quantity
    }

    /// Quantity executed when a partial fill is accepted.
    #[must_use]
    pub fn smaller_quantity(&self) -> Decimal {
        self.party_quantity.min(self.counterparty_quantity)
    }
}

/// Offer and bid ids of a match awaiting seller approval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchedPair {
    pub offer_id: OrderId,
    pub bid_id: OrderId,
}

impl MatchedPair {
    #[must_use]
    pub fn key(&self) -> ConfirmationKey {
        ConfirmationKey::for_match(&self.offer_id, &self.bid_id)
    }
}

/// How a confirmation prompt ended, as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Declined,
    Expired,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Declined => write!(f, "declined"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(party: Decimal, counterparty: Decimal) -> ConfirmationRequest {
        ConfirmationRequest {
            kind: FlowKind::QuantityTopUp,
            key: ConfirmationKey::new("k1"),
            asset: AssetId::new("X"),
            price: dec!(50),
            side: Side::Bid,
            party_quantity: party,
            counterparty_quantity: counterparty,
            matched: None,
            expires_at: None,
        }
    }

    #[test]
    fn combined_and_smaller_quantities() {
        let r = request(dec!(5), dec!(3));
        assert_eq!(r.combined_quantity(), dec!(8));
        assert_eq!(r.smaller_quantity(), dec!(3));
    }

    #[test]
    fn matched_pair_key() {
        let pair = MatchedPair {
            offer_id: OrderId::new("o1"),
            bid_id: OrderId::new("b1"),
        };
        assert_eq!(pair.key().as_str(), "o1:b1");
    }
}
