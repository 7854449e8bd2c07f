//! Turn-based price-improvement negotiation.

use rust_decimal::Decimal;

use super::id::{AssetId, PartyId};
use super::order::Side;

/// A protocol step granting one counterparty the exclusive right to improve
/// or pass on a price for an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationTurn {
    pub asset: AssetId,
    pub turn: Side,
    pub best_bid: Option<Decimal>,
    pub best_offer: Option<Decimal>,
    pub best_bid_party_id: Option<PartyId>,
    pub best_offer_party_id: Option<PartyId>,
    pub best_bid_name: Option<String>,
    pub best_offer_name: Option<String>,
    pub message: Option<String>,
}

impl NegotiationTurn {
    /// Party currently holding the turn.
    #[must_use]
    pub fn holder(&self) -> Option<&PartyId> {
        match self.turn {
            Side::Bid => self.best_bid_party_id.as_ref(),
            Side::Offer => self.best_offer_party_id.as_ref(),
        }
    }

    /// Whether `party` is the one entitled to respond to this turn.
    ///
    /// Identity resolution belongs to the caller; this is only the predicate.
    #[must_use]
    pub fn is_held_by(&self, party: &PartyId) -> bool {
        self.holder() == Some(party)
    }

    /// Best price on the side holding the turn.
    #[must_use]
    pub fn current_best(&self) -> Option<Decimal> {
        match self.turn {
            Side::Bid => self.best_bid,
            Side::Offer => self.best_offer,
        }
    }

    /// A bid improves by going strictly higher, an offer by going strictly lower.
    /// With no resting best on that side any positive price improves.
    #[must_use]
    pub fn is_improvement(&self, price: Decimal) -> bool {
        if price <= Decimal::ZERO {
            return false;
        }
        match (self.turn, self.current_best()) {
            (_, None) => true,
            (Side::Bid, Some(best)) => price > best,
            (Side::Offer, Some(best)) => price < best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn turn(side: Side) -> NegotiationTurn {
        NegotiationTurn {
            asset: AssetId::new("X"),
            turn: side,
            best_bid: Some(dec!(100)),
            best_offer: Some(dec!(110)),
            best_bid_party_id: Some(PartyId::new("buyer")),
            best_offer_party_id: Some(PartyId::new("seller")),
            best_bid_name: Some("Buyer Co".into()),
            best_offer_name: Some("Seller Co".into()),
            message: None,
        }
    }

    #[test]
    fn bid_must_be_strictly_higher() {
        let t = turn(Side::Bid);
        assert!(!t.is_improvement(dec!(100)));
        assert!(!t.is_improvement(dec!(99.5)));
        assert!(t.is_improvement(dec!(100.01)));
    }

    #[test]
    fn offer_must_be_strictly_lower() {
        let t = turn(Side::Offer);
        assert!(!t.is_improvement(dec!(110)));
        assert!(t.is_improvement(dec!(109)));
    }

    #[test]
    fn missing_best_accepts_any_positive_price() {
        let mut t = turn(Side::Bid);
        t.best_bid = None;
        assert!(t.is_improvement(dec!(1)));
        assert!(!t.is_improvement(dec!(0)));
    }

    #[test]
    fn ownership_follows_turn_side() {
        let bid_turn = turn(Side::Bid);
        assert!(bid_turn.is_held_by(&PartyId::new("buyer")));
        assert!(!bid_turn.is_held_by(&PartyId::new("seller")));

        let offer_turn = turn(Side::Offer);
        assert!(offer_turn.is_held_by(&PartyId::new("seller")));
    }
}
