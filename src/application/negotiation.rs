//! Negotiation turn coordinator.
//!
//! Holds at most one outstanding [`NegotiationTurn`] per asset. A new "your
//! turn" frame replaces the previous one unconditionally; a local response
//! clears it without waiting for the venue to acknowledge.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{AssetId, NegotiationTurn, Side};
use crate::error::ResponseError;
use crate::protocol::{NegotiationResponse, OutboundFrame};

/// Observable per-asset state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    YourTurn,
}

#[derive(Debug, Default)]
pub struct TurnCoordinator {
    turns: HashMap<AssetId, NegotiationTurn>,
}

impl TurnCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a turn, returning the one it superseded.
    pub fn on_your_turn(&mut self, turn: NegotiationTurn) -> Option<NegotiationTurn> {
        let previous = self.turns.insert(turn.asset.clone(), turn);
        if let Some(prev) = &previous {
            debug!(asset = %prev.asset, "Turn superseded by a newer one");
        }
        previous
    }

    #[must_use]
    pub fn state(&self, asset: &AssetId) -> TurnState {
        if self.turns.contains_key(asset) {
            TurnState::YourTurn
        } else {
            TurnState::Idle
        }
    }

    #[must_use]
    pub fn turn(&self, asset: &AssetId) -> Option<&NegotiationTurn> {
        self.turns.get(asset)
    }

    /// Validate a response and build the frame to transmit.
    ///
    /// Nothing is mutated; call [`complete`](Self::complete) once the frame
    /// has been sent.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::NoPendingRequest`] if no turn is outstanding for `asset`
    /// - [`ResponseError::ValidationFailed`] if an improvement lacks a price or
    ///   does not beat the current best on the turn's side
    pub fn prepare(
        &self,
        asset: &AssetId,
        improved: bool,
        new_price: Option<Decimal>,
    ) -> Result<OutboundFrame, ResponseError> {
        let turn = self
            .turns
            .get(asset)
            .ok_or_else(|| ResponseError::NoPendingRequest {
                key: asset.to_string(),
            })?;

        let new_price = if improved {
            let price = new_price
                .ok_or_else(|| ResponseError::validation("an improved price is required"))?;
            if !turn.is_improvement(price) {
                return Err(ResponseError::validation(improvement_rule(turn, price)));
            }
            Some(price)
        } else {
            None
        };

        Ok(OutboundFrame::NegotiationResponse(NegotiationResponse {
            asset: asset.clone(),
            improved,
            new_price,
        }))
    }

    /// Clear the turn after its response was transmitted.
    pub fn complete(&mut self, asset: &AssetId) -> Option<NegotiationTurn> {
        self.turns.remove(asset)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

fn improvement_rule(turn: &NegotiationTurn, price: Decimal) -> String {
    if price <= Decimal::ZERO {
        return format!("price {price} must be positive");
    }
    match (turn.turn, turn.current_best()) {
        (Side::Bid, Some(best)) => format!("bid {price} must be greater than best bid {best}"),
        (Side::Offer, Some(best)) => {
            format!("offer {price} must be less than best offer {best}")
        }
        (_, None) => format!("price {price} is not an improvement"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn turn(asset: &str, side: Side) -> NegotiationTurn {
        NegotiationTurn {
            asset: AssetId::new(asset),
            turn: side,
            best_bid: Some(dec!(100)),
            best_offer: Some(dec!(105)),
            best_bid_party_id: None,
            best_offer_party_id: None,
            best_bid_name: None,
            best_offer_name: None,
            message: None,
        }
    }

    #[test]
    fn new_turn_replaces_previous() {
        let mut coordinator = TurnCoordinator::new();
        let x = AssetId::new("X");
        assert!(coordinator.on_your_turn(turn("X", Side::Bid)).is_none());

        let mut newer = turn("X", Side::Bid);
        newer.best_bid = Some(dec!(102));
        let replaced = coordinator.on_your_turn(newer);

        assert_eq!(replaced.and_then(|t| t.best_bid), Some(dec!(100)));
        assert_eq!(coordinator.turn(&x).and_then(|t| t.best_bid), Some(dec!(102)));
        assert_eq!(coordinator.len(), 1);
    }

    #[test]
    fn bid_at_best_fails_validation() {
        let mut coordinator = TurnCoordinator::new();
        coordinator.on_your_turn(turn("X", Side::Bid));

        let err = coordinator
            .prepare(&AssetId::new("X"), true, Some(dec!(100)))
            .unwrap_err();
        assert!(matches!(err, ResponseError::ValidationFailed { .. }));
        assert_eq!(coordinator.state(&AssetId::new("X")), TurnState::YourTurn);
    }

    #[test]
    fn bid_above_best_builds_frame() {
        let mut coordinator = TurnCoordinator::new();
        coordinator.on_your_turn(turn("X", Side::Bid));

        let frame = coordinator
            .prepare(&AssetId::new("X"), true, Some(dec!(101)))
            .unwrap();
        assert_eq!(
            frame,
            OutboundFrame::NegotiationResponse(NegotiationResponse {
                asset: AssetId::new("X"),
                improved: true,
                new_price: Some(dec!(101)),
            })
        );
    }

    #[test]
    fn offer_must_undercut() {
        let mut coordinator = TurnCoordinator::new();
        coordinator.on_your_turn(turn("Y", Side::Offer));
        let y = AssetId::new("Y");

        assert!(coordinator.prepare(&y, true, Some(dec!(105))).is_err());
        assert!(coordinator.prepare(&y, true, Some(dec!(104.99))).is_ok());
    }

    #[test]
    fn improvement_requires_price() {
        let mut coordinator = TurnCoordinator::new();
        coordinator.on_your_turn(turn("X", Side::Bid));

        let err = coordinator.prepare(&AssetId::new("X"), true, None).unwrap_err();
        assert_eq!(err, ResponseError::validation("an improved price is required"));
    }

    #[test]
    fn pass_needs_no_price() {
        let mut coordinator = TurnCoordinator::new();
        coordinator.on_your_turn(turn("X", Side::Bid));

        let frame = coordinator.prepare(&AssetId::new("X"), false, None).unwrap();
        let OutboundFrame::NegotiationResponse(response) = frame else {
            panic!("expected negotiation response");
        };
        assert!(!response.improved);
        assert!(response.new_price.is_none());
    }

    #[test]
    fn respond_without_turn_is_rejected() {
        let coordinator = TurnCoordinator::new();
        let err = coordinator.prepare(&AssetId::new("Z"), false, None).unwrap_err();
        assert_eq!(err, ResponseError::NoPendingRequest { key: "Z".into() });
    }

    #[test]
    fn complete_returns_to_idle() {
        let mut coordinator = TurnCoordinator::new();
        coordinator.on_your_turn(turn("X", Side::Bid));
        coordinator.complete(&AssetId::new("X"));
        assert_eq!(coordinator.state(&AssetId::new("X")), TurnState::Idle);
    }
}
