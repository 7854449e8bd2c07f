//! Confirmation flow coordinator.
//!
//! Three keyed flows share one record store:
//!
//! - **Seller approval** (keyed `offerId:bidId`): flat accept/reject.
//! - **Quantity top-up**: offered to the smaller resting party. Accepting
//!   transmits the combined quantity computed here, never a caller total.
//! - **Partial-fill approval**: offered to the larger party after a top-up
//!   decline. Accepting executes the smaller quantity.
//!
//! Records are removed optimistically once a response has been transmitted.
//! The venue enforces the response window; the client never auto-resolves.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::{ConfirmationKey, ConfirmationRequest, FlowKind, OrderId};
use crate::error::ResponseError;
use crate::protocol::{OutboundFrame, QuantityConfirmationResponse, SellerApprovalResponse};

#[derive(Debug, Default)]
pub struct ConfirmationCoordinator {
    pending: HashMap<(FlowKind, ConfirmationKey), ConfirmationRequest>,
}

impl ConfirmationCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly received request.
    pub fn insert(&mut self, request: ConfirmationRequest) {
        debug!(flow = %request.kind, key = %request.key, "Tracking confirmation request");
        self.pending
            .insert((request.kind, request.key.clone()), request);
    }

    #[must_use]
    pub fn pending(&self, kind: FlowKind, key: &ConfirmationKey) -> Option<&ConfirmationRequest> {
        self.pending.get(&(kind, key.clone()))
    }

    /// All outstanding requests, in no particular order.
    pub fn requests(&self) -> impl Iterator<Item = &ConfirmationRequest> {
        self.pending.values()
    }

    fn require(
        &self,
        kind: FlowKind,
        key: &ConfirmationKey,
    ) -> Result<&ConfirmationRequest, ResponseError> {
        self.pending(kind, key).ok_or_else(|| {
            warn!(flow = %kind, key = %key, "Response for a request that is not pending");
            ResponseError::NoPendingRequest {
                key: key.to_string(),
            }
        })
    }

    /// Build a seller-approval response.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::NoPendingRequest`] if no approval is pending
    /// for the offer/bid pair.
    pub fn prepare_seller_approval(
        &self,
        offer_id: &OrderId,
        bid_id: &OrderId,
        approved: bool,
    ) -> Result<OutboundFrame, ResponseError> {
        let key = ConfirmationKey::for_match(offer_id, bid_id);
        self.require(FlowKind::SellerApproval, &key)?;
        Ok(OutboundFrame::SellerApprovalResponse(SellerApprovalResponse {
            offer_id: offer_id.clone(),
            bid_id: bid_id.clone(),
            approved,
        }))
    }

    /// Build a top-up response.
    ///
    /// When accepted, the quantity sent is the sum of both resting
    /// quantities from the original request. A differing `suggested` total
    /// is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::NoPendingRequest`] if no top-up is pending for `key`.
    pub fn prepare_top_up(
        &self,
        key: &ConfirmationKey,
        accepted: bool,
        suggested: Option<Decimal>,
    ) -> Result<OutboundFrame, ResponseError> {
        let request = self.require(FlowKind::QuantityTopUp, key)?;
        let new_quantity = accepted.then(|| request.combined_quantity());
        if let (Some(computed), Some(suggested)) = (new_quantity, suggested) {
            if computed != suggested {
                warn!(
                    key = %key,
                    %computed,
                    %suggested,
                    "Ignoring caller quantity that differs from the presented totals"
                );
            }
        }
        Ok(quantity_response(key, accepted, new_quantity))
    }

    /// Build a partial-fill response. Accepting executes the smaller quantity;
    /// declining leaves the original order untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::NoPendingRequest`] if no partial-fill approval
    /// is pending for `key`.
    pub fn prepare_partial_fill(
        &self,
        key: &ConfirmationKey,
        accepted: bool,
    ) -> Result<OutboundFrame, ResponseError> {
        let request = self.require(FlowKind::PartialFillApproval, key)?;
        let new_quantity = accepted.then(|| request.smaller_quantity());
        Ok(quantity_response(key, accepted, new_quantity))
    }

    /// Remove a record after its response was transmitted.
    pub fn complete(
        &mut self,
        kind: FlowKind,
        key: &ConfirmationKey,
    ) -> Option<ConfirmationRequest> {
        self.pending.remove(&(kind, key.clone()))
    }

    /// Drop records closed by a terminal notification. Returns the flows that
    /// had a record.
    pub fn resolve(&mut self, kinds: &[FlowKind], key: &ConfirmationKey) -> Vec<FlowKind> {
        kinds
            .iter()
            .copied()
            .filter(|kind| self.pending.remove(&(*kind, key.clone())).is_some())
            .collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn quantity_response(
    key: &ConfirmationKey,
    accepted: bool,
    new_quantity: Option<Decimal>,
) -> OutboundFrame {
    OutboundFrame::QuantityConfirmationResponse(QuantityConfirmationResponse {
        confirmation_key: key.clone(),
        accepted,
        new_quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetId, MatchedPair, Side};
    use rust_decimal_macros::dec;

    fn request(
        kind: FlowKind,
        key: &str,
        party: Decimal,
        counterparty: Decimal,
    ) -> ConfirmationRequest {
        ConfirmationRequest {
            kind,
            key: ConfirmationKey::new(key),
            asset: AssetId::new("X"),
            price: dec!(10),
            side: Side::Bid,
            party_quantity: party,
            counterparty_quantity: counterparty,
            matched: None,
            expires_at: None,
        }
    }

    fn new_quantity(frame: OutboundFrame) -> Option<Decimal> {
        match frame {
            OutboundFrame::QuantityConfirmationResponse(r) => r.new_quantity,
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn top_up_transmits_combined_quantity() {
        let mut coordinator = ConfirmationCoordinator::new();
        coordinator.insert(request(FlowKind::QuantityTopUp, "k1", dec!(5), dec!(3)));

        let frame = coordinator
            .prepare_top_up(&ConfirmationKey::new("k1"), true, Some(dec!(42)))
            .unwrap();
        assert_eq!(new_quantity(frame), Some(dec!(8)));
    }

    #[test]
    fn declined_top_up_has_no_quantity() {
        let mut coordinator = ConfirmationCoordinator::new();
        coordinator.insert(request(FlowKind::QuantityTopUp, "k1", dec!(5), dec!(3)));

        let frame = coordinator
            .prepare_top_up(&ConfirmationKey::new("k1"), false, None)
            .unwrap();
        assert_eq!(new_quantity(frame), None);
    }

    #[test]
    fn partial_fill_executes_smaller_quantity() {
        let mut coordinator = ConfirmationCoordinator::new();
        coordinator.insert(request(FlowKind::PartialFillApproval, "k1", dec!(9), dec!(4)));

        let frame = coordinator
            .prepare_partial_fill(&ConfirmationKey::new("k1"), true)
            .unwrap();
        assert_eq!(new_quantity(frame), Some(dec!(4)));
    }

    #[test]
    fn flows_do_not_share_records() {
        let mut coordinator = ConfirmationCoordinator::new();
        coordinator.insert(request(FlowKind::QuantityTopUp, "k1", dec!(5), dec!(3)));

        let err = coordinator
            .prepare_partial_fill(&ConfirmationKey::new("k1"), true)
            .unwrap_err();
        assert_eq!(err, ResponseError::NoPendingRequest { key: "k1".into() });
    }

    #[test]
    fn seller_approval_requires_pending_match() {
        let mut coordinator = ConfirmationCoordinator::new();
        let (offer, bid) = (OrderId::new("o1"), OrderId::new("b1"));
        assert!(coordinator.prepare_seller_approval(&offer, &bid, true).is_err());

        let mut approval = request(FlowKind::SellerApproval, "o1:b1", dec!(1), dec!(1));
        approval.matched = Some(MatchedPair {
            offer_id: offer.clone(),
            bid_id: bid.clone(),
        });
        coordinator.insert(approval);

        let frame = coordinator.prepare_seller_approval(&offer, &bid, false).unwrap();
        assert_eq!(
            frame,
            OutboundFrame::SellerApprovalResponse(SellerApprovalResponse {
                offer_id: offer,
                bid_id: bid,
                approved: false,
            })
        );
    }

    #[test]
    fn resolve_reports_removed_flows() {
        let mut coordinator = ConfirmationCoordinator::new();
        coordinator.insert(request(FlowKind::PartialFillApproval, "k1", dec!(9), dec!(4)));

        let removed = coordinator.resolve(
            &[FlowKind::QuantityTopUp, FlowKind::PartialFillApproval],
            &ConfirmationKey::new("k1"),
        );
        assert_eq!(removed, vec![FlowKind::PartialFillApproval]);
        assert!(coordinator.is_empty());
    }

    #[test]
    fn complete_is_single_shot() {
        let mut coordinator = ConfirmationCoordinator::new();
        coordinator.insert(request(FlowKind::QuantityTopUp, "k1", dec!(5), dec!(3)));
        let key = ConfirmationKey::new("k1");

        assert!(coordinator.complete(FlowKind::QuantityTopUp, &key).is_some());
        assert!(coordinator.complete(FlowKind::QuantityTopUp, &key).is_none());
        assert!(coordinator.prepare_top_up(&key, true, None).is_err());
    }
}
