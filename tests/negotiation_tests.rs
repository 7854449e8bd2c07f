mod support;

use parley::application::AppEvent;
use parley::domain::{AssetId, PartyId, Side};
use parley::error::ResponseError;
use parley::protocol::{NegotiationResponse, OutboundFrame};
use rust_decimal_macros::dec;

use support::frames::your_turn;
use support::Harness;

fn negotiation_frames(sent: &[OutboundFrame]) -> Vec<NegotiationResponse> {
    sent.iter()
        .filter_map(|f| match f {
            OutboundFrame::NegotiationResponse(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn bid_must_beat_best_bid() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let wheat = AssetId::new("WHEAT-DEC");
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(100), Some(110)))
        .await;
    assert!(h.session.turn(&wheat).is_some());

    let err = h
        .session
        .respond_negotiation(&wheat, true, Some(dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, ResponseError::ValidationFailed { .. }));
    assert!(negotiation_frames(&link.sent()).is_empty());
    assert!(h.session.turn(&wheat).is_some());

    h.session
        .respond_negotiation(&wheat, true, Some(dec!(101)))
        .await
        .unwrap();
    assert_eq!(
        negotiation_frames(&link.sent()),
        vec![NegotiationResponse {
            asset: wheat.clone(),
            improved: true,
            new_price: Some(dec!(101)),
        }]
    );
    assert!(h.session.turn(&wheat).is_none());
}

#[tokio::test]
async fn offer_must_undercut_best_offer() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let corn = AssetId::new("CORN-MAR");
    h.deliver(&link, "negotiation:your_turn", your_turn("CORN-MAR", "OFFER", Some(100), Some(110)))
        .await;

    let err = h
        .session
        .respond_negotiation(&corn, true, Some(dec!(111)))
        .await
        .unwrap_err();
    assert!(matches!(err, ResponseError::ValidationFailed { .. }));

    h.session
        .respond_negotiation(&corn, true, Some(dec!(109.5)))
        .await
        .unwrap();
    assert_eq!(negotiation_frames(&link.sent()).len(), 1);
}

#[tokio::test]
async fn newest_turn_wins() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let wheat = AssetId::new("WHEAT-DEC");
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(100), None))
        .await;
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(104), None))
        .await;

    let turn = h.session.turn(&wheat).unwrap();
    assert_eq!(turn.best_bid, Some(dec!(104)));
    assert_eq!(turn.turn, Side::Bid);

    // 102 beat the first turn but not the current one.
    let err = h
        .session
        .respond_negotiation(&wheat, true, Some(dec!(102)))
        .await
        .unwrap_err();
    assert!(matches!(err, ResponseError::ValidationFailed { .. }));

    let turns = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, AppEvent::NegotiationTurn(_)))
        .count();
    assert_eq!(turns, 2);
}

#[tokio::test]
async fn respond_without_turn_is_rejected() {
    let mut h = Harness::new();
    let link = h.connect().await;

    let err = h
        .session
        .respond_negotiation(&AssetId::new("OATS"), false, None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ResponseError::NoPendingRequest {
            key: "OATS".into()
        }
    );
    assert!(negotiation_frames(&link.sent()).is_empty());
}

#[tokio::test]
async fn pass_sends_no_price_and_clears_turn() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let wheat = AssetId::new("WHEAT-DEC");
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(100), None))
        .await;

    h.session
        .respond_negotiation(&wheat, false, None)
        .await
        .unwrap();

    assert_eq!(
        negotiation_frames(&link.sent()),
        vec![NegotiationResponse {
            asset: wheat.clone(),
            improved: false,
            new_price: None,
        }]
    );
    let err = h
        .session
        .respond_negotiation(&wheat, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResponseError::NoPendingRequest { .. }));
}

#[tokio::test]
async fn respond_while_disconnected_keeps_turn() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let wheat = AssetId::new("WHEAT-DEC");
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(100), None))
        .await;

    link.drop_connection("reset");
    h.session.pump().await;

    let err = h
        .session
        .respond_negotiation(&wheat, true, Some(dec!(101)))
        .await
        .unwrap_err();
    assert_eq!(err, ResponseError::NotConnected);
    assert!(h.session.turn(&wheat).is_some());
}

#[tokio::test]
async fn turn_ownership_is_exposed_for_callers() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let wheat = AssetId::new("WHEAT-DEC");
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(100), Some(110)))
        .await;

    let turn = h.session.turn(&wheat).unwrap();
    assert!(turn.is_held_by(&PartyId::new("p-bid")));
    assert!(!turn.is_held_by(&PartyId::new("p-offer")));
    assert_eq!(turn.current_best(), Some(dec!(100)));
}

#[tokio::test]
async fn disconnect_clears_turns() {
    let mut h = Harness::new();
    let link = h.connect().await;
    let wheat = AssetId::new("WHEAT-DEC");
    h.deliver(&link, "negotiation:your_turn", your_turn("WHEAT-DEC", "BID", Some(100), None))
        .await;

    h.session.disconnect().await;
    assert!(h.session.turn(&wheat).is_none());
}
