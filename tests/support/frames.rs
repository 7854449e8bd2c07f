//! Inbound payload builders.

use serde_json::{json, Value};

pub fn seller_approval(offer_id: &str, bid_id: &str) -> Value {
    json!({
        "offerId": offer_id,
        "bidId": bid_id,
        "asset": "WHEAT-DEC",
        "price": 101,
        "offerQuantity": 4,
        "amount": 4,
    })
}

pub fn approval_expired(offer_id: &str, bid_id: &str) -> Value {
    json!({ "offerId": offer_id, "bidId": bid_id })
}

pub fn quantity_request(key: &str, party: u32, counterparty: u32) -> Value {
    json!({
        "confirmationKey": key,
        "asset": "WHEAT-DEC",
        "price": 100,
        "side": "BID",
        "partyQuantity": party,
        "counterpartyQuantity": counterparty,
    })
}

pub fn keyed(key: &str) -> Value {
    json!({ "confirmationKey": key })
}

pub fn your_turn(asset: &str, side: &str, best_bid: Option<u32>, best_offer: Option<u32>) -> Value {
    json!({
        "asset": asset,
        "turn": side,
        "bestBid": best_bid,
        "bestOffer": best_offer,
        "bestBidUserId": "p-bid",
        "bestOfferUserId": "p-offer",
    })
}
