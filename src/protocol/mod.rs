//! Venue wire protocol.
//!
//! Every frame on the persistent connection is a JSON text message shaped as
//! an envelope:
//!
//! ```json
//! {"event": "negotiation:your_turn", "data": {"asset": "WHEAT-DEC", "turn": "BID"}}
//! ```
//!
//! [`inbound`] classifies envelopes into typed frames, [`outbound`] builds the
//! frames the client emits.

pub mod inbound;
pub mod outbound;

pub use inbound::{Envelope, InboundFrame, OrderEventKind};
pub use outbound::{
    MarketSubscription, NegotiationResponse, OutboundFrame, QuantityConfirmationResponse,
    SellerApprovalResponse,
};
