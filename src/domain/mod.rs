//! Venue-agnostic domain types: identifiers, connection state, orders,
//! negotiation turns and confirmation prompts.

pub mod confirmation;
pub mod connection;
pub mod id;
pub mod negotiation;
pub mod order;

pub use confirmation::{ConfirmationRequest, FlowKind, MatchedPair, Outcome};
pub use connection::ConnectionState;
pub use id::{AssetId, ConfirmationKey, OrderId, PartyId};
pub use negotiation::NegotiationTurn;
pub use order::{MarketChange, MarketUpdate, OrderNotice, Side, TradeNotice};
