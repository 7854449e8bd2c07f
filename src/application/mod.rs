//! Application layer: the session and everything it coordinates.
//!
//! - [`session`] - connection lifecycle, reconnection and outbound responses
//! - [`driver`] - single-task actor wrapper and its cloneable handle
//! - [`router`] - inbound frame dispatch
//! - [`dedup`] - idempotency keys for prompt events
//! - [`negotiation`] - per-asset turn state
//! - [`confirmation`] - seller approval, top-up and partial-fill records
//! - [`bus`] - application event fan-out

pub mod bus;
pub mod confirmation;
pub mod dedup;
pub mod driver;
pub mod negotiation;
pub mod router;
pub mod session;

pub use bus::{AppEvent, EventBus};
pub use confirmation::ConfirmationCoordinator;
pub use dedup::EventDedupCache;
pub use driver::{spawn, SessionHandle};
pub use negotiation::{TurnCoordinator, TurnState};
pub use router::{RouteOutcome, Router};
pub use session::{Session, SessionConfig, Wake};
