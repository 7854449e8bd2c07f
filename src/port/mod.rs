//! Ports: the capabilities the session consumes from its surroundings.
//!
//! - [`token`] - credential supply and forced logout
//! - [`transport`] - the persistent bidirectional connection

pub mod token;
pub mod transport;

pub use token::TokenProvider;
pub use transport::{Connector, Link, LinkSignal};
