//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! - [`transport`] - `ScriptedConnector`, `ChannelLink` and its `LinkHandle`
//! - [`token`] - `RecordingTokens`, a token provider that counts logouts

pub mod token;
pub mod transport;
