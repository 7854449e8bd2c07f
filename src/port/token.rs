//! Token provider port.

/// Supplies the current credential and can force a session teardown.
///
/// Token storage and expiry parsing live behind this trait.
pub trait TokenProvider: Send + Sync {
    /// Current non-expired token, or `None` when absent or past expiry.
    fn valid_token(&self) -> Option<String>;

    /// Clear credentials and send the user back to an unauthenticated entry
    /// point.
    fn handle_auth_error(&self);
}
