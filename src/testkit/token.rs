//! Recording [`TokenProvider`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::port::TokenProvider;

/// Token provider that counts forced logouts.
///
/// Clones share state, so a test can keep one and hand another to the
/// session. A forced logout clears the token.
#[derive(Debug, Clone, Default)]
pub struct RecordingTokens {
    token: Arc<Mutex<Option<String>>>,
    auth_errors: Arc<AtomicU32>,
}

impl RecordingTokens {
    pub fn valid(token: &str) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.to_string()))),
            auth_errors: Arc::default(),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<&str>) {
        *self.token.lock() = token.map(str::to_string);
    }

    pub fn auth_errors(&self) -> u32 {
        self.auth_errors.load(Ordering::SeqCst)
    }
}

impl TokenProvider for RecordingTokens {
    fn valid_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn handle_auth_error(&self) {
        self.auth_errors.fetch_add(1, Ordering::SeqCst);
        self.set(None);
    }
}
