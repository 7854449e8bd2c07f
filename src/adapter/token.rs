//! In-process credential store.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::port::TokenProvider;

/// Tokens this close to expiry are treated as already expired.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Holds a single access token until it expires or the venue rejects it.
///
/// Forced logout clears the credential; every later `valid_token` call then
/// returns `None` until a new one is stored.
#[derive(Debug)]
pub struct StoredTokenProvider {
    credential: Mutex<Option<Credential>>,
    buffer: Duration,
}

impl StoredTokenProvider {
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            credential: Mutex::new(Some(Credential {
                token: token.into(),
                expires_at,
            })),
            buffer: Duration::seconds(EXPIRY_BUFFER_SECS),
        }
    }

    /// Provider with no credential stored.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            credential: Mutex::new(None),
            buffer: Duration::seconds(EXPIRY_BUFFER_SECS),
        }
    }

    /// Read the token from `token_var` and an optional RFC 3339 expiry from
    /// `expiry_var`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the expiry is not a valid
    /// timestamp. A missing token is not an error: the session's forced
    /// logout path handles it.
    pub fn from_env(token_var: &str, expiry_var: &str) -> Result<Self, ConfigError> {
        let Some(token) = std::env::var(token_var).ok().filter(|t| !t.is_empty()) else {
            debug!(var = token_var, "No access token in environment");
            return Ok(Self::empty());
        };
        let expires_at = match std::env::var(expiry_var) {
            Ok(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "token expiry",
                        reason: e.to_string(),
                    })?
                    .with_timezone(&Utc),
            ),
            Err(_) => None,
        };
        Ok(Self::new(token, expires_at))
    }

    /// Replace the stored credential, e.g. after a fresh login.
    pub fn store(&self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        *self.credential.lock() = Some(Credential {
            token: token.into(),
            expires_at,
        });
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential.lock().is_some()
    }

    fn valid_at(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.credential.lock();
        let credential = guard.as_ref()?;
        match credential.expires_at {
            Some(expires_at) if expires_at - self.buffer <= now => {
                debug!(%expires_at, "Access token expired or about to expire");
                None
            }
            _ => Some(credential.token.clone()),
        }
    }
}

impl TokenProvider for StoredTokenProvider {
    fn valid_token(&self) -> Option<String> {
        self.valid_at(Utc::now())
    }

    fn handle_auth_error(&self) {
        if self.credential.lock().take().is_some() {
            warn!("Credential rejected, logged out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_without_expiry_is_valid() {
        let provider = StoredTokenProvider::new("abc", None);
        assert_eq!(provider.valid_token().as_deref(), Some("abc"));
    }

    #[test]
    fn token_inside_buffer_is_expired() {
        let now = Utc::now();
        let provider = StoredTokenProvider::new("abc", Some(now + Duration::seconds(120)));
        assert!(provider.valid_at(now).is_none());

        let provider = StoredTokenProvider::new("abc", Some(now + Duration::seconds(600)));
        assert!(provider.valid_at(now).is_some());
    }

    #[test]
    fn auth_error_clears_credential() {
        let provider = StoredTokenProvider::new("abc", None);
        provider.handle_auth_error();
        assert!(!provider.has_credential());
        assert!(provider.valid_token().is_none());

        provider.store("def", None);
        assert_eq!(provider.valid_token().as_deref(), Some("def"));
    }

    #[test]
    fn logout_from_another_thread_is_visible() {
        let provider = std::sync::Arc::new(StoredTokenProvider::new("abc", None));
        let shared = std::sync::Arc::clone(&provider);

        std::thread::spawn(move || shared.handle_auth_error())
            .join()
            .unwrap();

        assert!(provider.valid_token().is_none());
    }
}
