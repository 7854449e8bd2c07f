//! Idempotency-key cache for prompt events.
//!
//! The transport may redeliver the same request while reconnecting; the
//! router consults this cache so each prompt surfaces at most once per
//! session.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{ConfirmationKey, FlowKind};

/// Set of idempotency keys already handled in this session.
///
/// Keys are namespaced by flow (`approval:o1:b1`, `topup:k1`, `partial:k1`)
/// so a partial-fill request reusing its top-up's key is still a new prompt.
#[derive(Debug, Default)]
pub struct EventDedupCache {
    seen: HashSet<String>,
    evict_on_terminal: bool,
}

impl EventDedupCache {
    #[must_use]
    pub fn new(evict_on_terminal: bool) -> Self {
        Self {
            seen: HashSet::new(),
            evict_on_terminal,
        }
    }

    fn make_key(kind: FlowKind, key: &ConfirmationKey) -> String {
        format!("{}:{}", kind.prefix(), key.as_str())
    }

    /// Record a sighting. Returns `true` if the key was already handled.
    pub fn is_duplicate(&mut self, kind: FlowKind, key: &ConfirmationKey) -> bool {
        !self.seen.insert(Self::make_key(kind, key))
    }

    /// A terminal outcome was observed for `key`.
    ///
    /// Evicts the key when eviction is enabled, so a later request with the
    /// same key is treated as a new prompt. Returns whether a key was removed.
    pub fn resolve(&mut self, kind: FlowKind, key: &ConfirmationKey) -> bool {
        if !self.evict_on_terminal {
            return false;
        }
        let removed = self.seen.remove(&Self::make_key(kind, key));
        if removed {
            debug!(flow = %kind, key = %key, "Evicted dedup key after terminal outcome");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, kind: FlowKind, key: &ConfirmationKey) -> bool {
        self.seen.contains(&Self::make_key(kind, key))
    }

    /// Drop every key. Called when the session ends.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
