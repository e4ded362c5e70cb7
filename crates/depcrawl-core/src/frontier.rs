//! Deduplicating, unordered work set of identifiers awaiting processing.
//!
//! An identifier enters `seen` on its first push and is never admitted again
//! unless [`Frontier::reset`] clears it. `pop` makes no ordering promise.

use std::collections::HashSet;

use depcrawl_state::Identifier;

/// Pending identifiers plus the set of every identifier ever admitted.
#[derive(Debug, Default)]
pub struct Frontier {
    pending: HashSet<Identifier>,
    seen: HashSet<Identifier>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `id` unless it was ever pushed before. Returns whether it was admitted.
    pub fn push(&mut self, id: Identifier) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.pending.insert(id);
        true
    }

    /// Remove and return an arbitrary pending identifier. It stays seen.
    pub fn pop(&mut self) -> Option<Identifier> {
        let id = self.pending.iter().next().cloned()?;
        self.pending.remove(&id);
        Some(id)
    }

    /// Forget `id` entirely so a later push admits it again.
    pub fn reset(&mut self, id: &Identifier) {
        self.pending.remove(id);
        self.seen.remove(id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `id` is waiting to be popped.
    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn was_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }
}
