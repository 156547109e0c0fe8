//! Hook registrations scoped to one live object

use crate::handler::HookFn;
use crate::types::HookPriority;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque, stable identity of an owning object.
///
/// Allocated from a process-wide counter at object creation and carried by
/// the owner for its lifetime. Two owners are distinct even when their
/// values compare equal; identity never collides with a recycled address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Handler scoped to one `(hook name, owner)` pair
#[derive(Clone)]
pub struct BehaviorRegistration {
    /// Hook name, stored case-folded
    pub hook_name: String,

    /// Identity of the owning object
    pub owner: OwnerId,

    /// Invoked as a plain callback; return value discarded
    pub callback: HookFn,

    /// Higher runs earlier
    pub priority: HookPriority,

    pub(crate) seq: u64,
}

/// Storage for owner-scoped hook registrations.
///
/// Entries are independent of the exact-name registrations in the hook
/// table and are the only removable registrations, typically dropped when
/// the owning object is destroyed.
pub struct BehaviorTable {
    entries: DashMap<(String, OwnerId), Vec<BehaviorRegistration>>,
    seq: AtomicU64,
}

impl BehaviorTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Append unconditionally; duplicates are allowed
    pub fn add(&self, name: &str, owner: OwnerId, callback: HookFn, priority: HookPriority) {
        let name = name.to_lowercase();
        let registration = BehaviorRegistration {
            hook_name: name.clone(),
            owner,
            callback,
            priority,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.entries.entry((name, owner)).or_default().push(registration);
    }

    /// Remove registrations for a `(name, owner)` pair.
    ///
    /// Without a callback, removes the whole pair. With one, removes only
    /// entries whose stored callback is pointer-identical, compacting the
    /// rest in order. Returns whether anything was removed.
    pub fn remove(&self, name: &str, owner: OwnerId, callback: Option<&HookFn>) -> bool {
        let name = name.to_lowercase();
        let key = (name, owner);

        let Some(callback) = callback else {
            return self.entries.remove(&key).is_some();
        };

        let mut removed = false;
        if let Some(mut bucket) = self.entries.get_mut(&key) {
            let before = bucket.len();
            bucket.retain(|entry| !Arc::ptr_eq(&entry.callback, callback));
            removed = bucket.len() < before;
        }
        // Drop the guard before removing an emptied pair.
        if removed {
            self.entries.remove_if(&key, |_, bucket| bucket.is_empty());
        }
        removed
    }

    /// Registrations for a pair, ordered by priority descending with
    /// insertion order breaking ties; cloned out so no lock is held while
    /// callbacks run
    pub fn snapshot(&self, name: &str, owner: OwnerId) -> Vec<BehaviorRegistration> {
        let name = name.to_lowercase();
        let mut entries = self
            .entries
            .get(&(name, owner))
            .map(|bucket| bucket.clone())
            .unwrap_or_default();
        entries.sort_by_key(|entry| (std::cmp::Reverse(entry.priority), entry.seq));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BehaviorTable {
    fn default() -> Self {
        Self::new()
    }
}
