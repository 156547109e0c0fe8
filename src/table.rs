//! Ordered storage for named hook registrations

use crate::types::{HookKind, HookParams, HookPriority, CLASS_PARAM, DELEGATE_PARAM};
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// One registered handler
#[derive(Debug, Clone)]
pub struct HookRegistration {
    /// Hook name, stored case-folded; holds a regular expression when
    /// `is_pattern` is set
    pub name: String,

    /// How `target` is resolved at fire time
    pub kind: HookKind,

    /// Callable identifier: function name, host-module method name, or
    /// handler-class method name
    pub target: String,

    /// Higher runs earlier
    pub priority: HookPriority,

    /// Free-form metadata; `delegate` and `class` are reserved keys
    pub params: HookParams,

    /// Whether `name` is matched as a regex against fired names
    pub is_pattern: bool,

    /// Global registration sequence, the stable tie-break for equal
    /// priorities across the exact/pattern merge
    pub(crate) seq: u64,
}

impl HookRegistration {
    /// Whether this registration routes to the delegate path
    pub fn is_delegate(&self) -> bool {
        self.params
            .get(DELEGATE_PARAM)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Handler class name for `class_method` registrations
    pub fn class_name(&self) -> Option<&str> {
        self.params.get(CLASS_PARAM).and_then(Value::as_str)
    }
}

struct PatternBucket {
    regex: Regex,
    entries: Vec<HookRegistration>,
}

/// Registration storage, split into exact-name and pattern buckets.
///
/// Insertion order is preserved within a bucket; the global sequence number
/// preserves it across buckets when exact and pattern matches merge for a
/// fire. Patterns are evaluated against every fire rather than pre-indexed;
/// the pattern table is small and static after bootstrap.
pub struct HookTable {
    exact: DashMap<String, Vec<HookRegistration>>,
    patterns: DashMap<String, PatternBucket>,
    seq: AtomicU64,
}

impl HookTable {
    pub fn new() -> Self {
        Self {
            exact: DashMap::new(),
            patterns: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Append a registration, case-folding the name.
    ///
    /// Returns `false` without registering when `is_pattern` is set and the
    /// name does not compile as a regex; such an entry could never match a
    /// fire.
    pub fn register(
        &self,
        name: &str,
        kind: HookKind,
        target: impl Into<String>,
        priority: HookPriority,
        params: HookParams,
        is_pattern: bool,
    ) -> bool {
        let name = name.to_lowercase();
        let registration = HookRegistration {
            name: name.clone(),
            kind,
            target: target.into(),
            priority,
            params,
            is_pattern,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };

        if is_pattern {
            let mut bucket = match self.patterns.entry(name.clone()) {
                dashmap::mapref::entry::Entry::Occupied(occupied) => occupied.into_ref(),
                dashmap::mapref::entry::Entry::Vacant(vacant) => match Regex::new(&name) {
                    Ok(regex) => vacant.insert(PatternBucket {
                        regex,
                        entries: Vec::new(),
                    }),
                    Err(error) => {
                        tracing::warn!(pattern = %name, %error, "rejecting uncompilable hook pattern");
                        return false;
                    }
                },
            };
            bucket.entries.push(registration);
        } else {
            self.exact.entry(name).or_default().push(registration);
        }
        true
    }

    /// Collect every registration applicable to a fired name (already
    /// case-folded): the exact bucket plus each matching pattern bucket.
    ///
    /// Entries are cloned out so no table lock is held while handlers run.
    pub fn candidates_for(&self, fired: &str) -> Vec<HookRegistration> {
        let mut candidates = self
            .exact
            .get(fired)
            .map(|bucket| bucket.clone())
            .unwrap_or_default();

        for bucket in self.patterns.iter() {
            if bucket.regex.is_match(fired) {
                candidates.extend(bucket.entries.iter().cloned());
            }
        }

        candidates
    }

    /// Total registrations across both buckets
    pub fn len(&self) -> usize {
        let exact: usize = self.exact.iter().map(|b| b.len()).sum();
        let patterns: usize = self.patterns.iter().map(|b| b.entries.len()).sum();
        exact + patterns
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new()
    }
}
