//! Permit table.
//!
//! A permit lets one holder access one subject until its expiry. The table
//! keeps at most one permit per (holder, subject) pair and an enumerable
//! holder set per subject that always mirrors the stored permits.
//!
//! Expiry is advisory: the table never prunes expired entries. Readers compare
//! the stored expiry against the current time, and an expiry at or before
//! `now` counts as absent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use omnikey_core::{Address, Subject};

/// A single permit mutation, staged by a permitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitOp<K> {
    /// Record (or overwrite) a permit.
    Grant {
        subject: K,
        holder: Address,
        expiry: i64,
    },
    /// Delete a permit, if any.
    Revoke { subject: K, holder: Address },
}

impl<K: Subject> PermitOp<K> {
    pub fn subject(&self) -> K {
        match self {
            PermitOp::Grant { subject, .. } | PermitOp::Revoke { subject, .. } => *subject,
        }
    }

    pub fn holder(&self) -> Address {
        match self {
            PermitOp::Grant { holder, .. } | PermitOp::Revoke { holder, .. } => *holder,
        }
    }
}

/// Insertion-ordered set of holders with O(1) removal.
#[derive(Debug, Clone, Default)]
pub struct HolderSet {
    members: Vec<Address>,
    index: HashMap<Address, usize>,
}

impl HolderSet {
    /// Add a holder. Returns false if already present.
    pub fn insert(&mut self, holder: Address) -> bool {
        if self.index.contains_key(&holder) {
            return false;
        }
        self.index.insert(holder, self.members.len());
        self.members.push(holder);
        true
    }

    /// Remove a holder. Returns false if absent.
    pub fn remove(&mut self, holder: &Address) -> bool {
        let Some(pos) = self.index.remove(holder) else {
            return false;
        };
        self.members.swap_remove(pos);
        if let Some(moved) = self.members.get(pos) {
            self.index.insert(*moved, pos);
        }
        true
    }

    pub fn contains(&self, holder: &Address) -> bool {
        self.index.contains_key(holder)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Address> {
        self.members.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.members
    }
}

/// Permits indexed by (holder, subject), plus per-subject holder sets.
#[derive(Debug)]
pub struct PermitTable<K> {
    expiries: HashMap<(Address, K), i64>,
    holders: HashMap<K, HolderSet>,
}

impl<K> Default for PermitTable<K> {
    fn default() -> Self {
        Self {
            expiries: HashMap::new(),
            holders: HashMap::new(),
        }
    }
}

impl<K: Subject> PermitTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a permit, overwriting any previous expiry for the pair.
    pub fn grant(&mut self, subject: K, holder: Address, expiry: i64) {
        self.expiries.insert((holder, subject), expiry);
        self.holders.entry(subject).or_default().insert(holder);
    }

    /// Delete a permit. Returns the previous expiry, if there was one.
    pub fn revoke(&mut self, subject: &K, holder: &Address) -> Option<i64> {
        let previous = self.expiries.remove(&(*holder, *subject));
        if let Some(set) = self.holders.get_mut(subject) {
            set.remove(holder);
            if set.is_empty() {
                self.holders.remove(subject);
            }
        }
        previous
    }

    /// Apply a staged operation.
    pub fn apply(&mut self, op: &PermitOp<K>) {
        match *op {
            PermitOp::Grant {
                subject,
                holder,
                expiry,
            } => self.grant(subject, holder, expiry),
            PermitOp::Revoke { subject, holder } => {
                self.revoke(&subject, &holder);
            }
        }
    }

    /// Stored expiry for the pair, or zero if none.
    pub fn read(&self, holder: &Address, subject: &K) -> i64 {
        self.expiries.get(&(*holder, *subject)).copied().unwrap_or(0)
    }

    /// Whether the pair holds a permit that has not yet expired.
    pub fn is_active(&self, holder: &Address, subject: &K, now: i64) -> bool {
        self.read(holder, subject) > now
    }

    /// Number of holders of `subject`.
    pub fn holder_count(&self, subject: &K) -> usize {
        self.holders.get(subject).map_or(0, HolderSet::len)
    }

    /// The holder at `index` of `subject`'s holder set, with its expiry.
    pub fn holder_at(&self, subject: &K, index: usize) -> Option<(Address, i64)> {
        let holder = self.holders.get(subject)?.at(index)?;
        Some((holder, self.read(&holder, subject)))
    }

    /// All holders of `subject`, in set order.
    pub fn holders(&self, subject: &K) -> Vec<Address> {
        self.holders
            .get(subject)
            .map(|set| set.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Delete every permit on `subject`. Returns how many were removed.
    pub fn clear_subject(&mut self, subject: &K) -> usize {
        let Some(set) = self.holders.remove(subject) else {
            return 0;
        };
        for holder in set.as_slice() {
            self.expiries.remove(&(*holder, *subject));
        }
        set.len()
    }
}
