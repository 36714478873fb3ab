//! Permit policies.
//!
//! A policy decides whether one subject's permit may be acquired or released
//! and computes the permit's expiry. The [`Permitter`](crate::Permitter)
//! driver calls the hooks in order for every subject of a batch:
//!
//! 1. `before_*` (no-op by default)
//! 2. `acquire` / `release`
//! 3. `after_*` (no-op by default), once every subject has been authorized
//!
//! Any hook failing aborts the whole batch before anything reaches the
//! registry.

use omnikey_core::{Address, Subject};

use crate::error::Result;

/// Everything a policy sees about one subject of a batch.
#[derive(Debug, Clone, Copy)]
pub struct PermitContext<'a, K> {
    /// Subject the permit is for.
    pub subject: K,
    /// Account that will hold the permit.
    pub requester: Address,
    /// Account invoking the permitter.
    pub caller: Address,
    /// Requested lifetime in milliseconds. Zero for releases.
    pub duration: i64,
    /// Opaque application context.
    pub context: &'a [u8],
    /// Opaque authorization proof, interpreted by the policy.
    pub authorization: &'a [u8],
    /// Current time (Unix milliseconds).
    pub now: i64,
}

impl<K> PermitContext<'_, K> {
    /// `now + duration`, saturating.
    pub fn requested_expiry(&self) -> i64 {
        self.now.saturating_add(self.duration)
    }
}

/// Authorization policy plugged into a permitter.
pub trait PermitPolicy<K: Subject>: Send + Sync + 'static {
    fn before_acquire(&self, _ctx: &PermitContext<'_, K>) -> Result<()> {
        Ok(())
    }

    /// Authorize the acquisition and return the permit expiry.
    fn acquire(&self, ctx: &PermitContext<'_, K>) -> Result<i64>;

    fn after_acquire(&self, _ctx: &PermitContext<'_, K>, _expiry: i64) -> Result<()> {
        Ok(())
    }

    fn before_release(&self, _ctx: &PermitContext<'_, K>) -> Result<()> {
        Ok(())
    }

    /// Authorize the release.
    fn release(&self, ctx: &PermitContext<'_, K>) -> Result<()>;

    fn after_release(&self, _ctx: &PermitContext<'_, K>) -> Result<()> {
        Ok(())
    }
}
