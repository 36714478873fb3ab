//! The interface a permitter's terminal upstream exposes.

use omnikey_core::{Address, AssigneeHash, Component, SecretKey, Subject};

use crate::error::Result;
use crate::permits::PermitOp;

/// A registry as seen by permitters.
///
/// Implemented by [`Registry`](crate::Registry) and by anything that wraps
/// one (the key store). Every mutating call is authorized against the
/// registry's permitter allow-list using `caller`.
pub trait PermitRegistry<K: Subject>: Component {
    /// Apply staged operations in order, all or nothing.
    fn apply_permits(&self, caller: &Address, ops: &[PermitOp<K>]) -> Result<()>;

    /// Stored expiry for (holder, subject), or zero.
    fn read_permit(&self, holder: &Address, subject: &K) -> i64;

    /// Install one predecessor record while paused.
    fn manual_migration(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        subject: K,
        secret: SecretKey,
    ) -> Result<()>;

    fn is_permitter(&self, account: &Address) -> bool;

    fn grant_permit(&self, caller: &Address, subject: K, holder: Address, expiry: i64) -> Result<()> {
        self.apply_permits(
            caller,
            &[PermitOp::Grant {
                subject,
                holder,
                expiry,
            }],
        )
    }

    fn revoke_permit(&self, caller: &Address, subject: K, holder: Address) -> Result<()> {
        self.apply_permits(caller, &[PermitOp::Revoke { subject, holder }])
    }
}
