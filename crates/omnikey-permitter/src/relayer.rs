//! Trusted relayer policy.
//!
//! Only accounts on an owner-maintained relayer allow-list may acquire or
//! release permits. Relayers may also port records from a predecessor
//! deployment through [`Permitter::migrate_secret`], one registry call per
//! record, with failures reported per record instead of aborting the batch.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use omnikey_core::{Address, AssigneeHash, SecretKey, Subject};
use omnikey_registry::RegistryError;

use crate::error::{PermitterError, Result};
use crate::permitter::Permitter;
use crate::policy::{PermitContext, PermitPolicy};

#[derive(Debug)]
struct RelayerState {
    owner: Address,
    relayers: HashSet<Address>,
}

/// Relayer allow-list policy. The permit lifetime is the requested duration.
#[derive(Debug)]
pub struct TrustedRelayer {
    state: RwLock<RelayerState>,
}

impl TrustedRelayer {
    pub fn new(owner: Address) -> Self {
        Self {
            state: RwLock::new(RelayerState {
                owner,
                relayers: HashSet::new(),
            }),
        }
    }

    pub fn owner(&self) -> Address {
        self.state.read().unwrap_or_else(PoisonError::into_inner).owner
    }

    pub fn is_relayer(&self, account: &Address) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .relayers
            .contains(account)
    }

    /// Add or remove a relayer (owner-only).
    pub fn set_relayer(&self, caller: &Address, relayer: Address, allowed: bool) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.owner != *caller {
            return Err(PermitterError::NotOwner(*caller));
        }
        if allowed {
            state.relayers.insert(relayer);
        } else {
            state.relayers.remove(&relayer);
        }
        tracing::info!(%relayer, allowed, "relayer updated");
        Ok(())
    }

    pub fn transfer_ownership(&self, caller: &Address, owner: Address) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.owner != *caller {
            return Err(PermitterError::NotOwner(*caller));
        }
        state.owner = owner;
        Ok(())
    }

    pub fn require_relayer(&self, caller: &Address) -> Result<()> {
        if self.is_relayer(caller) {
            Ok(())
        } else {
            Err(PermitterError::NotRelayer(*caller))
        }
    }
}

impl<K: Subject> PermitPolicy<K> for TrustedRelayer {
    fn acquire(&self, ctx: &PermitContext<'_, K>) -> Result<i64> {
        self.require_relayer(&ctx.caller)?;
        Ok(ctx.requested_expiry())
    }

    fn release(&self, ctx: &PermitContext<'_, K>) -> Result<()> {
        self.require_relayer(&ctx.caller)
    }
}

/// One predecessor record to port.
#[derive(Debug, Clone)]
pub struct MigrationRecord<K> {
    pub assignee: AssigneeHash,
    pub subject: K,
    pub secret: SecretKey,
}

/// What happened to one migration record.
#[derive(Debug)]
pub struct MigrationOutcome<K> {
    pub subject: K,
    pub assignee: AssigneeHash,
    /// `None` when the record was installed.
    pub error: Option<RegistryError>,
}

impl<K> MigrationOutcome<K> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl<K: Subject> Permitter<K, TrustedRelayer> {
    /// Install predecessor records one by one (relayer-only).
    ///
    /// Records are processed in order. A record the registry rejects (not
    /// paused, already registered) is reported and skipped.
    pub fn migrate_secret(
        &self,
        caller: &Address,
        records: Vec<MigrationRecord<K>>,
    ) -> Result<Vec<MigrationOutcome<K>>> {
        self.policy().require_relayer(caller)?;
        if records.is_empty() {
            return Err(PermitterError::InvalidArgument("empty batch"));
        }

        let me = omnikey_core::Component::address(self);
        let outcomes: Vec<_> = records
            .into_iter()
            .map(|record| {
                let MigrationRecord {
                    assignee,
                    subject,
                    secret,
                } = record;
                let error = self
                    .registry()
                    .manual_migration(&me, assignee, subject, secret)
                    .err();
                if let Some(e) = &error {
                    tracing::warn!(%subject, error = %e, "migration record failed");
                }
                MigrationOutcome {
                    subject,
                    assignee,
                    error,
                }
            })
            .collect();

        let migrated = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(migrated, failed = outcomes.len() - migrated, "migration batch done");
        Ok(outcomes)
    }
}
