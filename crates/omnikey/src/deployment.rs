//! Deployment wiring.
//!
//! A [`Deployment`] stands up one identity key store, a trusted-relayer
//! permitter in front of it, an audit log, and the directory that lets
//! further permitters resolve their way to the store.

use std::sync::Arc;

use omnikey_audit::{AuditLog, MemoryAuditLog, SqliteAuditLog};
use omnikey_core::{
    Address, Clock, Component, EntropySource, HashChainEntropy, IdentityId, OsEntropy,
};
use omnikey_keystore::{KeyStore, PredecessorStore};
use omnikey_permitter::{PermitPolicy, Permitter, TrustedRelayer};
use omnikey_registry::{Directory, EventSink};

use crate::config::{EntropyMode, OmnikeyConfig};
use crate::error::Result;

/// A wired Omnikey deployment for identities.
pub struct Deployment {
    owner: Address,
    clock: Arc<dyn Clock>,
    config: OmnikeyConfig,
    directory: Directory<IdentityId>,
    keystore: Arc<KeyStore<IdentityId>>,
    relayer: Arc<Permitter<IdentityId, TrustedRelayer>>,
    audit: Arc<dyn AuditLog<IdentityId>>,
}

/// Address a component is deployed at, from its name and version.
pub fn component_address(name: &str, version: &str) -> Address {
    Address::derive(&format!("{}/v{}", name, version))
}

impl Deployment {
    /// Wire a fresh deployment owned by `owner`.
    pub fn new(owner: Address, config: OmnikeyConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::build(owner, config, clock, None)
    }

    /// Wire a deployment that can pull subjects from `predecessor` through
    /// [`KeyStore::auto_migration`]. `config.keystore.version` must differ
    /// from the predecessor's so the two get distinct addresses.
    pub fn successor(
        owner: Address,
        config: OmnikeyConfig,
        clock: Arc<dyn Clock>,
        predecessor: Arc<dyn PredecessorStore<IdentityId>>,
    ) -> Result<Self> {
        Self::build(owner, config, clock, Some(predecessor))
    }

    fn build(
        owner: Address,
        config: OmnikeyConfig,
        clock: Arc<dyn Clock>,
        predecessor: Option<Arc<dyn PredecessorStore<IdentityId>>>,
    ) -> Result<Self> {
        let store_address = component_address(&config.keystore.name, &config.keystore.version);

        let entropy: Arc<dyn EntropySource> = match config.entropy {
            EntropyMode::Os => Arc::new(OsEntropy),
            EntropyMode::HashChain => {
                Arc::new(HashChainEntropy::new(store_address, Arc::clone(&clock)))
            }
        };

        let audit: Arc<dyn AuditLog<IdentityId>> = match &config.audit.path {
            Some(path) => Arc::new(SqliteAuditLog::open(path, Arc::clone(&clock))?),
            None => Arc::new(MemoryAuditLog::new(Arc::clone(&clock))),
        };
        let sink: Arc<dyn EventSink<IdentityId>> = Arc::new(Arc::clone(&audit));

        let mut keystore = KeyStore::new(
            store_address,
            owner,
            entropy,
            Arc::clone(&clock),
            &config.keystore,
        )?
        .with_sink(sink);
        if let Some(predecessor) = predecessor {
            keystore = keystore.with_predecessor(predecessor);
        }
        let keystore = Arc::new(keystore);

        let directory = Directory::new();
        directory.register_registry(keystore.clone())?;

        let relayer = Arc::new(Permitter::new(
            component_address("TrustedRelayer", &config.keystore.version),
            store_address,
            &directory,
            TrustedRelayer::new(owner),
            Arc::clone(&clock),
            config.permitter.clone(),
        )?);
        directory.register(relayer.clone())?;
        keystore
            .registry()
            .set_permitter(&owner, relayer.as_ref(), true)?;

        tracing::info!(
            keystore = %store_address,
            relayer = %relayer.address(),
            "deployment wired"
        );

        Ok(Self {
            owner,
            clock,
            config,
            directory,
            keystore,
            relayer,
            audit,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &OmnikeyConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn directory(&self) -> &Directory<IdentityId> {
        &self.directory
    }

    pub fn keystore(&self) -> &Arc<KeyStore<IdentityId>> {
        &self.keystore
    }

    pub fn relayer(&self) -> &Arc<Permitter<IdentityId, TrustedRelayer>> {
        &self.relayer
    }

    pub fn audit(&self) -> &Arc<dyn AuditLog<IdentityId>> {
        &self.audit
    }

    /// Wire another permitter delegating to `upstream` and allow-list it on
    /// the key store (owner-only).
    pub fn add_permitter<P: PermitPolicy<IdentityId>>(
        &self,
        caller: &Address,
        address: Address,
        upstream: Address,
        policy: P,
    ) -> Result<Arc<Permitter<IdentityId, P>>> {
        let permitter = Arc::new(Permitter::new(
            address,
            upstream,
            &self.directory,
            policy,
            Arc::clone(&self.clock),
            self.config.permitter.clone(),
        )?);
        let registry = self.keystore.registry();
        let was_allowed = registry.is_permitter(&address);
        registry.set_permitter(caller, permitter.as_ref(), true)?;
        if let Err(e) = self.directory.register(permitter.clone()) {
            if !was_allowed {
                if let Err(undo) = registry.set_permitter(caller, permitter.as_ref(), false) {
                    tracing::warn!(%address, error = %undo, "permitter allow-list rollback failed");
                }
            }
            return Err(e.into());
        }
        Ok(permitter)
    }
}
