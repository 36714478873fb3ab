//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use omnikey_audit::{AuditLog, MemoryAuditLog};
use omnikey_core::{
    Address, Clock, Component, IdentityId, KeyRequest, Keypair, ManualClock, OsEntropy,
    SignedKeyRequest,
};
use omnikey_keystore::{KeyStore, KeyStoreConfig};
use omnikey_permitter::{Permitter, PermitterConfig, TrustedRelayer};
use omnikey_registry::{Directory, EventSink};

/// Start time of every fixture clock (2025-01-14T12:00:00Z).
pub const GENESIS: i64 = 1_736_856_000_000;

/// A key store, a trusted-relayer permitter in front of it, and an in-memory
/// audit log, all on a manual clock.
pub struct TestWorld {
    pub clock: ManualClock,
    pub owner: Address,
    /// Allow-listed registrant and relayer.
    pub operator: Address,
    pub directory: Directory<IdentityId>,
    pub keystore: Arc<KeyStore<IdentityId>>,
    pub relayer: Arc<Permitter<IdentityId, TrustedRelayer>>,
    pub audit: Arc<MemoryAuditLog<IdentityId>>,
}

impl TestWorld {
    pub fn new() -> Self {
        let clock = ManualClock::new(GENESIS);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let owner = Address::derive("test-owner");
        let operator = Address::derive("test-operator");

        let audit = Arc::new(MemoryAuditLog::new(Arc::clone(&shared)));
        let sink: Arc<dyn EventSink<IdentityId>> = audit.clone();
        let keystore = Arc::new(
            KeyStore::new(
                Address::derive("test-keystore"),
                owner,
                Arc::new(OsEntropy),
                Arc::clone(&shared),
                &KeyStoreConfig::default(),
            )
            .expect("key store")
            .with_sink(sink),
        );

        let directory = Directory::new();
        directory
            .register_registry(keystore.clone())
            .expect("register key store");
        let relayer = Arc::new(
            Permitter::new(
                Address::derive("test-relayer"),
                keystore.address(),
                &directory,
                TrustedRelayer::new(owner),
                shared,
                PermitterConfig::default(),
            )
            .expect("relayer"),
        );
        directory.register(relayer.clone()).expect("register relayer");

        let registry = keystore.registry();
        registry
            .set_permitter(&owner, relayer.as_ref(), true)
            .expect("allow relayer");
        registry
            .set_registrant(&owner, operator, true)
            .expect("allow registrant");
        relayer
            .policy()
            .set_relayer(&owner, operator, true)
            .expect("allow operator");

        Self {
            clock,
            owner,
            operator,
            directory,
            keystore,
            relayer,
            audit,
        }
    }

    /// Register an identity for `account` as the operator.
    pub fn create_identity(&self, account: &Keypair) -> IdentityId {
        self.keystore
            .create_identity(&self.operator, &account.address(), &account.address().0)
            .expect("create identity")
    }

    /// Grant `holder` a permit on `subject` through the relayer. Returns the
    /// recorded expiry.
    pub fn grant(&self, subject: IdentityId, holder: Address, duration: i64) -> i64 {
        self.relayer
            .acquire(&self.operator, &[subject], holder, duration, b"", b"")
            .expect("acquire")[0]
    }

    /// Revoke `holder`'s permit on `subject` through the relayer.
    pub fn revoke(&self, subject: IdentityId, holder: Address) {
        self.relayer
            .release(&self.operator, &[subject], holder, b"", b"")
            .expect("release");
    }

    /// A request for `subject` on behalf of `requester`, signed by `signer`,
    /// valid for one minute.
    pub fn request(
        &self,
        subject: IdentityId,
        requester: Address,
        signer: &Keypair,
    ) -> SignedKeyRequest<IdentityId> {
        KeyRequest::new(subject, requester, self.clock.now() + 60_000)
            .sign(self.keystore.verifier().domain(), signer)
            .expect("sign request")
    }

    /// Event names recorded so far, in order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.audit
            .events()
            .expect("audit events")
            .into_iter()
            .map(|r| r.event.name())
            .collect()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic keypairs for multi-party tests.
pub fn accounts(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[1] = 0xA5;
            Keypair::from_seed(&seed)
        })
        .collect()
}

/// Install a test-writer subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
