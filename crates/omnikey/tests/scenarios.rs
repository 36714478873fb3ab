//! End-to-end scenarios across registry, permitters, key store and audit.

use std::collections::HashMap;
use std::sync::Arc;

use omnikey::audit::{AuditLog, SqliteAuditLog};
use omnikey::core::{
    Address, AssigneeHash, Blake3Hash, Clock, Component, ErrorKind, IdentityId, KeyRequest,
    ManualClock, SecretKey, Subject,
};
use omnikey::permitter::{
    AttestationVerifier, Attested, MeasurementSelector, MigrationRecord, PermitContext,
    PermitPolicy, PermitterError, Verdict,
};
use omnikey::registry::RegistryEvent;
use omnikey::{Deployment, EntropyMode, OmnikeyConfig};
use omnikey_testkit::{accounts, init_tracing, PermitStep, TestWorld, GENESIS, HOLDER_POOL};
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Key release
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_key_release_lifecycle() {
    init_tracing();
    let world = TestWorld::new();
    let parties = accounts(2);
    let (alice, bob) = (&parties[0], &parties[1]);
    let id = world.create_identity(alice);

    // The assignee reads its own key without a permit.
    let own = world
        .keystore
        .get_key(&world.request(id, alice.address(), alice))
        .unwrap();
    assert!(!own.is_unset());

    // Bob has no permit yet.
    let err = world
        .keystore
        .get_key(&world.request(id, bob.address(), bob))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // With a permit Bob gets the same key.
    let expiry = world.grant(id, bob.address(), 10_000);
    assert_eq!(expiry, GENESIS + 10_000);
    let shared = world
        .keystore
        .get_key(&world.request(id, bob.address(), bob))
        .unwrap();
    assert_eq!(shared, own);

    // Expiry is exclusive.
    world.clock.set(expiry);
    let err = world
        .keystore
        .get_key(&world.request(id, bob.address(), bob))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);

    // Re-granting extends, releasing removes.
    world.grant(id, bob.address(), 10_000);
    assert!(world.keystore.registry().is_permitted(&bob.address(), &id));
    world.revoke(id, bob.address());
    assert_eq!(world.keystore.registry().read_permit(&bob.address(), &id), 0);
    let err = world
        .keystore
        .get_key(&world.request(id, bob.address(), bob))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_signer_must_be_requester() {
    let world = TestWorld::new();
    let parties = accounts(3);
    let (alice, bob, carol) = (&parties[0], &parties[1], &parties[2]);
    let id = world.create_identity(alice);
    world.grant(id, bob.address(), 10_000);

    // Carol signs a request naming Bob as requester.
    let err = world
        .keystore
        .get_key(&world.request(id, bob.address(), carol))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_expired_and_foreign_requests() {
    let world = TestWorld::new();
    let parties = accounts(1);
    let alice = &parties[0];
    let id = world.create_identity(alice);

    let stale = KeyRequest::new(id, alice.address(), GENESIS)
        .sign(world.keystore.verifier().domain(), alice)
        .unwrap();
    assert_eq!(
        world.keystore.get_key(&stale).unwrap_err().kind(),
        ErrorKind::Expired
    );

    // Signed for a different store's domain.
    let foreign = KeyRequest::new(id, alice.address(), GENESIS + 60_000)
        .sign(&Blake3Hash::hash(b"some other domain"), alice)
        .unwrap();
    assert_eq!(
        world.keystore.get_key(&foreign).unwrap_err().kind(),
        ErrorKind::Authorization
    );
}

#[test]
fn test_secondary_key_rotation() {
    let world = TestWorld::new();
    let parties = accounts(1);
    let alice = &parties[0];
    let id = world.create_identity(alice);
    let store = &world.keystore;

    let request = world.request(id, alice.address(), alice);
    let first = store.get_key(&request).unwrap();
    assert_eq!(
        store.get_secondary_key(&request).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    store
        .provision_secondary_key(&world.operator, &id, b"next")
        .unwrap();
    let next = store.get_secondary_key(&request).unwrap();
    assert_ne!(next, first);
    assert_eq!(
        store
            .provision_secondary_key(&world.operator, &id, b"again")
            .unwrap_err()
            .kind(),
        ErrorKind::Conflict
    );

    store.rotate_keys(&world.operator, &id).unwrap();
    assert_eq!(store.get_key(&request).unwrap(), next);

    // Rotating again swaps the empty secondary in: no primary, no secondary.
    store.rotate_keys(&world.operator, &id).unwrap();
    assert_eq!(store.get_key(&request).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        store.get_secondary_key(&request).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(world.audit.events_named("keys_rotated").unwrap().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_destroy_and_recreate() {
    let world = TestWorld::new();
    let parties = accounts(3);
    let (alice, bob, carol) = (&parties[0], &parties[1], &parties[2]);
    let registry = world.keystore.registry();

    let id = world.create_identity(alice);
    world.grant(id, bob.address(), 10_000);
    world.grant(id, carol.address(), 10_000);
    assert_eq!(registry.permitted_count(&id), 2);

    // A second identity for the same assignee conflicts.
    let err = world
        .keystore
        .create_identity(&world.operator, &alice.address(), b"again")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    world.keystore.destroy(&world.operator, &id).unwrap();
    assert!(!registry.is_registered(&id));
    assert_eq!(registry.identity_of(&alice.address()), None);
    assert_eq!(registry.permitted_count(&id), 0);
    assert_eq!(registry.read_permit(&bob.address(), &id), 0);

    let cleared = world.audit.events_named("permit_cleared").unwrap();
    assert_eq!(cleared.len(), 2);
    assert!(world.audit.events_named("permit_revoked").unwrap().is_empty());
    assert_eq!(
        world.event_names().last().copied(),
        Some("subject_destroyed")
    );

    // Destroying twice fails loudly.
    let err = world.keystore.destroy(&world.operator, &id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The assignee can be registered again, with fresh keys.
    let again = world.create_identity(alice);
    assert_ne!(again, id);
    assert_eq!(registry.permitted_count(&again), 0);
    let err = world
        .keystore
        .get_key(&world.request(id, alice.address(), alice))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_only_registrants_create() {
    let world = TestWorld::new();
    let parties = accounts(1);
    let err = world
        .keystore
        .create_identity(&Address::derive("stranger"), &parties[0].address(), b"")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(world.event_names().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Permitters
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_relayer_allow_list() {
    let world = TestWorld::new();
    let parties = accounts(2);
    let id = world.create_identity(&parties[0]);
    let stranger = Address::derive("stranger");

    let err = world
        .relayer
        .acquire(&stranger, &[id], parties[1].address(), 1_000, b"", b"")
        .unwrap_err();
    assert!(matches!(err, PermitterError::NotRelayer(_)));
    assert_eq!(world.keystore.registry().permitted_count(&id), 0);

    // Only the owner edits the list.
    assert_eq!(
        world
            .relayer
            .policy()
            .set_relayer(&stranger, stranger, true)
            .unwrap_err()
            .kind(),
        ErrorKind::Authorization
    );
    world
        .relayer
        .policy()
        .set_relayer(&world.owner, stranger, true)
        .unwrap();
    world
        .relayer
        .acquire(&stranger, &[id], parties[1].address(), 1_000, b"", b"")
        .unwrap();
    assert_eq!(world.keystore.registry().permitted_count(&id), 1);
}

/// Admits everything except one subject.
struct Except(IdentityId);

impl PermitPolicy<IdentityId> for Except {
    fn before_acquire(&self, ctx: &PermitContext<'_, IdentityId>) -> omnikey::permitter::Result<()> {
        if ctx.subject == self.0 {
            return Err(PermitterError::InvalidArgument("excluded subject"));
        }
        Ok(())
    }

    fn acquire(&self, ctx: &PermitContext<'_, IdentityId>) -> omnikey::permitter::Result<i64> {
        Ok(ctx.requested_expiry())
    }

    fn release(&self, _ctx: &PermitContext<'_, IdentityId>) -> omnikey::permitter::Result<()> {
        Ok(())
    }
}

#[test]
fn test_batch_is_all_or_nothing() {
    let clock = ManualClock::new(GENESIS);
    let owner = Address::derive("owner");
    let deployment = Deployment::new(owner, OmnikeyConfig::default(), Arc::new(clock)).unwrap();
    let store = deployment.keystore();
    let operator = Address::derive("operator");
    store.registry().set_registrant(&owner, operator, true).unwrap();

    let parties = accounts(4);
    let ids: Vec<_> = parties[..3]
        .iter()
        .map(|p| {
            store
                .create_identity(&operator, &p.address(), b"")
                .unwrap()
        })
        .collect();

    let picky = deployment
        .add_permitter(&owner, Address::derive("picky"), store.address(), Except(ids[2]))
        .unwrap();
    let holder = parties[3].address();

    let err = picky
        .acquire(&operator, &ids, holder, 5_000, b"", b"")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    for id in &ids {
        assert_eq!(store.registry().read_permit(&holder, id), 0);
    }

    let expiries = picky
        .acquire(&operator, &ids[..2], holder, 5_000, b"", b"")
        .unwrap();
    assert_eq!(expiries, vec![GENESIS + 5_000; 2]);
    assert_eq!(
        deployment.audit().events_named("permit_granted").unwrap().len(),
        2
    );
}

/// Accepts the proof `b"quote"` and reports fixed registers.
struct QuoteVerifier;

fn registers() -> Vec<Blake3Hash> {
    vec![Blake3Hash::hash(b"bios"), Blake3Hash::hash(b"kernel")]
}

impl AttestationVerifier for QuoteVerifier {
    fn verify(&self, _requester: &Address, _context: &[u8], proof: &[u8]) -> Verdict {
        if proof != b"quote" {
            return Verdict::reject();
        }
        Verdict {
            accepted: true,
            measurements: registers(),
            message_hash: None,
        }
    }
}

#[test]
fn test_multi_hop_chain() {
    init_tracing();
    let clock = ManualClock::new(GENESIS);
    let owner = Address::derive("owner");
    let deployment =
        Deployment::new(owner, OmnikeyConfig::default(), Arc::new(clock.clone())).unwrap();
    let store = deployment.keystore();
    let operator = Address::derive("operator");
    store.registry().set_registrant(&owner, operator, true).unwrap();

    let parties = accounts(2);
    let id = store
        .create_identity(&operator, &parties[0].address(), b"")
        .unwrap();

    // gatekeeper -> relayer -> key store
    let gatekeeper = deployment
        .add_permitter(
            &owner,
            Address::derive("gatekeeper"),
            deployment.relayer().address(),
            Attested::new(QuoteVerifier, MeasurementSelector::from_registers(0b11, &registers())),
        )
        .unwrap();
    assert_eq!(gatekeeper.registry().address(), store.address());
    assert_eq!(
        gatekeeper.upstream().map(|u| u.address),
        Some(deployment.relayer().address())
    );

    let holder = parties[1].address();
    let err = gatekeeper
        .acquire(&operator, &[id], holder, 1_000, b"", b"forged")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    gatekeeper
        .acquire(&operator, &[id], holder, 1_000, b"", b"quote")
        .unwrap();
    let granted = deployment.audit().events_named("permit_granted").unwrap();
    assert_eq!(
        granted[0].event,
        RegistryEvent::PermitGranted {
            subject: id,
            holder,
            expiry: GENESIS + 1_000,
            permitter: gatekeeper.address(),
        }
    );

    // The relayer can still revoke what the gatekeeper granted.
    deployment
        .relayer()
        .policy()
        .set_relayer(&owner, operator, true)
        .unwrap();
    deployment
        .relayer()
        .release(&operator, &[id], holder, b"", b"")
        .unwrap();
    assert_eq!(store.registry().read_permit(&holder, &id), 0);
}

#[test]
fn test_permitter_needs_capable_upstream() {
    let owner = Address::derive("owner");
    let deployment =
        Deployment::new(owner, OmnikeyConfig::default(), Arc::new(ManualClock::new(0))).unwrap();

    // Nothing is wired at this address.
    let err = deployment
        .add_permitter(
            &owner,
            Address::derive("orphan"),
            Address::derive("nowhere"),
            Except(IdentityId(1)),
        )
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::CapabilityMismatch);
    assert!(deployment
        .directory()
        .get(&Address::derive("orphan"))
        .is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration
// ─────────────────────────────────────────────────────────────────────────────

fn successor_config() -> OmnikeyConfig {
    let mut config = OmnikeyConfig::default();
    config.keystore.version = "2".into();
    config
}

#[test]
fn test_manual_migration_reports_per_record() {
    let owner = Address::derive("owner");
    let deployment =
        Deployment::new(owner, successor_config(), Arc::new(ManualClock::new(GENESIS))).unwrap();
    let store = deployment.keystore();
    let relayer = deployment.relayer();
    let operator = Address::derive("operator");
    relayer.policy().set_relayer(&owner, operator, true).unwrap();

    let parties = accounts(2);
    let record = |i: usize, subject: u128| MigrationRecord {
        assignee: AssigneeHash::of(&parties[i].address()),
        subject: IdentityId(subject),
        secret: SecretKey::from_bytes([subject as u8; 32]),
    };

    // Not paused: every record is reported as failed.
    let outcomes = relayer.migrate_secret(&operator, vec![record(0, 7)]).unwrap();
    assert!(!outcomes[0].is_success());
    assert!(!store.registry().is_registered(&IdentityId(7)));

    assert!(store.registry().toggle_pause(&owner).unwrap());
    let outcomes = relayer
        .migrate_secret(&operator, vec![record(0, 7), record(1, 7), record(1, 8)])
        .unwrap();
    let ok: Vec<_> = outcomes.iter().map(|o| o.is_success()).collect();
    assert_eq!(ok, vec![true, false, true]);
    assert_eq!(
        outcomes[1].error.as_ref().map(|e| e.kind()),
        Some(ErrorKind::Conflict)
    );

    assert!(!store.registry().toggle_pause(&owner).unwrap());
    let alice = &parties[0];
    let request = KeyRequest::new(IdentityId(7), alice.address(), GENESIS + 60_000)
        .sign(store.verifier().domain(), alice)
        .unwrap();
    assert_eq!(
        store.get_key(&request).unwrap(),
        SecretKey::from_bytes([7; 32])
    );
    assert_eq!(
        deployment
            .audit()
            .events_named("subject_migrated")
            .unwrap()
            .len(),
        2
    );

    // Relayer gate applies to the batch as a whole.
    let err = relayer
        .migrate_secret(&Address::derive("stranger"), vec![record(1, 9)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_auto_migration_carries_keys_and_permits() {
    let old = TestWorld::new();
    let parties = accounts(2);
    let (alice, bob) = (&parties[0], &parties[1]);
    let id = old.create_identity(alice);
    let expiry = old.grant(id, bob.address(), 30_000);
    let key = old
        .keystore
        .get_key(&old.request(id, alice.address(), alice))
        .unwrap();

    let owner = Address::derive("owner");
    let clock: Arc<dyn Clock> = Arc::new(old.clock.clone());
    let new = Deployment::successor(owner, successor_config(), clock, old.keystore.clone()).unwrap();
    let store = new.keystore();
    assert_ne!(store.address(), old.keystore.address());

    // Alice authorizes the pull with a request against the old store.
    let pull = old.request(id, alice.address(), alice);
    let assignee = AssigneeHash::of(&alice.address());

    let err = store.auto_migration(&owner, assignee, &pull).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization, "must be paused");

    store.registry().toggle_pause(&owner).unwrap();
    let err = store
        .auto_migration(&Address::derive("stranger"), assignee, &pull)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    assert_eq!(store.auto_migration(&owner, assignee, &pull).unwrap(), id);
    store.registry().toggle_pause(&owner).unwrap();

    assert_eq!(store.registry().identity_of(&alice.address()), Some(id));
    assert_eq!(store.registry().read_permit(&bob.address(), &id), expiry);

    // Bob reads the same key from the new store.
    let request = KeyRequest::new(id, bob.address(), old.clock.now() + 60_000)
        .sign(store.verifier().domain(), bob)
        .unwrap();
    assert_eq!(store.get_key(&request).unwrap(), key);

    // Pulling the same subject twice conflicts.
    store.registry().toggle_pause(&owner).unwrap();
    let err = store.auto_migration(&owner, assignee, &pull).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit and configuration
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sqlite_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let config = OmnikeyConfig::from_json_str(&format!(
        r#"{{"audit": {{"path": {}}}}}"#,
        serde_json::to_string(&path).unwrap()
    ))
    .unwrap();

    let owner = Address::derive("owner");
    let clock = ManualClock::new(GENESIS);
    let id = {
        let deployment = Deployment::new(owner, config, Arc::new(clock.clone())).unwrap();
        let store = deployment.keystore();
        store.registry().set_registrant(&owner, owner, true).unwrap();
        let id = store
            .create_identity(&owner, &Address::derive("alice"), b"")
            .unwrap();
        store.destroy(&owner, &id).unwrap();
        id
    };

    let log: SqliteAuditLog<IdentityId> = SqliteAuditLog::open(&path, Arc::new(clock)).unwrap();
    let names: Vec<_> = log
        .events_for(&id)
        .unwrap()
        .into_iter()
        .map(|r| r.event.name())
        .collect();
    assert_eq!(names, vec!["subject_created", "key_provisioned", "subject_destroyed"]);
    assert_eq!(log.failures(), 0);
}

#[test]
fn test_hash_chain_deployments_are_reproducible() {
    let config = OmnikeyConfig {
        entropy: EntropyMode::HashChain,
        ..OmnikeyConfig::default()
    };
    let owner = Address::derive("owner");
    let alice = Address::derive("alice");

    let ids: Vec<_> = (0..2)
        .map(|_| {
            let deployment =
                Deployment::new(owner, config.clone(), Arc::new(ManualClock::new(GENESIS))).unwrap();
            let store = deployment.keystore();
            store.registry().set_registrant(&owner, owner, true).unwrap();
            store.create_identity(&owner, &alice, b"alice").unwrap()
        })
        .collect();
    assert_eq!(ids[0], ids[1]);
    assert!(!ids[0].is_zero());
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn permits_follow_model(steps in prop::collection::vec(any::<PermitStep>(), 1..24)) {
        let world = TestWorld::new();
        let parties = accounts(HOLDER_POOL + 1);
        let id = world.create_identity(&parties[HOLDER_POOL]);
        let holders: Vec<_> = parties[..HOLDER_POOL].iter().map(|p| p.address()).collect();
        let mut model: HashMap<Address, i64> = HashMap::new();

        for step in steps {
            match step {
                PermitStep::Grant { holder, duration } => {
                    let expiry = world.grant(id, holders[holder], duration);
                    prop_assert_eq!(expiry, world.clock.now() + duration);
                    model.insert(holders[holder], expiry);
                }
                PermitStep::Revoke { holder } => {
                    world.revoke(id, holders[holder]);
                    model.remove(&holders[holder]);
                }
                PermitStep::Advance { millis } => world.clock.advance(millis),
            }

            let registry = world.keystore.registry();
            prop_assert_eq!(registry.permitted_count(&id), model.len());
            let now = world.clock.now();
            for (i, holder) in holders.iter().enumerate() {
                let expected = model.get(holder).copied().unwrap_or(0);
                prop_assert_eq!(registry.read_permit(holder, &id), expected);

                let released = world
                    .keystore
                    .get_key(&world.request(id, *holder, &parties[i]))
                    .is_ok();
                prop_assert_eq!(released, expected > now);
            }
            for index in 0..registry.permitted_count(&id) {
                let (holder, expiry) = registry.permitted_at(&id, index).unwrap();
                prop_assert_eq!(model.get(&holder).copied(), Some(expiry));
            }
        }
    }
}
