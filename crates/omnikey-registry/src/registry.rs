//! The registry: subject lifecycle, allow-lists and permit storage.
//!
//! A registry maps assignee hashes to opaque subject handles (identities or
//! attributes), records which accounts hold permits on which subjects, and
//! exposes grant/revoke entry points to allow-listed permitters only.
//!
//! Every entry point takes the write lock once, validates everything it
//! needs, then mutates. A failing call leaves no partial state behind.
//! Events are emitted after the lock is released.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use omnikey_core::{
    Address, AssigneeHash, Clock, Component, CoreError, EntropySource, Interface, SecretKey,
    Subject,
};

use crate::access::AccessControl;
use crate::error::{RegistryError, Result};
use crate::events::{EventSink, NullSink, RegistryEvent};
use crate::interface::PermitRegistry;
use crate::permits::{PermitOp, PermitTable};

/// Hook points a registry calls as subjects come and go.
///
/// Every method has a no-op default. The extension lives inside the registry
/// lock, so hook side effects commit or fail together with the registry
/// change that triggered them.
pub trait RegistryExtension<K: Subject>: Default + Send + Sync + 'static {
    /// Called after a new subject passed every check, before it is recorded.
    /// Failing here aborts the creation.
    fn on_create(
        &mut self,
        _subject: K,
        _entropy: &dyn EntropySource,
        _personalization: &[u8],
    ) -> std::result::Result<(), CoreError> {
        Ok(())
    }

    /// Called when a subject is destroyed.
    fn on_destroy(&mut self, _subject: &K) {}

    /// Called when a subject is installed by migration with its secret.
    fn on_import(&mut self, _subject: K, _secret: SecretKey) {}
}

impl<K: Subject> RegistryExtension<K> for () {}

/// A subject brought over wholesale from a predecessor deployment.
#[derive(Debug, Clone)]
pub struct ImportRecord<K> {
    pub assignee: AssigneeHash,
    pub subject: K,
    pub secret: SecretKey,
    /// Holders and their expiries.
    pub permits: Vec<(Address, i64)>,
}

/// Registry state guarded by a single lock.
pub struct RegistryState<K, X> {
    access: AccessControl,
    assignees: HashMap<AssigneeHash, K>,
    subjects: HashMap<K, AssigneeHash>,
    permits: PermitTable<K>,
    ext: X,
}

impl<K: Subject, X> RegistryState<K, X> {
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn permits(&self) -> &PermitTable<K> {
        &self.permits
    }

    pub fn ext(&self) -> &X {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }

    pub fn subject_of(&self, assignee: &AssigneeHash) -> Option<K> {
        self.assignees.get(assignee).copied()
    }

    pub fn assignee_of(&self, subject: &K) -> Option<AssigneeHash> {
        self.subjects.get(subject).copied()
    }

    pub fn is_registered(&self, subject: &K) -> bool {
        self.subjects.contains_key(subject)
    }

    /// The subject's assignee, or `NotRegistered`.
    pub fn require_registered(&self, subject: &K) -> Result<AssigneeHash> {
        self.assignee_of(subject)
            .ok_or_else(|| RegistryError::NotRegistered(subject.to_string()))
    }

    fn require_free(&self, assignee: &AssigneeHash, subject: &K) -> Result<()> {
        if subject.is_zero() {
            return Err(RegistryError::InvalidArgument("zero subject"));
        }
        if assignee.is_zero() {
            return Err(RegistryError::InvalidArgument("zero assignee"));
        }
        if self.assignees.contains_key(assignee) {
            return Err(RegistryError::AssigneeExists);
        }
        if self.subjects.contains_key(subject) {
            return Err(RegistryError::SubjectExists(subject.to_string()));
        }
        Ok(())
    }

    fn link(&mut self, assignee: AssigneeHash, subject: K) {
        self.assignees.insert(assignee, subject);
        self.subjects.insert(subject, assignee);
    }
}

fn require_valid_ops(ops: &[PermitOp<impl Subject>]) -> Result<()> {
    for op in ops {
        if op.holder() == Address::ZERO {
            return Err(RegistryError::InvalidArgument("zero holder"));
        }
        if let PermitOp::Grant { expiry, .. } = op {
            require_expiry(*expiry)?;
        }
    }
    Ok(())
}

/// Zero is the "no permit" reading, so a stored expiry must be positive.
fn require_expiry(expiry: i64) -> Result<()> {
    if expiry <= 0 {
        return Err(RegistryError::InvalidArgument("non-positive expiry"));
    }
    Ok(())
}

fn require_secret(secret: &SecretKey) -> Result<()> {
    if secret.is_unset() {
        return Err(RegistryError::InvalidArgument("unset secret"));
    }
    Ok(())
}

/// Identity or attribute registry.
///
/// `K` is the subject type; `X` is the hook strategy (`()` for a bare
/// registry, key slots for a key store).
pub struct Registry<K: Subject, X: RegistryExtension<K> = ()> {
    address: Address,
    entropy: Arc<dyn EntropySource>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink<K>>,
    state: RwLock<RegistryState<K, X>>,
}

impl<K: Subject, X: RegistryExtension<K>> Registry<K, X> {
    /// Create an empty registry owned by `owner`.
    pub fn new(
        address: Address,
        owner: Address,
        entropy: Arc<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            address,
            entropy,
            clock,
            sink: Arc::new(NullSink),
            state: RwLock::new(RegistryState {
                access: AccessControl::new(owner),
                assignees: HashMap::new(),
                subjects: HashMap::new(),
                permits: PermitTable::new(),
                ext: X::default(),
            }),
        }
    }

    /// Route committed events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink<K>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Current time from the registry's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn entropy(&self) -> &dyn EntropySource {
        self.entropy.as_ref()
    }

    fn state(&self) -> RwLockReadGuard<'_, RegistryState<K, X>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, RegistryState<K, X>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a consistent read view.
    pub fn read<R>(&self, f: impl FnOnce(&RegistryState<K, X>) -> R) -> R {
        f(&self.state())
    }

    /// Run `f` with exclusive access. Extensions use this to check registry
    /// state and mutate their own slots atomically.
    pub fn write<R, E>(
        &self,
        f: impl FnOnce(&mut RegistryState<K, X>) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        f(&mut self.state_mut())
    }

    /// Trace and forward an event.
    pub fn emit(&self, event: RegistryEvent<K>) {
        event.trace();
        self.sink.record(&event);
    }

    fn emit_all(&self, events: Vec<RegistryEvent<K>>) {
        for event in events {
            self.emit(event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subject lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new subject for `assignee`.
    ///
    /// The handle is derived from the entropy source seeded with
    /// `personalization`. A collision with an existing handle is fatal.
    pub fn create_subject(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        personalization: &[u8],
    ) -> Result<K> {
        let subject = {
            let mut state = self.state_mut();
            state.access.require_registrant(caller)?;
            if assignee.is_zero() {
                return Err(RegistryError::InvalidArgument("zero assignee"));
            }
            if state.assignees.contains_key(&assignee) {
                return Err(RegistryError::AssigneeExists);
            }

            let bytes = self.entropy.random_bytes(K::WIDTH, personalization)?;
            let subject = K::from_entropy(&bytes)?;
            if subject.is_zero() || state.subjects.contains_key(&subject) {
                return Err(RegistryError::SubjectExists(subject.to_string()));
            }

            state
                .ext
                .on_create(subject, self.entropy.as_ref(), personalization)?;
            state.link(assignee, subject);
            subject
        };

        self.emit(RegistryEvent::SubjectCreated { subject, assignee });
        Ok(subject)
    }

    /// Register a new subject for an account assignee.
    pub fn create_identity(
        &self,
        caller: &Address,
        assignee: &Address,
        personalization: &[u8],
    ) -> Result<K> {
        self.create_subject(caller, AssigneeHash::of(assignee), personalization)
    }

    /// Destroy a subject, revoking every permit on it.
    pub fn destroy_subject(&self, caller: &Address, subject: &K) -> Result<()> {
        let holders = {
            let mut state = self.state_mut();
            state.access.require_registrant(caller)?;
            let assignee = state.require_registered(subject)?;

            state.assignees.remove(&assignee);
            state.subjects.remove(subject);
            let holders = state.permits.holders(subject);
            state.permits.clear_subject(subject);
            state.ext.on_destroy(subject);
            holders
        };

        let mut events: Vec<_> = holders
            .iter()
            .map(|holder| RegistryEvent::PermitCleared {
                subject: *subject,
                holder: *holder,
                registrant: *caller,
            })
            .collect();
        events.push(RegistryEvent::SubjectDestroyed {
            subject: *subject,
            revoked: holders.len() as u32,
        });
        self.emit_all(events);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Administration
    // ─────────────────────────────────────────────────────────────────────────

    /// Add or remove a permitter. The component must pass the permitter probe.
    pub fn set_permitter(
        &self,
        caller: &Address,
        permitter: &dyn Component,
        allowed: bool,
    ) -> Result<()> {
        let address = permitter.address();
        {
            let mut state = self.state_mut();
            state.access.require_owner(caller)?;
            if !permitter.supports_interface(Interface::Permitter) {
                return Err(RegistryError::UnsupportedInterface(address));
            }
            state.access.set_permitter(address, allowed);
        }
        self.emit(RegistryEvent::PermitterUpdated {
            permitter: address,
            allowed,
        });
        Ok(())
    }

    /// Add or remove a registrant.
    pub fn set_registrant(&self, caller: &Address, registrant: Address, allowed: bool) -> Result<()> {
        {
            let mut state = self.state_mut();
            state.access.require_owner(caller)?;
            if registrant == Address::ZERO {
                return Err(RegistryError::InvalidArgument("zero registrant"));
            }
            state.access.set_registrant(registrant, allowed);
        }
        self.emit(RegistryEvent::RegistrantUpdated {
            registrant,
            allowed,
        });
        Ok(())
    }

    /// Flip the pause flag. Returns the new value.
    pub fn toggle_pause(&self, caller: &Address) -> Result<bool> {
        let paused = {
            let mut state = self.state_mut();
            state.access.require_owner(caller)?;
            state.access.toggle_pause()
        };
        self.emit(RegistryEvent::PauseToggled { paused });
        Ok(paused)
    }

    pub fn transfer_ownership(&self, caller: &Address, owner: Address) -> Result<()> {
        {
            let mut state = self.state_mut();
            state.access.require_owner(caller)?;
            if owner == Address::ZERO {
                return Err(RegistryError::InvalidArgument("zero owner"));
            }
            state.access.set_owner(owner);
        }
        self.emit(RegistryEvent::OwnershipTransferred {
            previous: *caller,
            owner,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permits
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply staged permit operations in order, all or nothing.
    pub fn apply_permits(&self, caller: &Address, ops: &[PermitOp<K>]) -> Result<()> {
        {
            let mut state = self.state_mut();
            state.access.require_permitter(caller)?;
            require_valid_ops(ops)?;
            for op in ops {
                state.permits.apply(op);
            }
        }

        let events = ops
            .iter()
            .map(|op| match *op {
                PermitOp::Grant {
                    subject,
                    holder,
                    expiry,
                } => RegistryEvent::PermitGranted {
                    subject,
                    holder,
                    expiry,
                    permitter: *caller,
                },
                PermitOp::Revoke { subject, holder } => RegistryEvent::PermitRevoked {
                    subject,
                    holder,
                    permitter: *caller,
                },
            })
            .collect();
        self.emit_all(events);
        Ok(())
    }

    pub fn grant_permit(&self, caller: &Address, subject: K, holder: Address, expiry: i64) -> Result<()> {
        self.apply_permits(
            caller,
            &[PermitOp::Grant {
                subject,
                holder,
                expiry,
            }],
        )
    }

    pub fn revoke_permit(&self, caller: &Address, subject: K, holder: Address) -> Result<()> {
        self.apply_permits(caller, &[PermitOp::Revoke { subject, holder }])
    }

    /// Stored expiry for (holder, subject), or zero.
    pub fn read_permit(&self, holder: &Address, subject: &K) -> i64 {
        self.state().permits.read(holder, subject)
    }

    /// Whether `holder` has an unexpired permit on `subject` right now.
    pub fn is_permitted(&self, holder: &Address, subject: &K) -> bool {
        let now = self.clock.now();
        self.state().permits.is_active(holder, subject, now)
    }

    pub fn permitted_count(&self, subject: &K) -> usize {
        self.state().permits.holder_count(subject)
    }

    pub fn permitted_at(&self, subject: &K, index: usize) -> Option<(Address, i64)> {
        self.state().permits.holder_at(subject, index)
    }

    pub fn permitted_accounts(&self, subject: &K) -> Vec<Address> {
        self.state().permits.holders(subject)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Migration
    // ─────────────────────────────────────────────────────────────────────────

    /// Install one predecessor record directly (permitter-only, paused-only).
    pub fn manual_migration(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        subject: K,
        secret: SecretKey,
    ) -> Result<()> {
        {
            let mut state = self.state_mut();
            state.access.require_permitter(caller)?;
            state.access.require_paused()?;
            state.require_free(&assignee, &subject)?;
            require_secret(&secret)?;

            state.link(assignee, subject);
            state.ext.on_import(subject, secret);
        }
        self.emit(RegistryEvent::SubjectMigrated {
            subject,
            assignee,
            permits: 0,
        });
        Ok(())
    }

    /// Install a full predecessor record with its permits (owner-only,
    /// paused-only).
    pub fn import(&self, caller: &Address, record: ImportRecord<K>) -> Result<()> {
        let ImportRecord {
            assignee,
            subject,
            secret,
            permits,
        } = record;

        {
            let mut state = self.state_mut();
            state.access.require_owner(caller)?;
            state.access.require_paused()?;
            state.require_free(&assignee, &subject)?;
            require_secret(&secret)?;
            for (holder, expiry) in &permits {
                if *holder == Address::ZERO {
                    return Err(RegistryError::InvalidArgument("zero holder"));
                }
                require_expiry(*expiry)?;
            }

            state.link(assignee, subject);
            for (holder, expiry) in &permits {
                state.permits.grant(subject, *holder, *expiry);
            }
            state.ext.on_import(subject, secret);
        }

        self.emit(RegistryEvent::SubjectMigrated {
            subject,
            assignee,
            permits: permits.len() as u32,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn owner(&self) -> Address {
        self.state().access.owner()
    }

    pub fn is_paused(&self) -> bool {
        self.state().access.is_paused()
    }

    pub fn is_permitter(&self, account: &Address) -> bool {
        self.state().access.is_permitter(account)
    }

    pub fn is_registrant(&self, account: &Address) -> bool {
        self.state().access.is_registrant(account)
    }

    pub fn subject_of(&self, assignee: &AssigneeHash) -> Option<K> {
        self.state().subject_of(assignee)
    }

    /// Subject registered for an account assignee.
    pub fn identity_of(&self, account: &Address) -> Option<K> {
        self.subject_of(&AssigneeHash::of(account))
    }

    pub fn assignee_of(&self, subject: &K) -> Option<AssigneeHash> {
        self.state().assignee_of(subject)
    }

    pub fn is_registered(&self, subject: &K) -> bool {
        self.state().is_registered(subject)
    }
}

impl<K: Subject, X: RegistryExtension<K>> Component for Registry<K, X> {
    fn address(&self) -> Address {
        self.address
    }

    fn supports_interface(&self, interface: Interface) -> bool {
        interface == Interface::Registry
    }
}

impl<K: Subject, X: RegistryExtension<K>> PermitRegistry<K> for Registry<K, X> {
    fn apply_permits(&self, caller: &Address, ops: &[PermitOp<K>]) -> Result<()> {
        Registry::apply_permits(self, caller, ops)
    }

    fn read_permit(&self, holder: &Address, subject: &K) -> i64 {
        Registry::read_permit(self, holder, subject)
    }

    fn manual_migration(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        subject: K,
        secret: SecretKey,
    ) -> Result<()> {
        Registry::manual_migration(self, caller, assignee, subject, secret)
    }

    fn is_permitter(&self, account: &Address) -> bool {
        Registry::is_permitter(self, account)
    }
}
