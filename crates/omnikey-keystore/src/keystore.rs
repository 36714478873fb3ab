//! The key store.
//!
//! A [`KeyStore`] is a registry whose subjects carry secret keys. Keys are
//! released only against a signed request that is either self-authorized
//! (signed by the subject's own assignee) or signed by the declared
//! requester while it holds an unexpired permit.
//!
//! A new deployment can pull subjects, keys and permits from a predecessor
//! through [`KeyStore::auto_migration`] while paused.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use omnikey_core::{
    Address, AssigneeHash, Clock, Component, EntropySource, IdentityId, Interface,
    RequestVerifier, SecretKey, SignedKeyRequest, SigningDomain, Subject,
};
use omnikey_registry::{
    EventSink, ImportRecord, KeySlot, PermitOp, PermitRegistry, Registry, RegistryError,
    RegistryEvent,
};

use crate::error::{KeyStoreError, Result};
use crate::slots::{derive_key, KeySlots};

/// Signing domain settings for a key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    pub name: String,
    pub version: String,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            name: "OmniKeyStore".to_string(),
            version: "1".to_string(),
        }
    }
}

/// Read access a successor needs from the deployment it replaces.
pub trait PredecessorStore<K: Subject>: Send + Sync {
    fn subject_of(&self, assignee: &AssigneeHash) -> Option<K>;

    /// The primary key, released under the predecessor's own rules.
    fn key_for(&self, request: &SignedKeyRequest<K>) -> Result<SecretKey>;

    fn permitted_count(&self, subject: &K) -> usize;

    fn permitted_at(&self, subject: &K, index: usize) -> Option<(Address, i64)>;
}

/// Registry plus key slots and a request verifier.
pub struct KeyStore<K: Subject = IdentityId> {
    registry: Registry<K, KeySlots<K>>,
    domain: SigningDomain,
    verifier: RequestVerifier,
    predecessor: Option<Arc<dyn PredecessorStore<K>>>,
}

impl<K: Subject> KeyStore<K> {
    pub fn new(
        address: Address,
        owner: Address,
        entropy: Arc<dyn EntropySource>,
        clock: Arc<dyn Clock>,
        config: &KeyStoreConfig,
    ) -> Result<Self> {
        let domain = SigningDomain::new(config.name.clone(), config.version.clone(), address);
        let verifier = RequestVerifier::new(&domain)?;
        if !entropy.is_confidential() {
            tracing::warn!(%address, "key store using non-confidential entropy");
        }
        Ok(Self {
            registry: Registry::new(address, owner, entropy, clock),
            domain,
            verifier,
            predecessor: None,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink<K>>) -> Self {
        self.registry = self.registry.with_sink(sink);
        self
    }

    /// Deployment to pull records from in [`auto_migration`](Self::auto_migration).
    pub fn with_predecessor(mut self, predecessor: Arc<dyn PredecessorStore<K>>) -> Self {
        self.predecessor = Some(predecessor);
        self
    }

    /// The underlying registry, for administration and queries.
    pub fn registry(&self) -> &Registry<K, KeySlots<K>> {
        &self.registry
    }

    /// The domain requests must be signed under.
    pub fn signing_domain(&self) -> &SigningDomain {
        &self.domain
    }

    pub fn verifier(&self) -> &RequestVerifier {
        &self.verifier
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a subject and derive its primary key.
    pub fn create_subject(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        personalization: &[u8],
    ) -> Result<K> {
        let subject = self
            .registry
            .create_subject(caller, assignee, personalization)?;
        self.registry.emit(RegistryEvent::KeyProvisioned {
            subject,
            slot: KeySlot::Primary,
        });
        Ok(subject)
    }

    /// Register an identity for an account.
    pub fn create_identity(
        &self,
        caller: &Address,
        assignee: &Address,
        personalization: &[u8],
    ) -> Result<K> {
        self.create_subject(caller, AssigneeHash::of(assignee), personalization)
    }

    /// Destroy a subject along with its keys and permits.
    pub fn destroy(&self, caller: &Address, subject: &K) -> Result<()> {
        Ok(self.registry.destroy_subject(caller, subject)?)
    }

    /// Derive a secondary key (registrant-only). Fails if one exists.
    pub fn provision_secondary_key(
        &self,
        caller: &Address,
        subject: &K,
        personalization: &[u8],
    ) -> Result<()> {
        let entropy = self.registry.entropy();
        self.registry.write(|state| {
            state.access().require_registrant(caller)?;
            state.require_registered(subject)?;
            if state.ext().has_secondary(subject) {
                return Err(KeyStoreError::SecondaryKeyExists(subject.to_string()));
            }
            let key = derive_key(entropy, subject, personalization)?;
            state.ext_mut().secondary.insert(*subject, key);
            Ok::<_, KeyStoreError>(())
        })?;

        self.registry.emit(RegistryEvent::KeyProvisioned {
            subject: *subject,
            slot: KeySlot::Secondary,
        });
        Ok(())
    }

    /// Promote the secondary key to primary and clear the secondary slot
    /// (registrant-only).
    ///
    /// Without a secondary key the primary slot ends up unset, so rotating
    /// twice in a row leaves the subject with no key at all.
    pub fn rotate_keys(&self, caller: &Address, subject: &K) -> Result<()> {
        self.registry.write(|state| {
            state.access().require_registrant(caller)?;
            state.require_registered(subject)?;
            let slots = state.ext_mut();
            match slots.secondary.remove(subject) {
                Some(next) => slots.primary.insert(*subject, next),
                None => slots.primary.remove(subject),
            };
            Ok::<_, KeyStoreError>(())
        })?;

        self.registry
            .emit(RegistryEvent::KeysRotated { subject: *subject });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Key release
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify `request` and check the signer may read its subject's keys.
    pub fn authorize(&self, request: &SignedKeyRequest<K>) -> Result<K> {
        let now = self.registry.now();
        let subject = request.subject();
        let signer = self.verifier.verify(request, now).map_err(|e| {
            tracing::warn!(%subject, error = %e, "key request rejected");
            e
        })?;

        self.registry
            .read(|state| -> Result<K> {
                let assignee = state.require_registered(&subject)?;
                if AssigneeHash::of(&signer) == assignee {
                    return Ok(subject);
                }
                let requester = request.requester();
                if signer != requester {
                    return Err(KeyStoreError::SignerMismatch { signer, requester });
                }
                match state.permits().read(&signer, &subject) {
                    0 => Err(KeyStoreError::NotAuthorized(signer)),
                    expiry if expiry <= now => Err(KeyStoreError::PermitExpired { expiry, now }),
                    _ => Ok(subject),
                }
            })
            .map_err(|e| {
                tracing::warn!(%subject, %signer, error = %e, "key request rejected");
                e
            })
    }

    /// Release the primary key.
    pub fn get_key(&self, request: &SignedKeyRequest<K>) -> Result<SecretKey> {
        let subject = self.authorize(request)?;
        self.registry.read(|state| {
            state
                .ext()
                .primary
                .get(&subject)
                .filter(|key| !key.is_unset())
                .cloned()
                .ok_or_else(|| KeyStoreError::KeyNotProvisioned(subject.to_string()))
        })
    }

    /// Release the secondary key, if provisioned.
    pub fn get_secondary_key(&self, request: &SignedKeyRequest<K>) -> Result<SecretKey> {
        let subject = self.authorize(request)?;
        self.registry.read(|state| {
            state
                .ext()
                .secondary
                .get(&subject)
                .filter(|key| !key.is_unset())
                .cloned()
                .ok_or_else(|| KeyStoreError::NoSecondaryKey(subject.to_string()))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Migration
    // ─────────────────────────────────────────────────────────────────────────

    /// Pull one subject from the predecessor: its handle, primary key and
    /// every permit with its expiry (owner-only, paused-only).
    pub fn auto_migration(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        request: &SignedKeyRequest<K>,
    ) -> Result<K> {
        self.registry.read(|state| {
            state.access().require_owner(caller)?;
            state.access().require_paused()
        })?;
        let predecessor = self.predecessor.as_ref().ok_or(KeyStoreError::NoPredecessor)?;

        let subject = predecessor
            .subject_of(&assignee)
            .ok_or(KeyStoreError::UnknownAssignee)?;
        if request.subject() != subject {
            return Err(KeyStoreError::InvalidArgument("request subject mismatch"));
        }
        let secret = predecessor.key_for(request)?;
        let permits: Vec<_> = (0..predecessor.permitted_count(&subject))
            .filter_map(|i| predecessor.permitted_at(&subject, i))
            .collect();

        self.registry.import(
            caller,
            ImportRecord {
                assignee,
                subject,
                secret,
                permits,
            },
        )?;
        Ok(subject)
    }
}

impl<K: Subject> PredecessorStore<K> for KeyStore<K> {
    fn subject_of(&self, assignee: &AssigneeHash) -> Option<K> {
        self.registry.subject_of(assignee)
    }

    fn key_for(&self, request: &SignedKeyRequest<K>) -> Result<SecretKey> {
        self.get_key(request)
    }

    fn permitted_count(&self, subject: &K) -> usize {
        self.registry.permitted_count(subject)
    }

    fn permitted_at(&self, subject: &K, index: usize) -> Option<(Address, i64)> {
        self.registry.permitted_at(subject, index)
    }
}

impl<K: Subject> Component for KeyStore<K> {
    fn address(&self) -> Address {
        self.registry.address()
    }

    fn supports_interface(&self, interface: Interface) -> bool {
        matches!(interface, Interface::Registry | Interface::KeyStore)
    }
}

impl<K: Subject> PermitRegistry<K> for KeyStore<K> {
    fn apply_permits(
        &self,
        caller: &Address,
        ops: &[PermitOp<K>],
    ) -> std::result::Result<(), RegistryError> {
        self.registry.apply_permits(caller, ops)
    }

    fn read_permit(&self, holder: &Address, subject: &K) -> i64 {
        self.registry.read_permit(holder, subject)
    }

    fn manual_migration(
        &self,
        caller: &Address,
        assignee: AssigneeHash,
        subject: K,
        secret: SecretKey,
    ) -> std::result::Result<(), RegistryError> {
        self.registry
            .manual_migration(caller, assignee, subject, secret)
    }

    fn is_permitter(&self, account: &Address) -> bool {
        self.registry.is_permitter(account)
    }
}
