//! Attribute key issuance with vendor segments.
//!
//! Attributes are registered by name: the assignee is the hash of the
//! attribute name and the registering vendor is recorded alongside. Each
//! attribute may carry segment keys, linked and unlinked by the owner or the
//! attribute's vendor, and released under the same signed-request rules as
//! the attribute key.

use omnikey_core::{Address, AssigneeHash, AttributeId, Blake3Hash, SecretKey, SignedKeyRequest};
use omnikey_registry::RegistryEvent;

use crate::error::{KeyStoreError, Result};
use crate::keystore::KeyStore;
use crate::slots::derive_key;

/// Key store over attributes, with segment namespaces.
pub struct SegmentLinker {
    store: KeyStore<AttributeId>,
}

impl SegmentLinker {
    pub fn new(store: KeyStore<AttributeId>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &KeyStore<AttributeId> {
        &self.store
    }

    /// Register attribute `name` on behalf of `vendor` (registrant-only).
    pub fn register_attribute(
        &self,
        caller: &Address,
        vendor: Address,
        name: &str,
        personalization: &[u8],
    ) -> Result<AttributeId> {
        if name.is_empty() {
            return Err(KeyStoreError::InvalidArgument("empty attribute name"));
        }
        if vendor == Address::ZERO {
            return Err(KeyStoreError::InvalidArgument("zero vendor"));
        }
        let attribute =
            self.store
                .create_subject(caller, AssigneeHash::of_name(name), personalization)?;
        self.store.registry().write(|state| {
            state.ext_mut().vendors.insert(attribute, vendor);
            Ok::<_, KeyStoreError>(())
        })?;
        tracing::info!(%attribute, %vendor, name, "attribute registered");
        Ok(attribute)
    }

    pub fn attribute_of(&self, name: &str) -> Option<AttributeId> {
        self.store.registry().subject_of(&AssigneeHash::of_name(name))
    }

    pub fn vendor_of(&self, attribute: &AttributeId) -> Option<Address> {
        self.store.registry().read(|state| state.ext().vendor_of(attribute))
    }

    /// Destroy an attribute with its segments and vendor record.
    pub fn destroy_attribute(&self, caller: &Address, attribute: &AttributeId) -> Result<()> {
        self.store.destroy(caller, attribute)
    }

    /// Derive a key for `segment` under `attribute` (owner or vendor).
    pub fn link_segment(
        &self,
        caller: &Address,
        attribute: &AttributeId,
        segment: Blake3Hash,
        personalization: &[u8],
    ) -> Result<()> {
        let registry = self.store.registry();
        let entropy = registry.entropy();
        registry.write(|state| -> Result<()> {
            state.require_registered(attribute)?;
            let is_owner = state.access().owner() == *caller;
            if !is_owner && state.ext().vendor_of(attribute) != Some(*caller) {
                return Err(KeyStoreError::NotOwnerOrVendor(*caller));
            }
            let segments = state.ext_mut().segments.entry(*attribute).or_default();
            if segments.contains_key(&segment) {
                return Err(KeyStoreError::SegmentExists);
            }
            let mut seed = segment.as_bytes().to_vec();
            seed.extend_from_slice(personalization);
            segments.insert(segment, derive_key(entropy, attribute, &seed)?);
            Ok(())
        })?;

        registry.emit(RegistryEvent::SegmentLinked {
            subject: *attribute,
            segment,
        });
        Ok(())
    }

    /// Remove `segment` and its key (owner or vendor).
    pub fn unlink_segment(
        &self,
        caller: &Address,
        attribute: &AttributeId,
        segment: &Blake3Hash,
    ) -> Result<()> {
        let registry = self.store.registry();
        registry.write(|state| -> Result<()> {
            state.require_registered(attribute)?;
            let is_owner = state.access().owner() == *caller;
            if !is_owner && state.ext().vendor_of(attribute) != Some(*caller) {
                return Err(KeyStoreError::NotOwnerOrVendor(*caller));
            }
            let slots = state.ext_mut();
            let removed = slots
                .segments
                .get_mut(attribute)
                .and_then(|segments| segments.remove(segment));
            if slots.segments.get(attribute).is_some_and(|s| s.is_empty()) {
                slots.segments.remove(attribute);
            }
            removed.map(|_| ()).ok_or(KeyStoreError::SegmentNotLinked)
        })?;

        registry.emit(RegistryEvent::SegmentUnlinked {
            subject: *attribute,
            segment: *segment,
        });
        Ok(())
    }

    /// Release a segment key under the attribute's request rules.
    pub fn get_segment_key(
        &self,
        request: &SignedKeyRequest<AttributeId>,
        segment: &Blake3Hash,
    ) -> Result<SecretKey> {
        let attribute = self.store.authorize(request)?;
        self.store.registry().read(|state| {
            state
                .ext()
                .segments
                .get(&attribute)
                .and_then(|segments| segments.get(segment))
                .cloned()
                .ok_or(KeyStoreError::SegmentNotLinked)
        })
    }

    pub fn segment_count(&self, attribute: &AttributeId) -> usize {
        self.store
            .registry()
            .read(|state| state.ext().segment_count(attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KeyStoreConfig;
    use omnikey_core::{KeyRequest, Keypair, ManualClock, OsEntropy};
    use omnikey_core::{Component, Interface};
    use std::sync::Arc;

    struct StubPermitter(Address);

    impl Component for StubPermitter {
        fn address(&self) -> Address {
            self.0
        }

        fn supports_interface(&self, interface: Interface) -> bool {
            interface == Interface::Permitter
        }
    }

    struct Setup {
        linker: SegmentLinker,
        owner: Address,
        registrant: Address,
        vendor: Address,
    }

    fn setup() -> Setup {
        let owner = Address::derive("owner");
        let registrant = Address::derive("registrant");
        let store = KeyStore::new(
            Address::derive("attributes"),
            owner,
            Arc::new(OsEntropy),
            Arc::new(ManualClock::new(0)),
            &KeyStoreConfig::default(),
        )
        .unwrap();
        store
            .registry()
            .set_registrant(&owner, registrant, true)
            .unwrap();
        Setup {
            linker: SegmentLinker::new(store),
            owner,
            registrant,
            vendor: Address::derive("vendor"),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let s = setup();
        let attr = s
            .linker
            .register_attribute(&s.registrant, s.vendor, "age>18", b"")
            .unwrap();
        assert_eq!(s.linker.attribute_of("age>18"), Some(attr));
        assert_eq!(s.linker.vendor_of(&attr), Some(s.vendor));

        assert!(s
            .linker
            .register_attribute(&s.registrant, s.vendor, "age>18", b"")
            .is_err());
    }

    #[test]
    fn test_link_restricted_to_owner_or_vendor() {
        let s = setup();
        let attr = s
            .linker
            .register_attribute(&s.registrant, s.vendor, "country", b"")
            .unwrap();
        let segment = Blake3Hash::hash(b"eu");

        let err = s
            .linker
            .link_segment(&s.registrant, &attr, segment, b"")
            .unwrap_err();
        assert!(matches!(err, KeyStoreError::NotOwnerOrVendor(_)));

        s.linker.link_segment(&s.vendor, &attr, segment, b"").unwrap();
        assert!(matches!(
            s.linker.link_segment(&s.owner, &attr, segment, b""),
            Err(KeyStoreError::SegmentExists)
        ));
        s.linker.unlink_segment(&s.owner, &attr, &segment).unwrap();
        assert!(matches!(
            s.linker.unlink_segment(&s.vendor, &attr, &segment),
            Err(KeyStoreError::SegmentNotLinked)
        ));
    }

    #[test]
    fn test_segment_key_requires_authorization() {
        let s = setup();
        let attr = s
            .linker
            .register_attribute(&s.registrant, s.vendor, "country", b"")
            .unwrap();
        let segment = Blake3Hash::hash(b"eu");
        s.linker.link_segment(&s.vendor, &attr, segment, b"").unwrap();

        let stranger = Keypair::generate();
        let req = KeyRequest::new(attr, stranger.address(), 10)
            .sign(s.linker.store().verifier().domain(), &stranger)
            .unwrap();
        assert!(matches!(
            s.linker.get_segment_key(&req, &segment),
            Err(KeyStoreError::NotAuthorized(_))
        ));

        let permitter = StubPermitter(Address::derive("permitter"));
        let registry = s.linker.store().registry();
        registry.set_permitter(&s.owner, &permitter, true).unwrap();
        registry
            .grant_permit(&permitter.0, attr, stranger.address(), 100)
            .unwrap();

        let key = s.linker.get_segment_key(&req, &segment).unwrap();
        let attr_key = s.linker.store().get_key(&req).unwrap();
        assert_ne!(key, attr_key);
        assert!(matches!(
            s.linker.get_segment_key(&req, &Blake3Hash::hash(b"us")),
            Err(KeyStoreError::SegmentNotLinked)
        ));
    }

    #[test]
    fn test_destroy_clears_segments() {
        let s = setup();
        let attr = s
            .linker
            .register_attribute(&s.registrant, s.vendor, "country", b"")
            .unwrap();
        s.linker
            .link_segment(&s.vendor, &attr, Blake3Hash::hash(b"eu"), b"")
            .unwrap();
        assert_eq!(s.linker.segment_count(&attr), 1);

        s.linker.destroy_attribute(&s.registrant, &attr).unwrap();
        assert_eq!(s.linker.segment_count(&attr), 0);
        assert_eq!(s.linker.vendor_of(&attr), None);
        assert_eq!(s.linker.attribute_of("country"), None);
    }
}
