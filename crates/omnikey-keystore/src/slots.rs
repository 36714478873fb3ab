//! Key slots kept alongside registry state.
//!
//! Every registered subject has a primary key, derived on creation or
//! supplied by migration. A secondary key may be provisioned ahead of a
//! rotation. Segment keys hang off attributes.

use std::collections::HashMap;

use omnikey_core::{Address, Blake3Hash, CoreError, EntropySource, SecretKey, Subject};
use omnikey_registry::RegistryExtension;

/// Derive fresh key material for `subject`.
pub(crate) fn derive_key<K: Subject>(
    entropy: &dyn EntropySource,
    subject: &K,
    personalization: &[u8],
) -> Result<SecretKey, CoreError> {
    let mut seed = subject.to_bytes();
    seed.extend_from_slice(personalization);
    let bytes = entropy.random_bytes(32, &seed)?;
    SecretKey::from_slice(&bytes)
}

/// Per-subject key material.
pub struct KeySlots<K> {
    pub(crate) primary: HashMap<K, SecretKey>,
    pub(crate) secondary: HashMap<K, SecretKey>,
    pub(crate) segments: HashMap<K, HashMap<Blake3Hash, SecretKey>>,
    pub(crate) vendors: HashMap<K, Address>,
}

impl<K> Default for KeySlots<K> {
    fn default() -> Self {
        Self {
            primary: HashMap::new(),
            secondary: HashMap::new(),
            segments: HashMap::new(),
            vendors: HashMap::new(),
        }
    }
}

impl<K: Subject> KeySlots<K> {
    pub fn has_primary(&self, subject: &K) -> bool {
        self.primary.contains_key(subject)
    }

    pub fn has_secondary(&self, subject: &K) -> bool {
        self.secondary.contains_key(subject)
    }

    pub fn vendor_of(&self, subject: &K) -> Option<Address> {
        self.vendors.get(subject).copied()
    }

    pub fn segment_count(&self, subject: &K) -> usize {
        self.segments.get(subject).map_or(0, HashMap::len)
    }
}

impl<K: Subject> RegistryExtension<K> for KeySlots<K> {
    fn on_create(
        &mut self,
        subject: K,
        entropy: &dyn EntropySource,
        personalization: &[u8],
    ) -> Result<(), CoreError> {
        let key = derive_key(entropy, &subject, personalization)?;
        self.primary.insert(subject, key);
        Ok(())
    }

    fn on_destroy(&mut self, subject: &K) {
        self.primary.remove(subject);
        self.secondary.remove(subject);
        self.segments.remove(subject);
        self.vendors.remove(subject);
    }

    fn on_import(&mut self, subject: K, secret: SecretKey) {
        self.primary.insert(subject, secret);
    }
}
