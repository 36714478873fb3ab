//! Component directory.
//!
//! Deployed components are wired by address. The directory answers
//! capability probes for any address and hands out the registry interface
//! for addresses that host one. Unknown addresses fail closed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use omnikey_core::{Address, Component, Interface, Subject, Upstream};

use crate::error::{RegistryError, Result};
use crate::interface::PermitRegistry;

/// A wired component.
pub enum Entry<K> {
    /// A terminal registry.
    Registry(Arc<dyn PermitRegistry<K>>),
    /// Anything else: permitters, gatekeepers.
    Component(Arc<dyn Component>),
}

impl<K> Clone for Entry<K> {
    fn clone(&self) -> Self {
        match self {
            Entry::Registry(r) => Entry::Registry(Arc::clone(r)),
            Entry::Component(c) => Entry::Component(Arc::clone(c)),
        }
    }
}

impl<K: Subject> Entry<K> {
    pub fn address(&self) -> Address {
        match self {
            Entry::Registry(r) => r.address(),
            Entry::Component(c) => c.address(),
        }
    }

    pub fn supports(&self, interface: Interface) -> bool {
        match self {
            Entry::Registry(r) => r.supports_interface(interface),
            Entry::Component(c) => c.supports_interface(interface),
        }
    }

    pub fn upstream(&self) -> Option<Upstream> {
        match self {
            Entry::Registry(r) => r.upstream(),
            Entry::Component(c) => c.upstream(),
        }
    }
}

/// Address-keyed table of wired components.
pub struct Directory<K> {
    entries: RwLock<HashMap<Address, Entry<K>>>,
}

impl<K> Default for Directory<K> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Subject> Directory<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, entry: Entry<K>) -> Result<()> {
        let address = entry.address();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&address) {
            return Err(RegistryError::AddressTaken(address));
        }
        tracing::debug!(%address, "component wired");
        entries.insert(address, entry);
        Ok(())
    }

    /// Wire a registry at its own address.
    pub fn register_registry(&self, registry: Arc<dyn PermitRegistry<K>>) -> Result<()> {
        self.insert(Entry::Registry(registry))
    }

    /// Wire a non-registry component at its own address.
    pub fn register(&self, component: Arc<dyn Component>) -> Result<()> {
        self.insert(Entry::Component(component))
    }

    pub fn get(&self, address: &Address) -> Option<Entry<K>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    /// Probe `address` for `interface`.
    pub fn probe(&self, address: &Address, interface: Interface) -> Result<bool> {
        self.get(address)
            .map(|entry| entry.supports(interface))
            .ok_or(RegistryError::UnknownComponent(*address))
    }

    /// The registry interface at `address`.
    pub fn registry(&self, address: &Address) -> Result<Arc<dyn PermitRegistry<K>>> {
        match self.get(address) {
            Some(Entry::Registry(registry)) if registry.supports_interface(Interface::Registry) => {
                Ok(registry)
            }
            Some(_) => Err(RegistryError::UnsupportedInterface(*address)),
            None => Err(RegistryError::UnknownComponent(*address)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
