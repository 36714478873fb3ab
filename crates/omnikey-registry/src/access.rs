//! Owner, allow-lists and the pause flag.

use std::collections::HashSet;

use omnikey_core::Address;

use crate::error::{RegistryError, Result};

/// Administrative state owned by one registry instance.
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: Address,
    permitters: HashSet<Address>,
    registrants: HashSet<Address>,
    paused: bool,
}

impl AccessControl {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            permitters: HashSet::new(),
            registrants: HashSet::new(),
            paused: false,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_permitter(&self, account: &Address) -> bool {
        self.permitters.contains(account)
    }

    pub fn is_registrant(&self, account: &Address) -> bool {
        self.registrants.contains(account)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn require_owner(&self, caller: &Address) -> Result<()> {
        if *caller != self.owner {
            return Err(RegistryError::NotOwner(*caller));
        }
        Ok(())
    }

    pub fn require_registrant(&self, caller: &Address) -> Result<()> {
        if !self.is_registrant(caller) {
            return Err(RegistryError::NotRegistrant(*caller));
        }
        Ok(())
    }

    pub fn require_permitter(&self, caller: &Address) -> Result<()> {
        if !self.is_permitter(caller) {
            return Err(RegistryError::NotPermitter(*caller));
        }
        Ok(())
    }

    /// Owner or registrant.
    pub fn require_owner_or_registrant(&self, caller: &Address) -> Result<()> {
        if *caller == self.owner || self.is_registrant(caller) {
            return Ok(());
        }
        Err(RegistryError::NotRegistrant(*caller))
    }

    pub fn require_paused(&self) -> Result<()> {
        if !self.paused {
            return Err(RegistryError::NotPaused);
        }
        Ok(())
    }

    pub(crate) fn set_permitter(&mut self, permitter: Address, allowed: bool) {
        if allowed {
            self.permitters.insert(permitter);
        } else {
            self.permitters.remove(&permitter);
        }
    }

    pub(crate) fn set_registrant(&mut self, registrant: Address, allowed: bool) {
        if allowed {
            self.registrants.insert(registrant);
        } else {
            self.registrants.remove(&registrant);
        }
    }

    pub(crate) fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub(crate) fn set_owner(&mut self, owner: Address) {
        self.owner = owner;
    }
}
