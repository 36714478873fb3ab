//! Capability probing.
//!
//! Components that take part in delegation (registries, permitters) answer an
//! interface-support query. Wiring code probes each component once, at
//! construction time, and fails closed on an unsupported answer.

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Interfaces a component can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interface {
    /// Records permits on behalf of allow-listed permitters.
    Registry,
    /// Authorizes permit acquisition and forwards it upstream.
    Permitter,
    /// Releases key material against signed requests.
    KeyStore,
}

/// Whether an upstream is the terminal registry or another permitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpstreamKind {
    Registry,
    Permitter,
}

/// A permitter's upstream, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Upstream {
    pub address: Address,
    pub kind: UpstreamKind,
}

/// Anything that can be wired by address and probed for capabilities.
pub trait Component: Send + Sync {
    /// Address this component is deployed at.
    fn address(&self) -> Address;

    /// Answer a capability probe.
    fn supports_interface(&self, interface: Interface) -> bool;

    /// The next hop towards the registry, for permitters.
    fn upstream(&self) -> Option<Upstream> {
        None
    }
}
