//! Strong type definitions for Omnikey.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::Blake3Hash;
use crate::error::CoreError;

/// An account or component address (32 bytes).
///
/// Accounts are addressed by their Ed25519 verifying key. Components
/// (registries, permitters) get an address assigned at deployment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a component address from a human-readable label.
    pub fn derive(label: &str) -> Self {
        Self(Blake3Hash::derive("omnikey 2024 component address", &[label.as_bytes()]).0)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The zero address (no account).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Hash of an external assignee identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssigneeHash(pub Blake3Hash);

impl AssigneeHash {
    /// Hash an account address into its assignee form.
    pub fn of(address: &Address) -> Self {
        Self(Blake3Hash::derive("omnikey 2024 assignee", &[address.as_bytes()]))
    }

    /// Hash an arbitrary external identifier (an attribute name, a legacy id).
    pub fn of_name(name: &str) -> Self {
        Self(Blake3Hash::derive("omnikey 2024 assignee", &[name.as_bytes()]))
    }

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Debug for AssigneeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assignee({})", &self.0.to_hex()[..16])
    }
}

/// A key a registry can be indexed by: an identity handle or an attribute key.
///
/// Both registry variants are structurally identical; only the subject type
/// differs. The all-zero value is reserved as "absent".
pub trait Subject:
    Copy
    + Eq
    + Hash
    + Ord
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Number of entropy bytes needed to derive a fresh handle.
    const WIDTH: usize;

    /// Build a handle from exactly `WIDTH` entropy bytes.
    fn from_entropy(bytes: &[u8]) -> Result<Self, CoreError>;

    /// Whether this is the reserved zero handle.
    fn is_zero(&self) -> bool;

    /// Fixed-width big-endian encoding used in signed requests.
    fn to_bytes(&self) -> Vec<u8>;
}

/// Opaque numeric identity handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub u128);

impl IdentityId {
    /// The zero handle (no identity).
    pub const ZERO: Self = Self(0);
}

impl Subject for IdentityId {
    const WIDTH: usize = 16;

    fn from_entropy(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: Self::WIDTH,
            actual: bytes.len(),
        })?;
        Ok(Self(u128::from_be_bytes(arr)))
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({:032x})", self.0)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for IdentityId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

/// Attribute key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub [u8; 32]);

impl AttributeId {
    /// The zero attribute key.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Subject for AttributeId {
    const WIDTH: usize = 32;

    fn from_entropy(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: Self::WIDTH,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Secret key material (32 bytes), wiped on drop.
///
/// The all-zero value means "unset".
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a derived byte slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The unset sentinel.
    pub const fn unset() -> Self {
        Self([0u8; 32])
    }

    /// Whether this slot holds no key.
    pub fn is_unset(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "SecretKey(unset)")
        } else {
            write!(f, "SecretKey(<redacted>)")
        }
    }
}
