//! Signed, time-limited key requests.
//!
//! A requester asks a key store for secret material by signing a
//! `{subject, requester, expiry}` tuple under the store's signing domain.
//! Requests are never persisted; they are verified once per call.

use serde::{Deserialize, Serialize};

use crate::canonical::{domain_separator, request_bytes, sign_message};
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::{CoreError, Result};
use crate::types::{Address, Subject};

/// Signing domain of a key store: binds signatures to one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    /// Registry name, e.g. `"OmniKeyStore"`.
    pub name: String,
    /// Registry version string.
    pub version: String,
    /// Address of the verifying registry.
    pub registry: Address,
}

impl SigningDomain {
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: Address) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry,
        }
    }

    /// Hash of this domain.
    pub fn separator(&self) -> Result<Blake3Hash> {
        domain_separator(&self.name, &self.version, &self.registry)
    }
}

/// The unsigned request tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest<K> {
    /// Identity or attribute whose key is requested.
    pub subject: K,
    /// Account the request is made on behalf of.
    pub requester: Address,
    /// Request expiry (Unix milliseconds).
    pub expiry: i64,
}

impl<K: Subject> KeyRequest<K> {
    pub fn new(subject: K, requester: Address, expiry: i64) -> Self {
        Self {
            subject,
            requester,
            expiry,
        }
    }

    /// The exact bytes a signer signs under `domain`.
    pub fn signing_message(&self, domain: &Blake3Hash) -> Result<Vec<u8>> {
        let bytes = request_bytes(&self.subject.to_bytes(), &self.requester, self.expiry)?;
        Ok(sign_message(domain, &bytes))
    }

    /// Sign this request.
    pub fn sign(self, domain: &Blake3Hash, keypair: &Keypair) -> Result<SignedKeyRequest<K>> {
        let message = self.signing_message(domain)?;
        Ok(SignedKeyRequest {
            request: self,
            signer: keypair.public_key(),
            signature: keypair.sign(&message),
        })
    }
}

/// A request plus the claimed signer and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedKeyRequest<K> {
    pub request: KeyRequest<K>,
    /// Claimed signer. Ed25519 has no key recovery, so the key travels with
    /// the signature and is checked against it.
    pub signer: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

impl<K: Subject> SignedKeyRequest<K> {
    pub fn subject(&self) -> K {
        self.request.subject
    }

    pub fn requester(&self) -> Address {
        self.request.requester
    }
}

/// Verifies signed key requests for one signing domain.
#[derive(Debug, Clone)]
pub struct RequestVerifier {
    domain: Blake3Hash,
}

impl RequestVerifier {
    pub fn new(domain: &SigningDomain) -> Result<Self> {
        Ok(Self {
            domain: domain.separator()?,
        })
    }

    /// The domain separator requests must be signed under.
    pub fn domain(&self) -> &Blake3Hash {
        &self.domain
    }

    /// Verify `signed` at time `now` and return the signer's address.
    ///
    /// Fails with `RequestExpired` once `expiry <= now`, and with
    /// `InvalidSignature` if the signature does not match the claimed signer.
    pub fn verify<K: Subject>(&self, signed: &SignedKeyRequest<K>, now: i64) -> Result<Address> {
        if signed.request.expiry <= now {
            return Err(CoreError::RequestExpired {
                expiry: signed.request.expiry,
                now,
            });
        }
        let message = signed.request.signing_message(&self.domain)?;
        signed.signer.verify(&message, &signed.signature)?;
        Ok(signed.signer.address())
    }
}
