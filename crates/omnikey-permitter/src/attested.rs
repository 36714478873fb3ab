//! Attestation-gated policy.
//!
//! Before anything is acquired or released, the authorization blob is handed
//! to an [`AttestationVerifier`]. The verifier is opaque: it accepts or
//! rejects, and reports the measurement registers it saw plus an optional
//! message hash. The policy then checks the selected registers against the
//! expected [`MeasurementSelector`].

use serde::{Deserialize, Serialize};

use omnikey_core::{Address, Blake3Hash, Subject};

use crate::error::{PermitterError, Result};
use crate::policy::{PermitContext, PermitPolicy};

const MEASUREMENT_CONTEXT: &str = "omnikey/measurement/v1";

/// Result of verifying an attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    /// Measurement registers reported by the attested environment.
    pub measurements: Vec<Blake3Hash>,
    /// Hash of the attested message, logged for auditability.
    pub message_hash: Option<Blake3Hash>,
}

impl Verdict {
    pub fn reject() -> Self {
        Self {
            accepted: false,
            measurements: Vec::new(),
            message_hash: None,
        }
    }
}

/// Verifies remote-attestation proofs.
pub trait AttestationVerifier: Send + Sync + 'static {
    fn verify(&self, requester: &Address, context: &[u8], proof: &[u8]) -> Verdict;
}

/// Expected measurements: a register mask and the hash over the selected
/// registers, in register order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSelector {
    pub mask: u32,
    pub hash: Blake3Hash,
}

impl MeasurementSelector {
    /// Build the selector matching `registers` under `mask`.
    pub fn from_registers(mask: u32, registers: &[Blake3Hash]) -> Self {
        Self {
            mask,
            hash: Self::digest(mask, registers),
        }
    }

    fn digest(mask: u32, registers: &[Blake3Hash]) -> Blake3Hash {
        let selected: Vec<&[u8]> = registers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < 32 && mask & (1 << i) != 0)
            .map(|(_, r)| r.as_bytes().as_slice())
            .collect();
        Blake3Hash::derive(MEASUREMENT_CONTEXT, &selected)
    }

    /// Whether `registers` produce the expected hash. Registers the mask
    /// selects must all be present.
    pub fn matches(&self, registers: &[Blake3Hash]) -> bool {
        let highest = 32 - self.mask.leading_zeros() as usize;
        registers.len() >= highest && Self::digest(self.mask, registers) == self.hash
    }
}

/// Policy requiring a verified attestation matching `selector`.
pub struct Attested<V> {
    verifier: V,
    selector: MeasurementSelector,
}

impl<V: AttestationVerifier> Attested<V> {
    pub fn new(verifier: V, selector: MeasurementSelector) -> Self {
        Self { verifier, selector }
    }

    pub fn selector(&self) -> &MeasurementSelector {
        &self.selector
    }

    fn check<K: Subject>(&self, ctx: &PermitContext<'_, K>) -> Result<()> {
        let verdict = self
            .verifier
            .verify(&ctx.requester, ctx.context, ctx.authorization);
        if !verdict.accepted {
            return Err(PermitterError::AttestationRejected);
        }
        if !self.selector.matches(&verdict.measurements) {
            return Err(PermitterError::MeasurementMismatch);
        }
        match verdict.message_hash {
            Some(hash) => tracing::info!(
                subject = %ctx.subject,
                requester = %ctx.requester,
                message = %hash.to_hex(),
                "attestation accepted"
            ),
            None => tracing::info!(
                subject = %ctx.subject,
                requester = %ctx.requester,
                "attestation accepted"
            ),
        }
        Ok(())
    }
}

impl<K: Subject, V: AttestationVerifier> PermitPolicy<K> for Attested<V> {
    fn before_acquire(&self, ctx: &PermitContext<'_, K>) -> Result<()> {
        self.check(ctx)
    }

    fn acquire(&self, ctx: &PermitContext<'_, K>) -> Result<i64> {
        Ok(ctx.requested_expiry())
    }

    fn before_release(&self, ctx: &PermitContext<'_, K>) -> Result<()> {
        self.check(ctx)
    }

    fn release(&self, _ctx: &PermitContext<'_, K>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permitter::{Permitter, PermitterConfig};
    use omnikey_core::{IdentityId, ManualClock, OsEntropy};
    use omnikey_registry::{Directory, Registry};
    use std::sync::Arc;

    fn registers() -> Vec<Blake3Hash> {
        vec![
            Blake3Hash::hash(b"firmware"),
            Blake3Hash::hash(b"kernel"),
            Blake3Hash::hash(b"app"),
        ]
    }

    /// Accepts proofs equal to `b"ok"`, reporting `measurements`.
    struct FixedVerifier {
        measurements: Vec<Blake3Hash>,
    }

    impl AttestationVerifier for FixedVerifier {
        fn verify(&self, _requester: &Address, _context: &[u8], proof: &[u8]) -> Verdict {
            if proof != b"ok" {
                return Verdict::reject();
            }
            Verdict {
                accepted: true,
                measurements: self.measurements.clone(),
                message_hash: Some(Blake3Hash::hash(proof)),
            }
        }
    }

    #[test]
    fn test_selector_ignores_unmasked_registers() {
        let selector = MeasurementSelector::from_registers(0b101, &registers());
        let mut other = registers();
        other[1] = Blake3Hash::hash(b"different kernel");
        assert!(selector.matches(&other));

        other[2] = Blake3Hash::hash(b"different app");
        assert!(!selector.matches(&other));
    }

    #[test]
    fn test_selector_requires_selected_registers() {
        let selector = MeasurementSelector::from_registers(0b100, &registers());
        assert!(!selector.matches(&registers()[..2]));
    }

    fn permitter(measurements: Vec<Blake3Hash>) -> (Arc<Registry<IdentityId>>, Permitter<IdentityId, Attested<FixedVerifier>>) {
        let owner = Address::derive("owner");
        let clock = ManualClock::new(0);
        let registry = Arc::new(Registry::new(
            Address::derive("registry"),
            owner,
            Arc::new(OsEntropy),
            Arc::new(clock.clone()),
        ));
        let directory = Directory::new();
        directory.register_registry(registry.clone()).unwrap();
        let policy = Attested::new(
            FixedVerifier { measurements },
            MeasurementSelector::from_registers(0b111, &registers()),
        );
        let permitter = Permitter::new(
            Address::derive("attested"),
            registry.address(),
            &directory,
            policy,
            Arc::new(clock),
            PermitterConfig::default(),
        )
        .unwrap();
        registry.set_permitter(&owner, &permitter, true).unwrap();
        (registry, permitter)
    }

    #[test]
    fn test_valid_attestation_grants() {
        let (registry, permitter) = permitter(registers());
        let alice = Address::derive("alice");
        permitter
            .acquire(&alice, &[IdentityId(4)], alice, 60, b"ctx", b"ok")
            .unwrap();
        assert_eq!(registry.read_permit(&alice, &IdentityId(4)), 60);
    }

    #[test]
    fn test_rejected_proof() {
        let (registry, permitter) = permitter(registers());
        let alice = Address::derive("alice");
        let err = permitter
            .acquire(&alice, &[IdentityId(4)], alice, 60, b"ctx", b"forged")
            .unwrap_err();
        assert!(matches!(err, PermitterError::AttestationRejected));
        assert_eq!(registry.read_permit(&alice, &IdentityId(4)), 0);
    }

    #[test]
    fn test_wrong_measurement() {
        let mut measured = registers();
        measured[0] = Blake3Hash::hash(b"patched firmware");
        let (_registry, permitter) = permitter(measured);
        let alice = Address::derive("alice");
        let err = permitter
            .release(&alice, &[IdentityId(4)], alice, b"ctx", b"ok")
            .unwrap_err();
        assert!(matches!(err, PermitterError::MeasurementMismatch));
    }
}
