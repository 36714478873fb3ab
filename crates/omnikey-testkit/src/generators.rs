//! Proptest generators for property-based testing.

use proptest::prelude::*;

use omnikey_core::{
    Address, AssigneeHash, AttributeId, Blake3Hash, IdentityId, Keypair, SecretKey,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a non-zero address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>()
        .prop_filter("non-zero", |b| b.iter().any(|x| *x != 0))
        .prop_map(Address::from_bytes)
}

/// Generate a non-zero identity handle.
pub fn identity_id() -> impl Strategy<Value = IdentityId> {
    (1u128..=u128::MAX).prop_map(IdentityId)
}

/// Generate a non-zero attribute handle.
pub fn attribute_id() -> impl Strategy<Value = AttributeId> {
    any::<[u8; 32]>()
        .prop_filter("non-zero", |b| b.iter().any(|x| *x != 0))
        .prop_map(AttributeId)
}

/// Generate an assignee hash from an arbitrary account.
pub fn assignee() -> impl Strategy<Value = AssigneeHash> {
    address().prop_map(|a| AssigneeHash::of(&a))
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// Generate set key material.
pub fn secret_key() -> impl Strategy<Value = SecretKey> {
    any::<[u8; 32]>()
        .prop_filter("set", |b| b.iter().any(|x| *x != 0))
        .prop_map(SecretKey::from_bytes)
}

/// Generate personalization bytes.
pub fn personalization() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=64)
}

/// Generate a permit duration between one second and one day.
pub fn duration() -> impl Strategy<Value = i64> {
    1_000i64..=86_400_000i64
}

/// One step of a permit lifecycle, against a small pool of holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitStep {
    Grant { holder: usize, duration: i64 },
    Revoke { holder: usize },
    Advance { millis: i64 },
}

/// Size of the holder pool [`PermitStep`] indexes into.
pub const HOLDER_POOL: usize = 4;

impl Arbitrary for PermitStep {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            3 => (0..HOLDER_POOL, duration())
                .prop_map(|(holder, duration)| PermitStep::Grant { holder, duration }),
            2 => (0..HOLDER_POOL).prop_map(|holder| PermitStep::Revoke { holder }),
            2 => (0i64..=172_800_000i64).prop_map(|millis| PermitStep::Advance { millis }),
        ]
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnikey_core::Subject;

    proptest! {
        #[test]
        fn test_generated_subjects_are_non_zero(id in identity_id(), attr in attribute_id()) {
            prop_assert!(!id.is_zero());
            prop_assert!(!attr.is_zero());
        }

        #[test]
        fn test_steps_stay_in_pool(step: PermitStep) {
            match step {
                PermitStep::Grant { holder, duration } => {
                    prop_assert!(holder < HOLDER_POOL);
                    prop_assert!(duration > 0);
                }
                PermitStep::Revoke { holder } => prop_assert!(holder < HOLDER_POOL),
                PermitStep::Advance { millis } => prop_assert!(millis >= 0),
            }
        }

        #[test]
        fn test_secret_keys_are_set(key in secret_key()) {
            prop_assert!(!key.is_unset());
        }
    }
}
