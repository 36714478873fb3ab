//! Entropy sources for handle and key derivation.
//!
//! [`OsEntropy`] is the confidential source: fresh OS randomness keyed into a
//! Blake3 XOF together with the caller's personalization.
//!
//! [`HashChainEntropy`] is the public fallback for hosts without a private
//! randomness facility. It seeds from the origin address, a monotonically
//! advancing link value, the current time and the personalization, then
//! expands by hashing chained with earlier link values. Anyone who can
//! observe those inputs can reproduce its output. It is NOT private and must
//! not be used for production key material.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use rand::RngCore;

use crate::clock::Clock;
use crate::crypto::Blake3Hash;
use crate::error::{CoreError, Result};
use crate::types::Address;

/// Number of historical link values kept by [`HashChainEntropy`].
pub const LINK_HISTORY: usize = 256;

/// Produces unpredictable byte sequences.
pub trait EntropySource: Send + Sync {
    /// Return `count` bytes mixed with `personalization`.
    fn random_bytes(&self, count: usize, personalization: &[u8]) -> Result<Vec<u8>>;

    /// Whether the output is private to this process.
    fn is_confidential(&self) -> bool;
}

impl<E: EntropySource + ?Sized> EntropySource for Arc<E> {
    fn random_bytes(&self, count: usize, personalization: &[u8]) -> Result<Vec<u8>> {
        (**self).random_bytes(count, personalization)
    }

    fn is_confidential(&self) -> bool {
        (**self).is_confidential()
    }
}

/// Confidential entropy backed by the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn random_bytes(&self, count: usize, personalization: &[u8]) -> Result<Vec<u8>> {
        if count == 0 {
            return Err(CoreError::ZeroLengthEntropy);
        }

        let mut seed = [0u8; 32];
        rand::rngs::OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| CoreError::Entropy(e.to_string()))?;

        let mut hasher = blake3::Hasher::new_keyed(&seed);
        hasher.update(personalization);
        let mut out = vec![0u8; count];
        hasher.finalize_xof().fill(&mut out);
        Ok(out)
    }

    fn is_confidential(&self) -> bool {
        true
    }
}

struct ChainState {
    counter: u64,
    links: VecDeque<Blake3Hash>,
}

/// Deterministic, observer-reproducible fallback entropy.
pub struct HashChainEntropy {
    origin: Address,
    clock: Arc<dyn Clock>,
    state: Mutex<ChainState>,
}

impl HashChainEntropy {
    pub fn new(origin: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            origin,
            clock,
            state: Mutex::new(ChainState {
                counter: 0,
                links: VecDeque::with_capacity(LINK_HISTORY),
            }),
        }
    }
}

impl EntropySource for HashChainEntropy {
    fn random_bytes(&self, count: usize, personalization: &[u8]) -> Result<Vec<u8>> {
        if count == 0 {
            return Err(CoreError::ZeroLengthEntropy);
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.counter += 1;

        let prev = state.links.back().copied().unwrap_or(Blake3Hash::ZERO);
        let link = Blake3Hash::derive(
            "omnikey 2024 entropy link",
            &[
                prev.as_bytes(),
                &state.counter.to_le_bytes(),
                &self.clock.now().to_le_bytes(),
            ],
        );
        if state.links.len() == LINK_HISTORY {
            state.links.pop_front();
        }
        state.links.push_back(link);

        let mut block = Blake3Hash::derive(
            "omnikey 2024 entropy seed",
            &[self.origin.as_bytes(), link.as_bytes(), personalization],
        );

        let mut out = Vec::with_capacity(count + 32);
        let len = state.links.len();
        let mut i: u64 = 0;
        while out.len() < count {
            let historical = state.links[len - 1 - (i as usize % len)];
            block = Blake3Hash::derive(
                "omnikey 2024 entropy expand",
                &[block.as_bytes(), &i.to_le_bytes(), historical.as_bytes()],
            );
            out.extend_from_slice(block.as_bytes());
            i += 1;
        }
        out.truncate(count);
        Ok(out)
    }

    fn is_confidential(&self) -> bool {
        false
    }
}
