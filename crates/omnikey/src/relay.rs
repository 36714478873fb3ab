//! Relayer client.
//!
//! An off-chain relayer provisions identities by submitting a creation and
//! then polling until the identity becomes visible. [`IdentityGateway`] is the
//! seam to whatever executes those calls; [`LocalGateway`] runs them against
//! an in-process key store.

use std::sync::Arc;

use async_trait::async_trait;

use omnikey_core::{Address, IdentityId, Subject};
use omnikey_keystore::KeyStore;

use crate::config::RetryPolicy;
use crate::error::Result;

/// Submits identity calls on behalf of a relayer.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Current identity for `assignee`, if any.
    async fn fetch_identity(&self, assignee: &Address) -> Result<Option<IdentityId>>;

    /// Submit an identity creation for `assignee`.
    async fn create_identity(&self, assignee: &Address) -> Result<IdentityId>;
}

/// Fetch the identity for `assignee`, creating it first if it does not exist.
///
/// Returns `Ok(None)` if the identity never became visible within the
/// policy's attempts. Retryable fetch errors are logged and count as an empty
/// attempt; any other error aborts.
pub async fn ensure_identity<G: IdentityGateway + ?Sized>(
    gateway: &G,
    assignee: &Address,
    policy: &RetryPolicy,
) -> Result<Option<IdentityId>> {
    match gateway.fetch_identity(assignee).await {
        Ok(Some(id)) if !id.is_zero() => return Ok(Some(id)),
        Ok(_) => {}
        Err(e) if e.is_retryable() => {
            tracing::warn!(%assignee, error = %e, "initial identity fetch failed");
        }
        Err(e) => return Err(e),
    }

    let submitted = gateway.create_identity(assignee).await?;
    tracing::info!(%assignee, identity = %submitted, "identity creation submitted");

    tokio::time::sleep(policy.initial_delay()).await;

    let attempts = policy.attempts();
    for (attempt, delay) in policy.retry_delays().enumerate() {
        match gateway.fetch_identity(assignee).await {
            Ok(Some(id)) if !id.is_zero() => return Ok(Some(id)),
            Ok(_) => {
                tracing::debug!(%assignee, attempt, "identity not visible yet");
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(%assignee, attempt, error = %e, "identity fetch failed");
            }
            Err(e) => return Err(e),
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::warn!(%assignee, attempts, "identity never became visible");
    Ok(None)
}

/// Gateway over an in-process key store, submitting as `registrant`.
pub struct LocalGateway {
    keystore: Arc<KeyStore<IdentityId>>,
    registrant: Address,
}

impl LocalGateway {
    pub fn new(keystore: Arc<KeyStore<IdentityId>>, registrant: Address) -> Self {
        Self {
            keystore,
            registrant,
        }
    }
}

#[async_trait]
impl IdentityGateway for LocalGateway {
    async fn fetch_identity(&self, assignee: &Address) -> Result<Option<IdentityId>> {
        Ok(self.keystore.registry().identity_of(assignee))
    }

    async fn create_identity(&self, assignee: &Address) -> Result<IdentityId> {
        Ok(self
            .keystore
            .create_identity(&self.registrant, assignee, assignee.as_bytes())?)
    }
}
