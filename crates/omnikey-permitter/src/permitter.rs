//! The permitter driver.
//!
//! A [`Permitter`] owns a policy and a fixed upstream. At construction it
//! probes the upstream, then walks the upstream chain until it reaches the
//! terminal registry. Every batch is authorized subject by subject, then
//! committed to that registry in a single call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use omnikey_core::{Address, Clock, Component, Interface, Subject, Upstream, UpstreamKind};
use omnikey_registry::{Directory, PermitOp, PermitRegistry, RegistryError};

use crate::error::{PermitterError, Result};
use crate::policy::{PermitContext, PermitPolicy};

/// Configuration for a permitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermitterConfig {
    /// Upper bound on permitters traversed while resolving the registry.
    pub max_upstream_hops: usize,
    /// Cap on any permit lifetime (milliseconds). `None` leaves the policy's
    /// expiry untouched.
    pub max_duration: Option<i64>,
}

impl Default for PermitterConfig {
    fn default() -> Self {
        Self {
            max_upstream_hops: 8,
            max_duration: None,
        }
    }
}

/// Classify `address` by capability probe.
pub fn probe_upstream<K: Subject>(directory: &Directory<K>, address: Address) -> Result<Upstream> {
    let kind = if directory.probe(&address, Interface::Registry)? {
        UpstreamKind::Registry
    } else if directory.probe(&address, Interface::Permitter)? {
        UpstreamKind::Permitter
    } else {
        return Err(PermitterError::UnsupportedUpstream(address));
    };
    Ok(Upstream { address, kind })
}

/// Walk upstream from `start` until a registry answers.
///
/// At most `max_hops` permitters are traversed; a longer chain (or a cycle)
/// fails with `UpstreamCycle`.
pub fn resolve_registry<K: Subject>(
    directory: &Directory<K>,
    start: Address,
    max_hops: usize,
) -> Result<Arc<dyn PermitRegistry<K>>> {
    let mut current = start;
    for _ in 0..=max_hops {
        let entry = directory
            .get(&current)
            .ok_or(RegistryError::UnknownComponent(current))?;
        if entry.supports(Interface::Registry) {
            return Ok(directory.registry(&current)?);
        }
        if !entry.supports(Interface::Permitter) {
            return Err(PermitterError::UnsupportedUpstream(current));
        }
        current = entry
            .upstream()
            .ok_or(PermitterError::UnsupportedUpstream(current))?
            .address;
    }
    Err(PermitterError::UpstreamCycle { hops: max_hops })
}

/// Permitter: policy plus fixed upstream.
pub struct Permitter<K: Subject, P> {
    address: Address,
    upstream: Upstream,
    registry: Arc<dyn PermitRegistry<K>>,
    policy: P,
    clock: Arc<dyn Clock>,
    config: PermitterConfig,
}

impl<K: Subject, P: PermitPolicy<K>> Permitter<K, P> {
    /// Wire a permitter at `address` delegating to `upstream`.
    ///
    /// Fails without side effects if the upstream answers neither probe or
    /// no registry is reachable.
    pub fn new(
        address: Address,
        upstream: Address,
        directory: &Directory<K>,
        policy: P,
        clock: Arc<dyn Clock>,
        config: PermitterConfig,
    ) -> Result<Self> {
        let upstream = probe_upstream(directory, upstream)?;
        let registry = resolve_registry(directory, upstream.address, config.max_upstream_hops)?;
        tracing::info!(
            %address,
            upstream = %upstream.address,
            kind = ?upstream.kind,
            registry = %registry.address(),
            "permitter wired"
        );
        Ok(Self {
            address,
            upstream,
            registry,
            policy,
            clock,
            config,
        })
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<dyn PermitRegistry<K>> {
        &self.registry
    }

    pub fn config(&self) -> &PermitterConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    fn cap(&self, expiry: i64, now: i64) -> i64 {
        match self.config.max_duration {
            Some(max) => expiry.min(now.saturating_add(max)),
            None => expiry,
        }
    }

    /// Acquire permits for `requester` on every subject. Returns the expiry
    /// recorded for each subject, in order.
    pub fn acquire(
        &self,
        caller: &Address,
        subjects: &[K],
        requester: Address,
        duration: i64,
        context: &[u8],
        authorization: &[u8],
    ) -> Result<Vec<i64>> {
        if subjects.is_empty() {
            return Err(PermitterError::InvalidArgument("empty batch"));
        }
        if duration <= 0 {
            return Err(PermitterError::InvalidArgument("non-positive duration"));
        }

        let now = self.clock.now();
        let mut staged = Vec::with_capacity(subjects.len());
        for &subject in subjects {
            let ctx = PermitContext {
                subject,
                requester,
                caller: *caller,
                duration,
                context,
                authorization,
                now,
            };
            self.policy.before_acquire(&ctx).map_err(|e| {
                tracing::warn!(%subject, %caller, error = %e, "acquire rejected");
                e
            })?;
            let expiry = self.cap(self.policy.acquire(&ctx)?, now);
            staged.push((ctx, expiry));
        }
        for (ctx, expiry) in &staged {
            self.policy.after_acquire(ctx, *expiry)?;
        }

        let ops: Vec<_> = staged
            .iter()
            .map(|(ctx, expiry)| PermitOp::Grant {
                subject: ctx.subject,
                holder: requester,
                expiry: *expiry,
            })
            .collect();
        self.registry.apply_permits(&self.address, &ops)?;

        tracing::debug!(%requester, count = ops.len(), "permits acquired");
        Ok(staged.into_iter().map(|(_, expiry)| expiry).collect())
    }

    /// Release `requester`'s permits on every subject.
    pub fn release(
        &self,
        caller: &Address,
        subjects: &[K],
        requester: Address,
        context: &[u8],
        authorization: &[u8],
    ) -> Result<()> {
        if subjects.is_empty() {
            return Err(PermitterError::InvalidArgument("empty batch"));
        }

        let now = self.clock.now();
        let mut staged = Vec::with_capacity(subjects.len());
        for &subject in subjects {
            let ctx = PermitContext {
                subject,
                requester,
                caller: *caller,
                duration: 0,
                context,
                authorization,
                now,
            };
            self.policy.before_release(&ctx).map_err(|e| {
                tracing::warn!(%subject, %caller, error = %e, "release rejected");
                e
            })?;
            self.policy.release(&ctx)?;
            staged.push(ctx);
        }
        for ctx in &staged {
            self.policy.after_release(ctx)?;
        }

        let ops: Vec<_> = staged
            .iter()
            .map(|ctx| PermitOp::Revoke {
                subject: ctx.subject,
                holder: requester,
            })
            .collect();
        self.registry.apply_permits(&self.address, &ops)?;

        tracing::debug!(%requester, count = ops.len(), "permits released");
        Ok(())
    }
}

impl<K: Subject, P: PermitPolicy<K>> Component for Permitter<K, P> {
    fn address(&self) -> Address {
        self.address
    }

    fn supports_interface(&self, interface: Interface) -> bool {
        interface == Interface::Permitter
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(self.upstream)
    }
}
