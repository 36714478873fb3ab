//! Registry events.
//!
//! Every committed state change produces one event. Events are observable
//! side effects: they go to the configured [`EventSink`] and to `tracing`,
//! and are never read back by the registry itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use omnikey_core::{Address, AssigneeHash, Blake3Hash, Subject};

/// Which key slot an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySlot {
    Primary,
    Secondary,
}

/// A state change committed by a registry or key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent<K> {
    SubjectCreated {
        subject: K,
        assignee: AssigneeHash,
    },
    SubjectDestroyed {
        subject: K,
        revoked: u32,
    },
    PermitGranted {
        subject: K,
        holder: Address,
        expiry: i64,
        permitter: Address,
    },
    PermitRevoked {
        subject: K,
        holder: Address,
        permitter: Address,
    },
    /// A permit dropped because its subject was destroyed by `registrant`.
    PermitCleared {
        subject: K,
        holder: Address,
        registrant: Address,
    },
    PermitterUpdated {
        permitter: Address,
        allowed: bool,
    },
    RegistrantUpdated {
        registrant: Address,
        allowed: bool,
    },
    PauseToggled {
        paused: bool,
    },
    OwnershipTransferred {
        previous: Address,
        owner: Address,
    },
    SubjectMigrated {
        subject: K,
        assignee: AssigneeHash,
        permits: u32,
    },
    KeyProvisioned {
        subject: K,
        slot: KeySlot,
    },
    KeysRotated {
        subject: K,
    },
    SegmentLinked {
        subject: K,
        segment: Blake3Hash,
    },
    SegmentUnlinked {
        subject: K,
        segment: Blake3Hash,
    },
}

impl<K: Subject> RegistryEvent<K> {
    /// Stable event name, used as the audit log kind column.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::SubjectCreated { .. } => "subject_created",
            RegistryEvent::SubjectDestroyed { .. } => "subject_destroyed",
            RegistryEvent::PermitGranted { .. } => "permit_granted",
            RegistryEvent::PermitRevoked { .. } => "permit_revoked",
            RegistryEvent::PermitCleared { .. } => "permit_cleared",
            RegistryEvent::PermitterUpdated { .. } => "permitter_updated",
            RegistryEvent::RegistrantUpdated { .. } => "registrant_updated",
            RegistryEvent::PauseToggled { .. } => "pause_toggled",
            RegistryEvent::OwnershipTransferred { .. } => "ownership_transferred",
            RegistryEvent::SubjectMigrated { .. } => "subject_migrated",
            RegistryEvent::KeyProvisioned { .. } => "key_provisioned",
            RegistryEvent::KeysRotated { .. } => "keys_rotated",
            RegistryEvent::SegmentLinked { .. } => "segment_linked",
            RegistryEvent::SegmentUnlinked { .. } => "segment_unlinked",
        }
    }

    /// The subject this event concerns, if any.
    pub fn subject(&self) -> Option<K> {
        match self {
            RegistryEvent::SubjectCreated { subject, .. }
            | RegistryEvent::SubjectDestroyed { subject, .. }
            | RegistryEvent::PermitGranted { subject, .. }
            | RegistryEvent::PermitRevoked { subject, .. }
            | RegistryEvent::PermitCleared { subject, .. }
            | RegistryEvent::SubjectMigrated { subject, .. }
            | RegistryEvent::KeyProvisioned { subject, .. }
            | RegistryEvent::KeysRotated { subject }
            | RegistryEvent::SegmentLinked { subject, .. }
            | RegistryEvent::SegmentUnlinked { subject, .. } => Some(*subject),
            RegistryEvent::PermitterUpdated { .. }
            | RegistryEvent::RegistrantUpdated { .. }
            | RegistryEvent::PauseToggled { .. }
            | RegistryEvent::OwnershipTransferred { .. } => None,
        }
    }

    /// Log this event at its level.
    pub fn trace(&self) {
        match self {
            RegistryEvent::PermitGranted {
                subject,
                holder,
                expiry,
                permitter,
            } => tracing::debug!(%subject, %holder, expiry, %permitter, "permit granted"),
            RegistryEvent::PermitRevoked {
                subject,
                holder,
                permitter,
            } => tracing::debug!(%subject, %holder, %permitter, "permit revoked"),
            RegistryEvent::PermitCleared {
                subject,
                holder,
                registrant,
            } => tracing::debug!(%subject, %holder, %registrant, "permit cleared"),
            other => match other.subject() {
                Some(subject) => tracing::info!(event = other.name(), %subject, "registry event"),
                None => tracing::info!(event = other.name(), "registry event"),
            },
        }
    }
}

/// Receives committed registry events.
pub trait EventSink<K>: Send + Sync {
    fn record(&self, event: &RegistryEvent<K>);
}

impl<K, S: EventSink<K> + ?Sized> EventSink<K> for Arc<S> {
    fn record(&self, event: &RegistryEvent<K>) {
        (**self).record(event)
    }
}

/// Discards events (they are still traced by the registry).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<K> EventSink<K> for NullSink {
    fn record(&self, _event: &RegistryEvent<K>) {}
}
