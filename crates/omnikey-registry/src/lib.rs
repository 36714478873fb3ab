//! # Omnikey Registry
//!
//! Identity and attribute registries: subject lifecycle, permit storage and
//! the allow-lists that gate them.
//!
//! ## Roles
//!
//! - **Owner** manages allow-lists, pause and ownership.
//! - **Registrants** create and destroy subjects.
//! - **Permitters** grant and revoke permits. They are probed before being
//!   allow-listed.
//!
//! A [`Registry`] is generic over its subject type and a
//! [`RegistryExtension`] that receives lifecycle hooks. The key store plugs
//! its key slots in through that extension.

pub mod access;
pub mod directory;
pub mod error;
pub mod events;
pub mod interface;
pub mod permits;
pub mod registry;

pub use access::AccessControl;
pub use directory::{Directory, Entry};
pub use error::{RegistryError, Result};
pub use events::{EventSink, KeySlot, NullSink, RegistryEvent};
pub use interface::PermitRegistry;
pub use permits::{HolderSet, PermitOp, PermitTable};
pub use registry::{ImportRecord, Registry, RegistryExtension, RegistryState};
