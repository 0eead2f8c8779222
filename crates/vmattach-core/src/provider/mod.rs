//! The attach provider seam -- the adapter interface over a VM family's
//! process-attach capability.
//!
//! This module defines the [`AttachProvider`] and [`AttachChannel`] traits
//! that a concrete binding (currently [`crate::hotspot`]) implements, plus
//! the supporting types ([`VmDescriptor`], [`ProviderError`]).
//!
//! # Architecture
//!
//! ```text
//! coordinator::attach_and_load
//!     |
//!     v
//! &dyn AttachProvider
//!     |   list() ------------------> Vec<VmDescriptor>
//!     |   attach_descriptor(&desc) -+
//!     |   attach_pid("12345") ------+--> Box<dyn AttachChannel>
//!     |                                       |
//!     |   load_agent_path(path, options) <----+
//!     |   system_properties()
//!     |   detach()
//! ```

pub mod trait_def;
pub mod types;

// Re-export the primary public API at the module level.
pub use trait_def::{AttachChannel, AttachProvider};
pub use types::{ProviderError, VmDescriptor};
