//! Core library for `vmattach`: loading a JVMTI native agent into an
//! already-running JVM over the platform's dynamic attach mechanism.
//!
//! The library splits into three layers:
//!
//! - [`provider`] -- the [`AttachProvider`]/[`AttachChannel`] trait pair
//!   modelling the attach capability of a VM family (enumerate visible
//!   VMs, open a channel, issue load/detach).
//! - [`hotspot`] -- the Linux HotSpot binding of that seam (perf-file
//!   discovery, attach-trigger handshake, NUL-delimited wire protocol).
//! - [`coordinator`] -- the one-shot `attach_and_load` operation with
//!   its guaranteed exactly-once channel release.

pub mod coordinator;
#[cfg(unix)]
pub mod hotspot;
pub mod provider;

// Re-export the primary public API at the crate root.
pub use coordinator::{AttachError, attach_and_load};
pub use provider::{AttachChannel, AttachProvider, ProviderError, VmDescriptor};
