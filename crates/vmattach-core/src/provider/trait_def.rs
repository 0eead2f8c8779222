//! The `AttachProvider` trait -- the adapter interface for VM attach
//! mechanisms.
//!
//! Each concrete binding (HotSpot on Linux today; another VM family's
//! attach primitive tomorrow) implements this pair of traits. Both are
//! intentionally object-safe so the coordinator can work against
//! `&dyn AttachProvider` / `Box<dyn AttachChannel>`, which is also what
//! makes the coordinator testable with a scripted fake.

use super::types::{ProviderError, VmDescriptor};

/// Adapter interface over a VM family's process-attach capability.
///
/// The whole surface is synchronous and blocking: a single attach
/// invocation owns a single logical thread of control, and a hung target
/// blocks the caller (callers wrap with an external timeout if they need
/// one).
pub trait AttachProvider {
    /// Enumerate the VMs currently visible to the attach subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Scan`] when the enumeration source itself
    /// cannot be read. An empty result is not an error.
    fn list(&self) -> Result<Vec<VmDescriptor>, ProviderError>;

    /// Open an attach channel to a process by raw pid.
    ///
    /// This covers targets that are attach-capable without being
    /// enumerable (e.g. running under a different namespace or with
    /// perf data disabled).
    fn attach_pid(&self, pid: &str) -> Result<Box<dyn AttachChannel>, ProviderError>;

    /// Open an attach channel using a descriptor from [`Self::list`].
    fn attach_descriptor(
        &self,
        descriptor: &VmDescriptor,
    ) -> Result<Box<dyn AttachChannel>, ProviderError>;
}

/// A live connection to one target VM's attach listener.
///
/// Exclusively owned by its opener; must be released with
/// [`Self::detach`] exactly once, after which every other operation
/// fails with [`ProviderError::Detached`].
pub trait AttachChannel {
    /// Instruct the target to load a native agent from `agent_path`,
    /// passing `options` through verbatim. Neither argument is
    /// interpreted locally.
    fn load_agent_path(&mut self, agent_path: &str, options: &str) -> Result<(), ProviderError>;

    /// Read the target VM's system properties (diagnostics only).
    fn system_properties(&mut self) -> Result<Vec<(String, String)>, ProviderError>;

    /// Release the channel. Idempotent: a second call is a no-op.
    fn detach(&mut self) -> Result<(), ProviderError>;
}

impl std::fmt::Debug for dyn AttachChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn AttachChannel")
    }
}

// Compile-time assertion: both traits must stay object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn AttachProvider, _: &dyn AttachChannel) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    /// A trivial provider that knows no VMs, used only to prove the
    /// traits can be implemented and used as trait objects.
    struct NoopProvider;
    struct NoopChannel;

    impl AttachProvider for NoopProvider {
        fn list(&self) -> Result<Vec<VmDescriptor>, ProviderError> {
            Ok(vec![])
        }

        fn attach_pid(&self, pid: &str) -> Result<Box<dyn AttachChannel>, ProviderError> {
            let _ = pid;
            Ok(Box::new(NoopChannel))
        }

        fn attach_descriptor(
            &self,
            descriptor: &VmDescriptor,
        ) -> Result<Box<dyn AttachChannel>, ProviderError> {
            self.attach_pid(&descriptor.id)
        }
    }

    impl AttachChannel for NoopChannel {
        fn load_agent_path(
            &mut self,
            _agent_path: &str,
            _options: &str,
        ) -> Result<(), ProviderError> {
            Ok(())
        }

        fn system_properties(&mut self) -> Result<Vec<(String, String)>, ProviderError> {
            Ok(vec![])
        }

        fn detach(&mut self) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[test]
    fn provider_is_object_safe() {
        let provider: Box<dyn AttachProvider> = Box::new(NoopProvider);
        assert!(provider.list().unwrap().is_empty());

        let mut channel = provider.attach_pid("1").unwrap();
        channel.load_agent_path("/tmp/libnoop.so", "").unwrap();
        channel.detach().unwrap();
    }
}
