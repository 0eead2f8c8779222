//! The attach coordinator: one-shot attach-and-load against a target VM.
//!
//! Given a target pid, an agent artifact path and an option string, the
//! coordinator discovers the target among visible VMs (falling back to a
//! direct pid attach), issues the agent-load instruction, and releases
//! the attach channel exactly once on every exit path. Release failures
//! are logged but never allowed to mask the load outcome.

use thiserror::Error;

use crate::provider::{AttachChannel, AttachProvider, ProviderError, VmDescriptor};

/// Errors surfaced by [`attach_and_load`], tagged with the phase that
/// failed. Release failures are deliberately absent: detach is
/// best-effort cleanup and is only ever logged.
#[derive(Debug, Error)]
pub enum AttachError {
    /// Enumerating visible VMs failed before any channel was opened.
    #[error("discovery of attach-capable VMs failed")]
    Discovery {
        #[source]
        source: ProviderError,
    },

    /// Neither descriptor-based nor direct pid attach produced a channel.
    #[error("could not establish an attach channel to {target}")]
    Establish {
        target: String,
        #[source]
        source: ProviderError,
    },

    /// The channel was open but the target rejected or failed the load.
    #[error("target failed to load agent {agent_path}")]
    Load {
        agent_path: String,
        #[source]
        source: ProviderError,
    },
}

/// Attach to the VM identified by `target_id` and load the native agent
/// at `agent_path`, passing `agent_options` through verbatim.
///
/// The operation is all-or-nothing: no retries, and any failure during
/// discovery, establishment or load is reported after cleanup has run.
/// If a channel was opened it is detached exactly once regardless of the
/// load outcome.
///
/// # Errors
///
/// Returns an [`AttachError`] naming the phase that failed, with the
/// underlying [`ProviderError`] preserved as its source.
pub fn attach_and_load(
    provider: &dyn AttachProvider,
    target_id: &str,
    agent_path: &str,
    agent_options: &str,
) -> Result<(), AttachError> {
    let descriptors = provider
        .list()
        .map_err(|source| AttachError::Discovery { source })?;

    // Linear scan; if the list somehow contains duplicates of the target
    // id, the last one wins. Quirk kept from the original behavior.
    let mut matched: Option<VmDescriptor> = None;
    for descriptor in descriptors {
        if descriptor.id == target_id {
            matched = Some(descriptor);
        }
    }

    let mut channel = match &matched {
        Some(descriptor) => {
            tracing::info!(
                target_vm = target_id,
                name = %descriptor.display_name,
                "attaching via discovered descriptor"
            );
            provider.attach_descriptor(descriptor)
        }
        None => {
            // The target may be attach-capable without being enumerable,
            // so fall back to attaching by raw pid.
            tracing::info!(target_vm = target_id, "no descriptor found, attaching by pid");
            provider.attach_pid(target_id)
        }
    }
    .map_err(|source| AttachError::Establish {
        target: target_id.to_string(),
        source,
    })?;

    log_target_vm(channel.as_mut(), target_id);

    let loaded = channel
        .load_agent_path(agent_path, agent_options)
        .map_err(|source| AttachError::Load {
            agent_path: agent_path.to_string(),
            source,
        });

    // Best-effort release: the load outcome already determined success or
    // failure, so a detach failure must not be promoted over it.
    if let Err(error) = channel.detach() {
        tracing::warn!(target_vm = target_id, %error, "detach failed after load attempt");
    }

    loaded
}

/// Log the target's java version and home so an operator can spot a
/// mismatch with the attaching side. Diagnostics only: a failure here
/// never aborts the load.
fn log_target_vm(channel: &mut dyn AttachChannel, target_id: &str) {
    match channel.system_properties() {
        Ok(properties) => {
            let get = |key: &str| {
                properties
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("?")
            };
            tracing::info!(
                target_vm = target_id,
                java_version = get("java.version"),
                java_home = get("java.home"),
                "attached to target VM"
            );
        }
        Err(error) => {
            tracing::debug!(target_vm = target_id, %error, "could not read target system properties");
        }
    }
}
