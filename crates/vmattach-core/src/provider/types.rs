//! Supporting types for the attach provider seam.

use std::path::PathBuf;

use thiserror::Error;

/// A VM discovered during the enumeration pass.
///
/// Transient: descriptors exist only for the duration of one discovery
/// scan and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmDescriptor {
    /// Process id of the VM, as a string (the unit of comparison against
    /// the caller-supplied target id).
    pub id: String,
    /// Best-effort human-readable name (command line of the process).
    pub display_name: String,
}

/// Errors produced by an attach provider or channel.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Enumerating visible VMs failed (permissions, missing directory).
    #[error("failed to scan {dir} for VM perf data")]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target id is not a parseable pid.
    #[error("invalid target pid: {0}")]
    InvalidPid(String),

    /// No process with the given pid exists.
    #[error("no such process: {0}")]
    NoSuchProcess(String),

    /// Could not place the attach trigger file for the target.
    #[error("failed to write attach trigger file for pid {pid}")]
    Trigger {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Signalling the target process failed.
    #[error("failed to signal pid {pid}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The target never opened its attach socket within the wait bound.
    #[error("pid {pid} did not open an attach socket within {timeout_ms}ms")]
    SocketTimeout { pid: u32, timeout_ms: u64 },

    /// I/O on the attach socket failed.
    #[error("attach socket I/O with pid {pid} failed")]
    SocketIo {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The target VM refused the command at the protocol level.
    #[error("target rejected '{command}' with status {status}")]
    CommandRejected { command: String, status: i32 },

    /// The channel delivered the load request but the agent's own
    /// initialization returned a non-zero code.
    #[error("agent failed to initialize (Agent_OnAttach returned {code})")]
    AgentInit { code: i32 },

    /// The target's response did not follow the attach wire protocol.
    #[error("malformed response to '{command}': {detail}")]
    MalformedResponse { command: String, detail: String },

    /// The channel was used after it was released.
    #[error("attach channel already detached")]
    Detached,
}
