//! The HotSpot attach channel.
//!
//! The listener handles exactly one operation per connection and closes
//! the socket after answering, so the channel holds the socket *path*
//! rather than a live stream and dials a fresh connection per command
//! (the JDK's `VirtualMachineImpl` works the same way). Detaching drops
//! the path, which makes release idempotent and infallible here.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use crate::provider::{AttachChannel, ProviderError};

use super::protocol::{self, Response};

pub struct HotSpotChannel {
    /// `None` once detached.
    socket_path: Option<PathBuf>,
    pid: u32,
}

impl HotSpotChannel {
    pub(crate) fn new(socket_path: PathBuf, pid: u32) -> Self {
        Self {
            socket_path: Some(socket_path),
            pid,
        }
    }

    fn execute(&mut self, command: &str, args: &[&str]) -> Result<Response, ProviderError> {
        let socket_path = self.socket_path.as_ref().ok_or(ProviderError::Detached)?;

        let mut stream = UnixStream::connect(socket_path).map_err(|source| {
            ProviderError::SocketIo {
                pid: self.pid,
                source,
            }
        })?;
        protocol::write_request(&mut stream, command, args).map_err(|source| {
            ProviderError::SocketIo {
                pid: self.pid,
                source,
            }
        })?;
        let raw = protocol::read_raw(&mut stream).map_err(|source| ProviderError::SocketIo {
            pid: self.pid,
            source,
        })?;

        let response = protocol::parse_response(&raw, command)?;
        if response.status != 0 {
            return Err(ProviderError::CommandRejected {
                command: command.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }
}

impl AttachChannel for HotSpotChannel {
    fn load_agent_path(&mut self, agent_path: &str, options: &str) -> Result<(), ProviderError> {
        // Args: library path, "true" for an absolute path, agent options.
        let response = self.execute("load", &[agent_path, "true", options])?;

        // The accepted command still reports the agent's own init result.
        let code_line = response.body.first().ok_or_else(|| {
            ProviderError::MalformedResponse {
                command: "load".to_string(),
                detail: "missing agent return code".to_string(),
            }
        })?;
        let code = code_line.trim().parse::<i32>().map_err(|_| {
            ProviderError::MalformedResponse {
                command: "load".to_string(),
                detail: format!("non-numeric agent return code {code_line:?}"),
            }
        })?;
        if code != 0 {
            return Err(ProviderError::AgentInit { code });
        }

        tracing::debug!(pid = self.pid, agent = agent_path, "agent load acknowledged");
        Ok(())
    }

    fn system_properties(&mut self) -> Result<Vec<(String, String)>, ProviderError> {
        let response = self.execute("properties", &[])?;
        Ok(parse_properties(&response.body))
    }

    fn detach(&mut self) -> Result<(), ProviderError> {
        if self.socket_path.take().is_some() {
            tracing::debug!(pid = self.pid, "detached from target VM");
        }
        Ok(())
    }
}

/// Parse `java.util.Properties` store output: `#` comment lines, then
/// `key=value` lines with backslash escapes. Unicode escapes are left
/// alone -- the keys we care about are plain ASCII.
fn parse_properties(body: &[String]) -> Vec<(String, String)> {
    body.iter()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .filter_map(|line| {
            line.split_once('=')
                .map(|(key, value)| (unescape(key), unescape(value)))
        })
        .collect()
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
