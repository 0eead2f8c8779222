//! Wire codec for the HotSpot dynamic attach protocol.
//!
//! A request is a sequence of NUL-terminated strings: the protocol
//! version (`"1"`), the command name, then exactly three argument slots
//! (unused slots are sent empty -- the VM always reads all three). The
//! response is ASCII text: a decimal completion-status line followed by
//! the command's payload lines.

use std::io::{self, Read, Write};

use crate::provider::ProviderError;

/// Protocol version understood by every HotSpot attach listener to date.
pub const PROTOCOL_VERSION: &str = "1";

/// The listener reads exactly this many argument strings per request.
pub const ARG_SLOTS: usize = 3;

/// A parsed attach-listener response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Completion status from the listener itself; `0` means the command
    /// was accepted and executed.
    pub status: i32,
    /// Payload lines following the status line.
    pub body: Vec<String>,
}

/// Write one request. `args` beyond [`ARG_SLOTS`] are a caller bug.
pub fn write_request<W: Write>(writer: &mut W, command: &str, args: &[&str]) -> io::Result<()> {
    debug_assert!(args.len() <= ARG_SLOTS);
    write_string(writer, PROTOCOL_VERSION)?;
    write_string(writer, command)?;
    for slot in 0..ARG_SLOTS {
        write_string(writer, args.get(slot).copied().unwrap_or(""))?;
    }
    writer.flush()
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    writer.write_all(value.as_bytes())?;
    writer.write_all(&[0])
}

/// Drain the listener's full response. The VM closes its end of the
/// connection after answering, so reading to EOF is the framing.
pub fn read_raw<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    Ok(raw)
}

/// Split a raw response into status and payload lines.
pub fn parse_response(raw: &str, command: &str) -> Result<Response, ProviderError> {
    let mut lines = raw.lines();
    let status_line = lines.next().ok_or_else(|| malformed(command, "empty response"))?;
    let status = status_line
        .trim()
        .parse::<i32>()
        .map_err(|_| malformed(command, &format!("non-numeric status line {status_line:?}")))?;
    Ok(Response {
        status,
        body: lines.map(str::to_string).collect(),
    })
}

fn malformed(command: &str, detail: &str) -> ProviderError {
    ProviderError::MalformedResponse {
        command: command.to_string(),
        detail: detail.to_string(),
    }
}
