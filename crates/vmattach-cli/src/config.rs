//! Configuration for vmattach.
//!
//! Provides a TOML-based config file at `~/.config/vmattach/config.toml`
//! and a resolution chain per setting: CLI flag > env var > config file
//! > built-in default.
//!
//! Settings:
//! - `attach.tmpdir` / `VMATTACH_TMPDIR` / `--tmpdir`: directory where
//!   HotSpot attach sockets and perf data live (default `/tmp`).
//! - `attach.timeout_ms` / `VMATTACH_TIMEOUT_MS` / `--timeout-ms`: bound
//!   on waiting for the target to open its attach socket.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TMPDIR: &str = "/tmp";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub attach: AttachSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AttachSection {
    pub tmpdir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the vmattach config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/vmattach` or
/// `~/.config/vmattach`, regardless of platform convention.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vmattach");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("vmattach")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn load_config_from(path: &Path) -> Result<Option<AttachSection>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(file.attach))
}

// -----------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------

/// Fully-resolved settings for one invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub tmpdir: PathBuf,
    pub timeout_ms: u64,
}

impl ResolvedConfig {
    /// Resolve settings from CLI flags, environment, config file and
    /// defaults, in that order of precedence.
    pub fn resolve(flag_tmpdir: Option<PathBuf>, flag_timeout_ms: Option<u64>) -> Result<Self> {
        let file = load_config_from(&config_path())?;
        Self::resolve_from(
            flag_tmpdir,
            flag_timeout_ms,
            std::env::var("VMATTACH_TMPDIR").ok(),
            std::env::var("VMATTACH_TIMEOUT_MS").ok(),
            file,
        )
    }

    fn resolve_from(
        flag_tmpdir: Option<PathBuf>,
        flag_timeout_ms: Option<u64>,
        env_tmpdir: Option<String>,
        env_timeout_ms: Option<String>,
        file: Option<AttachSection>,
    ) -> Result<Self> {
        let tmpdir = flag_tmpdir
            .or(env_tmpdir.map(PathBuf::from))
            .or_else(|| file.as_ref().and_then(|attach| attach.tmpdir.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TMPDIR));

        let timeout_ms = match flag_timeout_ms {
            Some(timeout) => timeout,
            None => match env_timeout_ms {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("invalid VMATTACH_TIMEOUT_MS value: {raw}"))?,
                None => file
                    .as_ref()
                    .and_then(|attach| attach.timeout_ms)
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            },
        };

        Ok(Self { tmpdir, timeout_ms })
    }
}
