//! Discovery of visible HotSpot VMs.
//!
//! Every HotSpot VM with perf data enabled (the default) maintains a
//! memory-mapped file at `<tmpdir>/hsperfdata_<user>/<pid>`. Scanning
//! those directories is how `jps` enumerates VMs, and how we build the
//! descriptor list for the discovery pass.

use std::fs;
use std::path::Path;

use crate::provider::ProviderError;

/// Scan `<tmpdir>/hsperfdata_*` for pid-named perf files.
///
/// Returns the sorted, deduplicated pid set. Per-user directories that
/// cannot be read (another user's, mode 0755 but contents restricted)
/// are skipped, as are files whose names are not pids.
///
/// Liveness is *not* checked here: perf files survive a crashed VM, so
/// the caller filters against `/proc`.
pub(crate) fn scan_perf_dirs(tmpdir: &Path) -> Result<Vec<u32>, ProviderError> {
    let entries = fs::read_dir(tmpdir).map_err(|source| ProviderError::Scan {
        dir: tmpdir.to_path_buf(),
        source,
    })?;

    let mut pids = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with("hsperfdata_") {
            continue;
        }
        let Ok(perf_files) = fs::read_dir(entry.path()) else {
            continue;
        };
        for perf_file in perf_files.flatten() {
            if let Some(pid) = perf_file
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            {
                pids.push(pid);
            }
        }
    }

    pids.sort_unstable();
    pids.dedup();
    Ok(pids)
}

/// Best-effort display name for a pid: its command line with NULs
/// replaced by spaces, or `<unknown>` when `/proc` gives us nothing.
pub(crate) fn display_name(pid: u32) -> String {
    match fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(raw) if !raw.is_empty() => raw
            .split(|byte| *byte == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::from("<unknown>"),
    }
}
