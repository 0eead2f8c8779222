//! Linux binding of the attach seam: the HotSpot dynamic attach
//! mechanism.
//!
//! Establishment works the way the JDK's own attach provider does it:
//! the target VM, once nudged, serves a Unix socket at
//! `<tmpdir>/.java_pid<pid>`. If the socket does not exist yet, we drop
//! a `.attach_pid<pid>` trigger file where the VM will look for it and
//! send `SIGQUIT`; the VM's handler notices the trigger file and starts
//! its attach listener instead of dumping threads. We then poll for the
//! socket with backoff, bounded by the configured timeout.
//!
//! Namespace wrinkle: for a target in another pid/mount namespace the
//! socket is named after the *namespace-local* pid (the last entry of
//! `NSpid` in `/proc/<pid>/status`) and its `/tmp` is only reachable
//! through `/proc/<pid>/root`.

mod channel;
mod discovery;
mod protocol;

pub use channel::HotSpotChannel;

use std::fs;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::provider::{AttachChannel, AttachProvider, ProviderError, VmDescriptor};

/// Where HotSpot places attach sockets and perf data by default.
pub const DEFAULT_TMPDIR: &str = "/tmp";

/// Default bound on waiting for the target to open its attach socket.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct HotSpotProvider {
    tmpdir: PathBuf,
    timeout: Duration,
}

impl HotSpotProvider {
    pub fn new(tmpdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tmpdir: tmpdir.into(),
            timeout,
        }
    }

    fn open_channel(&self, pid: u32) -> Result<HotSpotChannel, ProviderError> {
        if !Path::new(&format!("/proc/{pid}")).exists() {
            return Err(ProviderError::NoSuchProcess(pid.to_string()));
        }

        let nspid = namespace_pid(pid).unwrap_or(pid);
        let socket_path = self.socket_path_for(pid, nspid);

        if !socket_path.exists() {
            self.request_attach_listener(pid, nspid, &socket_path)?;
        }

        // Verification connect, as the JDK does on attach: proves the
        // socket is live before we hand out a channel.
        let stream = UnixStream::connect(&socket_path).map_err(|source| {
            ProviderError::SocketIo { pid, source }
        })?;
        drop(stream);

        tracing::debug!(pid, socket = %socket_path.display(), "attach channel established");
        Ok(HotSpotChannel::new(socket_path, pid))
    }

    fn socket_path_for(&self, pid: u32, nspid: u32) -> PathBuf {
        let name = format!(".java_pid{nspid}");
        if nspid != pid {
            // The target's /tmp lives behind its own mount namespace.
            return PathBuf::from(format!("/proc/{pid}/root/tmp")).join(name);
        }
        self.tmpdir.join(name)
    }

    /// Trigger-file-and-SIGQUIT dance, then poll for the socket.
    fn request_attach_listener(
        &self,
        pid: u32,
        nspid: u32,
        socket_path: &Path,
    ) -> Result<(), ProviderError> {
        let trigger = self.write_trigger_file(pid, nspid)?;
        tracing::debug!(pid, trigger = %trigger.display(), "requesting attach listener");

        let result = signal_quit(pid).and_then(|()| {
            let deadline = Instant::now() + self.timeout;
            let mut delay = Duration::from_millis(20);
            loop {
                if socket_path.exists() {
                    break Ok(());
                }
                if Instant::now() >= deadline {
                    break Err(ProviderError::SocketTimeout {
                        pid,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                thread::sleep(delay);
                delay = (delay * 2).min(Duration::from_millis(500));
            }
        });

        // The trigger file has served its purpose either way.
        let _ = fs::remove_file(&trigger);
        result
    }

    /// The VM looks for the trigger in its own working directory first;
    /// fall back to the shared tmpdir when the cwd is not writable to us.
    fn write_trigger_file(&self, pid: u32, nspid: u32) -> Result<PathBuf, ProviderError> {
        let name = format!(".attach_pid{nspid}");
        let cwd_trigger = PathBuf::from(format!("/proc/{pid}/cwd")).join(&name);
        if fs::write(&cwd_trigger, []).is_ok() {
            return Ok(cwd_trigger);
        }
        let tmp_trigger = self.tmpdir.join(&name);
        fs::write(&tmp_trigger, []).map_err(|source| ProviderError::Trigger { pid, source })?;
        Ok(tmp_trigger)
    }
}

impl AttachProvider for HotSpotProvider {
    fn list(&self) -> Result<Vec<VmDescriptor>, ProviderError> {
        let pids = discovery::scan_perf_dirs(&self.tmpdir)?;
        let mut vms = Vec::new();
        for pid in pids {
            // Perf files outlive crashed VMs; only report live processes.
            if !Path::new(&format!("/proc/{pid}")).exists() {
                continue;
            }
            vms.push(VmDescriptor {
                id: pid.to_string(),
                display_name: discovery::display_name(pid),
            });
        }
        tracing::debug!(count = vms.len(), "discovered attach-capable VMs");
        Ok(vms)
    }

    fn attach_pid(&self, pid: &str) -> Result<Box<dyn AttachChannel>, ProviderError> {
        let pid = pid
            .parse::<u32>()
            .map_err(|_| ProviderError::InvalidPid(pid.to_string()))?;
        Ok(Box::new(self.open_channel(pid)?))
    }

    fn attach_descriptor(
        &self,
        descriptor: &VmDescriptor,
    ) -> Result<Box<dyn AttachChannel>, ProviderError> {
        self.attach_pid(&descriptor.id)
    }
}

/// Last entry of the `NSpid` line in `/proc/<pid>/status`: the pid as
/// the target sees itself. `None` on kernels without `NSpid` or when
/// the file is unreadable; callers fall back to the global pid.
fn namespace_pid(pid: u32) -> Option<u32> {
    let status = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("NSpid:") {
            return rest.split_whitespace().last()?.parse().ok();
        }
    }
    None
}

fn signal_quit(pid: u32) -> Result<(), ProviderError> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGQUIT) };
    if rc != 0 {
        return Err(ProviderError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_pid_rejects_non_numeric_target() {
        let provider = HotSpotProvider::new(DEFAULT_TMPDIR, DEFAULT_TIMEOUT);
        let err = provider.attach_pid("not-a-pid").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPid(_)));
    }

    #[test]
    fn attach_pid_rejects_dead_process() {
        let provider = HotSpotProvider::new(DEFAULT_TMPDIR, Duration::from_millis(50));
        // Far above any kernel's pid_max.
        let err = provider.attach_pid("999999999").unwrap_err();
        assert!(matches!(err, ProviderError::NoSuchProcess(_)));
    }

    #[test]
    fn namespace_pid_of_self_matches_global_pid() {
        // Outside a pid namespace NSpid has a single entry equal to the
        // global pid; inside one, the test still holds for /proc/self.
        let pid = std::process::id();
        if let Some(nspid) = namespace_pid(pid) {
            assert!(nspid > 0);
        }
    }

    #[test]
    fn socket_path_uses_tmpdir_for_same_namespace() {
        let provider = HotSpotProvider::new("/custom/tmp", DEFAULT_TIMEOUT);
        let path = provider.socket_path_for(42, 42);
        assert_eq!(path, PathBuf::from("/custom/tmp/.java_pid42"));
    }

    #[test]
    fn socket_path_routes_through_proc_root_for_foreign_namespace() {
        let provider = HotSpotProvider::new("/custom/tmp", DEFAULT_TIMEOUT);
        let path = provider.socket_path_for(42, 7);
        assert_eq!(path, PathBuf::from("/proc/42/root/tmp/.java_pid7"));
    }
}
