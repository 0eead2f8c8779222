//! End-to-end attach tests: the real HotSpot provider talking to a fake
//! VM attach listener over a Unix socket in a private tmpdir.

#![cfg(unix)]

use std::time::Duration;

use tempfile::TempDir;

use vmattach_core::hotspot::HotSpotProvider;
use vmattach_core::{AttachError, AttachProvider, ProviderError, attach_and_load};
use vmattach_test_utils::FakeJvm;

fn provider_for(fake: &FakeJvm) -> HotSpotProvider {
    HotSpotProvider::new(fake.tmpdir(), Duration::from_millis(2000))
}

#[test]
fn loads_agent_via_direct_pid_attach() {
    // Our own pid: the socket name matches and /proc/<pid> exists.
    let pid = std::process::id();
    let fake = FakeJvm::start(pid);
    let provider = provider_for(&fake);

    attach_and_load(&provider, &pid.to_string(), "/tmp/libagent.so", "port=9999")
        .expect("attach and load should succeed");

    let requests = fake.requests();
    assert_eq!(requests.len(), 2, "expected properties then load");
    assert_eq!(requests[0].command, "properties");
    assert_eq!(requests[1].command, "load");
    assert_eq!(requests[1].args, vec!["/tmp/libagent.so", "true", "port=9999"]);
}

#[test]
fn loads_agent_via_discovered_descriptor() {
    let pid = std::process::id();
    let fake = FakeJvm::start(pid);
    fake.write_perf_file("testuser", pid);
    let provider = provider_for(&fake);

    let vms = provider.list().expect("discovery should succeed");
    assert!(vms.iter().any(|vm| vm.id == pid.to_string()));

    attach_and_load(&provider, &pid.to_string(), "/tmp/libagent.so", "")
        .expect("descriptor-based attach should succeed");

    let requests = fake.requests();
    assert_eq!(requests.last().unwrap().command, "load");
}

#[test]
fn discovery_filters_dead_pids() {
    let pid = std::process::id();
    let fake = FakeJvm::start(pid);
    fake.write_perf_file("testuser", pid);
    // A perf file left behind by a VM that no longer exists.
    fake.write_perf_file("testuser", 999_999_999);
    let provider = provider_for(&fake);

    let vms = provider.list().unwrap();
    assert!(vms.iter().any(|vm| vm.id == pid.to_string()));
    assert!(!vms.iter().any(|vm| vm.id == "999999999"));
}

#[test]
fn agent_init_failure_surfaces_as_load_error() {
    let pid = std::process::id();
    let fake = FakeJvm::start(pid);
    // Listener accepts the command; the agent's Agent_OnAttach fails.
    fake.set_response("load", "0\n102\n");
    let provider = provider_for(&fake);

    let err = attach_and_load(&provider, &pid.to_string(), "/tmp/libagent.so", "").unwrap_err();
    match err {
        AttachError::Load { source, .. } => {
            assert!(matches!(source, ProviderError::AgentInit { code: 102 }));
        }
        other => panic!("expected load error, got {other:?}"),
    }
}

#[test]
fn listener_rejection_surfaces_as_load_error() {
    let pid = std::process::id();
    let fake = FakeJvm::start(pid);
    fake.set_response("load", "101\n");
    let provider = provider_for(&fake);

    let err = attach_and_load(&provider, &pid.to_string(), "/tmp/libagent.so", "").unwrap_err();
    match err {
        AttachError::Load { source, .. } => {
            assert!(matches!(
                source,
                ProviderError::CommandRejected { status: 101, .. }
            ));
        }
        other => panic!("expected load error, got {other:?}"),
    }
}

#[test]
fn unknown_pid_fails_during_establishment() {
    let tmpdir = TempDir::new().unwrap();
    let provider = HotSpotProvider::new(tmpdir.path(), Duration::from_millis(100));

    let err = attach_and_load(&provider, "999999999", "/tmp/libagent.so", "").unwrap_err();
    assert!(matches!(err, AttachError::Establish { .. }));
}

#[test]
fn nudges_target_when_socket_appears_late() {
    // The lazy path signals our own process with SIGQUIT; ignore it so
    // the test binary survives the nudge.
    unsafe {
        libc::signal(libc::SIGQUIT, libc::SIG_IGN);
    }

    let pid = std::process::id();
    let fake = FakeJvm::start_delayed(pid, Duration::from_millis(150));
    let provider = provider_for(&fake);

    attach_and_load(&provider, &pid.to_string(), "/tmp/libagent.so", "lazy=1")
        .expect("attach should succeed once the listener appears");

    let requests = fake.requests();
    assert_eq!(requests.last().unwrap().args[2], "lazy=1");
}
