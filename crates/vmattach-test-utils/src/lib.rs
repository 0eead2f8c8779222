//! Shared test fixtures for vmattach integration tests.
//!
//! Provides [`FakeJvm`], a Unix-socket listener speaking the HotSpot
//! dynamic attach wire protocol from inside a private temp directory.
//! Like the real attach listener it handles one request per accepted
//! connection (NUL-delimited: version, command, three argument slots),
//! answers from a per-command response table, and closes the
//! connection. Received requests are recorded for assertions.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

/// One request as received off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    pub version: String,
    pub command: String,
    pub args: Vec<String>,
}

pub struct FakeJvm {
    dir: TempDir,
    socket_path: PathBuf,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    responses: Arc<Mutex<HashMap<String, String>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeJvm {
    /// Start a listener at `<tempdir>/.java_pid<pid>`, accepting
    /// connections immediately.
    pub fn start(pid: u32) -> Self {
        Self::spawn(pid, Duration::ZERO)
    }

    /// Start a listener whose socket only appears after `delay`,
    /// simulating a VM that has to be nudged into starting its attach
    /// listener.
    pub fn start_delayed(pid: u32, delay: Duration) -> Self {
        Self::spawn(pid, delay)
    }

    fn spawn(pid: u32, delay: Duration) -> Self {
        let dir = TempDir::new().expect("failed to create fake jvm tmpdir");
        let socket_path = dir.path().join(format!(".java_pid{pid}"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        // Bind synchronously unless a delayed appearance was asked for,
        // so the socket exists before start() returns.
        let eager_listener = if delay.is_zero() {
            Some(UnixListener::bind(&socket_path).expect("failed to bind fake jvm socket"))
        } else {
            None
        };

        let handle = {
            let socket_path = socket_path.clone();
            let requests = Arc::clone(&requests);
            let responses = Arc::clone(&responses);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                let listener = match eager_listener {
                    Some(listener) => listener,
                    None => {
                        thread::sleep(delay);
                        UnixListener::bind(&socket_path).expect("failed to bind fake jvm socket")
                    }
                };
                serve(listener, requests, responses, shutdown);
            })
        };

        Self {
            dir,
            socket_path,
            requests,
            responses,
            shutdown,
            handle: Some(handle),
        }
    }

    /// The directory standing in for the attach tmpdir (`/tmp`).
    pub fn tmpdir(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Override the raw response for a command. The default answers are
    /// a successful `load` ("0\n0\n") and a small `properties` set.
    pub fn set_response(&self, command: &str, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), response.to_string());
    }

    /// All requests received so far, in arrival order. Connections that
    /// sent no request (verification connects) are not recorded.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Drop an `hsperfdata_<user>/<pid>` fixture into the tmpdir so the
    /// discovery scan will enumerate `pid`.
    pub fn write_perf_file(&self, user: &str, pid: u32) {
        let dir = self.dir.path().join(format!("hsperfdata_{user}"));
        std::fs::create_dir_all(&dir).expect("failed to create perf dir");
        std::fs::write(dir.join(pid.to_string()), b"").expect("failed to write perf file");
    }
}

impl Drop for FakeJvm {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(
    listener: UnixListener,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    responses: Arc<Mutex<HashMap<String, String>>>,
    shutdown: Arc<AtomicBool>,
) {
    listener
        .set_nonblocking(true)
        .expect("failed to set fake jvm listener non-blocking");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                let _ = stream.set_nonblocking(false);
                handle_connection(stream, &requests, &responses);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(_) => break,
        }
    }
}

fn handle_connection(
    mut stream: UnixStream,
    requests: &Arc<Mutex<Vec<ReceivedRequest>>>,
    responses: &Arc<Mutex<HashMap<String, String>>>,
) {
    // Verification connects close without sending anything.
    let Some(version) = read_cstr(&mut stream) else {
        return;
    };
    let Some(command) = read_cstr(&mut stream) else {
        return;
    };
    let mut args = Vec::new();
    for _ in 0..3 {
        match read_cstr(&mut stream) {
            Some(arg) => args.push(arg),
            None => break,
        }
    }

    let response = responses
        .lock()
        .unwrap()
        .get(&command)
        .cloned()
        .unwrap_or_else(|| default_response(&command));

    requests.lock().unwrap().push(ReceivedRequest {
        version,
        command,
        args,
    });

    let _ = stream.write_all(response.as_bytes());
    // Dropping the stream closes the connection, which is the response
    // framing the client expects.
}

/// Read one NUL-terminated string. `None` on EOF before any byte.
fn read_cstr(stream: &mut UnixStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return if buf.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&buf).into_owned())
                };
            }
            Ok(_) => {
                if byte[0] == 0 {
                    return Some(String::from_utf8_lossy(&buf).into_owned());
                }
                buf.push(byte[0]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => return None,
        }
    }
}

fn default_response(command: &str) -> String {
    match command {
        "load" => "0\n0\n".to_string(),
        "properties" => {
            "0\n#fake jvm\njava.version=17.0.7\njava.home=/opt/jdk\n".to_string()
        }
        _ => "0\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_requests_and_answers_defaults() {
        let fake = FakeJvm::start(4242);

        let mut stream = UnixStream::connect(fake.socket_path()).unwrap();
        stream.write_all(b"1\0load\0/tmp/a.so\0true\0opts\0").unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();
        drop(stream);

        assert_eq!(raw, "0\n0\n");
        let requests = fake.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].version, "1");
        assert_eq!(requests[0].command, "load");
        assert_eq!(requests[0].args, vec!["/tmp/a.so", "true", "opts"]);
    }

    #[test]
    fn ignores_connections_that_send_nothing() {
        let fake = FakeJvm::start(4243);

        let stream = UnixStream::connect(fake.socket_path()).unwrap();
        drop(stream);

        // Give the accept loop a beat to process the empty connection.
        thread::sleep(Duration::from_millis(50));
        assert!(fake.requests().is_empty());
    }

    #[test]
    fn response_overrides_apply() {
        let fake = FakeJvm::start(4244);
        fake.set_response("load", "101\n");

        let mut stream = UnixStream::connect(fake.socket_path()).unwrap();
        stream.write_all(b"1\0load\0/tmp/a.so\0true\0\0").unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();

        assert_eq!(raw, "101\n");
    }
}
