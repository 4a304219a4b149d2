//! Shared test scaffolding: a minimal blocking HTTP stub standing in for the
//! telemetry collector, and a scratch-directory layout helper.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use telemetry_post_daemon::core::config::DaemonConfig;

/// A collector stub that always answers with the same status code, on a
/// background thread, for the life of the test.
pub struct StubCollector {
    pub addr: String,
    pub requests_seen: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl StubCollector {
    pub fn start(status_line: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let requests_seen = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let seen = Arc::clone(&requests_seen);
        let stop = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        seen.fetch_add(1, Ordering::SeqCst);
                        respond(stream, status_line);
                    }
                    Err(_) => std::thread::sleep(std::time::Duration::from_millis(5)),
                }
            }
        });

        Self {
            addr: format!("http://{addr}"),
            requests_seen,
            handle: Some(handle),
            shutdown,
        }
    }
}

impl Drop for StubCollector {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond(mut stream: TcpStream, status_line: &str) {
    stream.set_nonblocking(false).ok();
    let mut buf = [0u8; 4096];
    let _ = stream.read(&mut buf);
    let body = "ok";
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

/// A freshly created scratch directory tree with a default config pointed at it.
pub fn scratch_config(case: &str) -> (PathBuf, DaemonConfig) {
    let dir = std::env::temp_dir().join(format!(
        "tpd-scenario-{case}-{}-{}",
        std::process::id(),
        case.len()
    ));
    std::fs::create_dir_all(&dir).unwrap();

    let mut config = DaemonConfig::default();
    config.paths.staging_dir = dir.join("staging");
    config.paths.spool_dir = dir.join("spool");
    config.paths.retention_dir = dir.join("retention");
    config.paths.journal_path = dir.join("journal.jsonl");
    config.paths.journal_tmpdir = dir.join("journal.tmp");
    std::fs::create_dir_all(&config.paths.staging_dir).unwrap();

    (dir, config)
}

pub fn write_staged_record(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(
        &path,
        format!("Classification: perf\nEventId: evt-{name}\nSeverity: info\nTimestamp: 1\n{body}\n"),
    )
    .unwrap();
    path
}
