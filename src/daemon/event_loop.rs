//! Event loop (C8): multiplexes filesystem-watch events, signal events, and
//! the spool/journal-prune tick; drives the policy pipeline (C7).
//!
//! Ground: the original's `run_daemon`/`close_daemon` poll(2) loop over a
//! signalfd and an inotify fd. Here the blocking-poll style is kept but the
//! two event sources are a `SignalHandler` flag (checked between recv calls
//! instead of blocked-on directly — `signal-hook` delivers via an atomic
//! flag, not a pollable fd) and `notify`'s synchronous `std::sync::mpsc`
//! receiver, used with `recv_timeout` so the spool/prune tick still fires on
//! idle staging directories.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecursiveMode, Watcher, event::ModifyKind};

use crate::core::config::DaemonConfig;
use crate::core::errors::{Result, TpdError};
use crate::daemon::signals::SignalHandler;
use crate::journal::{Journal, NullPruneSink, PruneSink};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::policy::{self, DaemonState};
use crate::retention::RetentionPruneSink;

/// Run the daemon to completion: startup scan, then the main poll loop,
/// until `SIGINT`/`SIGTERM` is observed.
pub fn run(config: &DaemonConfig) -> Result<()> {
    let mut log = JsonlWriter::open(JsonlConfig::default());
    log.write_entry(&LogEntry::new(EventType::DaemonStart, Severity::Info));

    let signals = SignalHandler::new()?;

    std::fs::create_dir_all(&config.paths.staging_dir)
        .map_err(|source| TpdError::io(&config.paths.staging_dir, source))?;

    let journal_cap_bytes = 10 * 1024 * 1024; // matches spool's "bounded footprint" convention
    let journal = Journal::open(
        &config.paths.journal_path,
        journal_cap_bytes,
        &config.paths.journal_tmpdir,
    )?;
    let mut state = DaemonState::new(journal);

    let prune_sink: Box<dyn PruneSink> = if config.features.record_retention_enabled {
        Box::new(RetentionPruneSink {
            dir: config.paths.retention_dir.clone(),
        })
    } else {
        Box::new(NullPruneSink)
    };

    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx)
        .map_err(|source| TpdError::FatalInit {
            details: format!("creating filesystem watcher: {source}"),
        })?;
    watcher
        .watch(&config.paths.staging_dir, RecursiveMode::NonRecursive)
        .map_err(|source| TpdError::FatalInit {
            details: format!("watching {}: {source}", config.paths.staging_dir.display()),
        })?;

    // Startup scan: catch files that landed before the watch was armed.
    startup_scan(&config.paths.staging_dir, &mut state, config, &mut log)?;

    let tick_period = Duration::from_secs(config.spool.process_period_secs.max(1));
    let mut last_tick = Instant::now();

    loop {
        if signals.should_shutdown() {
            break;
        }

        match rx.recv_timeout(tick_period) {
            Ok(Ok(event)) => {
                handle_fs_event(&event, &config.paths.staging_dir, &mut state, config, &mut log)?;
            }
            Ok(Err(_watch_err)) => {
                // A watcher-internal error; keep looping, the next tick will
                // still run the spool/prune maintenance pass.
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_tick.elapsed() >= tick_period {
            spool_drain_hook();
            match state.journal.prune(prune_sink.as_ref()) {
                Ok(()) => log.write_entry(&LogEntry::new(EventType::JournalPruned, Severity::Info)),
                Err(err) => {
                    let mut entry = LogEntry::new(EventType::Error, Severity::Critical);
                    entry.error_code = Some(err.code().to_string());
                    entry.error_message = Some(err.to_string());
                    log.write_entry(&entry);
                }
            }
            last_tick = Instant::now();
        }
    }

    log.write_entry(&LogEntry::new(EventType::DaemonStop, Severity::Info));
    log.flush();
    drop(watcher);
    Ok(())
}

fn startup_scan(
    staging_dir: &Path,
    state: &mut DaemonState,
    config: &DaemonConfig,
    log: &mut JsonlWriter,
) -> Result<()> {
    let entries = std::fs::read_dir(staging_dir).map_err(|source| TpdError::io(staging_dir, source))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        process_one(&path, state, config, log)?;
    }
    Ok(())
}

fn handle_fs_event(
    event: &Event,
    staging_dir: &Path,
    state: &mut DaemonState,
    config: &DaemonConfig,
    log: &mut JsonlWriter,
) -> Result<()> {
    let is_close_write = matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Create(_)
    );
    if !is_close_write {
        return Ok(());
    }
    for path in &event.paths {
        if path.is_dir() || path.parent() != Some(staging_dir) {
            continue;
        }
        process_one(path, state, config, log)?;
    }
    Ok(())
}

fn process_one(
    path: &Path,
    state: &mut DaemonState,
    config: &DaemonConfig,
    log: &mut JsonlWriter,
) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let path_str = path.display().to_string();
    match policy::process_staged_record(path, state, config) {
        Ok(true) => {
            let _ = std::fs::remove_file(path);
            let mut entry = LogEntry::new(EventType::RecordAccepted, Severity::Info);
            entry.path = Some(path_str);
            log.write_entry(&entry);
        }
        Ok(false) => {
            let mut entry = LogEntry::new(EventType::RecordParseFailed, Severity::Warning);
            entry.path = Some(path_str);
            log.write_entry(&entry);
        }
        Err(err @ TpdError::InvalidWindowLength { .. }) => return Err(err),
        Err(err) => {
            let mut entry = LogEntry::new(EventType::Error, Severity::Critical);
            entry.path = Some(path_str);
            entry.error_code = Some(err.code().to_string());
            entry.error_message = Some(err.to_string());
            log.write_entry(&entry);
        }
    }
    Ok(())
}

/// Stub: the spool-retry daemon that drains `spool_dir` independently is an
/// external collaborator out of scope for this crate (spec.md §1); this hook
/// exists so the event loop's tick shape matches the original's
/// `spool_records_loop` call site.
fn spool_drain_hook() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Journal;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tpd-eventloop-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn startup_scan_processes_existing_files() {
        let dir = temp_dir("scan");
        let mut cfg = DaemonConfig::default();
        cfg.paths.staging_dir = dir.join("staging");
        cfg.paths.spool_dir = dir.join("spool");
        cfg.paths.retention_dir = dir.join("retention");
        cfg.paths.journal_path = dir.join("journal.jsonl");
        cfg.paths.journal_tmpdir = dir.join("journal.tmp");
        cfg.features.record_server_delivery_enabled = false;
        cfg.rate_limit.enabled = false;

        std::fs::create_dir_all(&cfg.paths.staging_dir).unwrap();
        std::fs::write(
            cfg.paths.staging_dir.join("r1"),
            "Classification: a\nEventId: 1\nSeverity: info\nTimestamp: 1\nbody\n",
        )
        .unwrap();

        let journal = Journal::open(&cfg.paths.journal_path, 1_000_000, &cfg.paths.journal_tmpdir).unwrap();
        let mut state = DaemonState::new(journal);
        let mut log = JsonlWriter::open(JsonlConfig {
            path: dir.join("activity.jsonl"),
            fallback_path: None,
            ..JsonlConfig::default()
        });
        startup_scan(&cfg.paths.staging_dir, &mut state, &cfg, &mut log).unwrap();

        assert_eq!(state.journal.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
