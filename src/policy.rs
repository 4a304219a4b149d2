//! Policy pipeline (C7): per-record orchestration applying C1-C6 in fixed
//! order.
//!
//! `process_staged_record` is the single entry point the event loop calls
//! for every staged file, whether discovered at startup or surfaced by the
//! filesystem watcher. Its return value means exactly one thing: "safe to
//! unlink the staged file." It is `false` only when the parse step (C1)
//! fails; every other outcome — sent, spooled, or dropped — is success from
//! the staging directory's point of view.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::core::config::DaemonConfig;
use crate::core::errors::{Result, TpdError};
use crate::http;
use crate::journal::Journal;
use crate::ratelimit::{RingWindow, burst_limit_enabled};
use crate::record::reader::read_record;
use crate::record::{CLASSIFICATION, EVENT_ID};
use crate::retention;
use crate::spool::{self, SpoolOutcome};

/// Duration records are routed straight to spool after a send failure.
pub const DIRECT_SPOOL_WINDOW: Duration = Duration::from_secs(1800);

/// Mutable, single-owner state threaded through every pipeline invocation.
pub struct DaemonState {
    pub bypass_until: Option<Instant>,
    pub record_burst: RingWindow,
    pub byte_burst: RingWindow,
    pub spool_bytes_used: u64,
    pub journal: Journal,
}

impl DaemonState {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            bypass_until: None,
            record_burst: RingWindow::new(),
            byte_burst: RingWindow::new(),
            spool_bytes_used: 0,
            journal,
        }
    }

    fn inside_direct_spool_window(&self, now: Instant) -> bool {
        self.bypass_until.is_some_and(|until| now < until)
    }

    fn arm_bypass(&mut self, now: Instant) {
        self.bypass_until = Some(now + DIRECT_SPOOL_WINDOW);
    }
}

/// Execute the fixed nine-step pipeline against a staged file.
///
/// Returns `Ok(true)` when the staged file may be unlinked, `Ok(false)` when
/// it must remain in place for a future pass. Genuine runtime errors that
/// are not simply "parse failed" — a fatal window-length configuration, or
/// an I/O error writing to the journal — surface as `Err`.
pub fn process_staged_record(
    path: &Path,
    state: &mut DaemonState,
    config: &DaemonConfig,
) -> Result<bool> {
    // Step 1: parse.
    let record = match read_record(path) {
        Ok(record) => record,
        Err(TpdError::ParseFailure { .. }) => return Ok(false),
        Err(other) => return Err(other),
    };

    let now_instant = Instant::now();
    let now_unix = unix_now();
    let minute = current_minute();

    // Step 2: journal append.
    let classification = record.header_value(CLASSIFICATION).unwrap_or_default();
    let event_id = record.header_value(EVENT_ID).unwrap_or_default();
    let record_id = state.journal.append(classification, event_id, now_unix)?;

    // Step 3: retention copy (best-effort, never blocks delivery).
    if config.features.record_retention_enabled {
        if let Err(err) = retention::write_copy(&config.paths.retention_dir, &record_id, &record.body)
        {
            eprintln!("[TPD-RETENTION] local copy failed for {record_id}: {err}");
        }
    }

    // Step 4: server delivery gate.
    if !config.features.record_server_delivery_enabled {
        return Ok(true);
    }

    // Step 5: direct-spool window. `spool_record` may silently drop the
    // write if the spool cap is already full; either way the staged file is
    // done with — there is nowhere else for it to go.
    if state.inside_direct_spool_window(now_instant) {
        spool_record(&record, config, state)?;
        return Ok(true);
    }

    // Step 6: window sanity. Fatal unconditionally — regardless of whether
    // rate limiting as a whole, or a given axis's burst limit, is enabled.
    if !(1..=60).contains(&config.rate_limit.record_window_length) {
        return Err(TpdError::InvalidWindowLength {
            value: config.rate_limit.record_window_length,
        });
    }
    if !(1..=60).contains(&config.rate_limit.byte_window_length) {
        return Err(TpdError::InvalidWindowLength {
            value: config.rate_limit.byte_window_length,
        });
    }
    let record_enabled = burst_limit_enabled(config.rate_limit.record_burst_limit);
    let byte_enabled = burst_limit_enabled(config.rate_limit.byte_burst_limit);

    // Step 7: rate-limit check.
    let rate_limiting_active = config.rate_limit.enabled && (record_enabled || byte_enabled);
    let mut record_check_passed = true;
    let mut byte_check_passed = true;
    if rate_limiting_active {
        if record_enabled {
            record_check_passed = state.record_burst.check(
                minute,
                config.rate_limit.record_window_length as usize,
                config.rate_limit.record_burst_limit,
                1,
            );
        }
        if byte_enabled {
            byte_check_passed = state.byte_burst.check(
                minute,
                config.rate_limit.byte_window_length as usize,
                config.rate_limit.byte_burst_limit,
                record.body_len(),
            );
        }
    }

    // Step 8: send decision.
    let should_attempt_send = !rate_limiting_active || (record_check_passed && byte_check_passed);
    let sent = if should_attempt_send {
        http::post(
            &config.http,
            &record.headers,
            config.features.machine_id_override.as_deref(),
            &record.body,
        )?
    } else {
        false
    };

    // Step 9: outcome dispatch.
    if sent {
        if rate_limiting_active {
            if record_enabled {
                state.record_burst.update(
                    minute,
                    config.rate_limit.record_window_length as usize,
                    1,
                );
            }
            if byte_enabled {
                state.byte_burst.update(
                    minute,
                    config.rate_limit.byte_window_length as usize,
                    record.body_len(),
                );
            }
        }
        return Ok(true);
    }

    if config.rate_limit.strategy_is_spool() {
        // Bypass arms only here — a true send failure — never on a
        // rate-limit rejection routed to spool by strategy alone.
        if should_attempt_send {
            state.arm_bypass(now_instant);
        }
        spool_record(&record, config, state)?;
    }

    // strategy == "drop", or spool wrote (or silently dropped for
    // capacity): either way the staged file is done with.
    Ok(true)
}

fn spool_record(
    record: &crate::record::Record,
    config: &DaemonConfig,
    state: &mut DaemonState,
) -> Result<SpoolOutcome> {
    spool::write_spooled(
        &config.paths.spool_dir,
        &record.headers,
        &record.body,
        config.spool.max_size_bytes(),
        &mut state.spool_bytes_used,
    )
}

fn current_minute() -> usize {
    let secs = unix_now();
    ((secs / 60) % 60) as usize
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
