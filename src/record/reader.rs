//! Parses a staged file into a `Record` (C1).
//!
//! Each of the first `N_HEADERS` lines is `Key: Value`; the remainder of the
//! file is the body. A missing trailing newline on the last header or on the
//! body is tolerated. Malformed input (fewer than `N_HEADERS` header lines)
//! fails without leaving partial state behind — the caller gets nothing but
//! an error, never a half-built `Record`.

use std::path::Path;

use crate::core::errors::{Result, TpdError};
use crate::record::{N_HEADERS, Record};

/// Read and parse a staged record file.
pub fn read_record(path: &Path) -> Result<Record> {
    let raw = std::fs::read_to_string(path).map_err(|source| TpdError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_record(&raw).map_err(|details| TpdError::ParseFailure {
        path: path.to_path_buf(),
        details,
    })
}

/// Parse the in-memory contents of a staged file.
///
/// Kept separate from `read_record` so the pipeline's tests can exercise
/// parsing without touching the filesystem.
pub fn parse_record(raw: &str) -> std::result::Result<Record, String> {
    let mut lines = raw.splitn(N_HEADERS + 1, '\n');
    let mut headers = Vec::with_capacity(N_HEADERS);

    for i in 0..N_HEADERS {
        let Some(line) = lines.next() else {
            return Err(format!("expected {N_HEADERS} header lines, found {i}"));
        };
        if !line.contains(": ") && !line.contains(':') {
            return Err(format!("header line {i} is not \"Key: Value\": {line:?}"));
        }
        headers.push(line.trim_end_matches('\r').to_string());
    }

    let body = lines.next().unwrap_or("").trim_end_matches('\n').to_string();

    Ok(Record { headers, body })
}
