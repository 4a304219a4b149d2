//! Spool writer (C5): persists rejected/failed records to local disk,
//! bounded by a configured maximum footprint.

use std::fs;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::core::errors::{Result, TpdError};

/// Outcome of a spool write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolOutcome {
    /// Written to disk; `spool_bytes_used` was advanced by the caller.
    Written,
    /// Dropped silently because the spool cap was reached.
    Dropped,
}

/// Pre-check the cap, then create a uniquely named file under `dir`, write
/// all headers then the body plus a trailing newline, and add
/// `st_blocks * 512` to `bytes_used`. Any error between create and stat
/// unlinks the partial file.
pub fn write_spooled(
    dir: &Path,
    headers: &[String],
    body: &str,
    max_bytes: Option<u64>,
    bytes_used: &mut u64,
) -> Result<SpoolOutcome> {
    if let Some(cap) = max_bytes {
        if *bytes_used >= cap {
            return Ok(SpoolOutcome::Dropped);
        }
    }

    fs::create_dir_all(dir).map_err(|source| TpdError::io(dir, source))?;

    let named = tempfile::Builder::new()
        .prefix("")
        .rand_bytes(6)
        .tempfile_in(dir)
        .map_err(|source| TpdError::io(dir, source))?;

    let write_result = write_spool_contents(named.path(), headers, body);
    if let Err(err) = write_result {
        let _ = fs::remove_file(named.path());
        return Err(err);
    }

    let meta = match fs::metadata(named.path()) {
        Ok(meta) => meta,
        Err(source) => {
            let path = named.path().to_path_buf();
            let _ = fs::remove_file(&path);
            return Err(TpdError::io(path, source));
        }
    };

    *bytes_used += meta.blocks() * 512;
    // keep the file on disk: persist it under its own generated name.
    let path = named.path().to_path_buf();
    named.keep().map_err(|e| TpdError::io(&path, e.error))?;
    Ok(SpoolOutcome::Written)
}

fn write_spool_contents(path: &Path, headers: &[String], body: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| TpdError::io(path, source))?;
    for header in headers {
        writeln!(file, "{header}").map_err(|source| TpdError::io(path, source))?;
    }
    writeln!(file, "{body}").map_err(|source| TpdError::io(path, source))?;
    file.flush().map_err(|source| TpdError::io(path, source))
}
