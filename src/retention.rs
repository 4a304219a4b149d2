//! Local retention copy writer (C3).
//!
//! Best-effort: writes the record body under a stable id when retention is
//! enabled. Failures are logged by the caller and swallowed — retention must
//! never block delivery.

use std::fs;
use std::path::Path;

use crate::core::errors::{Result, TpdError};
use crate::journal::{PruneSink, RecordId};

/// Write `body` plus a trailing newline to `dir/{record_id}`.
pub fn write_copy(dir: &Path, record_id: &str, body: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| TpdError::io(dir, source))?;
    let path = dir.join(record_id);
    fs::write(&path, format!("{body}\n")).map_err(|source| TpdError::io(&path, source))
}

/// A `PruneSink` that deletes the matching retention copy file. Armed by the
/// event loop only when `record_retention_enabled` is true (spec.md
/// invariant: "no deletion callback is armed" otherwise).
pub struct RetentionPruneSink {
    pub dir: std::path::PathBuf,
}

impl PruneSink for RetentionPruneSink {
    fn delete(&self, record_id: &RecordId) {
        let path = self.dir.join(record_id);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                eprintln!("[TPD-RETENTION] failed to delete {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_body_with_trailing_newline() {
        let dir = std::env::temp_dir().join(format!("tpd-retention-test-{}", std::process::id()));
        write_copy(&dir, "rec-1", "hello").unwrap();
        let contents = fs::read_to_string(dir.join("rec-1")).unwrap();
        assert_eq!(contents, "hello\n");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn prune_sink_deletes_matching_file() {
        let dir = std::env::temp_dir().join(format!("tpd-retention-test2-{}", std::process::id()));
        write_copy(&dir, "rec-2", "body").unwrap();
        let sink = RetentionPruneSink { dir: dir.clone() };
        sink.delete(&"rec-2".to_string());
        assert!(!dir.join("rec-2").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn prune_sink_tolerates_missing_file() {
        let dir = std::env::temp_dir().join(format!("tpd-retention-test3-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let sink = RetentionPruneSink { dir: dir.clone() };
        sink.delete(&"does-not-exist".to_string());
        fs::remove_dir_all(&dir).ok();
    }
}
