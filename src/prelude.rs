//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use telemetry_post_daemon::prelude::*;
//! ```

pub use crate::core::config::DaemonConfig;
pub use crate::core::errors::{Result, TpdError};

pub use crate::record::Record;
pub use crate::record::reader::read_record;

pub use crate::journal::{Journal, NullPruneSink, PruneSink};
pub use crate::policy::{DaemonState, process_staged_record};
pub use crate::ratelimit::RingWindow;
pub use crate::retention::RetentionPruneSink;
