//! Runtime constants shared by all stages

use std::time::Duration;

/// Pause after a transient receive or handler failure
pub const TRANSIENT_BACKOFF: Duration = Duration::from_millis(100);

/// Significant figures kept by latency histograms
pub const HISTOGRAM_SIGFIG: u8 = 3;

/// Messages a single handler call is expected to emit without spilling
pub const OUTBOX_INLINE: usize = 4;
