//! JSON-lines replay driver
//!
//! Each line is one encoded `Message`; ticks and signals are published on
//! their natural addresses and drive the manual clock forward to their event
//! time, so routing throttles see replay time rather than wall time.

use anyhow::Result;
use bus::codec::decode_json_line;
use bus::{EventBus, EventBusError, Message};
use common::{Clock, ManualClock};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Source label on replayed envelopes
pub const REPLAY_SOURCE: &str = "replay";

/// Replay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Lines read, including blanks and comments
    pub lines: u64,
    /// Messages handed to the bus
    pub published: u64,
    /// Valid messages of a kind replay does not feed
    pub skipped: u64,
    /// Lines that failed to decode
    pub invalid: u64,
    /// Published with nobody subscribed
    pub unrouted: u64,
}

/// Feed every line of `reader` into `bus`
pub async fn replay<R>(reader: R, bus: &EventBus<Message>, clock: &ManualClock) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        stats.lines += 1;
        let message = match decode_json_line(&line) {
            None => continue,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(line = stats.lines, error = %e, "undecodable replay line");
                stats.invalid += 1;
                continue;
            }
        };

        let event_ts = match &message {
            Message::Tick(tick) => tick.ts,
            Message::Signal(signal) => signal.ts,
            other => {
                debug!(line = stats.lines, kind = other.kind(), "replay skips non-input message");
                stats.skipped += 1;
                continue;
            }
        };
        if event_ts > clock.now() {
            clock.set(event_ts);
        }

        match bus.publish(message, REPLAY_SOURCE) {
            Ok(_) => stats.published += 1,
            Err(EventBusError::NoSubscribers { .. }) => stats.unrouted += 1,
            Err(e) => return Err(e.into()),
        }
        // Let the stages drain before the next line can overwrite the ring
        tokio::task::yield_now().await;
    }
    Ok(stats)
}
