//! Frame clock pacing output frame events.
//!
//! Tracks the last presentation time and the refresh interval of an output so
//! the next frame can be scheduled on the output's refresh grid instead of a
//! fixed-interval timer that drifts.

use std::num::NonZeroU64;
use std::time::Duration;

use tracing::warn;

use crate::utils::{get_monotonic_time, refresh_interval};

#[derive(Debug)]
pub struct FrameClock {
    last_presentation_time: Option<Duration>,
    refresh_interval_ns: Option<NonZeroU64>,
}

impl FrameClock {
    pub fn new(refresh_interval: Option<Duration>) -> Self {
        let refresh_interval_ns = refresh_interval
            .and_then(|interval| u64::try_from(interval.as_nanos()).ok())
            .and_then(NonZeroU64::new);

        Self {
            last_presentation_time: None,
            refresh_interval_ns,
        }
    }

    /// Clock for a mode refreshing at `refresh_mhz`
    pub fn from_refresh(refresh_mhz: i32) -> Self {
        Self::new(refresh_interval(refresh_mhz))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ns
            .map(|r| Duration::from_nanos(r.get()))
    }

    /// Record that a frame was presented at the given time.
    pub fn presented(&mut self, presentation_time: Duration) {
        if presentation_time.is_zero() {
            return;
        }
        self.last_presentation_time = Some(presentation_time);
    }

    /// Predict the next presentation time as seen from `now`.
    pub fn next_presentation_time_at(&self, mut now: Duration) -> Duration {
        let Some(refresh_interval_ns) = self.refresh_interval_ns else {
            return now;
        };
        let Some(last_presentation_time) = self.last_presentation_time else {
            return now;
        };

        let refresh_interval_ns = refresh_interval_ns.get();

        if now < last_presentation_time {
            // Woken up before the frame we last presented.
            let orig_now = now;
            now += Duration::from_nanos(refresh_interval_ns);

            if now < last_presentation_time {
                warn!(
                    now = ?orig_now,
                    ?last_presentation_time,
                    "frame timer fired 2+ intervals early"
                );
                now = last_presentation_time;
            }
        }

        let since_last = now - last_presentation_time;
        let since_last_ns =
            since_last.as_secs() * 1_000_000_000 + u64::from(since_last.subsec_nanos());
        let to_next_ns = (since_last_ns / refresh_interval_ns + 1) * refresh_interval_ns;

        last_presentation_time + Duration::from_nanos(to_next_ns)
    }

    pub fn next_presentation_time(&self) -> Duration {
        self.next_presentation_time_at(get_monotonic_time())
    }

    /// Delay from `now` until the next frame should be produced.
    ///
    /// Falls back to the refresh interval (or 16ms for unknown rates) when no
    /// frame has been presented yet.
    pub fn time_to_next_frame(&self, now: Duration) -> Duration {
        let next = self.next_presentation_time_at(now);
        if next > now {
            next - now
        } else {
            self.refresh_interval()
                .unwrap_or(Duration::from_millis(16))
        }
    }
}
