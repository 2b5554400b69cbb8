//! Wall-clock host for command-line playback.

use std::time::{Duration, Instant};

use hs_common::{DecoderHost, Timestamp};

/// Host whose clock starts when playback starts.
///
/// With pacing on, a frame with `pts` is due `latency` after `start + pts`.
/// Without pacing no frame has a deadline, so nothing is ever late.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    start: Instant,
    latency: Duration,
    paced: bool,
}

impl PlaybackClock {
    pub fn new(paced: bool, latency: Duration) -> Self {
        Self {
            start: Instant::now(),
            latency,
            paced,
        }
    }

    pub fn is_paced(&self) -> bool {
        self.paced
    }

    /// Block the thread until the presentation time `pts` is reached.
    pub fn wait_until(&self, pts: Timestamp) {
        if !self.paced {
            return;
        }
        let target = pts.duration_since(Timestamp::ZERO);
        if let Some(remaining) = target.checked_sub(self.start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}

impl DecoderHost for PlaybackClock {
    fn now(&self) -> Timestamp {
        let us = i64::try_from(self.start.elapsed().as_micros()).unwrap_or(i64::MAX);
        Timestamp::from_micros(us)
    }

    fn display_deadline(&self, pts: Timestamp) -> Option<Timestamp> {
        self.paced.then(|| pts + self.latency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaced_clock_has_no_deadlines() {
        let clock = PlaybackClock::new(false, Duration::from_millis(100));
        assert_eq!(clock.display_deadline(Timestamp::from_millis(40)), None);
        // Returns immediately.
        clock.wait_until(Timestamp::from_millis(10_000));
    }

    #[test]
    fn paced_deadline_adds_latency() {
        let clock = PlaybackClock::new(true, Duration::from_millis(100));
        assert_eq!(
            clock.display_deadline(Timestamp::from_millis(40)),
            Some(Timestamp::from_millis(140))
        );
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = PlaybackClock::new(true, Duration::ZERO);
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= Timestamp::ZERO);
    }
}
