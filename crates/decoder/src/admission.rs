//! Late-frame admission control.
//!
//! Decides, per input block, whether to decode and display, decode without
//! displaying, or not decode at all. Lateness is learned from the display
//! deadlines of the images the engine hands back.

use hs_common::{BlockFlags, DecodeError, LatenessPolicy, OverloadDrop, Timestamp};

/// Late-frame counter and the instant the current late streak began.
///
/// `window_start` is set exactly when `late_frames > 0`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LatenessState {
    late_frames: u32,
    window_start: Option<Timestamp>,
}

impl LatenessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A streak of `late_frames` late images that began at `since`.
    pub fn late_since(late_frames: u32, since: Timestamp) -> Self {
        Self {
            late_frames,
            window_start: (late_frames > 0).then_some(since),
        }
    }

    pub fn late_frames(&self) -> u32 {
        self.late_frames
    }

    pub fn window_start(&self) -> Option<Timestamp> {
        self.window_start
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Count one more late image; a new streak starts its window at `now`.
    pub fn record_late(&mut self, now: Timestamp) {
        self.late_frames = self.late_frames.saturating_add(1);
        if self.late_frames == 1 {
            self.window_start = Some(now);
        }
    }

    /// Take one frame off the count after dropping a block.
    fn relieve(&mut self) {
        self.late_frames = self.late_frames.saturating_sub(1);
        if self.late_frames == 0 {
            self.window_start = None;
        }
    }
}

/// What to do with a block that passed admission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Decode and return the first image.
    Display,
    /// Decode to keep the engine consistent, but show nothing.
    DecodeOnly,
}

/// Per-session lateness policy and state.
#[derive(Clone, Debug)]
pub struct AdmissionController {
    policy: LatenessPolicy,
    state: LatenessState,
}

impl AdmissionController {
    pub fn new(policy: LatenessPolicy) -> Self {
        Self {
            policy,
            state: LatenessState::new(),
        }
    }

    pub fn state(&self) -> &LatenessState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LatenessState {
        &mut self.state
    }

    pub fn policy(&self) -> &LatenessPolicy {
        &self.policy
    }

    /// Abandon discontinuous or corrupted blocks, clearing lateness.
    ///
    /// The caller resets the engine on [`DecodeError::Discontinuity`].
    pub fn screen_flags(&mut self, flags: BlockFlags) -> Result<(), DecodeError> {
        if flags.discontinuity || flags.corrupted {
            self.state.reset();
            return Err(if flags.discontinuity {
                DecodeError::Discontinuity
            } else {
                DecodeError::Corrupted
            });
        }
        Ok(())
    }

    /// Decide the fate of a block before anything is pushed to the engine.
    ///
    /// `host_paces` disables every lateness drop: the pipeline handles it.
    pub fn admit(
        &mut self,
        preroll: bool,
        host_paces: bool,
        now: Timestamp,
    ) -> Result<Admission, OverloadDrop> {
        let mut admission = Admission::Display;
        if preroll {
            self.state.reset();
            admission = Admission::DecodeOnly;
        }
        if host_paces {
            return Ok(admission);
        }

        let late_frames = self.state.late_frames;
        let ceiling = self.policy.drop_always_after();
        if let Some(start) = self.state.window_start {
            if late_frames > 0 && now.duration_since(start) > ceiling {
                self.state.relieve();
                return Err(OverloadDrop::TooSlow {
                    late_frames,
                    ceiling,
                });
            }
        }

        if late_frames > self.policy.soft_threshold {
            if late_frames > self.policy.hard_threshold {
                // Wait for the backlog to clear; the picture stays broken
                // until the next key frame.
                self.state.relieve();
                return Err(OverloadDrop::HardDrop {
                    late_frames,
                    limit: self.policy.hard_threshold,
                });
            }
            admission = Admission::DecodeOnly;
        }
        Ok(admission)
    }

    /// Update lateness from one pulled image. Returns true if it was late.
    ///
    /// An image is late when it has a deadline at or before `now`; an image
    /// without a deadline counts as on time.
    pub fn observe(&mut self, deadline: Option<Timestamp>, now: Timestamp) -> bool {
        match deadline {
            Some(deadline) if deadline <= now => {
                self.state.record_late(now);
                true
            }
            _ => {
                self.state.reset();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller() -> AdmissionController {
        AdmissionController::new(LatenessPolicy::default())
    }

    fn ms(v: i64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    #[test]
    fn late_streak_sets_window_once() {
        let mut ac = controller();
        assert!(ac.observe(Some(ms(10)), ms(20)));
        assert_eq!(ac.state().late_frames(), 1);
        assert_eq!(ac.state().window_start(), Some(ms(20)));

        assert!(ac.observe(Some(ms(30)), ms(40)));
        assert_eq!(ac.state().late_frames(), 2);
        assert_eq!(ac.state().window_start(), Some(ms(20)));

        assert!(!ac.observe(Some(ms(100)), ms(50)));
        assert_eq!(*ac.state(), LatenessState::new());
    }

    #[test]
    fn deadline_equal_to_now_is_late() {
        let mut ac = controller();
        assert!(ac.observe(Some(ms(5)), ms(5)));
    }

    #[test]
    fn missing_deadline_is_on_time() {
        let mut ac = controller();
        ac.observe(Some(ms(1)), ms(2));
        assert!(!ac.observe(None, ms(3)));
        assert_eq!(ac.state().late_frames(), 0);
    }

    #[test]
    fn flags_reset_and_abandon() {
        let mut ac = controller();
        *ac.state_mut() = LatenessState::late_since(7, ms(0));
        assert_eq!(
            ac.screen_flags(BlockFlags::corrupted()),
            Err(DecodeError::Corrupted)
        );
        assert_eq!(ac.state().late_frames(), 0);

        *ac.state_mut() = LatenessState::late_since(20, ms(0));
        assert_eq!(
            ac.screen_flags(BlockFlags::discontinuity()),
            Err(DecodeError::Discontinuity)
        );
        assert_eq!(ac.state().window_start(), None);
        assert!(ac.screen_flags(BlockFlags::NONE).is_ok());
    }

    #[test]
    fn soft_threshold_decodes_without_display() {
        let mut ac = controller();
        *ac.state_mut() = LatenessState::late_since(4, ms(0));
        assert_eq!(ac.admit(false, false, ms(10)), Ok(Admission::Display));

        *ac.state_mut() = LatenessState::late_since(5, ms(0));
        assert_eq!(ac.admit(false, false, ms(10)), Ok(Admission::DecodeOnly));
        // The soft branch leaves the count alone.
        assert_eq!(ac.state().late_frames(), 5);

        *ac.state_mut() = LatenessState::late_since(12, ms(0));
        assert_eq!(ac.admit(false, false, ms(10)), Ok(Admission::DecodeOnly));
    }

    #[test]
    fn hard_threshold_drops_and_decrements() {
        let mut ac = controller();
        *ac.state_mut() = LatenessState::late_since(13, ms(0));
        assert_eq!(
            ac.admit(false, false, ms(100)),
            Err(OverloadDrop::HardDrop {
                late_frames: 13,
                limit: 12
            })
        );
        assert_eq!(ac.state().late_frames(), 12);
        assert_eq!(ac.state().window_start(), Some(ms(0)));
    }

    #[test]
    fn five_second_ceiling_drops() {
        let mut ac = controller();
        *ac.state_mut() = LatenessState::late_since(1, ms(0));
        // Exactly at the ceiling is not yet too slow.
        assert_eq!(ac.admit(false, false, ms(5_000)), Ok(Admission::Display));

        let err = ac.admit(false, false, ms(5_001)).unwrap_err();
        assert_eq!(
            err,
            OverloadDrop::TooSlow {
                late_frames: 1,
                ceiling: Duration::from_secs(5)
            }
        );
        assert_eq!(*ac.state(), LatenessState::new());
    }

    #[test]
    fn preroll_clears_lateness_and_hides() {
        let mut ac = controller();
        *ac.state_mut() = LatenessState::late_since(30, ms(0));
        assert_eq!(ac.admit(true, false, ms(60_000)), Ok(Admission::DecodeOnly));
        assert_eq!(ac.state().late_frames(), 0);
    }

    #[test]
    fn pacing_host_never_drops() {
        let mut ac = controller();
        *ac.state_mut() = LatenessState::late_since(50, ms(0));
        assert_eq!(ac.admit(false, true, ms(60_000)), Ok(Admission::Display));
        assert_eq!(ac.state().late_frames(), 50);
    }
}
