//! What a session needs from the surrounding media pipeline.

use crate::format::VideoFormat;
use crate::picture::Picture;
use crate::types::Timestamp;

/// Clock, pacing and picture allocation supplied by the host pipeline.
pub trait DecoderHost {
    /// Current reading of the monotonic clock.
    fn now(&self) -> Timestamp;

    /// Absolute instant by which the frame with `pts` must be shown, or `None`
    /// if it has no deadline (unknown timestamp, clock not running).
    fn display_deadline(&self, pts: Timestamp) -> Option<Timestamp>;

    /// True if the pipeline already drops late pictures itself; the session
    /// then never drops blocks for lateness.
    fn paces_output(&self) -> bool {
        false
    }

    /// Allocate an output picture for `format`, or `None` if the pipeline has
    /// no buffer to give.
    fn new_picture(&mut self, format: &VideoFormat) -> Option<Picture> {
        Some(Picture::new(format))
    }
}
