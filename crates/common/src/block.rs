//! Input blocks — compressed data handed to a session, one call at a time.

use crate::types::Timestamp;

/// Per-block signalling from the host pipeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockFlags {
    /// The stream jumped (seek, lost data): decoder state must be reset.
    pub discontinuity: bool,
    /// The host knows this block's payload is damaged.
    pub corrupted: bool,
    /// Decode for warm-up only; never display.
    pub preroll: bool,
}

impl BlockFlags {
    pub const NONE: Self = Self {
        discontinuity: false,
        corrupted: false,
        preroll: false,
    };

    pub fn discontinuity() -> Self {
        Self {
            discontinuity: true,
            ..Self::NONE
        }
    }

    pub fn corrupted() -> Self {
        Self {
            corrupted: true,
            ..Self::NONE
        }
    }

    pub fn preroll() -> Self {
        Self {
            preroll: true,
            ..Self::NONE
        }
    }
}

/// A chunk of compressed input.
///
/// Chunk boundaries need not match frame boundaries. A session takes blocks
/// by value, so the block is released exactly once, when the call that
/// received it returns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// Compressed payload: length-prefixed NAL units or an Annex-B byte stream.
    pub data: Vec<u8>,
    pub flags: BlockFlags,
    /// Presentation timestamp, if the host knows it.
    pub pts: Option<Timestamp>,
}

impl Block {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            flags: BlockFlags::NONE,
            pts: None,
        }
    }

    pub fn with_pts(mut self, pts: Timestamp) -> Self {
        self.pts = Some(pts);
        self
    }

    pub fn with_flags(mut self, flags: BlockFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let block = Block::new(vec![1, 2, 3])
            .with_pts(Timestamp::from_micros(40))
            .with_flags(BlockFlags::preroll());
        assert_eq!(block.len(), 3);
        assert_eq!(block.pts, Some(Timestamp::from_micros(40)));
        assert!(block.flags.preroll);
        assert!(!block.flags.discontinuity);
    }

    #[test]
    fn default_block_is_empty() {
        let block = Block::default();
        assert!(block.is_empty());
        assert_eq!(block.flags, BlockFlags::NONE);
        assert_eq!(block.pts, None);
    }
}
