//! Scriptable engine and host doubles for exercising sessions without libde265.
//!
//! [`MockEngine`] records every call and releases queued images one per
//! `steps_per_image` decode steps. [`MockHost`] is a hand-driven clock with a
//! fixed presentation latency.

use std::collections::VecDeque;

use hs_common::{
    ChromaFormat, DecodeEngine, DecodedImage, DecoderHost, EngineError, EngineOp, ImagePlane,
    Picture, PixelFormat, StepOutcome, Timestamp, VideoFormat,
};

/// An image served by [`MockEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockImage {
    pub width: u32,
    pub height: u32,
    pub chroma: ChromaFormat,
    pub pts: Timestamp,
    /// `(bytes, stride)` per plane.
    pub planes: Vec<(Vec<u8>, usize)>,
}

impl MockImage {
    /// A 4:2:0 image whose planes hold a recognizable pattern, strides padded
    /// to `width + 16` (luma) and `width / 2 + 8` (chroma).
    pub fn i420(width: u32, height: u32, pts: Timestamp) -> Self {
        let strides = [width as usize + 16, (width as usize).div_ceil(2) + 8];
        Self::i420_with_strides(width, height, pts, [strides[0], strides[1], strides[1]])
    }

    pub fn i420_with_strides(
        width: u32,
        height: u32,
        pts: Timestamp,
        strides: [usize; 3],
    ) -> Self {
        let planes = strides
            .iter()
            .enumerate()
            .map(|(index, &stride)| {
                let (_, lines) = PixelFormat::I420.plane_size(index, width, height);
                let bytes = (0..stride * lines as usize)
                    .map(|i| (i as u8).wrapping_mul(3).wrapping_add(index as u8 * 50))
                    .collect();
                (bytes, stride)
            })
            .collect();
        Self {
            width,
            height,
            chroma: ChromaFormat::Yuv420,
            pts,
            planes,
        }
    }

    pub fn with_chroma(mut self, chroma: ChromaFormat) -> Self {
        self.chroma = chroma;
        self
    }
}

impl DecodedImage for MockImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn chroma(&self) -> ChromaFormat {
        self.chroma
    }

    fn pts(&self) -> Timestamp {
        self.pts
    }

    fn plane(&self, index: usize) -> Option<ImagePlane<'_>> {
        self.planes.get(index).map(|(data, stride)| ImagePlane {
            data,
            stride: *stride,
        })
    }
}

/// One recorded engine call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    Push { data: Vec<u8>, pts: Timestamp },
    PushNal { data: Vec<u8>, pts: Timestamp },
    EndOfNal,
    Step,
    Flush,
    Reset,
    StartWorkers(u32),
}

impl EngineCall {
    pub fn is_push(&self) -> bool {
        matches!(self, Self::Push { .. } | Self::PushNal { .. })
    }
}

/// Deterministic stand-in for a decoding engine.
#[derive(Debug)]
pub struct MockEngine {
    /// Every call, in order.
    pub calls: Vec<EngineCall>,
    /// Images still "being decoded".
    pub pending: VecDeque<MockImage>,
    /// Images ready to be pulled.
    pub ready: VecDeque<MockImage>,
    /// Decode steps needed to finish each pending image.
    pub steps_per_image: u32,
    /// Returned by the next push, if set.
    pub fail_push: Option<EngineError>,
    /// Returned by the next step, if set.
    pub fail_step: Option<EngineError>,
    /// Returned by `start_workers`, if set.
    pub fail_workers: Option<EngineError>,
    /// Returned by the next flush, if set.
    pub fail_flush: Option<EngineError>,
    progress: u32,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            steps_per_image: 1,
            fail_push: None,
            fail_step: None,
            fail_workers: None,
            fail_flush: None,
            progress: 0,
        }
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an image to come out of later decode steps.
    pub fn queue(&mut self, image: MockImage) {
        self.pending.push_back(image);
    }

    pub fn with_images(images: impl IntoIterator<Item = MockImage>) -> Self {
        let mut engine = Self::new();
        engine.pending.extend(images);
        engine
    }

    pub fn push_count(&self) -> usize {
        self.calls.iter().filter(|c| c.is_push()).count()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// Payloads of every `push_nal`, in order.
    pub fn pushed_nals(&self) -> Vec<&[u8]> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::PushNal { data, .. } => Some(data.as_slice()),
                _ => None,
            })
            .collect()
    }

    fn rejected(op: EngineOp, code: i32) -> EngineError {
        EngineError::Rejected {
            op,
            code,
            text: "mock failure".to_string(),
        }
    }

    /// An error as libde265 would report running out of memory.
    pub fn out_of_memory(op: EngineOp) -> EngineError {
        Self::rejected(op, 7)
    }
}

impl DecodeEngine for MockEngine {
    type Image<'a> = MockImage;

    fn push(&mut self, data: &[u8], pts: Timestamp) -> Result<(), EngineError> {
        if let Some(err) = self.fail_push.take() {
            return Err(err);
        }
        self.calls.push(EngineCall::Push {
            data: data.to_vec(),
            pts,
        });
        Ok(())
    }

    fn push_nal(&mut self, data: &[u8], pts: Timestamp) -> Result<(), EngineError> {
        if let Some(err) = self.fail_push.take() {
            return Err(err);
        }
        self.calls.push(EngineCall::PushNal {
            data: data.to_vec(),
            pts,
        });
        Ok(())
    }

    fn push_end_of_nal(&mut self) {
        self.calls.push(EngineCall::EndOfNal);
    }

    fn step(&mut self) -> Result<StepOutcome, EngineError> {
        self.calls.push(EngineCall::Step);
        if let Some(err) = self.fail_step.take() {
            return Err(err);
        }
        if self.pending.is_empty() {
            return Ok(StepOutcome::Stalled);
        }
        self.progress += 1;
        if self.progress >= self.steps_per_image {
            self.progress = 0;
            if let Some(image) = self.pending.pop_front() {
                self.ready.push_back(image);
            }
        }
        Ok(if self.pending.is_empty() {
            StepOutcome::Stalled
        } else {
            StepOutcome::Progressed
        })
    }

    fn pull_image(&mut self) -> Option<MockImage> {
        self.ready.pop_front()
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        if let Some(err) = self.fail_flush.take() {
            return Err(err);
        }
        self.calls.push(EngineCall::Flush);
        Ok(())
    }

    fn reset(&mut self) {
        self.calls.push(EngineCall::Reset);
        self.pending.clear();
        self.ready.clear();
        self.progress = 0;
    }

    fn start_workers(&mut self, count: u32) -> Result<(), EngineError> {
        self.calls.push(EngineCall::StartWorkers(count));
        match self.fail_workers.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn version(&self) -> String {
        "mock engine".to_string()
    }
}

/// Host with a manually advanced clock.
///
/// Deadlines are `pts + latency`; with `latency = None` no frame has one.
#[derive(Clone, Debug)]
pub struct MockHost {
    pub now: Timestamp,
    pub latency: Option<i64>,
    pub paces_output: bool,
    /// Refuse every picture allocation.
    pub out_of_pictures: bool,
    /// Custom pitches for allocated pictures; default 32-byte aligned.
    pub pitches: Option<Vec<usize>>,
    pub allocations: u32,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            now: Timestamp::ZERO,
            latency: Some(0),
            paces_output: false,
            out_of_pictures: false,
            pitches: None,
            allocations: 0,
        }
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn advance_micros(&mut self, us: i64) {
        self.now = Timestamp::from_micros(self.now.as_micros() + us);
    }
}

impl DecoderHost for MockHost {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn display_deadline(&self, pts: Timestamp) -> Option<Timestamp> {
        self.latency
            .map(|latency| Timestamp::from_micros(pts.as_micros() + latency))
    }

    fn paces_output(&self) -> bool {
        self.paces_output
    }

    fn new_picture(&mut self, format: &VideoFormat) -> Option<Picture> {
        if self.out_of_pictures {
            return None;
        }
        self.allocations += 1;
        match &self.pitches {
            Some(pitches) => Picture::with_pitches(format, pitches),
            None => Some(Picture::new(format)),
        }
    }
}
