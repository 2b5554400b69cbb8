//! libde265 decoder context implementing [`DecodeEngine`].

use std::ffi::c_int;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, warn};

use hs_common::{
    ChromaFormat, DecodeEngine, DecodedImage, EngineError, EngineOp, ImagePlane, StepOutcome,
    Timestamp,
};

use super::ffi::{
    status_is_ok, De265Api, De265Error, De265Library, DE265_CHROMA_420, DE265_CHROMA_422,
    DE265_CHROMA_444, DE265_CHROMA_MONO, DE265_ERROR_IMAGE_BUFFER_FULL,
    DE265_ERROR_WAITING_FOR_INPUT_DATA,
};

/// One libde265 decoder context, freed on drop.
pub struct De265Engine {
    lib: Arc<De265Library>,
    ctx: NonNull<std::ffi::c_void>,
}

// SAFETY: a decoder context may move between threads; it is only ever used
// through `&mut self`, so never from two threads at once.
unsafe impl Send for De265Engine {}

impl std::fmt::Debug for De265Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("De265Engine").field("ctx", &self.ctx).finish()
    }
}

impl De265Engine {
    /// Allocate a new decoder context.
    pub fn new(lib: Arc<De265Library>) -> Result<Self, EngineError> {
        // SAFETY: no preconditions; returns null on allocation failure.
        let ctx = unsafe { (lib.api.de265_new_decoder)() };
        let ctx = NonNull::new(ctx)
            .ok_or_else(|| EngineError::Unavailable("de265_new_decoder returned null".into()))?;
        debug!("Created libde265 decoder context");
        Ok(Self { lib, ctx })
    }

    fn api(&self) -> &De265Api {
        &self.lib.api
    }

    fn check(&self, status: De265Error, op: EngineOp) -> Result<(), EngineError> {
        if status_is_ok(status) {
            Ok(())
        } else {
            Err(EngineError::Rejected {
                op,
                code: status,
                text: self.lib.error_text(status),
            })
        }
    }

    fn push_with(
        &mut self,
        op: EngineOp,
        data: &[u8],
        pts: Timestamp,
    ) -> Result<(), EngineError> {
        let len = c_int::try_from(data.len())
            .map_err(|_| EngineError::InputTooLarge { len: data.len() })?;
        let push = match op {
            EngineOp::PushNal => self.api().de265_push_NAL,
            _ => self.api().de265_push_data,
        };
        // SAFETY: `data` is valid for `len` bytes; libde265 copies it before
        // returning and never dereferences the null user pointer.
        let status = unsafe {
            push(
                self.ctx.as_ptr(),
                data.as_ptr().cast(),
                len,
                pts.as_micros(),
                ptr::null_mut(),
            )
        };
        self.check(status, op)
    }
}

/// Map a `de265_decode` result onto a step outcome.
fn step_outcome(status: De265Error, more: c_int) -> Option<StepOutcome> {
    match status {
        DE265_ERROR_IMAGE_BUFFER_FULL | DE265_ERROR_WAITING_FOR_INPUT_DATA => {
            Some(StepOutcome::Stalled)
        }
        s if status_is_ok(s) => Some(if more != 0 {
            StepOutcome::Progressed
        } else {
            StepOutcome::Stalled
        }),
        _ => None,
    }
}

fn chroma_from_raw(raw: c_int) -> ChromaFormat {
    match raw {
        DE265_CHROMA_MONO => ChromaFormat::Monochrome,
        DE265_CHROMA_420 => ChromaFormat::Yuv420,
        DE265_CHROMA_422 => ChromaFormat::Yuv422,
        DE265_CHROMA_444 => ChromaFormat::Yuv444,
        // Not produced by libde265; reported as unsupported either way.
        _ => ChromaFormat::Yuv444,
    }
}

impl DecodeEngine for De265Engine {
    type Image<'a> = De265Image<'a>;

    fn push(&mut self, data: &[u8], pts: Timestamp) -> Result<(), EngineError> {
        self.push_with(EngineOp::PushData, data, pts)
    }

    fn push_nal(&mut self, data: &[u8], pts: Timestamp) -> Result<(), EngineError> {
        self.push_with(EngineOp::PushNal, data, pts)
    }

    fn push_end_of_nal(&mut self) {
        // SAFETY: `ctx` is a live decoder context.
        unsafe { (self.api().de265_push_end_of_NAL)(self.ctx.as_ptr()) }
    }

    fn step(&mut self) -> Result<StepOutcome, EngineError> {
        let mut more: c_int = 0;
        // SAFETY: `ctx` is live and `more` is a valid out-pointer.
        let status = unsafe { (self.api().de265_decode)(self.ctx.as_ptr(), &mut more) };
        match step_outcome(status, more) {
            Some(outcome) => Ok(outcome),
            None => Err(EngineError::Rejected {
                op: EngineOp::Decode,
                code: status,
                text: self.lib.error_text(status),
            }),
        }
    }

    fn pull_image(&mut self) -> Option<De265Image<'_>> {
        // SAFETY: `ctx` is live. The returned image stays valid until the next
        // call into the context, which the `&mut self` borrow rules out.
        let raw = unsafe { (self.api().de265_get_next_picture)(self.ctx.as_ptr()) };
        NonNull::new(raw.cast_mut()).map(|raw| De265Image {
            api: &self.lib.api,
            raw,
            _engine: PhantomData,
        })
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        // SAFETY: `ctx` is a live decoder context.
        let status = unsafe { (self.api().de265_flush_data)(self.ctx.as_ptr()) };
        self.check(status, EngineOp::Flush)
    }

    fn reset(&mut self) {
        // SAFETY: `ctx` is a live decoder context.
        unsafe { (self.api().de265_reset)(self.ctx.as_ptr()) }
    }

    fn start_workers(&mut self, count: u32) -> Result<(), EngineError> {
        let count = c_int::try_from(count).unwrap_or(c_int::MAX);
        // SAFETY: `ctx` is a live decoder context.
        let status =
            unsafe { (self.api().de265_start_worker_threads)(self.ctx.as_ptr(), count) };
        self.check(status, EngineOp::StartWorkers)
    }

    fn version(&self) -> String {
        format!("libde265 {}", self.lib.version())
    }
}

impl Drop for De265Engine {
    fn drop(&mut self) {
        // SAFETY: `ctx` came from `de265_new_decoder` and is freed exactly once.
        let status = unsafe { (self.api().de265_free_decoder)(self.ctx.as_ptr()) };
        if !status_is_ok(status) {
            warn!(code = status, "Failed to free libde265 decoder context");
        }
    }
}

/// A picture held in libde265's output queue.
pub struct De265Image<'a> {
    api: &'a De265Api,
    raw: NonNull<std::ffi::c_void>,
    _engine: PhantomData<&'a mut De265Engine>,
}

impl De265Image<'_> {
    fn ptr(&self) -> *const std::ffi::c_void {
        self.raw.as_ptr()
    }
}

impl DecodedImage for De265Image<'_> {
    fn width(&self) -> u32 {
        // SAFETY: `raw` is a live image for the lifetime of `self`.
        let w = unsafe { (self.api.de265_get_image_width)(self.ptr(), 0) };
        u32::try_from(w).unwrap_or(0)
    }

    fn height(&self) -> u32 {
        // SAFETY: as above.
        let h = unsafe { (self.api.de265_get_image_height)(self.ptr(), 0) };
        u32::try_from(h).unwrap_or(0)
    }

    fn chroma(&self) -> ChromaFormat {
        // SAFETY: as above.
        chroma_from_raw(unsafe { (self.api.de265_get_chroma_format)(self.ptr()) })
    }

    fn pts(&self) -> Timestamp {
        // SAFETY: as above.
        Timestamp::from_micros(unsafe { (self.api.de265_get_image_PTS)(self.ptr()) })
    }

    fn plane(&self, index: usize) -> Option<ImagePlane<'_>> {
        if index >= 3 || (index > 0 && self.chroma() == ChromaFormat::Monochrome) {
            return None;
        }
        let channel = index as c_int;
        let mut stride: c_int = 0;
        // SAFETY: `raw` is live and `stride` is a valid out-pointer.
        let data = unsafe { (self.api.de265_get_image_plane)(self.ptr(), channel, &mut stride) };
        // SAFETY: as above.
        let lines = unsafe { (self.api.de265_get_image_height)(self.ptr(), channel) };

        let stride = usize::try_from(stride).ok().filter(|&s| s > 0)?;
        let lines = usize::try_from(lines).ok()?;
        if data.is_null() {
            return None;
        }
        // SAFETY: libde265 allocates each plane as `stride * height` bytes and
        // keeps it alive as long as the image is.
        let data = unsafe { std::slice::from_raw_parts(data, stride * lines) };
        Some(ImagePlane { data, stride })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de265::ffi::{DE265_ERROR_OUT_OF_MEMORY, DE265_OK};

    #[test]
    fn decode_status_mapping() {
        assert_eq!(step_outcome(DE265_OK, 1), Some(StepOutcome::Progressed));
        assert_eq!(step_outcome(DE265_OK, 0), Some(StepOutcome::Stalled));
        assert_eq!(
            step_outcome(DE265_ERROR_IMAGE_BUFFER_FULL, 1),
            Some(StepOutcome::Stalled)
        );
        assert_eq!(
            step_outcome(DE265_ERROR_WAITING_FOR_INPUT_DATA, 1),
            Some(StepOutcome::Stalled)
        );
        // Warnings keep decoding.
        assert_eq!(step_outcome(1000, 1), Some(StepOutcome::Progressed));
        assert_eq!(step_outcome(DE265_ERROR_OUT_OF_MEMORY, 1), None);
    }

    #[test]
    fn chroma_mapping() {
        assert_eq!(chroma_from_raw(DE265_CHROMA_420), ChromaFormat::Yuv420);
        assert_eq!(chroma_from_raw(DE265_CHROMA_MONO), ChromaFormat::Monochrome);
        assert!(!chroma_from_raw(42).is_supported());
    }
}
