//! Decoder session — the per-stream decode loop.
//!
//! A session owns one engine and turns a stream of input blocks into
//! pictures. Each [`DecoderSession::decode`] call takes one block, decides
//! whether to decode it, pushes it, and drives the engine until it either
//! yields a displayable image or runs dry.
//!
//! ## Block lifecycle
//!
//! 1. Empty input is a no-op.
//! 2. Discontinuous or corrupted blocks are dropped (a discontinuity also
//!    resets the engine).
//! 3. On the first real block, extradata is classified; Annex-B parameter
//!    sets are pushed and decoded before anything else.
//! 4. The admission controller may drop the block or hide its pictures.
//! 5. The block is pushed (NAL by NAL when length-prefixed) and released.
//! 6. The engine is stepped, pulling after every step, until a displayable
//!    image appears or the engine stalls.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use hs_common::{
    Block, DecodeEngine, DecodeError, DecodedImage, DecoderHost, InputFormat, OverloadDrop,
    Picture, SessionConfig, SessionError, StepOutcome, Timestamp, VideoCodec, VideoFormat,
};
use hs_demux::nal::split_length_prefixed;
use hs_demux::probe::{classify_extradata, Framing};

use crate::admission::{Admission, AdmissionController, LatenessState};
use crate::de265::{De265Engine, De265Library};
use crate::materialize::{copy_image, renegotiate};

/// Counters describing what a session has done so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Non-empty blocks handed to `decode`.
    pub blocks_received: u64,
    pub pictures_emitted: u64,
    /// Images taken out of the engine, displayed or not.
    pub images_pulled: u64,
    /// Images pulled but not displayed (preroll, soft overload).
    pub images_skipped: u64,
    pub framing_errors: u64,
    pub engine_errors: u64,
    pub overload_drops: u64,
    /// Blocks dropped for a discontinuity or corruption flag.
    pub flagged_drops: u64,
    pub unsupported_images: u64,
    pub renegotiations: u64,
}

impl SessionStats {
    /// Blocks abandoned before or while being pushed.
    pub fn blocks_abandoned(&self) -> u64 {
        self.framing_errors + self.overload_drops + self.flagged_drops
    }
}

/// Reject anything that is not HEVC before an engine is created.
pub fn check_codec(codec: VideoCodec) -> Result<(), SessionError> {
    if codec.is_hevc() {
        Ok(())
    } else {
        Err(SessionError::UnsupportedCodec(codec))
    }
}

/// One open HEVC stream.
pub struct DecoderSession<E: DecodeEngine, H: DecoderHost> {
    engine: E,
    host: H,
    config: SessionConfig,
    framing: Framing,
    extradata: Vec<u8>,
    extradata_checked: bool,
    admission: AdmissionController,
    output: VideoFormat,
    stats: SessionStats,
}

impl<E: DecodeEngine, H: DecoderHost> std::fmt::Debug for DecoderSession<E, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSession")
            .field("framing", &self.framing)
            .field("extradata_checked", &self.extradata_checked)
            .field("lateness", self.admission.state())
            .field("output", &self.output)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<H: DecoderHost> DecoderSession<De265Engine, H> {
    /// Open a session on a fresh libde265 decoder context.
    pub fn with_library(
        lib: Arc<De265Library>,
        host: H,
        input: &InputFormat,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        check_codec(input.codec)?;
        let engine = De265Engine::new(lib).map_err(SessionError::EngineInit)?;
        Self::open(engine, host, input, config)
    }
}

impl<E: DecodeEngine, H: DecoderHost> DecoderSession<E, H> {
    /// Open a session around `engine`.
    ///
    /// Worker start-up failure is logged and the engine runs single-threaded.
    ///
    /// # Errors
    /// `UnsupportedCodec` for non-HEVC input, `InvalidConfig` for a config
    /// that fails validation.
    pub fn open(
        mut engine: E,
        host: H,
        input: &InputFormat,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        check_codec(input.codec)?;
        config.validate()?;

        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = config.workers.thread_count(available);
        if workers > 0 {
            if let Err(e) = engine.start_workers(workers) {
                error!(workers, error = %e, "Failed to start worker threads, decoding single-threaded");
            }
        }

        info!(
            engine = %engine.version(),
            workers,
            resolution = %input.resolution,
            packetized = input.packetized,
            "Opened HEVC decoder session"
        );

        Ok(Self {
            engine,
            host,
            framing: Framing {
                packetized: input.packetized,
                length_size: config.default_length_size,
            },
            admission: AdmissionController::new(config.lateness.clone()),
            config,
            extradata: input.extradata.clone(),
            extradata_checked: false,
            output: VideoFormat::i420(input.resolution),
            stats: SessionStats::default(),
        })
    }

    /// Decode one block, returning a picture if one became displayable.
    ///
    /// Never fails: every abandoned block is logged and yields `None`.
    pub fn decode(&mut self, block: Option<Block>) -> Option<Picture> {
        match self.try_decode(block) {
            Ok(picture) => picture,
            Err(err) => {
                log_failure(&err);
                None
            }
        }
    }

    /// Like [`decode`](Self::decode), but reports why no picture was produced.
    ///
    /// `Ok(None)` means the engine simply needs more input.
    pub fn try_decode(&mut self, block: Option<Block>) -> Result<Option<Picture>, DecodeError> {
        let Some(block) = block.filter(|b| !b.is_empty()) else {
            return Ok(None);
        };
        self.stats.blocks_received += 1;
        let result = self.decode_block(block);
        self.account(&result);
        result
    }

    /// Flush the engine at end of stream and return every remaining picture.
    ///
    /// Images that cannot be shown are logged and skipped. An engine failure
    /// while stepping ends the drain with the pictures collected so far.
    ///
    /// # Errors
    /// Only a rejected flush, before any picture is taken out.
    pub fn drain(&mut self) -> Result<Vec<Picture>, DecodeError> {
        if let Err(err) = self.engine.flush() {
            let err = DecodeError::from(err);
            self.account(&Err(err.clone()));
            return Err(err);
        }

        let mut pictures = Vec::new();
        loop {
            let result = self.next_picture(Admission::Display, false);
            self.account(&result);
            match result {
                Ok(Some(picture)) => pictures.push(picture),
                Ok(None) => break,
                Err(err @ DecodeError::Engine(_)) => {
                    log_failure(&err);
                    break;
                }
                Err(err) => log_failure(&err),
            }
        }
        debug!(count = pictures.len(), "Drained decoder");
        Ok(pictures)
    }

    /// Close the session, releasing the engine. Returns the final statistics.
    pub fn close(self) -> SessionStats {
        info!(
            pictures = self.stats.pictures_emitted,
            abandoned = self.stats.blocks_abandoned(),
            "Closed HEVC decoder session"
        );
        self.stats
    }

    /// Output format, once the geometry is known.
    pub fn output_format(&self) -> Option<&VideoFormat> {
        (!self.output.resolution.is_empty()).then_some(&self.output)
    }

    /// Framing in effect (updated from extradata on the first block).
    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lateness(&self) -> &LatenessState {
        self.admission.state()
    }

    /// Overwrite the lateness state, e.g. to carry it across a session restart.
    pub fn set_lateness(&mut self, state: LatenessState) {
        *self.admission.state_mut() = state;
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn decode_block(&mut self, block: Block) -> Result<Option<Picture>, DecodeError> {
        if let Err(err) = self.admission.screen_flags(block.flags) {
            if err == DecodeError::Discontinuity {
                self.engine.reset();
            }
            return Err(err);
        }

        if !self.extradata_checked {
            self.extradata_checked = true;
            self.prime()?;
        }

        let preroll = block.flags.preroll;
        let admission =
            self.admission
                .admit(preroll, self.host.paces_output(), self.host.now())?;

        self.push_block(&block)?;
        drop(block);

        self.next_picture(admission, preroll)
    }

    /// Classify extradata and, for Annex-B, feed it through the engine.
    fn prime(&mut self) -> Result<(), DecodeError> {
        let probe = classify_extradata(&self.extradata, self.framing);
        self.framing = probe.framing;
        if !probe.needs_priming() {
            return Ok(());
        }

        self.engine.push(&self.extradata, Timestamp::ZERO)?;
        self.engine.push_end_of_nal();
        loop {
            let outcome = self.engine.step()?;
            while self.engine.pull_image().is_some() {}
            if outcome == StepOutcome::Stalled {
                return Ok(());
            }
        }
    }

    fn push_block(&mut self, block: &Block) -> Result<(), DecodeError> {
        let pts = block.pts.unwrap_or(Timestamp::ZERO);
        if !self.framing.packetized {
            self.engine.push(&block.data, pts)?;
            return Ok(());
        }
        for nal in split_length_prefixed(&block.data, self.framing.length_size) {
            self.engine.push_nal(nal?.data, pts)?;
        }
        Ok(())
    }

    /// Step and pull until a displayable image is materialized or the engine runs dry.
    ///
    /// Every pulled image updates lateness, including the ones skipped.
    fn next_picture(
        &mut self,
        admission: Admission,
        preroll: bool,
    ) -> Result<Option<Picture>, DecodeError> {
        loop {
            let image = loop {
                let outcome = self.engine.step()?;
                if let Some(image) = self.engine.pull_image() {
                    break image;
                }
                if outcome == StepOutcome::Stalled {
                    return Ok(None);
                }
            };
            self.stats.images_pulled += 1;

            let chroma = image.chroma();
            if !chroma.is_supported() {
                return Err(DecodeError::UnsupportedChroma(chroma));
            }

            let pts = image.pts();
            let deadline = if preroll {
                None
            } else {
                self.host.display_deadline(pts)
            };
            self.admission.observe(deadline, self.host.now());

            if admission == Admission::DecodeOnly {
                self.stats.images_skipped += 1;
                continue;
            }

            let (width, height) = (image.width(), image.height());
            if renegotiate(&mut self.output, width, height) {
                info!(width, height, "Output geometry changed");
                self.stats.renegotiations += 1;
            }

            let mut picture = self
                .host
                .new_picture(&self.output)
                .ok_or(DecodeError::PictureUnavailable)?;
            copy_image(&image, &mut picture);
            picture.progressive = true;
            picture.pts = pts;
            return Ok(Some(picture));
        }
    }

    fn account(&mut self, result: &Result<Option<Picture>, DecodeError>) {
        let stats = &mut self.stats;
        match result {
            Ok(Some(_)) => stats.pictures_emitted += 1,
            Ok(None) => {}
            Err(DecodeError::Framing(_)) => stats.framing_errors += 1,
            Err(DecodeError::Engine(_)) => stats.engine_errors += 1,
            Err(DecodeError::Overload(_)) => stats.overload_drops += 1,
            Err(DecodeError::Discontinuity | DecodeError::Corrupted) => stats.flagged_drops += 1,
            Err(DecodeError::UnsupportedChroma(_)) => stats.unsupported_images += 1,
            Err(DecodeError::PictureUnavailable) => {}
        }
    }
}

fn log_failure(err: &DecodeError) {
    match err {
        DecodeError::Overload(OverloadDrop::HardDrop { late_frames, .. }) => {
            warn!(late_frames, "{err}");
        }
        DecodeError::Overload(OverloadDrop::TooSlow { late_frames, .. }) => {
            error!(late_frames, "{err}");
        }
        DecodeError::Discontinuity | DecodeError::Corrupted => debug!("{err}"),
        DecodeError::PictureUnavailable => warn!("{err}"),
        DecodeError::Framing(_) | DecodeError::Engine(_) | DecodeError::UnsupportedChroma(_) => {
            error!("{err}");
        }
    }
}
