//! `hs-demux` — HEVC bitstream demuxing.
//!
//! Classifies extradata (hvcC record vs. Annex-B parameter sets) and splits
//! blocks into NAL units, either length-prefixed or start-code delimited.
//! NAL units are never copied: every unit is a view into its block.

pub mod nal;
pub mod probe;

pub use nal::{
    annexb_to_length_prefixed, split_access_units, split_annexb, split_length_prefixed,
    AnnexBNals, HevcNalType, LengthPrefixedNals, NalUnit, ANNEXB_START_CODE,
};
pub use probe::{classify_extradata, is_annexb_start, ExtradataKind, Framing, Probe};
