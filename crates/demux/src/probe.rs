//! Extradata probing — decide how NAL units are framed in a stream.
//!
//! An hvcC configuration record means length-prefixed NAL units and carries
//! the prefix width; anything starting with an Annex-B start code is a raw
//! byte stream whose parameter sets must be fed to the engine before the
//! first frame.

use tracing::debug;

/// Offset of `lengthSizeMinusOne` in an HEVCDecoderConfigurationRecord.
pub const HVCC_LENGTH_SIZE_OFFSET: usize = 21;

/// Extradata this short is never classified.
const MIN_CLASSIFIED_LEN: usize = 4;

/// How a session splits blocks into NAL units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Framing {
    /// Blocks carry `length_size`-byte big-endian prefixed NAL units.
    pub packetized: bool,
    /// Width of the length prefix, 1..=4.
    pub length_size: u8,
}

impl Framing {
    pub fn annexb(length_size: u8) -> Self {
        Self {
            packetized: false,
            length_size,
        }
    }

    pub fn packetized(length_size: u8) -> Self {
        Self {
            packetized: true,
            length_size,
        }
    }
}

/// What the extradata turned out to be.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExtradataKind {
    /// Empty or too short to classify; caller defaults stand.
    Unclassified,
    /// A configuration record for length-prefixed NAL units.
    LengthPrefixed,
    /// Annex-B parameter sets, to be pushed before any frame.
    AnnexB,
}

/// Outcome of [`classify_extradata`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    pub kind: ExtradataKind,
    pub framing: Framing,
}

impl Probe {
    /// True if the extradata must be pushed to the engine as a priming chunk.
    pub fn needs_priming(&self) -> bool {
        self.kind == ExtradataKind::AnnexB
    }
}

/// True if `data` opens with `00 00 00` or `00 00 01`.
pub fn is_annexb_start(data: &[u8]) -> bool {
    matches!(data, [0, 0, b2, ..] if *b2 <= 1)
}

/// NAL length-prefix width stored in an hvcC record, if the record is long enough.
pub fn hvcc_length_size(extradata: &[u8]) -> Option<u8> {
    extradata
        .get(HVCC_LENGTH_SIZE_OFFSET)
        .map(|b| (b & 0b11) + 1)
}

/// Classify out-of-band extradata.
///
/// `defaults` is what the caller declared; it is returned unchanged when the
/// extradata is too short to say anything.
pub fn classify_extradata(extradata: &[u8], defaults: Framing) -> Probe {
    if extradata.len() < MIN_CLASSIFIED_LEN {
        return Probe {
            kind: ExtradataKind::Unclassified,
            framing: defaults,
        };
    }

    if is_annexb_start(extradata) {
        debug!(len = extradata.len(), "Assuming non-packetized data");
        return Probe {
            kind: ExtradataKind::AnnexB,
            framing: Framing::annexb(defaults.length_size),
        };
    }

    let length_size = hvcc_length_size(extradata).unwrap_or(defaults.length_size);
    debug!(length_size, "Assuming packetized data");
    Probe {
        kind: ExtradataKind::LengthPrefixed,
        framing: Framing::packetized(length_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hvcc(length_size_minus_one: u8) -> Vec<u8> {
        let mut record = vec![0u8; 23];
        record[0] = 1; // configurationVersion
        record[HVCC_LENGTH_SIZE_OFFSET] = 0xFC | length_size_minus_one;
        record
    }

    #[test]
    fn test_empty_keeps_defaults() {
        let defaults = Framing::packetized(4);
        let probe = classify_extradata(&[], defaults);
        assert_eq!(probe.kind, ExtradataKind::Unclassified);
        assert_eq!(probe.framing, defaults);
        assert!(!probe.needs_priming());
    }

    #[test]
    fn test_short_keeps_defaults() {
        let defaults = Framing::annexb(4);
        let probe = classify_extradata(&[1, 2, 3], defaults);
        assert_eq!(probe.framing, defaults);
    }

    #[test]
    fn test_hvcc_length_size() {
        for minus_one in 0..4u8 {
            let probe = classify_extradata(&hvcc(minus_one), Framing::annexb(4));
            assert_eq!(probe.kind, ExtradataKind::LengthPrefixed);
            assert_eq!(probe.framing, Framing::packetized(minus_one + 1));
        }
    }

    #[test]
    fn test_short_record_keeps_default_length_size() {
        let probe = classify_extradata(&[1, 2, 3, 4, 5], Framing::annexb(2));
        assert_eq!(probe.framing, Framing::packetized(2));
    }

    #[test]
    fn test_start_codes_are_annexb() {
        let three = [0x00, 0x00, 0x01, 0x40, 0x01, 0x0C];
        let four = [0x00, 0x00, 0x00, 0x01, 0x40, 0x01];
        for extradata in [&three[..], &four[..]] {
            let probe = classify_extradata(extradata, Framing::packetized(4));
            assert_eq!(probe.kind, ExtradataKind::AnnexB);
            assert!(!probe.framing.packetized);
            assert!(probe.needs_priming());
        }
    }

    #[test]
    fn test_third_byte_two_is_packetized() {
        let probe = classify_extradata(&[0x00, 0x00, 0x02, 0x00], Framing::annexb(4));
        assert_eq!(probe.kind, ExtradataKind::LengthPrefixed);
    }
}
