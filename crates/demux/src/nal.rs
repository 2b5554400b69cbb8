//! NAL unit splitting — length-prefixed and Annex-B framing, HEVC header inspection.

use byteorder::{BigEndian, ByteOrder};

use hs_common::FramingError;

/// Annex-B start code (4 bytes).
pub const ANNEXB_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL unit type for H.265, from the 6-bit `nal_unit_type` header field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HevcNalType {
    /// Non-IRAP VCL NAL unit (types 0..=15).
    Slice(u8),
    BlaWLp,
    BlaWRadl,
    BlaNLp,
    IdrWRadl,
    IdrNLp,
    Cra,
    /// Reserved IRAP types 22 and 23.
    ReservedIrap(u8),
    Vps,
    Sps,
    Pps,
    Aud,
    EndSeq,
    EndStream,
    FillerData,
    PrefixSei,
    SuffixSei,
    Other(u8),
}

impl HevcNalType {
    /// Parse the first byte of a NAL unit header.
    pub fn from_header(first_byte: u8) -> Self {
        Self::from((first_byte >> 1) & 0x3F)
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::Slice(t) | Self::ReservedIrap(t) | Self::Other(t) => t,
            Self::BlaWLp => 16,
            Self::BlaWRadl => 17,
            Self::BlaNLp => 18,
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::EndSeq => 36,
            Self::EndStream => 37,
            Self::FillerData => 38,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
        }
    }

    /// Coded slice data (types 0..=31).
    pub fn is_vcl(self) -> bool {
        self.raw() < 32
    }

    /// Random access point: a decoder can start here.
    pub fn is_irap(self) -> bool {
        (16..=23).contains(&self.raw())
    }

    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }
}

impl From<u8> for HevcNalType {
    fn from(val: u8) -> Self {
        match val & 0x3F {
            t @ 0..=15 => Self::Slice(t),
            16 => Self::BlaWLp,
            17 => Self::BlaWRadl,
            18 => Self::BlaNLp,
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            t @ 22..=23 => Self::ReservedIrap(t),
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            36 => Self::EndSeq,
            37 => Self::EndStream,
            38 => Self::FillerData,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            other => Self::Other(other),
        }
    }
}

/// A NAL unit viewed in place inside its block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// Offset of the first payload byte in the block.
    pub offset: usize,
    /// Payload, without start code or length prefix.
    pub data: &'a [u8],
}

impl NalUnit<'_> {
    pub fn nal_type(&self) -> Option<HevcNalType> {
        self.data.first().map(|&b| HevcNalType::from_header(b))
    }
}

/// Iterator over length-prefixed NAL units.
///
/// Stops when fewer than `length_size` bytes remain. A prefix that declares
/// more bytes than are left yields one [`FramingError`] and ends iteration.
#[derive(Clone, Debug)]
pub struct LengthPrefixedNals<'a> {
    data: &'a [u8],
    pos: usize,
    length_size: usize,
    failed: bool,
}

impl<'a> LengthPrefixedNals<'a> {
    /// `length_size` must be 1..=4.
    pub fn new(data: &'a [u8], length_size: u8) -> Self {
        debug_assert!((1..=4).contains(&length_size));
        Self {
            data,
            pos: 0,
            length_size: length_size as usize,
            failed: false,
        }
    }
}

impl<'a> Iterator for LengthPrefixedNals<'a> {
    type Item = Result<NalUnit<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.len() - self.pos < self.length_size {
            return None;
        }

        let prefix = &self.data[self.pos..self.pos + self.length_size];
        let declared = BigEndian::read_uint(prefix, self.length_size) as usize;
        let offset = self.pos + self.length_size;
        let remaining = self.data.len() - offset;

        if declared > remaining {
            self.failed = true;
            return Some(Err(FramingError {
                offset,
                declared,
                remaining,
            }));
        }

        self.pos = offset + declared;
        Some(Ok(NalUnit {
            offset,
            data: &self.data[offset..offset + declared],
        }))
    }
}

/// Split a length-prefixed block into NAL units.
pub fn split_length_prefixed(data: &[u8], length_size: u8) -> LengthPrefixedNals<'_> {
    LengthPrefixedNals::new(data, length_size)
}

/// Iterator over start-code delimited NAL units of an Annex-B byte stream.
///
/// Bytes before the first start code are skipped, as are trailing zero bytes
/// of each unit (they belong to the next 4-byte start code).
#[derive(Clone, Debug)]
pub struct AnnexBNals<'a> {
    data: &'a [u8],
    /// Payload start of the next unit, once a start code has been found.
    next: Option<usize>,
}

impl<'a> AnnexBNals<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let next = find_start_code(data, 0).map(|sc| sc + 3);
        Self { data, next }
    }
}

impl<'a> Iterator for AnnexBNals<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let offset = self.next?;
            let end = match find_start_code(self.data, offset) {
                Some(sc) => {
                    self.next = Some(sc + 3);
                    sc
                }
                None => {
                    self.next = None;
                    self.data.len()
                }
            };

            let mut payload = &self.data[offset..end];
            while let [rest @ .., 0] = payload {
                payload = rest;
            }
            if !payload.is_empty() {
                return Some(NalUnit {
                    offset,
                    data: payload,
                });
            }
        }
    }
}

/// Split an Annex-B byte stream into NAL units.
pub fn split_annexb(data: &[u8]) -> AnnexBNals<'_> {
    AnnexBNals::new(data)
}

/// Position of the next `00 00 01` at or after `from`.
fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(3)
        .position(|w| w == [0x00, 0x00, 0x01])
        .map(|p| from + p)
}

/// True if `nal` opens a new access unit once the current one holds a slice.
fn starts_access_unit(nal: &[u8]) -> bool {
    let Some(&first) = nal.first() else {
        return false;
    };
    let nal_type = HevcNalType::from_header(first);
    if nal_type.is_vcl() {
        // first_slice_segment_in_pic_flag is the first bit after the 2-byte header.
        return nal.get(2).is_some_and(|b| b & 0x80 != 0);
    }
    matches!(nal_type.raw(), 32..=35 | 39 | 41..=44 | 48..=55)
}

/// Split an Annex-B byte stream into access units (one coded picture each).
///
/// Each returned slice is a contiguous piece of `data`, start codes included,
/// and the slices together cover all of `data`.
pub fn split_access_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut au_start = 0;
    let mut boundary = 0;
    let mut seen_vcl = false;

    for nal in split_annexb(data) {
        if seen_vcl && starts_access_unit(nal.data) {
            units.push(&data[au_start..boundary]);
            au_start = boundary;
            seen_vcl = false;
        }
        if nal.nal_type().is_some_and(HevcNalType::is_vcl) {
            seen_vcl = true;
        }
        boundary = nal.offset + nal.data.len();
    }

    if au_start < data.len() {
        units.push(&data[au_start..]);
    }
    units
}

/// Convert an Annex-B byte stream to length-prefixed NAL units.
///
/// Returns `None` if `length_size` is not 1..=4 or a unit is too long for it.
pub fn annexb_to_length_prefixed(data: &[u8], length_size: u8) -> Option<Vec<u8>> {
    if !(1..=4).contains(&length_size) {
        return None;
    }
    let ls = length_size as usize;
    let max_len = (1u64 << (8 * ls)) - 1;
    let mut output = Vec::with_capacity(data.len() + 16);
    let mut prefix = [0u8; 4];

    for nal in split_annexb(data) {
        let len = nal.data.len() as u64;
        if len > max_len {
            return None;
        }
        BigEndian::write_uint(&mut prefix[..ls], len, ls);
        output.extend_from_slice(&prefix[..ls]);
        output.extend_from_slice(nal.data);
    }

    Some(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nal_type_parsing() {
        assert_eq!(HevcNalType::from_header(0x40), HevcNalType::Vps); // 32 << 1
        assert_eq!(HevcNalType::from_header(0x42), HevcNalType::Sps);
        assert_eq!(HevcNalType::from_header(0x44), HevcNalType::Pps);
        assert_eq!(HevcNalType::from_header(0x26), HevcNalType::IdrWRadl); // 19 << 1
        assert_eq!(HevcNalType::from_header(0x02), HevcNalType::Slice(1));
        assert!(HevcNalType::IdrNLp.is_irap());
        assert!(HevcNalType::Cra.is_vcl());
        assert!(!HevcNalType::Sps.is_vcl());
        assert!(HevcNalType::Pps.is_parameter_set());
    }

    #[test]
    fn length_prefixed_basic() {
        let data = [0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB, 0x00, 0x00, 0x00, 0x01, 0xCC];
        let nals: Vec<_> = split_length_prefixed(&data, 4)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(nals.len(), 2);
        assert_eq!(nals[0].offset, 4);
        assert_eq!(nals[0].data, &[0xAA, 0xBB]);
        assert_eq!(nals[1].offset, 10);
        assert_eq!(nals[1].data, &[0xCC]);
    }

    #[test]
    fn length_prefixed_stops_on_short_tail() {
        let data = [0x01, 0xAA, 0x00];
        let nals: Vec<_> = split_length_prefixed(&data, 2).collect();
        assert_eq!(nals.len(), 1);
        assert_eq!(nals[0].as_ref().unwrap().data, &[0xAA]);
    }

    #[test]
    fn length_prefixed_overrun_is_framing_error() {
        let data = [0x05, 0xAA, 0xBB, 0x01, 0xCC];
        let mut nals = split_length_prefixed(&data, 1);
        assert_eq!(
            nals.next(),
            Some(Err(FramingError {
                offset: 1,
                declared: 5,
                remaining: 4
            }))
        );
        assert_eq!(nals.next(), None);
    }

    #[test]
    fn zero_length_nal_is_yielded() {
        let data = [0x00, 0x00];
        let nals: Vec<_> = split_length_prefixed(&data, 2).collect();
        assert_eq!(nals.len(), 1);
        assert!(nals[0].as_ref().unwrap().data.is_empty());
    }

    #[test]
    fn annexb_split_mixed_start_codes() {
        let data = [
            0xFF, // garbage before first start code
            0x00, 0x00, 0x00, 0x01, 0x40, 0x01, // VPS, 4-byte start code
            0x00, 0x00, 0x01, 0x42, 0x01, 0x05, // SPS, 3-byte start code
            0x00, 0x00, 0x00, 0x01, 0x26, 0x01, 0x80,
        ];
        let nals: Vec<_> = split_annexb(&data).collect();
        assert_eq!(nals.len(), 3);
        assert_eq!(nals[0].data, &[0x40, 0x01]);
        assert_eq!(nals[0].offset, 5);
        assert_eq!(nals[1].data, &[0x42, 0x01, 0x05]);
        assert_eq!(nals[2].data, &[0x26, 0x01, 0x80]);
        assert_eq!(nals[2].nal_type(), Some(HevcNalType::IdrWRadl));
    }

    #[test]
    fn annexb_without_start_code_is_empty() {
        assert_eq!(split_annexb(&[0x40, 0x01, 0x02]).count(), 0);
    }

    #[test]
    fn access_units_split_on_first_slice() {
        let mut data = Vec::new();
        for nal in [
            &[0x40, 0x01][..],       // VPS
            &[0x42, 0x01, 0x01],     // SPS
            &[0x44, 0x01, 0x01],     // PPS
            &[0x26, 0x01, 0x80],     // IDR, first slice
            &[0x26, 0x01, 0x20],     // IDR, second slice of the same picture
            &[0x02, 0x01, 0x80],     // TRAIL_R, first slice
            &[0x4E, 0x01, 0x05],     // prefix SEI
            &[0x02, 0x01, 0x80],     // TRAIL_R, first slice
        ] {
            data.extend_from_slice(&ANNEXB_START_CODE);
            data.extend_from_slice(nal);
        }

        let units = split_access_units(&data);
        assert_eq!(units.len(), 3);
        assert_eq!(units.iter().map(|u| u.len()).sum::<usize>(), data.len());
        assert_eq!(split_annexb(units[0]).count(), 5);
        assert_eq!(split_annexb(units[1]).count(), 1);
        assert_eq!(split_annexb(units[2]).count(), 2);
    }

    #[test]
    fn annexb_to_length_prefixed_basic() {
        let annexb = [0x00, 0x00, 0x00, 0x01, 0x40, 0x01, 0x00, 0x00, 0x01, 0x42];
        let packed = annexb_to_length_prefixed(&annexb, 4).unwrap();
        assert_eq!(packed, vec![0, 0, 0, 2, 0x40, 0x01, 0, 0, 0, 1, 0x42]);

        let nals: Vec<_> = split_length_prefixed(&packed, 4)
            .map(|n| n.unwrap().data)
            .collect();
        assert_eq!(nals, vec![&[0x40, 0x01][..], &[0x42][..]]);
    }

    #[test]
    fn annexb_to_length_prefixed_rejects_oversized_units() {
        let mut annexb = ANNEXB_START_CODE.to_vec();
        annexb.extend_from_slice(&[0x11; 300]);
        assert!(annexb_to_length_prefixed(&annexb, 1).is_none());
        assert!(annexb_to_length_prefixed(&annexb, 2).is_some());
        assert!(annexb_to_length_prefixed(&annexb, 5).is_none());
    }
}
