//! Property-based tests for the decode loop and plane copies.

use proptest::prelude::*;

use hs_common::{Block, ImagePlane, InputFormat, Plane, Resolution, SessionConfig, Timestamp};
use hs_decoder::materialize::copy_plane;
use hs_decoder::testing::{MockEngine, MockHost, MockImage};
use hs_decoder::{DecoderSession, LatenessState};

fn hvcc_extradata(length_size: u8) -> Vec<u8> {
    let mut record = vec![0u8; 23];
    record[0] = 0x01;
    record[21] = 0xFC | (length_size - 1);
    record
}

fn session_with(
    length_size: u8,
    engine: MockEngine,
    host: MockHost,
) -> DecoderSession<MockEngine, MockHost> {
    let input = InputFormat::hevc(Resolution::new(64, 64))
        .with_extradata(hvcc_extradata(length_size));
    DecoderSession::open(engine, host, &input, SessionConfig::default()).unwrap()
}

fn pack(nals: &[Vec<u8>], ls: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes()[4 - ls as usize..]);
        out.extend_from_slice(nal);
    }
    out
}

// ─── Packetized pushes ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn every_packed_nal_is_pushed_once(
        ls in 1u8..=4,
        nals in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..120), 1..10),
    ) {
        let mut session = session_with(ls, MockEngine::new(), MockHost::new());
        let block = Block::new(pack(&nals, ls));
        prop_assert_eq!(session.try_decode(Some(block)), Ok(None));

        let pushed = session.engine().pushed_nals();
        prop_assert_eq!(pushed.len(), nals.len());
        for (got, want) in pushed.iter().zip(&nals) {
            prop_assert_eq!(*got, &want[..]);
        }
    }

    #[test]
    fn null_block_never_changes_anything(late in 0u32..40, start_ms in 0i64..10_000) {
        let mut session = session_with(4, MockEngine::new(), MockHost::new());
        let lateness = LatenessState::late_since(late, Timestamp::from_millis(start_ms));
        session.set_lateness(lateness);
        let calls = session.engine().calls.clone();

        prop_assert_eq!(session.try_decode(None), Ok(None));
        prop_assert_eq!(session.try_decode(Some(Block::default())), Ok(None));
        prop_assert_eq!(*session.lateness(), lateness);
        prop_assert_eq!(&session.engine().calls, &calls);
    }

    #[test]
    fn above_hard_limit_nothing_is_pushed(late in 13u32..200, blocks in 1usize..20) {
        let now = Timestamp::from_millis(1_000);
        let mut session = session_with(4, MockEngine::new(), MockHost::at(now));
        session.set_lateness(LatenessState::late_since(late, now));

        let drops = blocks.min((late - 12) as usize);
        for _ in 0..drops {
            let result = session.try_decode(Some(Block::new(vec![0, 0, 0, 1, 0x02])));
            prop_assert!(result.is_err());
        }
        prop_assert_eq!(session.engine().push_count(), 0);
        prop_assert_eq!(session.lateness().late_frames(), late - drops as u32);
    }
}

// ─── Plane copies ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn copy_is_min_stride_times_lines(
        src_stride in 1usize..96,
        dst_pitch in 1usize..96,
        lines in 0usize..24,
    ) {
        let src_data: Vec<u8> = (0..src_stride * lines).map(|i| (i * 7) as u8).collect();
        let src = ImagePlane { data: &src_data, stride: src_stride };
        let mut dst = Plane::new(dst_pitch, lines);
        dst.pixels.fill(0xA5);

        let copied = copy_plane(&src, &mut dst);
        let size = src_stride.min(dst_pitch);
        prop_assert_eq!(copied, size * lines);

        for line in 0..lines {
            let got = dst.line(line);
            prop_assert_eq!(&got[..size], &src_data[line * src_stride..line * src_stride + size]);
            prop_assert!(got[size..].iter().all(|&b| b == 0xA5));
        }
    }

    #[test]
    fn decoded_picture_matches_source_planes(
        width in 1u32..40,
        height in 1u32..24,
        pad in 0usize..20,
    ) {
        let strides = [
            width as usize + pad,
            (width as usize).div_ceil(2) + pad,
            (width as usize).div_ceil(2) + pad,
        ];
        let image = MockImage::i420_with_strides(width, height, Timestamp::ZERO, strides);
        let expected = image.clone();
        let mut session = session_with(4, MockEngine::with_images([image]), MockHost::new());

        let picture = session
            .decode(Some(Block::new(vec![0, 0, 0, 1, 0x02])))
            .unwrap();
        for (index, plane) in picture.planes.iter().enumerate() {
            let (src, stride) = &expected.planes[index];
            let size = (*stride).min(plane.pitch);
            for line in 0..plane.visible_lines {
                prop_assert_eq!(
                    &plane.line(line)[..size],
                    &src[line * stride..line * stride + size]
                );
            }
        }
    }
}
