//! Frame materialization — copy an engine image into an output picture.

use hs_common::{DecodedImage, ImagePlane, Picture, Plane, Resolution, VideoFormat};

/// Copy the visible lines of one plane.
///
/// Each line copies `min(src.stride, dst.pitch)` bytes and both sides advance
/// by their own stride. Copying stops early if the source runs out of lines.
/// Returns the number of bytes written.
pub fn copy_plane(src: &ImagePlane<'_>, dst: &mut Plane) -> usize {
    let size = src.stride.min(dst.pitch);
    if size == 0 {
        return 0;
    }

    let mut copied = 0;
    let src_lines = src.data.chunks(src.stride);
    let dst_lines = dst.pixels.chunks_mut(dst.pitch);
    for (src_line, dst_line) in src_lines.zip(dst_lines).take(dst.visible_lines) {
        if src_line.len() < size || dst_line.len() < size {
            break;
        }
        dst_line[..size].copy_from_slice(&src_line[..size]);
        copied += size;
    }
    copied
}

/// Copy every plane of `image` into `picture`. Returns the bytes written.
///
/// Planes the image does not have are left untouched.
pub fn copy_image<I: DecodedImage + ?Sized>(image: &I, picture: &mut Picture) -> usize {
    picture
        .planes
        .iter_mut()
        .enumerate()
        .filter_map(|(index, dst)| image.plane(index).map(|src| copy_plane(&src, dst)))
        .sum()
}

/// Bring `format` in line with the image's luma size.
///
/// Returns true if the coded or visible geometry changed.
pub fn renegotiate(format: &mut VideoFormat, width: u32, height: u32) -> bool {
    let size = Resolution::new(width, height);
    let mut changed = false;
    if format.resolution != size {
        format.resolution = size;
        changed = true;
    }
    if format.visible != size {
        format.visible = size;
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_common::{ChromaFormat, Timestamp};

    fn plane_of(stride: usize, lines: usize) -> Vec<u8> {
        (0..stride * lines).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn narrower_destination_truncates_lines() {
        let data = plane_of(16, 4);
        let src = ImagePlane {
            data: &data,
            stride: 16,
        };
        let mut dst = Plane::new(8, 4);
        assert_eq!(copy_plane(&src, &mut dst), 8 * 4);
        for line in 0..4 {
            assert_eq!(dst.line(line), &data[line * 16..line * 16 + 8]);
        }
    }

    #[test]
    fn wider_destination_keeps_padding() {
        let data = plane_of(8, 3);
        let src = ImagePlane {
            data: &data,
            stride: 8,
        };
        let mut dst = Plane::new(12, 3);
        dst.pixels.fill(0xEE);
        assert_eq!(copy_plane(&src, &mut dst), 8 * 3);
        for line in 0..3 {
            assert_eq!(&dst.line(line)[..8], &data[line * 8..line * 8 + 8]);
            assert_eq!(&dst.line(line)[8..], &[0xEE; 4]);
        }
    }

    #[test]
    fn short_source_stops_early() {
        let data = plane_of(8, 2);
        let src = ImagePlane {
            data: &data,
            stride: 8,
        };
        let mut dst = Plane::new(8, 5);
        assert_eq!(copy_plane(&src, &mut dst), 16);
    }

    #[test]
    fn renegotiate_reports_changes() {
        let mut format = VideoFormat::i420(Resolution::new(64, 64));
        assert!(!renegotiate(&mut format, 64, 64));
        assert!(renegotiate(&mut format, 128, 72));
        assert_eq!(format.resolution, Resolution::new(128, 72));
        assert_eq!(format.visible, Resolution::new(128, 72));
    }

    struct TwoPlaneImage {
        luma: Vec<u8>,
    }

    impl DecodedImage for TwoPlaneImage {
        fn width(&self) -> u32 {
            4
        }
        fn height(&self) -> u32 {
            2
        }
        fn chroma(&self) -> ChromaFormat {
            ChromaFormat::Yuv420
        }
        fn pts(&self) -> Timestamp {
            Timestamp::ZERO
        }
        fn plane(&self, index: usize) -> Option<ImagePlane<'_>> {
            (index == 0).then(|| ImagePlane {
                data: &self.luma,
                stride: 4,
            })
        }
    }

    #[test]
    fn missing_planes_are_skipped() {
        let image = TwoPlaneImage {
            luma: vec![7; 8],
        };
        let mut picture = Picture::new(&VideoFormat::i420(Resolution::new(4, 2)));
        assert_eq!(copy_image(&image, &mut picture), 8);
        assert_eq!(&picture.planes[0].line(1)[..4], &[7, 7, 7, 7]);
        assert!(picture.planes[1].pixels.iter().all(|&b| b == 0));
    }
}
