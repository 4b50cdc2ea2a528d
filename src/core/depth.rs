//! Depth visualization by cumulative-histogram equalization.
//!
//! Raw depth readings are remapped so that nearer surfaces appear brighter and
//! depth gradations stay visible regardless of how the scene is distributed.
//! A reading of 0 means "no data": it is excluded from the histogram and the
//! matching output pixel is left to the caller's background policy.

use crate::source::types::Frame;

/// Number of intensity levels produced by the mapping.
const INTENSITY_LEVELS: u64 = 256;

/// Build the depth → intensity lookup table for a frame.
///
/// The returned table has `max_depth + 1` entries and is indexed by raw depth.
/// Entry 0 is unused and always 0. Readings above `max_depth` are clamped to
/// `max_depth`. When the frame has no valid reading every entry is 0.
///
/// For `d1 < d2`, `table[d1] >= table[d2]`.
pub fn equalize(frame: &Frame, max_depth: u16) -> Vec<u8> {
    let max_depth = max_depth as usize;
    let mut counts = vec![0u64; max_depth + 1];

    for &depth in frame.samples() {
        if depth != 0 {
            counts[(depth as usize).min(max_depth)] += 1;
        }
    }

    for i in 1..=max_depth {
        counts[i] += counts[i - 1];
    }

    let total = counts[max_depth];
    let mut table = vec![0u8; max_depth + 1];
    if total == 0 {
        return table;
    }

    for i in 1..=max_depth {
        // floor(256 * (1 - counts[i] / total)) in integer arithmetic
        let level = INTENSITY_LEVELS * (total - counts[i]) / total;
        table[i] = level.min(255) as u8;
    }

    table
}

/// Write mapped intensities for every pixel with a valid reading.
///
/// Pixels whose depth is 0 are not touched. `out` must hold one byte per pixel.
pub fn apply_table(frame: &Frame, table: &[u8], out: &mut [u8]) {
    let max_index = table.len().saturating_sub(1);
    for (dst, &depth) in out.iter_mut().zip(frame.samples()) {
        if depth != 0 {
            *dst = table[(depth as usize).min(max_index)];
        }
    }
}

/// Equalize a depth frame into a fresh grayscale buffer of `width * height` bytes.
///
/// Pixels without a reading are filled with `background`.
pub fn render_intensity(frame: &Frame, max_depth: u16, background: u8) -> Vec<u8> {
    let table = equalize(frame, max_depth);
    let mut out = vec![background; frame.pixel_count()];
    apply_table(frame, &table, &mut out);
    out
}

/// Pass-through rendering for image streams: samples are clamped into a byte.
pub fn render_image(frame: &Frame) -> Vec<u8> {
    frame
        .samples()
        .iter()
        .map(|&s| s.min(u8::MAX as u16) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::StreamId;

    fn depth_frame(width: u32, height: u32, samples: Vec<u16>) -> Frame {
        Frame::new(width, height, samples, 0, 0, StreamId(1)).unwrap()
    }

    #[test]
    fn test_all_zero_frame_maps_to_background() {
        let frame = depth_frame(4, 4, vec![0; 16]);
        let table = equalize(&frame, 100);
        assert_eq!(table.len(), 101);
        assert!(table.iter().all(|&v| v == 0));

        let rendered = render_intensity(&frame, 100, 7);
        assert!(rendered.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_nearer_is_brighter() {
        let frame = depth_frame(4, 1, vec![100, 200, 300, 400]);
        let table = equalize(&frame, 500);

        // counts at or nearer: 1, 2, 3, 4 of 4
        assert_eq!(table[100], 192);
        assert_eq!(table[200], 128);
        assert_eq!(table[300], 64);
        assert_eq!(table[400], 0);
        // depths between readings share the cumulative count below them
        assert_eq!(table[150], 192);
        // nothing nearer than the first reading
        assert_eq!(table[50], 255);
    }

    #[test]
    fn test_table_is_monotonic() {
        let samples: Vec<u16> = (0..64u16).map(|i| (i * 37) % 900).collect();
        let frame = depth_frame(8, 8, samples);
        let table = equalize(&frame, 1000);
        for pair in table[1..].windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_equalize_is_deterministic() {
        let samples: Vec<u16> = (0..100u16).map(|i| (i * 13) % 70).collect();
        let frame = depth_frame(10, 10, samples);
        assert_eq!(equalize(&frame, 80), equalize(&frame, 80));
        assert_eq!(
            render_intensity(&frame, 80, 0),
            render_intensity(&frame, 80, 0)
        );
    }

    #[test]
    fn test_zero_pixels_are_not_rewritten() {
        let frame = depth_frame(3, 1, vec![0, 10, 0]);
        let table = equalize(&frame, 20);
        let mut out = vec![42u8; 3];
        apply_table(&frame, &table, &mut out);
        assert_eq!(out[0], 42);
        assert_eq!(out[2], 42);
        assert_eq!(out[1], 0);
    }

    #[test]
    fn test_readings_above_max_are_clamped() {
        let frame = depth_frame(2, 1, vec![5, 60]);
        let table = equalize(&frame, 10);
        let out = render_intensity(&frame, 10, 0);
        assert_eq!(table[5], 128);
        assert_eq!(out, vec![128, 0]);
    }

    #[test]
    fn test_image_passthrough_clamps() {
        let frame = depth_frame(3, 1, vec![0, 200, 900]);
        assert_eq!(render_image(&frame), vec![0, 200, 255]);
    }
}
