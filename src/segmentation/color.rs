use super::types::{HsvRange, Mask, Segmenter, OBJECT};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// Radius of the square structuring element (radius 2 = 5x5)
pub const KERNEL_RADIUS: u8 = 2;

/// Fixed colour-range segmenter
///
/// Thresholds each pixel against an HSV window, then denoises the mask with
/// a morphological opening followed by a closing.
#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    range: HsvRange,
    kernel_radius: u8,
}

impl ColorSegmenter {
    pub fn new(range: HsvRange) -> Self {
        Self {
            range,
            kernel_radius: KERNEL_RADIUS,
        }
    }

    pub fn range(&self) -> HsvRange {
        self.range
    }

    /// Raw in-range test, before any morphology
    pub fn threshold(&self, frame: &RgbImage) -> Mask {
        let (width, height) = frame.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            let p = frame.get_pixel(x, y);
            let hsv = rgb_to_hsv([p[0], p[1], p[2]]);
            Luma([if self.range.contains(hsv) { OBJECT } else { 0 }])
        })
    }
}

impl Default for ColorSegmenter {
    fn default() -> Self {
        Self::new(HsvRange::default())
    }
}

impl Segmenter for ColorSegmenter {
    fn segment(&self, frame: &RgbImage) -> Mask {
        let _span = tracing::debug_span!("segment").entered();

        let raw = self.threshold(frame);
        // LInf norm makes the structuring element a square
        let opened = morphology::open(&raw, Norm::LInf, self.kernel_radius);
        morphology::close(&opened, Norm::LInf, self.kernel_radius)
    }
}

/// Convert an 8-bit RGB pixel to 8-bit HSV
///
/// Hue is halved to fit a byte and wraps into 0-179, saturation and value
/// span 0-255.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        ((h / 2.0).round() as u16 % 180) as u8,
        s.round() as u8,
        max as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const GREEN: Rgb<u8> = Rgb([40, 200, 40]);
    const GREY: Rgb<u8> = Rgb([90, 90, 90]);

    fn frame_with_square(x0: u32, y0: u32, side: u32) -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                GREEN
            } else {
                GREY
            }
        })
    }

    fn object_pixels(mask: &Mask) -> usize {
        mask.pixels().filter(|p| p[0] == OBJECT).count()
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn test_hue_wraps_below_180() {
        // hue 359.5 degrees rounds to 180 on the halved scale
        assert_eq!(rgb_to_hsv([255, 0, 2])[0], 0);
        assert_eq!(rgb_to_hsv([255, 0, 6])[0], 179);
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = HsvRange::default();
        assert!(range.contains([30, 50, 50]));
        assert!(range.contains([85, 255, 255]));
        assert!(!range.contains([29, 200, 200]));
        assert!(!range.contains([86, 200, 200]));
        assert!(!range.contains([60, 49, 200]));
        assert!(!range.contains([60, 200, 49]));
    }

    #[test]
    fn test_threshold_selects_green() {
        let segmenter = ColorSegmenter::default();
        let mask = segmenter.threshold(&frame_with_square(10, 10, 20));
        assert_eq!(object_pixels(&mask), 400);
        assert_eq!(mask.get_pixel(15, 15)[0], OBJECT);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_dark_green_is_background() {
        let segmenter = ColorSegmenter::default();
        let frame = RgbImage::from_pixel(8, 8, Rgb([0, 40, 0]));
        assert_eq!(object_pixels(&segmenter.segment(&frame)), 0);
    }

    #[test]
    fn test_opening_removes_speckle() {
        let segmenter = ColorSegmenter::default();
        let mut frame = frame_with_square(10, 10, 20);
        frame.put_pixel(50, 50, GREEN);
        frame.put_pixel(51, 50, GREEN);

        let mask = segmenter.segment(&frame);
        assert_eq!(mask.get_pixel(50, 50)[0], 0);
        assert_eq!(mask.get_pixel(51, 50)[0], 0);
        assert_eq!(object_pixels(&mask), 400);
    }

    #[test]
    fn test_closing_fills_small_hole() {
        let segmenter = ColorSegmenter::default();
        let mut frame = frame_with_square(10, 10, 30);
        for y in 24..27 {
            for x in 24..27 {
                frame.put_pixel(x, y, GREY);
            }
        }

        let mask = segmenter.segment(&frame);
        assert_eq!(mask.get_pixel(25, 25)[0], OBJECT);
        assert_eq!(object_pixels(&mask), 900);
    }
}
