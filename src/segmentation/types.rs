use image::{GrayImage, RgbImage};

/// Binary object mask: 255 = object, 0 = background
/// Dimensions match the input frame dimensions
pub type Mask = GrayImage;

/// Mask value of an object pixel
pub const OBJECT: u8 = 255;

/// Inclusive HSV window on the 8-bit scale (H in 0-179, S and V in 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }
}

impl Default for HsvRange {
    /// Lemon green
    fn default() -> Self {
        Self::new([30, 50, 50], [85, 255, 255])
    }
}

/// Trait for segmentation backends
/// Turns a colour frame into an object/background mask
pub trait Segmenter {
    /// Segment a frame
    ///
    /// # Arguments
    /// * `frame` - Input RGB frame
    ///
    /// # Returns
    /// * Binary mask with the frame's dimensions
    fn segment(&self, frame: &RgbImage) -> Mask;
}
