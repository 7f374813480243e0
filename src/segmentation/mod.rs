mod color;
pub mod types;

pub use color::ColorSegmenter;
pub use types::{HsvRange, Mask, Segmenter, OBJECT};
