mod classifier;
mod contour;

pub use classifier::{
    ClassCounts, Classification, ContourClassifier, Detection, SizeClass, UNCLASSIFIED_COLOR,
};
pub use contour::Contour;
