use super::contour::{external_contours, Contour};
use crate::segmentation::Mask;
use image::Rgb;
use std::fmt;
use std::ops::AddAssign;

/// Contours below this area are noise and never reach classification
pub const MIN_CONTOUR_AREA: f64 = 3_000.0;
/// Lower bound (inclusive) of the SMALL band
pub const SMALL_MIN_AREA: f64 = 10_000.0;
/// Lower bound (inclusive) of the MEDIUM band, upper bound of SMALL
pub const MEDIUM_MIN_AREA: f64 = 75_000.0;
/// Upper bound (exclusive) of MEDIUM; LARGE starts strictly above it
pub const LARGE_AREA_FLOOR: f64 = 110_000.0;

/// Annotation colour for detections that fall between the bands
pub const UNCLASSIFIED_COLOR: Rgb<u8> = Rgb([160, 160, 170]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::Small, SizeClass::Medium, SizeClass::Large];

    /// Map an area onto its band
    ///
    /// `[3000, 10000)` and exactly `110000` belong to no band.
    pub fn from_area(area: f64) -> Option<Self> {
        if (SMALL_MIN_AREA..MEDIUM_MIN_AREA).contains(&area) {
            Some(SizeClass::Small)
        } else if (MEDIUM_MIN_AREA..LARGE_AREA_FLOOR).contains(&area) {
            Some(SizeClass::Medium)
        } else if area > LARGE_AREA_FLOOR {
            Some(SizeClass::Large)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeClass::Small => "SMALL",
            SizeClass::Medium => "MEDIUM",
            SizeClass::Large => "LARGE",
        }
    }

    pub fn color(self) -> Rgb<u8> {
        match self {
            SizeClass::Small => Rgb([255, 150, 0]),
            SizeClass::Medium => Rgb([220, 180, 0]),
            SizeClass::Large => Rgb([210, 180, 30]),
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of contours per size class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
}

impl ClassCounts {
    pub fn get(&self, class: SizeClass) -> u64 {
        match class {
            SizeClass::Small => self.small,
            SizeClass::Medium => self.medium,
            SizeClass::Large => self.large,
        }
    }

    pub fn increment(&mut self, class: SizeClass) {
        match class {
            SizeClass::Small => self.small += 1,
            SizeClass::Medium => self.medium += 1,
            SizeClass::Large => self.large += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.small + self.medium + self.large
    }
}

impl AddAssign for ClassCounts {
    fn add_assign(&mut self, other: Self) {
        self.small += other.small;
        self.medium += other.medium;
        self.large += other.large;
    }
}

/// One contour that survived the noise filter
#[derive(Debug, Clone)]
pub struct Detection {
    pub contour: Contour,
    pub class: Option<SizeClass>,
}

impl Detection {
    pub fn color(&self) -> Rgb<u8> {
        self.class.map_or(UNCLASSIFIED_COLOR, SizeClass::color)
    }
}

/// Per-frame classification result
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Class of the last contour (in extraction order) that landed in a band
    pub dominant: Option<SizeClass>,
    /// Histogram for this frame only
    pub counts: ClassCounts,
    /// True iff any contour passed the noise filter
    pub detected: bool,
    pub detections: Vec<Detection>,
}

/// Assigns size classes to mask regions by contour area
#[derive(Debug, Clone, Copy, Default)]
pub struct ContourClassifier;

impl ContourClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Extract external contours from a mask and classify them
    pub fn classify_mask(&self, mask: &Mask) -> Classification {
        let _span = tracing::debug_span!("classify").entered();
        self.classify(external_contours(mask))
    }

    /// Classify contours in the order given
    ///
    /// The dominant class is overwritten by every contour that receives a
    /// class, so the last classified contour wins.
    pub fn classify(&self, contours: Vec<Contour>) -> Classification {
        let mut result = Classification::default();

        for contour in contours {
            if contour.area() < MIN_CONTOUR_AREA {
                continue;
            }
            result.detected = true;

            let class = SizeClass::from_area(contour.area());
            if let Some(class) = class {
                result.counts.increment(class);
                result.dominant = Some(class);
            }
            result.detections.push(Detection { contour, class });
        }

        result
    }
}
