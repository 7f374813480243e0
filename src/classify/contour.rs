use crate::segmentation::Mask;
use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Outer boundary of one connected mask region
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point<i32>>,
    area: f64,
    bounds: Rect,
}

impl Contour {
    /// Build a contour from its boundary points, in tracing order
    ///
    /// Returns `None` for an empty point list.
    pub fn new(points: Vec<Point<i32>>) -> Option<Self> {
        let first = *points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let bounds = Rect::at(min_x, min_y)
            .of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32);
        let area = polygon_area(&points);

        Some(Self {
            points,
            area,
            bounds,
        })
    }

    pub fn points(&self) -> &[Point<i32>] {
        &self.points
    }

    /// Area enclosed by the boundary polygon
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Axis-aligned bounding box, inclusive of the boundary pixels
    pub fn bounding_rect(&self) -> Rect {
        self.bounds
    }
}

/// Extract the outermost contours of a mask
///
/// Holes, and anything nested inside a hole, are ignored. Regions touching
/// the frame edge are traced like any other.
pub fn external_contours(mask: &Mask) -> Vec<Contour> {
    // find_contours never starts an outer border in column 0, so trace a copy
    // with a one pixel background frame and shift the points back
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            Contour::new(points)
        })
        .collect()
}

/// Shoelace area of a closed polygon
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

#[cfg(test)]
pub(crate) fn rectangle(x: i32, y: i32, width: i32, height: i32) -> Contour {
    Contour::new(vec![
        Point::new(x, y),
        Point::new(x + width, y),
        Point::new(x + width, y + height),
        Point::new(x, y + height),
    ])
    .unwrap()
}
