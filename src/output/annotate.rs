use crate::classify::Detection;
use image::RgbImage;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Outline thickness in pixels
const BOX_THICKNESS: u32 = 3;

/// Outline every detection's bounding box in its class colour
pub fn annotate(frame: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let rect = detection.contour.bounding_rect();
        let color = detection.color();

        for inset in 0..BOX_THICKNESS {
            if rect.width() <= 2 * inset || rect.height() <= 2 * inset {
                break;
            }
            let inner = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32)
                .of_size(rect.width() - 2 * inset, rect.height() - 2 * inset);
            draw_hollow_rect_mut(frame, inner, color);
        }
    }
}
